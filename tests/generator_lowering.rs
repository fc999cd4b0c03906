//! Shape of the kernel code the generator emits
//!
//! These tests look at the lowered statements rather than running them.

use std::sync::Arc;

use torq::interpreter::{Generator, GeneratorError, parse};
use torq::kernel::stmt::{CompleteOrIdent, Stmt, StmtKind};
use torq::kernel::{Ident, Value};

fn lower(source: &str) -> Arc<Stmt> {
    let node = parse(source).unwrap();
    Generator::new().generate_stmt(&node).unwrap()
}

fn lower_err(source: &str) -> GeneratorError {
    let node = parse(source).unwrap();
    Generator::new().generate_stmt(&node).unwrap_err()
}

fn children(stmt: &Stmt) -> Vec<&Stmt> {
    match &stmt.kind {
        StmtKind::Local { body, .. } => vec![body.as_ref()],
        StmtKind::Seq(stmts) => stmts.iter().map(|s| s.as_ref()).collect(),
        StmtKind::If { then, .. } => vec![then.as_ref()],
        StmtKind::IfElse {
            then, otherwise, ..
        } => vec![then.as_ref(), otherwise.as_ref()],
        StmtKind::Case { body, .. } => vec![body.as_ref()],
        StmtKind::CaseElse {
            body, otherwise, ..
        } => vec![body.as_ref(), otherwise.as_ref()],
        StmtKind::Try {
            body, catch_body, ..
        } => vec![body.as_ref(), catch_body.as_ref()],
        _ => Vec::new(),
    }
}

fn find<'a>(stmt: &'a Stmt, pred: &dyn Fn(&Stmt) -> bool) -> Option<&'a Stmt> {
    if pred(stmt) {
        return Some(stmt);
    }
    children(stmt).into_iter().find_map(|child| find(child, pred))
}

fn applies(stmt: &Stmt) -> bool {
    find(stmt, &|s| matches!(s.kind, StmtKind::Apply { .. })).is_some()
}

fn first_if_else(stmt: &Stmt) -> (&Stmt, &Stmt) {
    let found = find(stmt, &|s| matches!(s.kind, StmtKind::IfElse { .. }))
        .unwrap_or_else(|| panic!("no if-else in\n{}", stmt));
    let StmtKind::IfElse {
        then, otherwise, ..
    } = &found.kind
    else {
        unreachable!()
    };
    (then.as_ref(), otherwise.as_ref())
}

#[test]
fn test_and_only_calls_right_operand_when_left_is_true() {
    let stmt = lower("var r = false && f()");
    let (then, otherwise) = first_if_else(&stmt);
    assert!(applies(then));
    assert!(!applies(otherwise));
}

#[test]
fn test_or_only_calls_right_operand_when_left_is_false() {
    let stmt = lower("var r = true || f()");
    let (then, otherwise) = first_if_else(&stmt);
    assert!(!applies(then));
    assert!(applies(otherwise));
}

#[test]
fn test_literal_binds_without_temporary() {
    let stmt = lower("var x = 1");
    let StmtKind::Local { idents, body } = &stmt.kind else {
        panic!("expected local, got\n{}", stmt);
    };
    assert_eq!(idents, &vec![Ident::user("x")]);
    let StmtKind::Bind { target, value } = &body.kind else {
        panic!("expected bind, got\n{}", body);
    };
    assert_eq!(target, &Ident::user("x"));
    assert!(matches!(value, CompleteOrIdent::Value(Value::Int32(1))));
}

#[test]
fn test_nested_expression_gets_temporary() {
    let stmt = lower("var x = (1 + 2) * 3");
    let StmtKind::Local { idents, .. } = &stmt.kind else {
        panic!("expected local, got\n{}", stmt);
    };
    assert_eq!(idents.len(), 2);
    assert!(idents.contains(&Ident::user("x")));
}

#[test]
fn test_loop_jump_labels() {
    let text = lower("for i in [1, 2] do continue end").to_string();
    assert!(text.contains("jump-catch 2"), "{}", text);
    assert!(!text.contains("jump-catch 1"), "{}", text);

    let text = lower("func f() in return 1 end").to_string();
    assert!(text.contains("jump-catch 3"), "{}", text);
}

#[test]
fn test_errors_point_at_offending_node() {
    let err = lower_err("var x = 1\nbreak");
    assert!(matches!(err, GeneratorError::BreakNotAllowed(_)));
    assert_eq!(err.span().text(), "break");
}

#[test]
fn test_free_identifiers_exclude_declared_names() {
    let stmt = lower("var y = x + 1");
    assert_eq!(stmt.free_idents(), vec![Ident::user("x")]);
}

#[test]
fn test_actor_lowers_to_configurator() {
    let text = lower("actor Echo() in handle ask m in m end end").to_string();
    assert!(text.contains("actor-cfgtr"), "{}", text);
    assert!(text.contains("Echo = {cfg: "), "{}", text);
}
