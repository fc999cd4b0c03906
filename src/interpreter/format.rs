//! Canonical source formatter
//!
//! Prints an AST back as source text. The output parses to a tree equal to
//! the input, so `format` is a fixed point after one application. Blocks are
//! indented by four spaces and every statement of a sequence gets its own
//! line.

use super::ast::{
    ActorItem, CaseClause, Literal, Node, NodeKind, Pat, PatKind, TypeAnno, UnaryOp, VarDecl,
};
use crate::kernel::ident::{is_keyword, is_plain_name};
use crate::kernel::value::{escape_char, escape_text};

const INDENT: &str = "    ";

const PREC_UNIFY: u8 = 1;
const PREC_OR: u8 = 2;
const PREC_AND: u8 = 3;
const PREC_UNARY: u8 = 7;
const PREC_POSTFIX: u8 = 8;
const PREC_PRIMARY: u8 = 9;

/// Format a program
pub fn format(node: &Node) -> String {
    let mut out = String::new();
    for line in seq_items(node) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn seq_items(node: &Node) -> Vec<String> {
    let items: Vec<&Node> = match &node.kind {
        NodeKind::Seq(items) => items.iter().collect(),
        _ => vec![node],
    };
    format_items(&items, 0)
}

/// One string per statement; each begins at `indent`
fn format_items(items: &[&Node], indent: usize) -> Vec<String> {
    let mut lines: Vec<String> = items.iter().map(|item| stmt(item, indent)).collect();
    // A statement starting with `-` would continue the previous one as a subtraction
    for index in 1..lines.len() {
        if lines[index].starts_with('-') {
            lines[index - 1].push(';');
        }
    }
    lines
        .into_iter()
        .map(|line| format!("{}{}", INDENT.repeat(indent), line))
        .collect()
}

fn block(body: &Node, indent: usize) -> String {
    let items: Vec<&Node> = match &body.kind {
        NodeKind::Seq(items) => items.iter().collect(),
        _ => vec![body],
    };
    let mut out = String::new();
    for line in format_items(&items, indent + 1) {
        out.push('\n');
        out.push_str(&line);
    }
    out.push('\n');
    out.push_str(&INDENT.repeat(indent));
    out
}

fn stmt(node: &Node, indent: usize) -> String {
    match &node.kind {
        NodeKind::Var(decls) => format!("var {}", decls_text(decls, indent)),
        NodeKind::For { pat, iter, body } => format!(
            "for {} in {} do{}end",
            pat_text(pat),
            expr(iter, 0, indent),
            block(body, indent)
        ),
        NodeKind::While { cond, body } => format!(
            "while {} do{}end",
            expr(cond, 0, indent),
            block(body, indent)
        ),
        NodeKind::Import { qualifier, names } => {
            let mut path: Vec<String> = qualifier.iter().map(|name| ident_text(name)).collect();
            if names.len() == 1 {
                path.push(ident_text(&names[0]));
                format!("import {}", path.join("."))
            } else {
                let names: Vec<String> = names.iter().map(|name| ident_text(name)).collect();
                format!("import {}.{{{}}}", path.join("."), names.join(", "))
            }
        }
        NodeKind::Throw(error) => format!("throw {}", expr(error, 0, indent)),
        NodeKind::Break => "break".to_string(),
        NodeKind::Continue => "continue".to_string(),
        NodeKind::Skip => "skip".to_string(),
        NodeKind::Return(None) => "return".to_string(),
        NodeKind::Return(Some(value)) => format!("return {}", expr(value, 0, indent)),
        _ => expr(node, 0, indent),
    }
}

fn decls_text(decls: &[VarDecl], indent: usize) -> String {
    decls
        .iter()
        .map(|decl| match &decl.value {
            Some(value) => format!("{} = {}", pat_text(&decl.pat), expr(value, 0, indent)),
            None => pat_text(&decl.pat),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn precedence(node: &Node) -> u8 {
    match &node.kind {
        NodeKind::Unify { .. } | NodeKind::Assign { .. } => PREC_UNIFY,
        NodeKind::Or(..) => PREC_OR,
        NodeKind::And(..) => PREC_AND,
        NodeKind::BinOp { op, .. } => op.precedence(),
        NodeKind::Unary { .. } => PREC_UNARY,
        NodeKind::Literal(Literal::Int(text) | Literal::Flt(text) | Literal::Dec(text))
            if text.starts_with('-') =>
        {
            PREC_UNARY
        }
        NodeKind::Select { .. } | NodeKind::Index { .. } | NodeKind::Apply { .. } => PREC_POSTFIX,
        _ => PREC_PRIMARY,
    }
}

fn is_number(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::Literal(Literal::Int(_) | Literal::Flt(_) | Literal::Dec(_))
    )
}

/// Format `node`, parenthesized unless it binds at least as tight as `min`
fn expr(node: &Node, min: u8, indent: usize) -> String {
    let text = expr_bare(node, indent);
    if precedence(node) < min {
        format!("({})", text)
    } else {
        text
    }
}

fn expr_bare(node: &Node, indent: usize) -> String {
    match &node.kind {
        NodeKind::Ident(name) => ident_text(name),
        NodeKind::Literal(literal) => literal_text(literal),
        NodeKind::Seq(_) => format!("begin{}end", block(node, indent)),
        NodeKind::Begin(body) => format!("begin{}end", block(body, indent)),
        NodeKind::Local { decls, body } => format!(
            "local {} in{}end",
            decls_text(decls, indent),
            block(body, indent)
        ),
        NodeKind::If {
            branches,
            otherwise,
        } => {
            let mut out = String::new();
            for (index, (cond, body)) in branches.iter().enumerate() {
                out.push_str(if index == 0 { "if " } else { "elseif " });
                out.push_str(&expr(cond, 0, indent));
                out.push_str(" then");
                out.push_str(&block(body, indent));
            }
            if let Some(otherwise) = otherwise {
                out.push_str("else");
                out.push_str(&block(otherwise, indent));
            }
            out.push_str("end");
            out
        }
        NodeKind::Case {
            arg,
            clauses,
            otherwise,
        } => {
            let mut out = format!("case {}\n", expr(arg, 0, indent));
            out.push_str(&INDENT.repeat(indent));
            for clause in clauses {
                out.push_str("of ");
                out.push_str(&clause_text(clause, "then", indent));
            }
            if let Some(otherwise) = otherwise {
                out.push_str("else");
                out.push_str(&block(otherwise, indent));
            }
            out.push_str("end");
            out
        }
        NodeKind::Try {
            body,
            catches,
            finally,
        } => {
            let mut out = format!("try{}", block(body, indent));
            for clause in catches {
                out.push_str("catch ");
                out.push_str(&clause_text(clause, "then", indent));
            }
            if let Some(finally) = finally {
                out.push_str("finally");
                out.push_str(&block(finally, indent));
            }
            out.push_str("end");
            out
        }
        NodeKind::Func {
            name,
            formals,
            ret_anno,
            body,
        } => {
            let ret = ret_anno
                .as_ref()
                .map(|anno| format!(" -> {}", type_text(anno)))
                .unwrap_or_default();
            format!(
                "func{}({}){} in{}end",
                name_text(name),
                pats_text(formals),
                ret,
                block(body, indent)
            )
        }
        NodeKind::Proc {
            name,
            formals,
            body,
        } => format!(
            "proc{}({}) in{}end",
            name_text(name),
            pats_text(formals),
            block(body, indent)
        ),
        NodeKind::Act(body) => format!("act{}end", block(body, indent)),
        NodeKind::Spawn(cfg) => format!("spawn({})", expr(cfg, 0, indent)),
        NodeKind::SelfRef => "self".to_string(),
        NodeKind::Actor {
            name,
            formals,
            items,
        } => {
            let mut out = format!("actor{}({}) in", name_text(name), pats_text(formals));
            let pad = INDENT.repeat(indent + 1);
            for item in items {
                out.push('\n');
                out.push_str(&pad);
                match item {
                    ActorItem::Stmt(node) => out.push_str(&stmt(node, indent + 1)),
                    ActorItem::Ask(clause) => {
                        out.push_str("handle ask ");
                        out.push_str(&clause_text(clause, "in", indent + 1));
                        out.push_str("end");
                    }
                    ActorItem::Tell(clause) => {
                        out.push_str("handle tell ");
                        out.push_str(&clause_text(clause, "in", indent + 1));
                        out.push_str("end");
                    }
                }
            }
            out.push('\n');
            out.push_str(&INDENT.repeat(indent));
            out.push_str("end");
            out
        }
        NodeKind::Unify { left, right } => format!(
            "{} = {}",
            expr(left, PREC_OR, indent),
            expr(right, PREC_UNIFY, indent)
        ),
        NodeKind::Assign { left, right } => format!(
            "{} := {}",
            expr(left, PREC_OR, indent),
            expr(right, PREC_UNIFY, indent)
        ),
        NodeKind::Or(left, right) => format!(
            "{} || {}",
            expr(left, PREC_OR, indent),
            expr(right, PREC_AND, indent)
        ),
        NodeKind::And(left, right) => format!(
            "{} && {}",
            expr(left, PREC_AND, indent),
            expr(right, PREC_AND + 1, indent)
        ),
        NodeKind::BinOp { op, left, right } => {
            let prec = op.precedence();
            format!(
                "{} {} {}",
                expr(left, prec, indent),
                op.symbol(),
                expr(right, prec + 1, indent)
            )
        }
        NodeKind::Unary { op, arg } => {
            let folds = *op == UnaryOp::Neg && is_number(arg) && precedence(arg) == PREC_PRIMARY;
            if folds {
                format!("-({})", expr_bare(arg, indent))
            } else {
                format!("{}{}", op.symbol(), expr(arg, PREC_UNARY, indent))
            }
        }
        NodeKind::Select { rec, feature } => {
            let base = if is_number(rec) {
                format!("({})", expr_bare(rec, indent))
            } else {
                expr(rec, PREC_POSTFIX, indent)
            };
            format!("{}.{}", base, select_text(feature))
        }
        NodeKind::Index { rec, index } => format!(
            "{}[{}]",
            expr(rec, PREC_POSTFIX, indent),
            expr(index, 0, indent)
        ),
        NodeKind::Apply { proc, args } => {
            let args: Vec<String> = args.iter().map(|arg| expr(arg, 0, indent)).collect();
            format!("{}({})", expr(proc, PREC_POSTFIX, indent), args.join(", "))
        }
        NodeKind::Rec { label, fields } => {
            let fields: Vec<String> = fields
                .iter()
                .map(|(feature, value)| {
                    format!("{}: {}", feature_text(feature), expr(value, 0, indent))
                })
                .collect();
            format!("{}{{{}}}", label_text(label), fields.join(", "))
        }
        NodeKind::Tuple { label, values } => {
            let values: Vec<String> = values.iter().map(|value| expr(value, 0, indent)).collect();
            format!("{}[{}]", label_text(label), values.join(", "))
        }
        NodeKind::Var(_)
        | NodeKind::For { .. }
        | NodeKind::While { .. }
        | NodeKind::Import { .. }
        | NodeKind::Throw(_)
        | NodeKind::Break
        | NodeKind::Continue
        | NodeKind::Return(_)
        | NodeKind::Skip => stmt(node, indent),
    }
}

fn clause_text(clause: &CaseClause, keyword: &str, indent: usize) -> String {
    let guard = clause
        .guard
        .as_ref()
        .map(|guard| format!(" when {}", expr(guard, 0, indent)))
        .unwrap_or_default();
    format!(
        "{}{} {}{}",
        pat_text(&clause.pat),
        guard,
        keyword,
        block(&clause.body, indent)
    )
}

fn name_text(name: &Option<String>) -> String {
    name.as_ref()
        .map(|name| format!(" {}", ident_text(name)))
        .unwrap_or_default()
}

fn ident_text(name: &str) -> String {
    if is_plain_name(name) {
        name.to_string()
    } else {
        format!("`{}`", escape_text(name, '`'))
    }
}

fn literal_text(literal: &Literal) -> String {
    match literal {
        Literal::Int(text) | Literal::Flt(text) | Literal::Dec(text) => text.clone(),
        Literal::Str(text) => format!("'{}'", escape_text(text, '\'')),
        Literal::Char(ch) => format!("&{}", escape_char(*ch)),
        Literal::Bool(true) => "true".to_string(),
        Literal::Bool(false) => "false".to_string(),
        Literal::Null => "null".to_string(),
        Literal::Nothing => "nothing".to_string(),
        Literal::Eof => "eof".to_string(),
    }
}

fn feature_text(feature: &Literal) -> String {
    match feature {
        Literal::Str(name) if is_plain_name(name) => name.clone(),
        other => literal_text(other),
    }
}

fn select_text(feature: &Literal) -> String {
    match feature {
        Literal::Str(name) if is_keyword(name) => name.clone(),
        other => feature_text(other),
    }
}

fn label_text(label: &Option<Literal>) -> String {
    label
        .as_ref()
        .map(|label| format!("{}#", feature_text(label)))
        .unwrap_or_default()
}

fn type_text(anno: &TypeAnno) -> String {
    if anno.params.is_empty() {
        return ident_text(&anno.name);
    }
    let params: Vec<String> = anno.params.iter().map(type_text).collect();
    format!("{}[{}]", ident_text(&anno.name), params.join(", "))
}

fn pats_text(pats: &[Pat]) -> String {
    pats.iter().map(pat_text).collect::<Vec<_>>().join(", ")
}

fn pat_text(pat: &Pat) -> String {
    match &pat.kind {
        PatKind::Ident { name, anno } => match anno {
            Some(anno) => format!("{}: {}", ident_text(name), type_text(anno)),
            None => ident_text(name),
        },
        PatKind::Anon => "_".to_string(),
        PatKind::Escaped(name) => format!("~{}", ident_text(name)),
        PatKind::Literal(literal) => literal_text(literal),
        PatKind::Rec {
            label,
            fields,
            partial,
        } => {
            let mut parts: Vec<String> = fields
                .iter()
                .map(|(feature, pat)| format!("{}: {}", feature_text(feature), pat_text(pat)))
                .collect();
            if *partial {
                parts.push("...".to_string());
            }
            format!("{}{{{}}}", label_text(label), parts.join(", "))
        }
        PatKind::Tuple {
            label,
            values,
            partial,
        } => {
            let mut parts: Vec<String> = values.iter().map(pat_text).collect();
            if *partial {
                parts.push("...".to_string());
            }
            format!("{}[{}]", label_text(label), parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::parser::parse;

    fn roundtrip(source: &str) -> String {
        let tree = parse(source).unwrap();
        let text = format(&tree);
        let reparsed = parse(&text).unwrap_or_else(|err| panic!("{err}\n{text}"));
        assert_eq!(reparsed, tree, "formatted text:\n{text}");
        text
    }

    #[test]
    fn test_format_expression() {
        assert_eq!(roundtrip("1+2*3"), "1 + 2 * 3\n");
        assert_eq!(roundtrip("(1+2)*3"), "(1 + 2) * 3\n");
        assert_eq!(roundtrip("a - (b - c)"), "a - (b - c)\n");
        assert_eq!(roundtrip("-(1)"), "-(1)\n");
        assert_eq!(roundtrip("(a + b).c"), "(a + b).c\n");
    }

    #[test]
    fn test_format_blocks() {
        let text = roundtrip("if a then b elseif c then d else e end");
        assert_eq!(text, "if a then\n    b\nelseif c then\n    d\nelse\n    e\nend\n");
        roundtrip("func f(x: Int32) -> Int32 in var y = x + 1 return y end");
        let text =
            roundtrip("case x of [a, {k: ~y, ...}] when a > 0 then a of 'p'#[_] then 1 else 2 end");
        assert!(text.contains("\nof p#[_] then\n"));
    }

    #[test]
    fn test_statement_starting_with_minus_is_separated() {
        let text = roundtrip("a;\n-1");
        assert_eq!(text, "a;\n-1\n");
    }

    #[test]
    fn test_keyword_selects_stay_bare() {
        assert_eq!(roundtrip("back.ask(n) + 1"), "back.ask(n) + 1\n");
        assert_eq!(roundtrip("x.`tell`('m')"), "x.tell('m')\n");
    }

    #[test]
    fn test_quoted_names() {
        assert_eq!(roundtrip("`odd name` = {`end`: 1}"), "`odd name` = {'end': 1}\n");
    }
}
