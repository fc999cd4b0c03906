//! Lexical scopes and jump flags used while lowering

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use crate::kernel::ident::Ident;
use crate::kernel::stmt::{Stmt, StmtKind};
use crate::util::span::Span;

/// Accumulates declarations and statements for one kernel scope
#[derive(Debug, Default)]
pub(crate) struct LexicalScope {
    idents: Vec<Ident>,
    stmts: Vec<Arc<Stmt>>,
}

impl LexicalScope {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Declare `ident`; redeclaring in the same scope is a no-op
    pub(crate) fn declare(&mut self, ident: Ident) {
        if !self.idents.contains(&ident) {
            self.idents.push(ident);
        }
    }

    pub(crate) fn push(&mut self, stmt: Arc<Stmt>) {
        self.stmts.push(stmt);
    }

    pub(crate) fn emit(&mut self, kind: StmtKind, span: &Span) {
        self.stmts.push(Stmt::arc(kind, span.clone()));
    }

    /// Statements as a sequence, without a `Local` for the declarations
    pub(crate) fn into_parts(self, span: &Span) -> (Vec<Ident>, Arc<Stmt>) {
        (self.idents, sequence(self.stmts, span))
    }

    /// Statements wrapped in a `Local` when anything was declared
    pub(crate) fn build(self, span: &Span) -> Arc<Stmt> {
        let (idents, body) = self.into_parts(span);
        if idents.is_empty() {
            body
        } else {
            Stmt::arc(StmtKind::Local { idents, body }, span.clone())
        }
    }
}

/// Collapse a statement list into `Skip`, the single statement, or a `Seq`
pub(crate) fn sequence(mut stmts: Vec<Arc<Stmt>>, span: &Span) -> Arc<Stmt> {
    match stmts.len() {
        0 => Stmt::arc(StmtKind::Skip, span.clone()),
        1 => stmts.remove(0),
        _ => Stmt::arc(StmtKind::Seq(stmts), span.clone()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpState {
    NotAllowed,
    Allowed,
    Used,
}

/// Shared tri-state flag for one jump label
#[derive(Debug, Clone)]
pub(crate) struct JumpFlag(Rc<Cell<JumpState>>);

impl JumpFlag {
    fn new(state: JumpState) -> Self {
        Self(Rc::new(Cell::new(state)))
    }

    /// Record a use; false when the jump is not allowed here
    pub(crate) fn mark_used(&self) -> bool {
        match self.0.get() {
            JumpState::NotAllowed => false,
            JumpState::Allowed | JumpState::Used => {
                self.0.set(JumpState::Used);
                true
            }
        }
    }

    pub(crate) fn is_used(&self) -> bool {
        self.0.get() == JumpState::Used
    }
}

/// Jump flags in effect for the construct being lowered
#[derive(Debug, Clone)]
pub(crate) struct JumpFlags {
    pub(crate) break_flag: JumpFlag,
    pub(crate) continue_flag: JumpFlag,
    pub(crate) return_flag: JumpFlag,
    /// Result parameter that `return e` binds
    pub(crate) return_ident: Option<Ident>,
}

impl JumpFlags {
    /// Top level: no jump is allowed
    pub(crate) fn top() -> Self {
        Self {
            break_flag: JumpFlag::new(JumpState::NotAllowed),
            continue_flag: JumpFlag::new(JumpState::NotAllowed),
            return_flag: JumpFlag::new(JumpState::NotAllowed),
            return_ident: None,
        }
    }

    /// Loop body: fresh break/continue flags, shared return flag
    pub(crate) fn for_loop(&self) -> Self {
        Self {
            break_flag: JumpFlag::new(JumpState::Allowed),
            continue_flag: JumpFlag::new(JumpState::Allowed),
            return_flag: self.return_flag.clone(),
            return_ident: self.return_ident.clone(),
        }
    }

    /// Procedure or function body: only `return` is allowed
    pub(crate) fn for_proc(return_ident: Option<Ident>) -> Self {
        Self {
            break_flag: JumpFlag::new(JumpState::NotAllowed),
            continue_flag: JumpFlag::new(JumpState::NotAllowed),
            return_flag: JumpFlag::new(JumpState::Allowed),
            return_ident,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_builds_local_only_when_declared() {
        let span = Span::none();
        let mut bare = LexicalScope::new();
        bare.emit(StmtKind::Skip, &span);
        assert!(matches!(bare.build(&span).kind, StmtKind::Skip));

        let mut scoped = LexicalScope::new();
        scoped.declare(Ident::user("x"));
        scoped.declare(Ident::user("x"));
        scoped.emit(StmtKind::Skip, &span);
        scoped.emit(StmtKind::Skip, &span);
        let StmtKind::Local { idents, body } = &scoped.build(&span).kind else {
            panic!("expected local");
        };
        assert_eq!(idents.len(), 1);
        assert!(matches!(&body.kind, StmtKind::Seq(stmts) if stmts.len() == 2));
    }

    #[test]
    fn test_loop_flags_share_return() {
        let outer = JumpFlags::for_proc(None);
        let inner = outer.for_loop();
        assert!(inner.break_flag.mark_used());
        assert!(!outer.break_flag.mark_used());
        assert!(inner.return_flag.mark_used());
        assert!(outer.return_flag.is_used());
        assert!(!JumpFlags::top().continue_flag.mark_used());
    }
}
