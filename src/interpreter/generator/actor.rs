//! Actor lowering
//!
//! `actor Name(a, b) in items end` becomes a configurator over a handler
//! constructor. The constructor runs the initialization statements and binds
//! its last parameter to the tuple `[ask, tell]` of handler procedures.
//! `Name` is bound to the record `{cfg: configurator}`.

use std::sync::Arc;

use super::Generator;
use super::scope::{JumpFlags, LexicalScope};
use crate::interpreter::ast::{ActorItem, CaseClause, Pat};
use crate::interpreter::error::GeneratorResult;
use crate::kernel::ident::Ident;
use crate::kernel::stmt::{CompleteOrIdent, ProcDef, StmtKind};
use crate::kernel::value::Feature;
use crate::util::span::Span;

impl Generator {
    pub(super) fn lower_actor(
        &mut self,
        formals: &[Pat],
        items: &[ActorItem],
        target: &Ident,
        scope: &mut LexicalScope,
        span: &Span,
    ) -> GeneratorResult<()> {
        let mut ctor = LexicalScope::new();
        let mut params = self.formals(formals, &mut ctor)?;
        let jumps = JumpFlags::top();

        let mut asks = Vec::new();
        let mut tells = Vec::new();
        for item in items {
            match item {
                ActorItem::Stmt(node) => self.stmt(node, &mut ctor, &jumps)?,
                ActorItem::Ask(clause) => asks.push(clause),
                ActorItem::Tell(clause) => tells.push(clause),
            }
        }

        let ask = self.fresh("ask");
        ctor.declare(ask.clone());
        let def = self.handler_proc(&asks, true, span)?;
        ctor.emit(
            StmtKind::CreateProc {
                target: ask.clone(),
                def,
            },
            span,
        );
        let tell = self.fresh("tell");
        ctor.declare(tell.clone());
        let def = self.handler_proc(&tells, false, span)?;
        ctor.emit(
            StmtKind::CreateProc {
                target: tell.clone(),
                def,
            },
            span,
        );

        let handlers = self.fresh("handlers");
        ctor.emit(
            StmtKind::CreateTuple {
                target: handlers.clone(),
                label: None,
                values: vec![CompleteOrIdent::Ident(ask), CompleteOrIdent::Ident(tell)],
            },
            span,
        );
        params.push(handlers);

        let cfgtr = self.fresh("cfgtr");
        scope.declare(cfgtr.clone());
        scope.emit(
            StmtKind::CreateActorCfgtr {
                target: cfgtr.clone(),
                def: Arc::new(ProcDef::new(params, ctor.build(span), span.clone())),
            },
            span,
        );
        scope.emit(
            StmtKind::CreateRec {
                target: target.clone(),
                label: None,
                fields: vec![(Feature::str("cfg"), CompleteOrIdent::Ident(cfgtr))],
            },
            span,
        );
        Ok(())
    }

    /// `ask` handlers take `(message, result)`; `tell` handlers take `(message)`
    fn handler_proc(
        &mut self,
        clauses: &[&CaseClause],
        is_ask: bool,
        span: &Span,
    ) -> GeneratorResult<Arc<ProcDef>> {
        let message = self.fresh("m");
        let result = is_ask.then(|| self.fresh("r"));
        let error_name = if is_ask {
            "AskNotHandledError"
        } else {
            "TellNotHandledError"
        };
        let mut scope = LexicalScope::new();
        let fallback = self.not_handled(error_name, &message, span);
        let chain = self.lower_clauses(
            &message,
            clauses,
            fallback,
            result.as_ref(),
            &JumpFlags::top(),
            &mut scope,
        )?;
        scope.push(chain);
        let mut params = vec![message];
        params.extend(result);
        Ok(Arc::new(ProcDef::new(params, scope.build(span), span.clone())))
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::generator::Generator;
    use crate::interpreter::parser::parse;
    use crate::kernel::ident::Ident;
    use crate::kernel::stmt::StmtKind;

    #[test]
    fn test_actor_binds_cfg_record() {
        let source = "actor Counter(start) in\n\
                      var n = Cell.new(start)\n\
                      handle ask 'get' in @n end\n\
                      handle tell 'inc' in n := @n + 1 end\n\
                      end";
        let node = parse(source).unwrap();
        let stmt = Generator::new().generate_stmt(&node).unwrap();
        let StmtKind::Local { idents, body } = &stmt.kind else {
            panic!("expected local, got {}", stmt);
        };
        assert!(idents.contains(&Ident::user("Counter")));
        let StmtKind::Seq(stmts) = &body.kind else {
            panic!("expected seq");
        };
        let StmtKind::CreateActorCfgtr { def, .. } = &stmts[0].kind else {
            panic!("expected configurator");
        };
        // start + handlers
        assert_eq!(def.formals.len(), 2);
        assert!(def.free_idents.contains(&Ident::user("Cell")));
        assert!(matches!(
            &stmts[1].kind,
            StmtKind::CreateRec { target, .. } if *target == Ident::user("Counter")
        ));
    }

    #[test]
    fn test_unmatched_messages_raise_named_errors() {
        let node = parse("actor A() in handle ask 1 in 2 end end").unwrap();
        let text = Generator::new().generate_stmt(&node).unwrap().to_string();
        assert!(text.contains("AskNotHandledError"), "{}", text);
        assert!(text.contains("TellNotHandledError"), "{}", text);
    }
}
