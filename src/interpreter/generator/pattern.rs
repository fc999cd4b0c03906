//! Pattern lowering for declarations, `case`, and `catch`
//!
//! Declarations destructure by construction: the pattern is rebuilt as a
//! record over its binders and unified with the value. Clauses instead
//! compile to chains of single-level `CaseElse` tests. Nested compound
//! patterns bind the inner value to a fresh `$m` and test it with a nested
//! chain that shares the clause's fallback.

use std::sync::Arc;

use super::scope::{JumpFlags, LexicalScope, sequence};
use super::{Generator, label_feature, literal_feature, literal_value};
use crate::interpreter::ast::{CaseClause, Node, Pat, PatKind};
use crate::interpreter::error::{GeneratorError, GeneratorResult};
use crate::kernel::ident::Ident;
use crate::kernel::stmt::{CaseField, CasePat, CompleteOrIdent, ProcDef, Stmt, StmtKind};
use crate::kernel::value::{Feature, Value};
use crate::util::span::Span;

impl Generator {
    /// Unify `value` with a declaration pattern whose binders are declared
    pub(super) fn unify_pat(
        &mut self,
        pat: &Pat,
        value: CompleteOrIdent,
        scope: &mut LexicalScope,
    ) -> GeneratorResult<()> {
        let span = &pat.span;
        match &pat.kind {
            PatKind::Ident { name, .. } => scope.emit(
                StmtKind::Bind {
                    target: Ident::user(name.as_str()),
                    value,
                },
                span,
            ),
            PatKind::Anon => {}
            PatKind::Escaped(name) => scope.emit(
                StmtKind::Unify {
                    left: CompleteOrIdent::Ident(Ident::user(name.as_str())),
                    right: value,
                },
                span,
            ),
            PatKind::Literal(literal) => scope.emit(
                StmtKind::Unify {
                    left: CompleteOrIdent::Value(literal_value(literal, span)?),
                    right: value,
                },
                span,
            ),
            PatKind::Rec { partial: true, .. } | PatKind::Tuple { partial: true, .. } => {
                return Err(GeneratorError::InvalidPattern {
                    reason: "partial arity is only allowed in case and catch clauses".into(),
                    span: span.clone(),
                });
            }
            PatKind::Rec { label, fields, .. } => {
                let target = self.pat_target(value, scope, span);
                let label = label_feature(label.as_ref(), span)?;
                let mut nested = Vec::new();
                let fields = fields
                    .iter()
                    .map(|(feature, sub)| {
                        Ok((
                            literal_feature(feature, &sub.span)?,
                            self.pat_operand(sub, scope, &mut nested)?,
                        ))
                    })
                    .collect::<GeneratorResult<Vec<_>>>()?;
                scope.emit(
                    StmtKind::CreateRec {
                        target,
                        label,
                        fields,
                    },
                    span,
                );
                for (ident, sub) in nested {
                    self.unify_pat(sub, CompleteOrIdent::Ident(ident), scope)?;
                }
            }
            PatKind::Tuple { label, values, .. } => {
                let target = self.pat_target(value, scope, span);
                let label = label_feature(label.as_ref(), span)?;
                let mut nested = Vec::new();
                let values = values
                    .iter()
                    .map(|sub| self.pat_operand(sub, scope, &mut nested))
                    .collect::<GeneratorResult<Vec<_>>>()?;
                scope.emit(
                    StmtKind::CreateTuple {
                        target,
                        label,
                        values,
                    },
                    span,
                );
                for (ident, sub) in nested {
                    self.unify_pat(sub, CompleteOrIdent::Ident(ident), scope)?;
                }
            }
        }
        Ok(())
    }

    fn pat_target(
        &mut self,
        value: CompleteOrIdent,
        scope: &mut LexicalScope,
        span: &Span,
    ) -> Ident {
        match value {
            CompleteOrIdent::Ident(ident) => ident,
            value @ CompleteOrIdent::Value(_) => {
                let ident = self.temp(scope);
                scope.emit(
                    StmtKind::Bind {
                        target: ident.clone(),
                        value,
                    },
                    span,
                );
                ident
            }
        }
    }

    fn pat_operand<'a>(
        &mut self,
        sub: &'a Pat,
        scope: &mut LexicalScope,
        nested: &mut Vec<(Ident, &'a Pat)>,
    ) -> GeneratorResult<CompleteOrIdent> {
        Ok(match &sub.kind {
            PatKind::Ident { name, .. } => CompleteOrIdent::Ident(Ident::user(name.as_str())),
            PatKind::Anon => CompleteOrIdent::Ident(self.temp(scope)),
            PatKind::Escaped(name) => CompleteOrIdent::Ident(Ident::user(name.as_str())),
            PatKind::Literal(literal) => CompleteOrIdent::Value(literal_value(literal, &sub.span)?),
            PatKind::Rec { .. } | PatKind::Tuple { .. } => {
                let ident = self.temp(scope);
                nested.push((ident.clone(), sub));
                CompleteOrIdent::Ident(ident)
            }
        })
    }

    /// `case arg of clauses else otherwise end`; without `else` an unmatched
    /// value throws `NotHandledError`
    pub(super) fn lower_case(
        &mut self,
        arg: &Node,
        clauses: &[CaseClause],
        otherwise: Option<&Node>,
        target: Option<&Ident>,
        jumps: &JumpFlags,
        span: &Span,
    ) -> GeneratorResult<Arc<Stmt>> {
        let mut scope = LexicalScope::new();
        let arg = self.ident_operand(arg, &mut scope, jumps)?;
        let fallback = match otherwise {
            Some(node) => self.body(node, target, jumps)?,
            None => self.not_handled("NotHandledError", &arg, span),
        };
        let clauses: Vec<&CaseClause> = clauses.iter().collect();
        let chain = self.lower_clauses(&arg, &clauses, fallback, target, jumps, &mut scope)?;
        scope.push(chain);
        Ok(scope.build(span))
    }

    /// `try body catch clauses finally f end`
    ///
    /// The finalizer runs after normal completion and before rethrowing an
    /// unmatched error. Jumps out of the body bypass it.
    pub(super) fn lower_try(
        &mut self,
        body: &Node,
        catches: &[CaseClause],
        finally: Option<&Node>,
        target: Option<&Ident>,
        jumps: &JumpFlags,
        span: &Span,
    ) -> GeneratorResult<Arc<Stmt>> {
        let mut scope = LexicalScope::new();
        let finalizer = match finally {
            Some(node) => {
                let proc = self.fresh("fin");
                scope.declare(proc.clone());
                let def =
                    ProcDef::new(Vec::new(), self.body(node, None, jumps)?, node.span.clone());
                scope.emit(
                    StmtKind::CreateProc {
                        target: proc.clone(),
                        def: Arc::new(def),
                    },
                    &node.span,
                );
                Some(proc)
            }
            None => None,
        };
        let protected = self.body(body, target, jumps)?;

        let error = self.fresh("x");
        let mut rethrow = Vec::new();
        if let Some(proc) = &finalizer {
            rethrow.push(call(proc, span));
        }
        rethrow.push(Stmt::arc(
            StmtKind::Throw {
                error: CompleteOrIdent::Ident(error.clone()),
            },
            span.clone(),
        ));
        let fallback = sequence(rethrow, span);

        let mut handler = LexicalScope::new();
        let clauses: Vec<&CaseClause> = catches.iter().collect();
        let chain = self.lower_clauses(&error, &clauses, fallback, target, jumps, &mut handler)?;
        handler.push(chain);

        scope.emit(
            StmtKind::Try {
                body: protected,
                catch_ident: error,
                catch_body: handler.build(span),
            },
            span,
        );
        if let Some(proc) = &finalizer {
            scope.push(call(proc, span));
        }
        Ok(scope.build(span))
    }

    /// Fold clauses into a test chain ending in `fallback`; helper procedures
    /// are declared in `scope`
    pub(super) fn lower_clauses(
        &mut self,
        arg: &Ident,
        clauses: &[&CaseClause],
        fallback: Arc<Stmt>,
        target: Option<&Ident>,
        jumps: &JumpFlags,
        scope: &mut LexicalScope,
    ) -> GeneratorResult<Arc<Stmt>> {
        let mut chain = fallback;
        for clause in clauses.iter().rev() {
            chain = self.lower_clause(arg, clause, chain, target, jumps, scope)?;
        }
        Ok(chain)
    }

    fn lower_clause(
        &mut self,
        arg: &Ident,
        clause: &CaseClause,
        otherwise: Arc<Stmt>,
        target: Option<&Ident>,
        jumps: &JumpFlags,
        scope: &mut LexicalScope,
    ) -> GeneratorResult<Arc<Stmt>> {
        let span = clause.pat.span.adjoin(&clause.body.span);
        // Once binders are in scope, the alternative must not see them
        let otherwise = if clause.guard.is_some() || has_nested(&clause.pat) {
            self.else_proc(otherwise, scope, &span)
        } else {
            otherwise
        };

        let mut success = self.body(&clause.body, target, jumps)?;
        if let Some(guard) = &clause.guard {
            let mut guarded = LexicalScope::new();
            let cond = self.operand(guard, &mut guarded, jumps)?;
            guarded.emit(
                StmtKind::IfElse {
                    cond,
                    then: success,
                    otherwise: otherwise.clone(),
                },
                &guard.span,
            );
            success = guarded.build(&span);
        }

        match &clause.pat.kind {
            PatKind::Ident { name, .. } => {
                let binder = Ident::user(name.as_str());
                let bind = Stmt::arc(
                    StmtKind::Bind {
                        target: binder.clone(),
                        value: CompleteOrIdent::Ident(arg.clone()),
                    },
                    clause.pat.span.clone(),
                );
                Ok(Stmt::arc(
                    StmtKind::Local {
                        idents: vec![binder],
                        body: sequence(vec![bind, success], &span),
                    },
                    span,
                ))
            }
            PatKind::Anon => Ok(success),
            _ => self.match_into(arg, &clause.pat, success, &otherwise),
        }
    }

    /// Wrap `otherwise` in a zero-argument procedure declared in `scope`
    fn else_proc(
        &mut self,
        otherwise: Arc<Stmt>,
        scope: &mut LexicalScope,
        span: &Span,
    ) -> Arc<Stmt> {
        if matches!(otherwise.kind, StmtKind::Skip) {
            return otherwise;
        }
        let proc = self.fresh("else");
        scope.declare(proc.clone());
        scope.emit(
            StmtKind::CreateProc {
                target: proc.clone(),
                def: Arc::new(ProcDef::new(Vec::new(), otherwise, span.clone())),
            },
            span,
        );
        call(&proc, span)
    }

    fn match_into(
        &mut self,
        arg: &Ident,
        pat: &Pat,
        success: Arc<Stmt>,
        otherwise: &Arc<Stmt>,
    ) -> GeneratorResult<Arc<Stmt>> {
        let mut nested = Vec::new();
        let case_pat = self.case_pat(pat, &mut nested)?;
        let mut body = success;
        for (ident, sub) in nested.into_iter().rev() {
            body = self.match_into(&ident, sub, body, otherwise)?;
        }
        Ok(Stmt::arc(
            StmtKind::CaseElse {
                arg: arg.clone(),
                pat: case_pat,
                body,
                otherwise: otherwise.clone(),
            },
            pat.span.clone(),
        ))
    }

    fn case_pat<'a>(
        &mut self,
        pat: &'a Pat,
        nested: &mut Vec<(Ident, &'a Pat)>,
    ) -> GeneratorResult<CasePat> {
        let span = &pat.span;
        match &pat.kind {
            PatKind::Literal(literal) => Ok(CasePat::Value(literal_value(literal, span)?)),
            PatKind::Escaped(name) => Ok(CasePat::Escaped(Ident::user(name.as_str()))),
            PatKind::Rec {
                label,
                fields,
                partial,
            } => {
                let fields = fields
                    .iter()
                    .map(|(feature, sub)| {
                        Ok((
                            literal_feature(feature, &sub.span)?,
                            self.case_field(sub, nested)?,
                        ))
                    })
                    .collect::<GeneratorResult<Vec<_>>>()?;
                Ok(CasePat::Rec {
                    label: label_feature(label.as_ref(), span)?,
                    fields,
                    partial: *partial,
                })
            }
            PatKind::Tuple {
                label,
                values,
                partial,
            } => {
                let fields = values
                    .iter()
                    .enumerate()
                    .map(|(i, sub)| Ok((Feature::Int(i as i64), self.case_field(sub, nested)?)))
                    .collect::<GeneratorResult<Vec<_>>>()?;
                Ok(CasePat::Rec {
                    label: label_feature(label.as_ref(), span)?,
                    fields,
                    partial: *partial,
                })
            }
            PatKind::Ident { .. } | PatKind::Anon => Err(GeneratorError::InvalidPattern {
                reason: "binder where a test is required".into(),
                span: span.clone(),
            }),
        }
    }

    fn case_field<'a>(
        &mut self,
        sub: &'a Pat,
        nested: &mut Vec<(Ident, &'a Pat)>,
    ) -> GeneratorResult<CaseField> {
        Ok(match &sub.kind {
            PatKind::Ident { name, .. } => CaseField::Bind(Ident::user(name.as_str())),
            PatKind::Anon => CaseField::Anon,
            PatKind::Literal(literal) => CaseField::Value(literal_value(literal, &sub.span)?),
            PatKind::Escaped(name) => CaseField::Escaped(Ident::user(name.as_str())),
            PatKind::Rec { .. } | PatKind::Tuple { .. } => {
                let ident = self.fresh("m");
                nested.push((ident.clone(), sub));
                CaseField::Bind(ident)
            }
        })
    }

    /// Throw `error#{name: <name>, message: ..., value: arg}`
    pub(super) fn not_handled(&mut self, name: &str, arg: &Ident, span: &Span) -> Arc<Stmt> {
        let error = self.fresh("e");
        let create = Stmt::arc(
            StmtKind::CreateRec {
                target: error.clone(),
                label: Some(Feature::str("error")),
                fields: vec![
                    (
                        Feature::str("message"),
                        CompleteOrIdent::Value(Value::str("no clause matched the value")),
                    ),
                    (
                        Feature::str("name"),
                        CompleteOrIdent::Value(Value::str(name)),
                    ),
                    (Feature::str("value"), CompleteOrIdent::Ident(arg.clone())),
                ],
            },
            span.clone(),
        );
        let throw = Stmt::arc(
            StmtKind::Throw {
                error: CompleteOrIdent::Ident(error.clone()),
            },
            span.clone(),
        );
        Stmt::arc(
            StmtKind::Local {
                idents: vec![error],
                body: sequence(vec![create, throw], span),
            },
            span.clone(),
        )
    }
}

fn call(proc: &Ident, span: &Span) -> Arc<Stmt> {
    Stmt::arc(
        StmtKind::Apply {
            proc: CompleteOrIdent::Ident(proc.clone()),
            args: Vec::new(),
        },
        span.clone(),
    )
}

fn has_nested(pat: &Pat) -> bool {
    match &pat.kind {
        PatKind::Rec { fields, .. } => fields.iter().any(|(_, sub)| sub.is_compound()),
        PatKind::Tuple { values, .. } => values.iter().any(Pat::is_compound),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::error::GeneratorError;
    use crate::interpreter::generator::Generator;
    use crate::interpreter::parser::parse;
    use crate::kernel::stmt::{CaseField, CasePat, StmtKind};

    fn lower(source: &str) -> String {
        let node = parse(source).expect("parse");
        Generator::new()
            .generate_stmt(&node)
            .expect("generate")
            .to_string()
    }

    #[test]
    fn test_partial_arity_rejected_in_declarations() {
        let node = parse("var {a: x, ...} = r").unwrap();
        assert!(matches!(
            Generator::new().generate_stmt(&node),
            Err(GeneratorError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_case_without_else_throws_not_handled() {
        let text = lower("case v of 1 then skip end");
        assert!(text.contains("NotHandledError"), "{}", text);
    }

    #[test]
    fn test_guard_routes_failure_through_else_proc() {
        let text = lower("case v of x when x > 1 then skip else skip end");
        assert!(!text.contains("$else"), "{}", text);
        let text = lower("case v of x when x > 1 then skip else throw 0 end");
        assert!(text.contains("$else"), "{}", text);
    }

    #[test]
    fn test_nested_pattern_binds_inner_value() {
        let node = parse("case v of [a, {x: b}] then skip else skip end").unwrap();
        let stmt = Generator::new().generate_stmt(&node).unwrap();
        let StmtKind::CaseElse { pat, body, .. } = &stmt.kind else {
            panic!("expected case-else, got {}", stmt);
        };
        let CasePat::Rec { fields, partial, .. } = pat else {
            panic!("expected record pattern");
        };
        assert!(!partial);
        assert_eq!(fields.len(), 2);
        let CaseField::Bind(inner) = &fields[1].1 else {
            panic!("expected bound inner value");
        };
        let StmtKind::CaseElse { arg, .. } = &body.kind else {
            panic!("expected nested test");
        };
        assert_eq!(arg, inner);
    }

    #[test]
    fn test_try_finally_runs_after_body() {
        let text = lower("try skip catch _ then skip finally skip end");
        assert!(text.contains("$fin"), "{}", text);
    }
}
