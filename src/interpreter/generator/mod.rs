//! Generator: lowers the AST into kernel statements
//!
//! Every expression is lowered against a *target* identifier that receives
//! its value. Nested expressions get fresh system temporaries (`$v1`, ...)
//! declared in the innermost kernel scope. Loops become recursive zero-argument
//! procedures, and jumps become `JumpThrow`/`JumpCatch` pairs that are only
//! emitted when the jump is actually used.

mod actor;
mod pattern;
pub(crate) mod scope;

use std::sync::Arc;

use self::scope::{JumpFlags, LexicalScope};
use super::ast::{BinOp, Literal, Node, NodeKind, Pat, PatKind, UnaryOp, VarDecl};
use super::error::{GeneratorError, GeneratorResult};
use crate::kernel::builtins;
use crate::kernel::decimal::Dec128;
use crate::kernel::ident::Ident;
use crate::kernel::stmt::{
    ArithOp, BREAK_ID, CONTINUE_ID, CasePat, CompleteOrIdent, FeatureOrIdent, ProcDef, RETURN_ID,
    RelOp, Stmt, StmtKind,
};
use crate::kernel::value::{Feature, Value};
use crate::util::span::Span;

/// A lowered program whose outermost declarations are left to the caller
#[derive(Debug, Clone)]
pub struct Lowered {
    /// Statement without the outermost `Local`
    pub stmt: Arc<Stmt>,
    /// Identifiers declared at the outermost scope
    pub declared: Vec<Ident>,
}

/// AST to kernel lowering
#[derive(Debug, Default)]
pub struct Generator {
    next_id: u32,
}

impl Generator {
    /// Create a generator with a fresh temporary counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower `node` in statement position
    pub fn generate_stmt(&mut self, node: &Node) -> GeneratorResult<Arc<Stmt>> {
        let mut scope = LexicalScope::new();
        self.stmt(node, &mut scope, &JumpFlags::top())?;
        Ok(scope.build(&node.span))
    }

    /// Lower `node` as an expression whose value is bound to `target`
    pub fn generate_expr(&mut self, node: &Node, target: &Ident) -> GeneratorResult<Arc<Stmt>> {
        let mut scope = LexicalScope::new();
        self.expr(node, Some(target), &mut scope, &JumpFlags::top())?;
        Ok(scope.build(&node.span))
    }

    /// Lower a whole program; with `result` the program is an expression
    /// bound to that identifier
    pub fn lower_program(
        &mut self,
        node: &Node,
        result: Option<&Ident>,
    ) -> GeneratorResult<Lowered> {
        let mut scope = LexicalScope::new();
        let jumps = JumpFlags::top();
        match result {
            Some(target) => {
                self.expr(node, Some(target), &mut scope, &jumps)?;
            }
            None => self.stmt(node, &mut scope, &jumps)?,
        }
        let (declared, stmt) = scope.into_parts(&node.span);
        Ok(Lowered { stmt, declared })
    }

    fn fresh(&mut self, prefix: &'static str) -> Ident {
        self.next_id += 1;
        Ident::system(prefix, self.next_id)
    }

    fn temp(&mut self, scope: &mut LexicalScope) -> Ident {
        let ident = self.fresh("v");
        scope.declare(ident.clone());
        ident
    }

    /// Lower an expression; without a target, identifiers and literals are
    /// returned as operands and anything else gets a temporary
    fn expr(
        &mut self,
        node: &Node,
        target: Option<&Ident>,
        scope: &mut LexicalScope,
        jumps: &JumpFlags,
    ) -> GeneratorResult<CompleteOrIdent> {
        let operand = match &node.kind {
            NodeKind::Ident(name) => CompleteOrIdent::Ident(Ident::user(name.as_str())),
            NodeKind::Literal(literal) => {
                CompleteOrIdent::Value(literal_value(literal, &node.span)?)
            }
            _ => {
                let target = match target {
                    Some(target) => target.clone(),
                    None => self.temp(scope),
                };
                self.expr_to(node, &target, scope, jumps)?;
                return Ok(CompleteOrIdent::Ident(target));
            }
        };
        match target {
            Some(target) => {
                scope.emit(
                    StmtKind::Bind {
                        target: target.clone(),
                        value: operand,
                    },
                    &node.span,
                );
                Ok(CompleteOrIdent::Ident(target.clone()))
            }
            None => Ok(operand),
        }
    }

    fn operand(
        &mut self,
        node: &Node,
        scope: &mut LexicalScope,
        jumps: &JumpFlags,
    ) -> GeneratorResult<CompleteOrIdent> {
        self.expr(node, None, scope, jumps)
    }

    fn ident_operand(
        &mut self,
        node: &Node,
        scope: &mut LexicalScope,
        jumps: &JumpFlags,
    ) -> GeneratorResult<Ident> {
        match self.operand(node, scope, jumps)? {
            CompleteOrIdent::Ident(ident) => Ok(ident),
            CompleteOrIdent::Value(value) => {
                let ident = self.temp(scope);
                scope.emit(
                    StmtKind::Bind {
                        target: ident.clone(),
                        value: CompleteOrIdent::Value(value),
                    },
                    &node.span,
                );
                Ok(ident)
            }
        }
    }

    /// Lower `node` in a scope of its own
    fn body(
        &mut self,
        node: &Node,
        target: Option<&Ident>,
        jumps: &JumpFlags,
    ) -> GeneratorResult<Arc<Stmt>> {
        let mut scope = LexicalScope::new();
        match target {
            Some(target) => {
                self.expr(node, Some(target), &mut scope, jumps)?;
            }
            None => self.stmt(node, &mut scope, jumps)?,
        }
        Ok(scope.build(&node.span))
    }

    fn operands(
        &mut self,
        nodes: &[Node],
        scope: &mut LexicalScope,
        jumps: &JumpFlags,
    ) -> GeneratorResult<Vec<CompleteOrIdent>> {
        nodes
            .iter()
            .map(|node| self.operand(node, scope, jumps))
            .collect()
    }

    fn expr_to(
        &mut self,
        node: &Node,
        target: &Ident,
        scope: &mut LexicalScope,
        jumps: &JumpFlags,
    ) -> GeneratorResult<()> {
        let span = &node.span;
        let target_op = || target.clone();
        match &node.kind {
            NodeKind::Ident(_) | NodeKind::Literal(_) => {
                self.expr(node, Some(target), scope, jumps)?;
            }
            NodeKind::Seq(items) => {
                let Some((last, init)) = items.split_last() else {
                    return Err(GeneratorError::NotExpr(span.clone()));
                };
                for item in init {
                    self.stmt(item, scope, jumps)?;
                }
                self.expr(last, Some(target), scope, jumps)?;
            }
            NodeKind::Begin(body) => {
                let stmt = self.body(body, Some(target), jumps)?;
                scope.push(stmt);
            }
            NodeKind::Local { decls, body } => {
                let mut inner = LexicalScope::new();
                self.decls(decls, &mut inner, jumps)?;
                self.expr(body, Some(target), &mut inner, jumps)?;
                scope.push(inner.build(span));
            }
            NodeKind::If {
                branches,
                otherwise,
            } => {
                let stmt =
                    self.lower_if(branches, otherwise.as_deref(), Some(target), jumps, span)?;
                scope.push(stmt);
            }
            NodeKind::Case {
                arg,
                clauses,
                otherwise,
            } => {
                let stmt =
                    self.lower_case(arg, clauses, otherwise.as_deref(), Some(target), jumps, span)?;
                scope.push(stmt);
            }
            NodeKind::Try {
                body,
                catches,
                finally,
            } => {
                let stmt =
                    self.lower_try(body, catches, finally.as_deref(), Some(target), jumps, span)?;
                scope.push(stmt);
            }
            NodeKind::Func {
                name: None,
                formals,
                body,
                ..
            } => {
                let def = self.lower_proc(formals, body, true, span)?;
                scope.emit(
                    StmtKind::CreateProc {
                        target: target_op(),
                        def,
                    },
                    span,
                );
            }
            NodeKind::Proc {
                name: None,
                formals,
                body,
            } => {
                let def = self.lower_proc(formals, body, false, span)?;
                scope.emit(
                    StmtKind::CreateProc {
                        target: target_op(),
                        def,
                    },
                    span,
                );
            }
            NodeKind::Actor {
                name: None,
                formals,
                items,
            } => self.lower_actor(formals, items, target, scope, span)?,
            NodeKind::Act(body) => {
                let def = self.lower_act(body, true, span)?;
                scope.emit(
                    StmtKind::Act {
                        def,
                        target: target_op(),
                    },
                    span,
                );
            }
            NodeKind::Spawn(cfg) => {
                let cfg = self.operand(cfg, scope, jumps)?;
                scope.emit(
                    StmtKind::Spawn {
                        cfg,
                        target: target_op(),
                    },
                    span,
                );
            }
            NodeKind::SelfRef => scope.emit(
                StmtKind::SelfRef {
                    target: target_op(),
                },
                span,
            ),
            NodeKind::BinOp { op, left, right } => {
                let left = self.operand(left, scope, jumps)?;
                let right = self.operand(right, scope, jumps)?;
                scope.emit(binop_stmt(*op, left, right, target_op()), span);
            }
            NodeKind::And(left, right) => {
                let cond = self.operand(left, scope, jumps)?;
                let then = self.body(right, Some(target), jumps)?;
                let otherwise = bind_bool(target, false, span);
                scope.emit(
                    StmtKind::IfElse {
                        cond,
                        then,
                        otherwise,
                    },
                    span,
                );
            }
            NodeKind::Or(left, right) => {
                let cond = self.operand(left, scope, jumps)?;
                let then = bind_bool(target, true, span);
                let otherwise = self.body(right, Some(target), jumps)?;
                scope.emit(
                    StmtKind::IfElse {
                        cond,
                        then,
                        otherwise,
                    },
                    span,
                );
            }
            NodeKind::Unary { op, arg } => {
                let arg = self.operand(arg, scope, jumps)?;
                let kind = match op {
                    UnaryOp::Neg => StmtKind::Negate {
                        arg,
                        target: target_op(),
                    },
                    UnaryOp::Not => StmtKind::Not {
                        arg,
                        target: target_op(),
                    },
                    UnaryOp::Deref => StmtKind::GetCellValue {
                        cell: arg,
                        target: target_op(),
                    },
                };
                scope.emit(kind, span);
            }
            NodeKind::Select { rec, feature } => {
                let rec = self.operand(rec, scope, jumps)?;
                let feature = literal_feature(feature, span)?;
                scope.emit(
                    StmtKind::Select {
                        rec,
                        feature: FeatureOrIdent::Feature(feature),
                        target: target_op(),
                    },
                    span,
                );
            }
            NodeKind::Index { rec, index } => {
                let rec = self.operand(rec, scope, jumps)?;
                let feature = match self.operand(index, scope, jumps)? {
                    CompleteOrIdent::Ident(ident) => FeatureOrIdent::Ident(ident),
                    CompleteOrIdent::Value(value) => match value.to_feature() {
                        Some(feature) => FeatureOrIdent::Feature(feature),
                        None => {
                            return Err(GeneratorError::InvalidLiteral {
                                text: value.to_string(),
                                span: index.span.clone(),
                            });
                        }
                    },
                };
                scope.emit(
                    StmtKind::Select {
                        rec,
                        feature,
                        target: target_op(),
                    },
                    span,
                );
            }
            NodeKind::Apply { proc, args } => {
                let proc = self.operand(proc, scope, jumps)?;
                let mut args = self.operands(args, scope, jumps)?;
                args.push(CompleteOrIdent::Ident(target_op()));
                scope.emit(StmtKind::Apply { proc, args }, span);
            }
            NodeKind::Rec { label, fields } => {
                let label = label_feature(label.as_ref(), span)?;
                let fields = fields
                    .iter()
                    .map(|(feature, value)| {
                        Ok((
                            literal_feature(feature, span)?,
                            self.operand(value, scope, jumps)?,
                        ))
                    })
                    .collect::<GeneratorResult<Vec<_>>>()?;
                scope.emit(
                    StmtKind::CreateRec {
                        target: target_op(),
                        label,
                        fields,
                    },
                    span,
                );
            }
            NodeKind::Tuple { label, values } => {
                let label = label_feature(label.as_ref(), span)?;
                let values = self.operands(values, scope, jumps)?;
                scope.emit(
                    StmtKind::CreateTuple {
                        target: target_op(),
                        label,
                        values,
                    },
                    span,
                );
            }
            NodeKind::Throw(_) | NodeKind::Break | NodeKind::Continue | NodeKind::Return(_) => {
                self.stmt(node, scope, jumps)?;
            }
            NodeKind::Var(_)
            | NodeKind::For { .. }
            | NodeKind::While { .. }
            | NodeKind::Import { .. }
            | NodeKind::Skip
            | NodeKind::Unify { .. }
            | NodeKind::Assign { .. }
            | NodeKind::Func { name: Some(_), .. }
            | NodeKind::Proc { name: Some(_), .. }
            | NodeKind::Actor { name: Some(_), .. } => {
                return Err(GeneratorError::NotExpr(span.clone()));
            }
        }
        Ok(())
    }

    fn stmt(
        &mut self,
        node: &Node,
        scope: &mut LexicalScope,
        jumps: &JumpFlags,
    ) -> GeneratorResult<()> {
        let span = &node.span;
        match &node.kind {
            NodeKind::Seq(items) => {
                for item in items {
                    self.stmt(item, scope, jumps)?;
                }
            }
            NodeKind::Begin(body) => {
                let stmt = self.body(body, None, jumps)?;
                scope.push(stmt);
            }
            NodeKind::Local { decls, body } => {
                let mut inner = LexicalScope::new();
                self.decls(decls, &mut inner, jumps)?;
                self.stmt(body, &mut inner, jumps)?;
                scope.push(inner.build(span));
            }
            NodeKind::Var(decls) => self.decls(decls, scope, jumps)?,
            NodeKind::If {
                branches,
                otherwise,
            } => {
                let stmt = self.lower_if(branches, otherwise.as_deref(), None, jumps, span)?;
                scope.push(stmt);
            }
            NodeKind::Case {
                arg,
                clauses,
                otherwise,
            } => {
                let stmt = self.lower_case(arg, clauses, otherwise.as_deref(), None, jumps, span)?;
                scope.push(stmt);
            }
            NodeKind::Try {
                body,
                catches,
                finally,
            } => {
                let stmt = self.lower_try(body, catches, finally.as_deref(), None, jumps, span)?;
                scope.push(stmt);
            }
            NodeKind::For { pat, iter, body } => {
                self.lower_for(pat, iter, body, scope, jumps, span)?
            }
            NodeKind::While { cond, body } => self.lower_while(cond, body, scope, jumps, span)?,
            NodeKind::Func {
                name: Some(name),
                formals,
                body,
                ..
            } => {
                let target = Ident::user(name.as_str());
                scope.declare(target.clone());
                let def = self.lower_proc(formals, body, true, span)?;
                scope.emit(StmtKind::CreateProc { target, def }, span);
            }
            NodeKind::Proc {
                name: Some(name),
                formals,
                body,
            } => {
                let target = Ident::user(name.as_str());
                scope.declare(target.clone());
                let def = self.lower_proc(formals, body, false, span)?;
                scope.emit(StmtKind::CreateProc { target, def }, span);
            }
            NodeKind::Actor {
                name: Some(name),
                formals,
                items,
            } => {
                let target = Ident::user(name.as_str());
                scope.declare(target.clone());
                self.lower_actor(formals, items, &target, scope, span)?;
            }
            NodeKind::Import { qualifier, names } => {
                let names = names
                    .iter()
                    .map(|name| {
                        let ident = Ident::user(name.as_str());
                        scope.declare(ident.clone());
                        (name.clone(), ident)
                    })
                    .collect();
                scope.emit(
                    StmtKind::Import {
                        qualifier: qualifier.clone(),
                        names,
                    },
                    span,
                );
            }
            NodeKind::Throw(error) => {
                let error = self.operand(error, scope, jumps)?;
                scope.emit(StmtKind::Throw { error }, span);
            }
            NodeKind::Break => {
                if !jumps.break_flag.mark_used() {
                    return Err(GeneratorError::BreakNotAllowed(span.clone()));
                }
                scope.emit(StmtKind::JumpThrow(BREAK_ID), span);
            }
            NodeKind::Continue => {
                if !jumps.continue_flag.mark_used() {
                    return Err(GeneratorError::ContinueNotAllowed(span.clone()));
                }
                scope.emit(StmtKind::JumpThrow(CONTINUE_ID), span);
            }
            NodeKind::Return(value) => {
                if !jumps.return_flag.mark_used() {
                    return Err(GeneratorError::ReturnNotAllowed(span.clone()));
                }
                if let Some(value) = value {
                    let Some(result) = &jumps.return_ident else {
                        return Err(GeneratorError::ReturnNotAllowed(span.clone()));
                    };
                    self.expr(value, Some(result), scope, jumps)?;
                }
                scope.emit(StmtKind::JumpThrow(RETURN_ID), span);
            }
            NodeKind::Skip => scope.emit(StmtKind::Skip, span),
            NodeKind::Unify { left, right } => match (&left.kind, &right.kind) {
                (NodeKind::Ident(name), _) => {
                    self.expr(right, Some(&Ident::user(name.as_str())), scope, jumps)?;
                }
                (_, NodeKind::Ident(name)) => {
                    self.expr(left, Some(&Ident::user(name.as_str())), scope, jumps)?;
                }
                _ => {
                    let left = self.operand(left, scope, jumps)?;
                    let right = self.operand(right, scope, jumps)?;
                    scope.emit(StmtKind::Unify { left, right }, span);
                }
            },
            NodeKind::Assign { left, right } => {
                let NodeKind::Ident(name) = &left.kind else {
                    return Err(GeneratorError::NotIdent(left.span.clone()));
                };
                let value = self.operand(right, scope, jumps)?;
                scope.emit(
                    StmtKind::SetCellValue {
                        cell: CompleteOrIdent::Ident(Ident::user(name.as_str())),
                        value,
                    },
                    span,
                );
            }
            NodeKind::Apply { proc, args } => {
                let proc = self.operand(proc, scope, jumps)?;
                let args = self.operands(args, scope, jumps)?;
                scope.emit(StmtKind::Apply { proc, args }, span);
            }
            NodeKind::Act(body) => {
                let def = self.lower_act(body, false, span)?;
                let target = self.temp(scope);
                scope.emit(StmtKind::Act { def, target }, span);
            }
            NodeKind::Func { name: None, .. }
            | NodeKind::Proc { name: None, .. }
            | NodeKind::Actor { name: None, .. }
            | NodeKind::Ident(_)
            | NodeKind::Literal(_)
            | NodeKind::BinOp { .. }
            | NodeKind::And(..)
            | NodeKind::Or(..)
            | NodeKind::Unary { .. }
            | NodeKind::Select { .. }
            | NodeKind::Index { .. }
            | NodeKind::Rec { .. }
            | NodeKind::Tuple { .. }
            | NodeKind::Spawn(_)
            | NodeKind::SelfRef => return Err(GeneratorError::NotStmt(span.clone())),
        }
        Ok(())
    }

    /// Declarations: all binders first so values may refer to them
    fn decls(
        &mut self,
        decls: &[VarDecl],
        scope: &mut LexicalScope,
        jumps: &JumpFlags,
    ) -> GeneratorResult<()> {
        for decl in decls {
            for name in decl.pat.binders() {
                scope.declare(Ident::user(name));
            }
        }
        for decl in decls {
            let Some(value) = &decl.value else {
                continue;
            };
            match &decl.pat.kind {
                PatKind::Ident { name, .. } => {
                    self.expr(value, Some(&Ident::user(name.as_str())), scope, jumps)?;
                }
                _ => {
                    let value = self.operand(value, scope, jumps)?;
                    self.unify_pat(&decl.pat, value, scope)?;
                }
            }
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        branches: &[(Node, Node)],
        otherwise: Option<&Node>,
        target: Option<&Ident>,
        jumps: &JumpFlags,
        span: &Span,
    ) -> GeneratorResult<Arc<Stmt>> {
        let Some(((cond, then), rest)) = branches.split_first() else {
            return match otherwise {
                Some(node) => self.body(node, target, jumps),
                None => Ok(Stmt::arc(StmtKind::Skip, span.clone())),
            };
        };
        let mut scope = LexicalScope::new();
        let cond = self.operand(cond, &mut scope, jumps)?;
        let then = self.body(then, target, jumps)?;
        if rest.is_empty() && otherwise.is_none() {
            scope.emit(StmtKind::If { cond, then }, span);
        } else {
            let otherwise = self.lower_if(rest, otherwise, target, jumps, span)?;
            scope.emit(
                StmtKind::IfElse {
                    cond,
                    then,
                    otherwise,
                },
                span,
            );
        }
        Ok(scope.build(span))
    }

    /// Formal parameters; compound patterns destructure a fresh parameter
    fn formals(
        &mut self,
        formals: &[Pat],
        scope: &mut LexicalScope,
    ) -> GeneratorResult<Vec<Ident>> {
        let mut params = Vec::with_capacity(formals.len());
        for pat in formals {
            let param = match &pat.kind {
                PatKind::Ident { name, .. } => Ident::user(name.as_str()),
                PatKind::Anon => self.fresh("v"),
                PatKind::Escaped(_) => return Err(GeneratorError::InvalidEscape(pat.span.clone())),
                _ => {
                    let param = self.fresh("arg");
                    for name in pat.binders() {
                        scope.declare(Ident::user(name));
                    }
                    self.unify_pat(pat, CompleteOrIdent::Ident(param.clone()), scope)?;
                    param
                }
            };
            params.push(param);
        }
        Ok(params)
    }

    fn lower_proc(
        &mut self,
        formals: &[Pat],
        body: &Node,
        is_func: bool,
        span: &Span,
    ) -> GeneratorResult<Arc<ProcDef>> {
        let mut scope = LexicalScope::new();
        let mut params = self.formals(formals, &mut scope)?;
        let result = is_func.then(|| self.fresh("r"));
        let jumps = JumpFlags::for_proc(result.clone());
        match &result {
            Some(result) => {
                self.expr(body, Some(result), &mut scope, &jumps)?;
            }
            None => self.stmt(body, &mut scope, &jumps)?,
        }
        if jumps.return_flag.is_used() {
            scope.emit(StmtKind::JumpCatch(RETURN_ID), span);
        }
        params.extend(result);
        Ok(Arc::new(ProcDef::new(params, scope.build(span), span.clone())))
    }

    /// `act` body as a one-parameter procedure binding its result
    fn lower_act(
        &mut self,
        body: &Node,
        has_value: bool,
        span: &Span,
    ) -> GeneratorResult<Arc<ProcDef>> {
        let result = self.fresh("r");
        let jumps = JumpFlags::top();
        let mut scope = LexicalScope::new();
        if has_value {
            self.expr(body, Some(&result), &mut scope, &jumps)?;
        } else {
            self.stmt(body, &mut scope, &jumps)?;
            scope.emit(
                StmtKind::Bind {
                    target: result.clone(),
                    value: CompleteOrIdent::Value(Value::Nothing),
                },
                span,
            );
        }
        Ok(Arc::new(ProcDef::new(
            vec![result],
            scope.build(span),
            span.clone(),
        )))
    }

    /// `while c do b end` as a recursive procedure
    fn lower_while(
        &mut self,
        cond: &Node,
        body: &Node,
        scope: &mut LexicalScope,
        jumps: &JumpFlags,
        span: &Span,
    ) -> GeneratorResult<()> {
        let name = self.fresh("WHILE");
        scope.declare(name.clone());
        let loop_jumps = jumps.for_loop();

        let mut iteration = LexicalScope::new();
        let cond = self.operand(cond, &mut iteration, &loop_jumps)?;
        let mut step = LexicalScope::new();
        step.push(self.body(body, None, &loop_jumps)?);
        if loop_jumps.continue_flag.is_used() {
            step.emit(StmtKind::JumpCatch(CONTINUE_ID), span);
        }
        step.emit(apply0(&name), span);
        iteration.emit(
            StmtKind::If {
                cond,
                then: step.build(span),
            },
            span,
        );

        self.emit_loop(name, iteration.build(span), &loop_jumps, scope, span);
        Ok(())
    }

    /// `for p in src do b end` over an `Iter.new` iterator
    fn lower_for(
        &mut self,
        pat: &Pat,
        iter: &Node,
        body: &Node,
        scope: &mut LexicalScope,
        jumps: &JumpFlags,
        span: &Span,
    ) -> GeneratorResult<()> {
        let iterator = self.fresh("iter");
        scope.declare(iterator.clone());
        let source = self.operand(iter, scope, jumps)?;
        scope.emit(
            StmtKind::Apply {
                proc: CompleteOrIdent::Value(builtins::iter_new()),
                args: vec![source, CompleteOrIdent::Ident(iterator.clone())],
            },
            &iter.span,
        );
        let name = self.fresh("FOR");
        scope.declare(name.clone());
        let loop_jumps = jumps.for_loop();
        let next = self.fresh("v");

        let mut step = LexicalScope::new();
        match &pat.kind {
            PatKind::Anon => {}
            PatKind::Ident { name: binder, .. } => {
                let binder = Ident::user(binder.as_str());
                step.declare(binder.clone());
                step.emit(
                    StmtKind::Bind {
                        target: binder,
                        value: CompleteOrIdent::Ident(next.clone()),
                    },
                    &pat.span,
                );
            }
            _ => {
                for binder in pat.binders() {
                    step.declare(Ident::user(binder));
                }
                self.unify_pat(pat, CompleteOrIdent::Ident(next.clone()), &mut step)?;
            }
        }
        step.push(self.body(body, None, &loop_jumps)?);
        if loop_jumps.continue_flag.is_used() {
            step.emit(StmtKind::JumpCatch(CONTINUE_ID), span);
        }
        step.emit(apply0(&name), span);

        let mut iteration = LexicalScope::new();
        iteration.declare(next.clone());
        iteration.emit(
            StmtKind::Apply {
                proc: CompleteOrIdent::Ident(iterator),
                args: vec![CompleteOrIdent::Ident(next.clone())],
            },
            span,
        );
        iteration.emit(
            StmtKind::CaseElse {
                arg: next,
                pat: CasePat::Value(Value::Eof),
                body: Stmt::arc(StmtKind::Skip, span.clone()),
                otherwise: step.build(span),
            },
            span,
        );

        self.emit_loop(name, iteration.build(span), &loop_jumps, scope, span);
        Ok(())
    }

    fn emit_loop(
        &mut self,
        name: Ident,
        iteration: Arc<Stmt>,
        loop_jumps: &JumpFlags,
        scope: &mut LexicalScope,
        span: &Span,
    ) {
        let def = Arc::new(ProcDef::new(Vec::new(), iteration, span.clone()));
        scope.emit(
            StmtKind::CreateProc {
                target: name.clone(),
                def,
            },
            span,
        );
        scope.emit(apply0(&name), span);
        if loop_jumps.break_flag.is_used() {
            scope.emit(StmtKind::JumpCatch(BREAK_ID), span);
        }
    }
}

fn apply0(proc: &Ident) -> StmtKind {
    StmtKind::Apply {
        proc: CompleteOrIdent::Ident(proc.clone()),
        args: Vec::new(),
    }
}

fn bind_bool(target: &Ident, value: bool, span: &Span) -> Arc<Stmt> {
    Stmt::arc(
        StmtKind::Bind {
            target: target.clone(),
            value: CompleteOrIdent::Value(Value::Bool(value)),
        },
        span.clone(),
    )
}

fn binop_stmt(op: BinOp, left: CompleteOrIdent, right: CompleteOrIdent, target: Ident) -> StmtKind {
    let arith = |op| StmtKind::Arith {
        op,
        left: left.clone(),
        right: right.clone(),
        target: target.clone(),
    };
    let relational = |op| StmtKind::Relational {
        op,
        left: left.clone(),
        right: right.clone(),
        target: target.clone(),
    };
    match op {
        BinOp::Add => arith(ArithOp::Add),
        BinOp::Sub => arith(ArithOp::Sub),
        BinOp::Mul => arith(ArithOp::Mul),
        BinOp::Div => arith(ArithOp::Div),
        BinOp::Mod => arith(ArithOp::Mod),
        BinOp::Lt => relational(RelOp::Lt),
        BinOp::Le => relational(RelOp::Le),
        BinOp::Gt => relational(RelOp::Gt),
        BinOp::Ge => relational(RelOp::Ge),
        BinOp::Eq => StmtKind::Entails {
            left,
            right,
            target,
        },
        BinOp::Ne => StmtKind::Disentails {
            left,
            right,
            target,
        },
    }
}

fn literal_text(literal: &Literal) -> String {
    match literal {
        Literal::Int(text) | Literal::Flt(text) | Literal::Dec(text) | Literal::Str(text) => {
            text.clone()
        }
        Literal::Char(ch) => ch.to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Null => "null".to_string(),
        Literal::Nothing => "nothing".to_string(),
        Literal::Eof => "eof".to_string(),
    }
}

/// Value of a literal; integers fit Int32 when possible unless suffixed `L`
pub(crate) fn literal_value(literal: &Literal, span: &Span) -> GeneratorResult<Value> {
    let value = match literal {
        Literal::Int(text) => parse_int(text),
        Literal::Flt(text) => parse_flt(text),
        Literal::Dec(text) => {
            let digits = text.trim_end_matches(['m', 'M']).replace('_', "");
            Dec128::parse(&digits).map(Value::Dec128)
        }
        Literal::Str(text) => Some(Value::str(text.as_str())),
        Literal::Char(ch) => Some(Value::Char(*ch)),
        Literal::Bool(b) => Some(Value::Bool(*b)),
        Literal::Null => Some(Value::Null),
        Literal::Nothing => Some(Value::Nothing),
        Literal::Eof => Some(Value::Eof),
    };
    value.ok_or_else(|| GeneratorError::InvalidLiteral {
        text: literal_text(literal),
        span: span.clone(),
    })
}

/// Feature named by a literal; only scalar literals qualify
pub(crate) fn literal_feature(literal: &Literal, span: &Span) -> GeneratorResult<Feature> {
    literal_value(literal, span)?
        .to_feature()
        .ok_or_else(|| GeneratorError::InvalidLiteral {
            text: literal_text(literal),
            span: span.clone(),
        })
}

fn label_feature(label: Option<&Literal>, span: &Span) -> GeneratorResult<Option<Feature>> {
    label.map(|label| literal_feature(label, span)).transpose()
}

fn parse_int(text: &str) -> Option<Value> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (body, long) = match body.strip_suffix(['L', 'l']) {
        Some(rest) => (rest, true),
        None => (body, false),
    };
    let digits = body.replace('_', "");
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };
    let value = if negative { -magnitude } else { magnitude };
    if !long && let Ok(small) = i32::try_from(value) {
        return Some(Value::Int32(small));
    }
    i64::try_from(value).ok().map(Value::Int64)
}

fn parse_flt(text: &str) -> Option<Value> {
    if let Some(body) = text.strip_suffix(['f', 'F']) {
        return body.replace('_', "").parse::<f32>().ok().map(Value::Flt32);
    }
    let body = text.strip_suffix(['d', 'D']).unwrap_or(text);
    body.replace('_', "").parse::<f64>().ok().map(Value::Flt64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::parser::parse;

    fn lower(source: &str) -> GeneratorResult<Arc<Stmt>> {
        let node = parse(source).expect("parse");
        Generator::new().generate_stmt(&node)
    }

    fn lower_err(source: &str) -> GeneratorError {
        lower(source).expect_err("generation should fail")
    }

    #[test]
    fn test_int_literals() {
        let span = Span::none();
        let int = |text: &str| literal_value(&Literal::Int(text.to_string()), &span).unwrap();
        assert_eq!(int("42"), Value::Int32(42));
        assert_eq!(int("-2147483648"), Value::Int32(i32::MIN));
        assert_eq!(int("2147483648"), Value::Int64(2_147_483_648));
        assert_eq!(int("7L"), Value::Int64(7));
        assert_eq!(int("0xFF"), Value::Int32(255));
        assert_eq!(int("1_000"), Value::Int32(1000));
        assert!(matches!(
            literal_value(&Literal::Int("99999999999999999999".into()), &span),
            Err(GeneratorError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn test_float_literals() {
        let span = Span::none();
        let flt = |text: &str| literal_value(&Literal::Flt(text.to_string()), &span).unwrap();
        assert_eq!(flt("1.5"), Value::Flt64(1.5));
        assert_eq!(flt("1.5f"), Value::Flt32(1.5));
        assert_eq!(flt("2d"), Value::Flt64(2.0));
    }

    #[test]
    fn test_jumps_outside_loops_rejected() {
        assert!(matches!(lower_err("break"), GeneratorError::BreakNotAllowed(_)));
        assert!(matches!(
            lower_err("continue"),
            GeneratorError::ContinueNotAllowed(_)
        ));
        assert!(matches!(
            lower_err("return"),
            GeneratorError::ReturnNotAllowed(_)
        ));
        assert!(matches!(
            lower_err("proc p() in while true do func f() in break end end end"),
            GeneratorError::BreakNotAllowed(_)
        ));
    }

    #[test]
    fn test_value_in_statement_position_rejected() {
        assert!(matches!(lower_err("1 + 2"), GeneratorError::NotStmt(_)));
        assert!(matches!(lower_err("1 + 2 := 3"), GeneratorError::NotIdent(_)));
    }

    #[test]
    fn test_named_func_declares_itself() {
        let stmt = lower("func f(x) in x end").unwrap();
        let StmtKind::Local { idents, body } = &stmt.kind else {
            panic!("expected local, got {}", stmt);
        };
        assert_eq!(idents, &vec![Ident::user("f")]);
        let StmtKind::CreateProc { def, .. } = &body.kind else {
            panic!("expected proc");
        };
        assert_eq!(def.formals.len(), 2);
        assert_eq!(def.formals[0], Ident::user("x"));
    }

    #[test]
    fn test_loop_catches_only_used_jumps() {
        let plain = lower("while true do skip end").unwrap().to_string();
        assert!(!plain.contains("jump-catch"), "{}", plain);
        let with_break = lower("while true do break end").unwrap();
        let StmtKind::Local { body, .. } = &with_break.kind else {
            panic!("expected local");
        };
        let StmtKind::Seq(stmts) = &body.kind else {
            panic!("expected seq");
        };
        assert!(matches!(
            stmts.last().map(|s| &s.kind),
            Some(StmtKind::JumpCatch(BREAK_ID))
        ));
    }

    #[test]
    fn test_var_pattern_declares_binders() {
        let stmt = lower("var [a, {x: b}] = v").unwrap();
        let StmtKind::Local { idents, .. } = &stmt.kind else {
            panic!("expected local");
        };
        assert!(idents.contains(&Ident::user("a")));
        assert!(idents.contains(&Ident::user("b")));
    }

    #[test]
    fn test_program_leaves_root_declarations_open() {
        let node = parse("var x = 1").unwrap();
        let lowered = Generator::new().lower_program(&node, None).unwrap();
        assert_eq!(lowered.declared, vec![Ident::user("x")]);
        assert!(matches!(lowered.stmt.kind, StmtKind::Bind { .. }));
    }
}
