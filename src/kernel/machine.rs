//! The kernel machine
//!
//! A [`Machine`] executes kernel statements from an explicit stack of
//! frames. Execution stops when the stack empties, the time slice runs out,
//! a statement touches an unbound variable, or an error escapes every
//! `try`. A statement that needs an unbound variable leaves its frame on the
//! stack untouched, so calling [`Machine::compute`] again after the barrier
//! is bound retries it from the start.

use std::sync::Arc;

use super::env::{Env, EnvEntry};
use super::error::{MachineError, MachineResult};
use super::ident::Ident;
use super::ops;
use super::registry::ModuleRegistry;
use super::stmt::{CaseField, CasePat, CompleteOrIdent, FeatureOrIdent, ProcDef, Stmt, StmtKind};
use super::unify::unify;
use super::value::{
    ActorCfg, ActorCfgtr, Closure, FailedValue, Feature, NativeProc, Rec, Value, ValueOrVar,
};
use super::var::Var;
use crate::runtime::envelope::ActorRefHandle;
use crate::util::span::Span;

/// Default number of statements executed per [`Machine::compute`] call
pub const DEFAULT_TIME_SLICE: usize = 10_000;

/// Reason a statement stopped short of completing
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// The statement needs this unbound variable
    Wait(Var),
    /// A user-level error value was thrown
    Throw(Value),
    /// A structural error was raised
    Error(MachineError),
    /// A labelled jump (`break`, `continue`, `return`)
    Jump(u32),
}

impl From<MachineError> for Interrupt {
    fn from(err: MachineError) -> Self {
        Interrupt::Error(err)
    }
}

/// Resolve an operand to a determined value; waits on unbound variables and
/// throws failed values
pub fn require(operand: &ValueOrVar) -> Result<Value, Interrupt> {
    match operand.resolve() {
        ValueOrVar::Var(var) => Err(Interrupt::Wait(var)),
        ValueOrVar::Value(Value::Failed(failed)) => Err(Interrupt::Throw(Value::Failed(failed))),
        ValueOrVar::Value(value) => Ok(value),
    }
}

/// Resolve the subject of a pattern test
///
/// A failed value is matched through its error record instead of being
/// thrown, so `catch` clauses can destructure failures that crossed an
/// actor boundary. Binding the whole subject still binds the failed value.
fn match_subject(operand: &ValueOrVar) -> Result<Value, Interrupt> {
    match operand.resolve() {
        ValueOrVar::Var(var) => Err(Interrupt::Wait(var)),
        ValueOrVar::Value(Value::Failed(failed)) => Ok(failed.error.clone()),
        ValueOrVar::Value(value) => Ok(value),
    }
}

/// Like [`require`], but also waits until every nested field is determined
pub fn require_complete(operand: &ValueOrVar) -> Result<Value, Interrupt> {
    require(operand)?.check_complete().map_err(Interrupt::Wait)
}

/// Unify a result argument with a value
pub fn bind_result(target: &ValueOrVar, value: Value) -> Result<(), Interrupt> {
    unify(target, &ValueOrVar::Value(value)).map_err(Interrupt::from)
}

/// Services the machine needs from whatever is running it
pub trait MachineHost {
    /// Reference of the running actor, if any
    fn self_ref(&self) -> Option<ActorRefHandle>;

    /// Start `closure` concurrently, binding its single result parameter into `target`
    ///
    /// Returns `false` when the host wants the machine to run it inline.
    fn act(&mut self, closure: Arc<Closure>, target: Var) -> MachineResult<bool>;

    /// Start a child actor
    fn spawn(&mut self, cfg: Arc<ActorCfg>) -> MachineResult<ActorRefHandle>;

    /// Send a request whose response will be bound into `response`
    fn send_request(
        &mut self,
        target: &ActorRefHandle,
        message: Value,
        response: ValueOrVar,
    ) -> MachineResult<()>;

    /// Send a notification
    fn send_notify(&mut self, target: &ActorRefHandle, message: Value) -> MachineResult<()>;
}

/// Host for computations that run outside any actor
#[derive(Debug, Default)]
pub struct DetachedHost;

impl MachineHost for DetachedHost {
    fn self_ref(&self) -> Option<ActorRefHandle> {
        None
    }

    fn act(&mut self, _closure: Arc<Closure>, _target: Var) -> MachineResult<bool> {
        Ok(false)
    }

    fn spawn(&mut self, _cfg: Arc<ActorCfg>) -> MachineResult<ActorRefHandle> {
        Err(MachineError::NotInActor("spawn"))
    }

    fn send_request(
        &mut self,
        _target: &ActorRefHandle,
        _message: Value,
        _response: ValueOrVar,
    ) -> MachineResult<()> {
        Err(MachineError::NotInActor("ask"))
    }

    fn send_notify(&mut self, _target: &ActorRefHandle, _message: Value) -> MachineResult<()> {
        Err(MachineError::NotInActor("tell"))
    }
}

/// Context handed to native procedures
pub struct NativeCtx<'a> {
    /// Span of the apply statement
    pub span: &'a Span,
    /// Host running the machine
    pub host: &'a mut dyn MachineHost,
}

/// Uncaught error that stopped the machine
#[derive(Debug, Clone)]
pub struct Halt {
    /// Thrown error value
    pub error: Value,
    /// Structural error the throw started as, if any
    pub native: Option<MachineError>,
    /// Spans of the frames on the stack when the error was raised, innermost first
    pub stack: Vec<Span>,
}

impl Halt {
    /// Capture this halt as a failed value
    pub fn to_failed_value(&self, address: &str) -> FailedValue {
        let (error, parent) = match &self.error {
            Value::Failed(parent) => (parent.error.clone(), Some(parent.clone())),
            other => (other.clone(), None),
        };
        FailedValue {
            address: address.to_string(),
            error,
            stack: self.stack.clone(),
            parent,
            native_cause: self.native.as_ref().map(|err| err.to_string()),
        }
    }
}

/// Outcome of one [`Machine::compute`] call
#[derive(Debug)]
pub enum ComputeEnd {
    /// The stack is empty
    End,
    /// The time slice ran out
    Preempt,
    /// Blocked until this variable is bound
    Wait(Var),
    /// An error escaped every handler; the stack has been cleared
    Halt(Halt),
}

#[derive(Debug)]
enum Frame {
    Stmt {
        stmt: Arc<Stmt>,
        env: Env,
    },
    Catch {
        ident: Ident,
        body: Arc<Stmt>,
        env: Env,
        span: Span,
    },
}

impl Frame {
    fn span(&self) -> &Span {
        match self {
            Frame::Stmt { stmt, .. } => &stmt.span,
            Frame::Catch { span, .. } => span,
        }
    }
}

/// Kernel statement interpreter
#[derive(Debug)]
pub struct Machine {
    stack: Vec<Frame>,
    registry: Arc<ModuleRegistry>,
}

impl Machine {
    /// Create an idle machine resolving imports against `registry`
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self {
            stack: Vec::new(),
            registry,
        }
    }

    /// Schedule `stmt` to run in `env`
    pub fn push(&mut self, stmt: Arc<Stmt>, env: Env) {
        self.stack.push(Frame::Stmt { stmt, env });
    }

    /// Schedule an application of `proc` to `args`
    pub fn push_apply(&mut self, proc: Value, args: Vec<ValueOrVar>, span: Span) {
        let mut entries = Vec::with_capacity(args.len() + 1);
        let proc_ident = Ident::system("apply", 0);
        entries.push(EnvEntry::new(proc_ident.clone(), Var::bound(proc)));
        let mut actuals = Vec::with_capacity(args.len());
        for (index, arg) in args.into_iter().enumerate() {
            let ident = Ident::system("arg", index as u32);
            let var = match arg {
                ValueOrVar::Var(var) => var,
                ValueOrVar::Value(value) => Var::bound(value),
            };
            entries.push(EnvEntry::new(ident.clone(), var));
            actuals.push(CompleteOrIdent::Ident(ident));
        }
        let stmt = Stmt::arc(
            StmtKind::Apply {
                proc: CompleteOrIdent::Ident(proc_ident),
                args: actuals,
            },
            span,
        );
        self.push(stmt, Env::new(entries));
    }

    /// Whether no work is scheduled
    pub fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }

    /// Module registry used by `import`
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Run up to `time_slice` statements
    pub fn compute(&mut self, host: &mut dyn MachineHost, time_slice: usize) -> ComputeEnd {
        let mut budget = time_slice.max(1);
        loop {
            if budget == 0 {
                return if self.stack.is_empty() {
                    ComputeEnd::End
                } else {
                    ComputeEnd::Preempt
                };
            }
            let Some(frame) = self.stack.pop() else {
                return ComputeEnd::End;
            };
            budget -= 1;
            let (stmt, env) = match frame {
                Frame::Stmt { stmt, env } => (stmt, env),
                Frame::Catch { .. } => continue,
            };
            match self.execute(host, &stmt, &env) {
                Ok(()) => {}
                Err(Interrupt::Wait(var)) => {
                    self.stack.push(Frame::Stmt { stmt, env });
                    return ComputeEnd::Wait(var);
                }
                Err(Interrupt::Throw(error)) => {
                    if let Some(halt) = self.unwind_throw(error, None, &stmt.span) {
                        return ComputeEnd::Halt(halt);
                    }
                }
                Err(Interrupt::Error(err)) => {
                    if let Some(halt) = self.unwind_throw(err.to_value(), Some(err), &stmt.span) {
                        return ComputeEnd::Halt(halt);
                    }
                }
                Err(Interrupt::Jump(id)) => {
                    if !self.unwind_jump(id) {
                        let err = MachineError::InvalidJump(id);
                        return ComputeEnd::Halt(Halt {
                            error: err.to_value(),
                            native: Some(err),
                            stack: vec![stmt.span.clone()],
                        });
                    }
                }
            }
        }
    }

    fn unwind_throw(
        &mut self,
        error: Value,
        native: Option<MachineError>,
        origin: &Span,
    ) -> Option<Halt> {
        let mut stack = vec![origin.clone()];
        stack.extend(self.stack.iter().rev().map(|frame| frame.span().clone()));
        while let Some(frame) = self.stack.pop() {
            if let Frame::Catch {
                ident, body, env, ..
            } = frame
            {
                let env = env.extend(vec![EnvEntry::new(ident, Var::bound(error))]);
                self.stack.push(Frame::Stmt { stmt: body, env });
                return None;
            }
        }
        Some(Halt {
            error,
            native,
            stack,
        })
    }

    fn unwind_jump(&mut self, id: u32) -> bool {
        while let Some(frame) = self.stack.pop() {
            if let Frame::Stmt { stmt, .. } = &frame {
                if matches!(stmt.kind, StmtKind::JumpCatch(target) if target == id) {
                    return true;
                }
            }
        }
        false
    }

    fn lookup(&self, env: &Env, ident: &Ident) -> Result<Var, Interrupt> {
        env.get(ident)
            .cloned()
            .ok_or_else(|| Interrupt::Error(MachineError::IdentNotFound(ident.clone())))
    }

    fn operand(&self, env: &Env, operand: &CompleteOrIdent) -> Result<ValueOrVar, Interrupt> {
        match operand {
            CompleteOrIdent::Value(value) => Ok(ValueOrVar::Value(value.clone())),
            CompleteOrIdent::Ident(ident) => Ok(ValueOrVar::Var(self.lookup(env, ident)?)),
        }
    }

    fn value(&self, env: &Env, operand: &CompleteOrIdent) -> Result<Value, Interrupt> {
        require(&self.operand(env, operand)?)
    }

    fn complete(&self, env: &Env, operand: &CompleteOrIdent) -> Result<Value, Interrupt> {
        require_complete(&self.operand(env, operand)?)
    }

    fn bind(&self, env: &Env, target: &Ident, value: Value) -> Result<(), Interrupt> {
        let var = self.lookup(env, target)?;
        unify(&ValueOrVar::Var(var), &ValueOrVar::Value(value))?;
        Ok(())
    }

    fn closure(&self, env: &Env, def: &Arc<ProcDef>) -> Result<Arc<Closure>, Interrupt> {
        let captured = env
            .capture(def.free_idents.iter())
            .map_err(|ident| Interrupt::Error(MachineError::IdentNotFound(ident)))?;
        Ok(Arc::new(Closure {
            def: def.clone(),
            env: captured,
        }))
    }

    fn feature(&self, env: &Env, feature: &FeatureOrIdent) -> Result<Feature, Interrupt> {
        match feature {
            FeatureOrIdent::Feature(feature) => Ok(feature.clone()),
            FeatureOrIdent::Ident(ident) => {
                let value = require(&ValueOrVar::Var(self.lookup(env, ident)?))?;
                value
                    .to_feature()
                    .ok_or_else(|| Interrupt::Error(MachineError::InvalidKey(value.to_string())))
            }
        }
    }

    fn execute(
        &mut self,
        host: &mut dyn MachineHost,
        stmt: &Arc<Stmt>,
        env: &Env,
    ) -> Result<(), Interrupt> {
        match &stmt.kind {
            StmtKind::Local { idents, body } => {
                let entries = idents
                    .iter()
                    .map(|ident| EnvEntry::new(ident.clone(), Var::new()))
                    .collect();
                self.push(body.clone(), env.extend(entries));
            }
            StmtKind::Seq(stmts) => {
                for child in stmts.iter().rev() {
                    self.push(child.clone(), env.clone());
                }
            }
            StmtKind::Skip | StmtKind::JumpCatch(_) => {}
            StmtKind::Bind { target, value } => {
                let var = self.lookup(env, target)?;
                unify(&ValueOrVar::Var(var), &self.operand(env, value)?)?;
            }
            StmtKind::Unify { left, right } => {
                unify(&self.operand(env, left)?, &self.operand(env, right)?)?;
            }
            StmtKind::If { cond, then } => {
                if self.condition(env, cond)? {
                    self.push(then.clone(), env.clone());
                }
            }
            StmtKind::IfElse {
                cond,
                then,
                otherwise,
            } => {
                let branch = if self.condition(env, cond)? { then } else { otherwise };
                self.push(branch.clone(), env.clone());
            }
            StmtKind::Case { arg, pat, body } => {
                if let Some(entries) = self.match_pat(env, arg, pat)? {
                    self.push(body.clone(), env.extend(entries));
                }
            }
            StmtKind::CaseElse {
                arg,
                pat,
                body,
                otherwise,
            } => match self.match_pat(env, arg, pat)? {
                Some(entries) => self.push(body.clone(), env.extend(entries)),
                None => self.push(otherwise.clone(), env.clone()),
            },
            StmtKind::Apply { proc, args } => {
                let proc = self.value(env, proc)?;
                let args = args
                    .iter()
                    .map(|arg| self.operand(env, arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply(host, proc, args, &stmt.span)?;
            }
            StmtKind::CreateProc { target, def } => {
                let closure = self.closure(env, def)?;
                self.bind(env, target, Value::Closure(closure))?;
            }
            StmtKind::CreateActorCfgtr { target, def } => {
                let ctor = self.closure(env, def)?;
                self.bind(env, target, Value::ActorCfgtr(Arc::new(ActorCfgtr { ctor })))?;
            }
            StmtKind::CreateRec {
                target,
                label,
                fields,
            } => {
                let fields = fields
                    .iter()
                    .map(|(feature, value)| Ok((feature.clone(), self.operand(env, value)?)))
                    .collect::<Result<Vec<_>, Interrupt>>()?;
                let rec = Rec::new(label.clone(), fields)
                    .map_err(|dup| MachineError::DuplicateFeature(dup.to_string()))?;
                self.bind(env, target, Value::Rec(Arc::new(rec)))?;
            }
            StmtKind::CreateTuple {
                target,
                label,
                values,
            } => {
                let values = values
                    .iter()
                    .map(|value| self.operand(env, value))
                    .collect::<Result<Vec<_>, _>>()?;
                self.bind(env, target, Value::Rec(Arc::new(Rec::tuple(label.clone(), values))))?;
            }
            StmtKind::Select {
                rec,
                feature,
                target,
            } => {
                let container = self.value(env, rec)?;
                let feature = self.feature(env, feature)?;
                let field = select(&container, &feature)?;
                let var = self.lookup(env, target)?;
                unify(&ValueOrVar::Var(var), &field)?;
            }
            StmtKind::GetCellValue { cell, target } => match self.value(env, cell)? {
                Value::Cell(cell) => {
                    let var = self.lookup(env, target)?;
                    unify(&ValueOrVar::Var(var), &cell.get())?;
                }
                other => return Err(MachineError::type_mismatch("Cell", &other).into()),
            },
            StmtKind::SetCellValue { cell, value } => match self.value(env, cell)? {
                Value::Cell(cell) => cell.set(self.operand(env, value)?),
                other => return Err(MachineError::type_mismatch("Cell", &other).into()),
            },
            StmtKind::Arith {
                op,
                left,
                right,
                target,
            } => {
                let left = self.value(env, left)?;
                let right = self.value(env, right)?;
                self.bind(env, target, ops::arith(*op, &left, &right)?)?;
            }
            StmtKind::Negate { arg, target } => {
                let arg = self.value(env, arg)?;
                self.bind(env, target, ops::negate(&arg)?)?;
            }
            StmtKind::Not { arg, target } => {
                let arg = self.value(env, arg)?;
                self.bind(env, target, ops::not(&arg)?)?;
            }
            StmtKind::Relational {
                op,
                left,
                right,
                target,
            } => {
                let left = self.value(env, left)?;
                let right = self.value(env, right)?;
                self.bind(env, target, ops::relational(*op, &left, &right)?)?;
            }
            StmtKind::Entails {
                left,
                right,
                target,
            } => {
                let left = self.complete(env, left)?;
                let right = self.complete(env, right)?;
                self.bind(env, target, Value::Bool(left.entails(&right)))?;
            }
            StmtKind::Disentails {
                left,
                right,
                target,
            } => {
                let left = self.complete(env, left)?;
                let right = self.complete(env, right)?;
                self.bind(env, target, Value::Bool(!left.entails(&right)))?;
            }
            StmtKind::Throw { error } => {
                let error = match self.operand(env, error)?.resolve() {
                    ValueOrVar::Var(var) => return Err(Interrupt::Wait(var)),
                    ValueOrVar::Value(value) => value,
                };
                return Err(Interrupt::Throw(error));
            }
            StmtKind::Try {
                body,
                catch_ident,
                catch_body,
            } => {
                self.stack.push(Frame::Catch {
                    ident: catch_ident.clone(),
                    body: catch_body.clone(),
                    env: env.clone(),
                    span: stmt.span.clone(),
                });
                self.push(body.clone(), env.clone());
            }
            StmtKind::JumpThrow(id) => return Err(Interrupt::Jump(*id)),
            StmtKind::Act { def, target } => {
                let closure = self.closure(env, def)?;
                let var = self.lookup(env, target)?;
                if !host.act(closure.clone(), var.clone())? {
                    let formal = closure.def.formals.first().cloned().ok_or(
                        MachineError::ArityMismatch {
                            expected: 1,
                            found: 0,
                        },
                    )?;
                    let body_env = closure.env.extend(vec![EnvEntry::new(formal, var)]);
                    self.push(closure.def.body.clone(), body_env);
                }
            }
            StmtKind::Spawn { cfg, target } => match self.complete(env, cfg)? {
                Value::ActorCfg(cfg) => {
                    let actor = host.spawn(cfg)?;
                    self.bind(env, target, Value::ActorRef(actor))?;
                }
                other => return Err(MachineError::type_mismatch("ActorCfg", &other).into()),
            },
            StmtKind::Import { qualifier, names } => {
                let path = qualifier.join(".");
                let module = self
                    .registry
                    .lookup(&path)
                    .ok_or_else(|| MachineError::ModuleNotFound(path.clone()))?;
                for (name, ident) in names {
                    let export = match &module {
                        Value::Rec(rec) => rec.get(&Feature::str(name.as_str())).cloned(),
                        _ => None,
                    }
                    .ok_or_else(|| MachineError::NotExported {
                        module: path.clone(),
                        name: name.clone(),
                    })?;
                    let var = self.lookup(env, ident)?;
                    unify(&ValueOrVar::Var(var), &export)?;
                }
            }
            StmtKind::SelfRef { target } => {
                let actor = host.self_ref().ok_or(MachineError::NotInActor("self"))?;
                self.bind(env, target, Value::ActorRef(actor))?;
            }
        }
        Ok(())
    }

    fn condition(&self, env: &Env, cond: &CompleteOrIdent) -> Result<bool, Interrupt> {
        match self.value(env, cond)? {
            Value::Bool(b) => Ok(b),
            other => Err(MachineError::type_mismatch("Bool", &other).into()),
        }
    }

    fn apply(
        &mut self,
        host: &mut dyn MachineHost,
        proc: Value,
        args: Vec<ValueOrVar>,
        span: &Span,
    ) -> Result<(), Interrupt> {
        match proc {
            Value::Closure(closure) => {
                let formals = &closure.def.formals;
                if formals.len() != args.len() {
                    return Err(MachineError::ArityMismatch {
                        expected: formals.len(),
                        found: args.len(),
                    }
                    .into());
                }
                let entries = formals
                    .iter()
                    .zip(args)
                    .map(|(formal, arg)| {
                        let var = match arg {
                            ValueOrVar::Var(var) => var,
                            ValueOrVar::Value(value) => Var::bound(value),
                        };
                        EnvEntry::new(formal.clone(), var)
                    })
                    .collect();
                self.push(closure.def.body.clone(), closure.env.extend(entries));
                Ok(())
            }
            Value::Native(native) => apply_native(&native, host, args, span),
            Value::ActorCfgtr(cfgtr) => {
                let expected = cfgtr.arg_count() + 1;
                if args.len() != expected {
                    return Err(MachineError::ArityMismatch {
                        expected,
                        found: args.len(),
                    }
                    .into());
                }
                let (result, inputs) = args.split_last().ok_or(MachineError::ArityMismatch {
                    expected,
                    found: 0,
                })?;
                let values = inputs
                    .iter()
                    .map(require_complete)
                    .collect::<Result<Vec<_>, _>>()?;
                let cfg = ActorCfg {
                    ctor: cfgtr.ctor.clone(),
                    args: values,
                };
                bind_result(result, Value::ActorCfg(Arc::new(cfg)))
            }
            other => Err(MachineError::NotProc(other.to_string()).into()),
        }
    }

    fn match_pat(
        &self,
        env: &Env,
        arg: &Ident,
        pat: &CasePat,
    ) -> Result<Option<Vec<EnvEntry>>, Interrupt> {
        let value = match_subject(&ValueOrVar::Var(self.lookup(env, arg)?))?;
        match pat {
            CasePat::Value(literal) => Ok(value.entails(literal).then(Vec::new)),
            CasePat::Escaped(ident) => {
                let expected = require_complete(&ValueOrVar::Var(self.lookup(env, ident)?))?;
                let actual = value.check_complete().map_err(Interrupt::Wait)?;
                Ok(actual.entails(&expected).then(Vec::new))
            }
            CasePat::Rec {
                label,
                fields,
                partial,
            } => {
                let Value::Rec(rec) = &value else {
                    return Ok(None);
                };
                if rec.label() != label.as_ref() {
                    return Ok(None);
                }
                if !partial && rec.len() != fields.len() {
                    return Ok(None);
                }
                let mut entries = Vec::new();
                for (feature, field) in fields {
                    let Some(actual) = rec.get(feature) else {
                        return Ok(None);
                    };
                    match field {
                        CaseField::Bind(ident) => {
                            let var = match actual.resolve() {
                                ValueOrVar::Var(var) => var,
                                ValueOrVar::Value(value) => Var::bound(value),
                            };
                            entries.push(EnvEntry::new(ident.clone(), var));
                        }
                        CaseField::Value(literal) => {
                            if !require(actual)?.entails(literal) {
                                return Ok(None);
                            }
                        }
                        CaseField::Escaped(ident) => {
                            let expected =
                                require_complete(&ValueOrVar::Var(self.lookup(env, ident)?))?;
                            if !require_complete(actual)?.entails(&expected) {
                                return Ok(None);
                            }
                        }
                        CaseField::Anon => {}
                    }
                }
                Ok(Some(entries))
            }
        }
    }
}

fn apply_native(
    native: &Arc<NativeProc>,
    host: &mut dyn MachineHost,
    args: Vec<ValueOrVar>,
    span: &Span,
) -> Result<(), Interrupt> {
    if native.arity != args.len() {
        return Err(MachineError::ArityMismatch {
            expected: native.arity,
            found: args.len(),
        }
        .into());
    }
    let mut ctx = NativeCtx { span, host };
    native.invoke(&mut ctx, &args)
}

/// Select `feature` from a record, host object, or actor reference
pub fn select(container: &Value, feature: &Feature) -> Result<ValueOrVar, Interrupt> {
    let not_found = || {
        Interrupt::Error(MachineError::FeatureNotFound {
            feature: feature.to_string(),
            rec: container.to_string(),
        })
    };
    match container {
        Value::Rec(rec) => rec.get(feature).cloned().ok_or_else(not_found),
        Value::Obj(obj) => obj.select(feature).map(ValueOrVar::Value).ok_or_else(not_found),
        Value::ActorRef(actor) => actor_method(actor, feature)
            .map(ValueOrVar::Value)
            .ok_or_else(not_found),
        _ => Err(not_found()),
    }
}

fn actor_method(actor: &ActorRefHandle, feature: &Feature) -> Option<Value> {
    let Feature::Str(name) = feature else {
        return None;
    };
    let target = actor.clone();
    let native = match name.as_ref() {
        "ask" => NativeProc::new("ask", 2, move |ctx, args| {
            let message = require_complete(&args[0])?;
            ctx.host.send_request(&target, message, args[1].clone())?;
            Ok(())
        }),
        "tell" => NativeProc::new("tell", 1, move |ctx, args| {
            let message = require_complete(&args[0])?;
            ctx.host.send_notify(&target, message)?;
            Ok(())
        }),
        "address" => {
            return Some(Value::str(actor.address().to_string()));
        }
        _ => return None,
    };
    Some(Value::Native(Arc::new(native)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::stmt::{ArithOp, BREAK_ID};

    fn span() -> Span {
        Span::none()
    }

    fn ident(name: &str) -> Ident {
        Ident::user(name)
    }

    fn machine() -> Machine {
        Machine::new(Arc::new(ModuleRegistry::with_system()))
    }

    #[test]
    fn test_machine_suspends_and_resumes() {
        let x = Var::new();
        let y = Var::new();
        let env = Env::new(vec![
            EnvEntry::new(ident("x"), x.clone()),
            EnvEntry::new(ident("y"), y.clone()),
        ]);
        let stmt = Stmt::arc(
            StmtKind::Arith {
                op: ArithOp::Add,
                left: ident("x").into(),
                right: CompleteOrIdent::Value(Value::Int32(1)),
                target: ident("y"),
            },
            span(),
        );
        let mut machine = machine();
        machine.push(stmt, env);
        match machine.compute(&mut DetachedHost, DEFAULT_TIME_SLICE) {
            ComputeEnd::Wait(barrier) => assert!(barrier.same(&x)),
            other => panic!("expected wait, got {:?}", other),
        }
        x.bind_to_value(Value::Int32(41)).unwrap();
        assert!(matches!(
            machine.compute(&mut DetachedHost, DEFAULT_TIME_SLICE),
            ComputeEnd::End
        ));
        assert_eq!(y.value(), Some(Value::Int32(42)));
    }

    #[test]
    fn test_machine_preempts_when_slice_exhausted() {
        let stmts = (0..5).map(|_| Stmt::arc(StmtKind::Skip, span())).collect();
        let mut machine = machine();
        machine.push(Stmt::arc(StmtKind::Seq(stmts), span()), Env::empty());
        assert!(matches!(machine.compute(&mut DetachedHost, 3), ComputeEnd::Preempt));
        assert!(matches!(
            machine.compute(&mut DetachedHost, 100),
            ComputeEnd::End
        ));
    }

    #[test]
    fn test_uncaught_throw_halts_and_try_catches() {
        let error = CompleteOrIdent::Value(Value::str("boom"));
        let throw = Stmt::arc(StmtKind::Throw { error }, span());
        let mut machine = machine();
        machine.push(throw.clone(), Env::empty());
        match machine.compute(&mut DetachedHost, DEFAULT_TIME_SLICE) {
            ComputeEnd::Halt(halt) => assert_eq!(halt.error, Value::str("boom")),
            other => panic!("expected halt, got {:?}", other),
        }

        let caught = Var::new();
        let env = Env::new(vec![EnvEntry::new(ident("caught"), caught.clone())]);
        let handler = Stmt::arc(
            StmtKind::Bind {
                target: ident("caught"),
                value: ident("e").into(),
            },
            span(),
        );
        let guarded = Stmt::arc(
            StmtKind::Try {
                body: throw,
                catch_ident: ident("e"),
                catch_body: handler,
            },
            span(),
        );
        machine.push(guarded, env);
        assert!(matches!(
            machine.compute(&mut DetachedHost, DEFAULT_TIME_SLICE),
            ComputeEnd::End
        ));
        assert_eq!(caught.value(), Some(Value::str("boom")));
    }

    #[test]
    fn test_jump_skips_to_matching_catch() {
        let hit = Var::new();
        let env = Env::new(vec![EnvEntry::new(ident("hit"), hit.clone())]);
        let bind_hit = Stmt::arc(
            StmtKind::Bind {
                target: ident("hit"),
                value: CompleteOrIdent::Value(Value::Bool(true)),
            },
            span(),
        );
        let seq = Stmt::arc(
            StmtKind::Seq(vec![
                Stmt::arc(StmtKind::JumpThrow(BREAK_ID), span()),
                bind_hit,
                Stmt::arc(StmtKind::JumpCatch(BREAK_ID), span()),
            ]),
            span(),
        );
        let mut machine = machine();
        machine.push(seq, env);
        assert!(matches!(
            machine.compute(&mut DetachedHost, DEFAULT_TIME_SLICE),
            ComputeEnd::End
        ));
        assert!(!hit.is_bound());
    }

    #[test]
    fn test_apply_checks_arity() {
        let def = Arc::new(ProcDef::new(
            vec![ident("a")],
            Stmt::arc(StmtKind::Skip, span()),
            span(),
        ));
        let closure = Value::Closure(Arc::new(Closure {
            def,
            env: Env::empty(),
        }));
        let mut machine = machine();
        machine.push_apply(closure, vec![], span());
        match machine.compute(&mut DetachedHost, DEFAULT_TIME_SLICE) {
            ComputeEnd::Halt(halt) => {
                assert_eq!(halt.error.error_name().as_deref(), Some("ArityMismatchError"));
                assert!(matches!(halt.native, Some(MachineError::ArityMismatch { .. })));
            }
            other => panic!("expected halt, got {:?}", other),
        }
    }

    #[test]
    fn test_touching_failed_value_throws_it_with_parent_chain() {
        let inner = Arc::new(FailedValue {
            address: "torq://test/a".into(),
            error: Value::error("AskNotHandledError", "not handled", vec![]),
            stack: vec![],
            parent: None,
            native_cause: None,
        });
        let x = Var::bound(Value::Failed(inner.clone()));
        let env = Env::new(vec![
            EnvEntry::new(ident("x"), x),
            EnvEntry::new(ident("y"), Var::new()),
        ]);
        let stmt = Stmt::arc(
            StmtKind::Negate {
                arg: ident("x").into(),
                target: ident("y"),
            },
            span(),
        );
        let mut machine = machine();
        machine.push(stmt, env);
        match machine.compute(&mut DetachedHost, DEFAULT_TIME_SLICE) {
            ComputeEnd::Halt(halt) => {
                let failed = halt.to_failed_value("torq://test/b");
                assert_eq!(failed.error_name().as_deref(), Some("AskNotHandledError"));
                assert!(Arc::ptr_eq(failed.parent.as_ref().unwrap(), &inner));
            }
            other => panic!("expected halt, got {:?}", other),
        }
    }
}
