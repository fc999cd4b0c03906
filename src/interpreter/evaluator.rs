//! Standalone evaluator
//!
//! Runs a program outside any actor. The evaluator is a type-state builder:
//! each stage type only exposes the calls legal in that stage, so calling
//! `perform` before `generate` is a compile error rather than a runtime one.
//!
//! ```text
//! Evaluator::builder()        Init
//!     .source("...")          Ready
//!     .parse()?               Parsed
//!     .generate()?            Generated
//!     .perform()?             Performed
//! ```
//!
//! Without an actor system `act` runs inline and actor operations fail with
//! `NotInActorError`. With one, `spawn`, `ask` and `tell` go through the
//! system and the evaluator blocks until responses bind the variables it is
//! waiting on.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::ast::Node;
use super::error::{EvaluatorError, EvaluatorResult};
use super::generator::{Generator, Lowered};
use super::parser::Parser;
use crate::kernel::env::{Env, EnvEntry};
use crate::kernel::ident::Ident;
use crate::kernel::machine::{ComputeEnd, DEFAULT_TIME_SLICE, DetachedHost, Machine, MachineHost};
use crate::kernel::registry::ModuleRegistry;
use crate::kernel::stmt::Stmt;
use crate::kernel::value::{Value, ValueOrVar};
use crate::kernel::var::Var;
use crate::runtime::ActorSystem;
use crate::runtime::client::SystemHost;
use crate::util::span::SourceText;

/// Default evaluation budget
pub const DEFAULT_MAX_TIME: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct Config {
    root_env: Env,
    vars: Vec<EnvEntry>,
    registry: Option<Arc<ModuleRegistry>>,
    system: Option<ActorSystem>,
    max_time: Duration,
    time_slice: usize,
    result: Option<Ident>,
}

impl Config {
    fn env(&self) -> Env {
        self.root_env.extend(self.vars.clone())
    }

    fn registry(&self) -> Arc<ModuleRegistry> {
        match (&self.registry, &self.system) {
            (Some(registry), _) => registry.clone(),
            (None, Some(system)) => system.registry().clone(),
            (None, None) => Arc::new(ModuleRegistry::with_system()),
        }
    }
}

/// Configuration stage
#[derive(Debug, Clone)]
pub struct Init {
    config: Config,
}

/// Source set, not yet parsed
#[derive(Debug, Clone)]
pub struct Ready {
    config: Config,
    source: SourceText,
}

/// Parsed program
#[derive(Debug, Clone)]
pub struct Parsed {
    config: Config,
    node: Node,
}

/// Lowered program
#[derive(Debug, Clone)]
pub struct Generated {
    config: Config,
    node: Node,
    lowered: Lowered,
}

/// Finished program
#[derive(Debug, Clone)]
pub struct Performed {
    env: Env,
    result: Option<Var>,
    elapsed: Duration,
}

/// Evaluator in stage `S`
#[derive(Debug, Clone)]
pub struct Evaluator<S> {
    state: S,
}

impl Evaluator<Init> {
    /// Start configuring an evaluation
    pub fn builder() -> Self {
        Self {
            state: Init {
                config: Config {
                    root_env: Env::empty(),
                    vars: Vec::new(),
                    registry: None,
                    system: None,
                    max_time: DEFAULT_MAX_TIME,
                    time_slice: DEFAULT_TIME_SLICE,
                    result: None,
                },
            },
        }
    }

    /// Environment the program's free identifiers resolve against
    pub fn root_env(mut self, env: Env) -> Self {
        self.state.config.root_env = env;
        self
    }

    /// Make `var` visible to the program as `name`
    pub fn add_var(mut self, name: &str, var: Var) -> Self {
        self.state
            .config
            .vars
            .push(EnvEntry::new(Ident::user(name), var));
        self
    }

    /// Modules available to `import`
    pub fn registry(mut self, registry: Arc<ModuleRegistry>) -> Self {
        self.state.config.registry = Some(registry);
        self
    }

    /// Actor system used for `spawn`, `ask` and `tell`
    pub fn actor_system(mut self, system: ActorSystem) -> Self {
        self.state.config.system = Some(system);
        self
    }

    /// Wall-clock budget for `perform`
    pub fn max_time(mut self, max_time: Duration) -> Self {
        self.state.config.max_time = max_time;
        self
    }

    /// Statements executed between budget checks
    pub fn time_slice(mut self, time_slice: usize) -> Self {
        self.state.config.time_slice = time_slice.max(1);
        self
    }

    /// Treat the program as an expression bound to the user identifier `name`
    pub fn result(mut self, name: &str) -> Self {
        self.state.config.result = Some(Ident::user(name));
        self
    }

    /// Treat the program as an expression bound to a system identifier
    pub fn expr(mut self) -> Self {
        self.state.config.result = Some(Ident::system("result", 0));
        self
    }

    /// Set the program text
    pub fn source(self, source: &str) -> Evaluator<Ready> {
        Evaluator {
            state: Ready {
                config: self.state.config,
                source: SourceText::new(source),
            },
        }
    }
}

impl Evaluator<Ready> {
    /// Parse the program
    pub fn parse(self) -> EvaluatorResult<Evaluator<Parsed>> {
        let mut parser = Parser::new(self.state.source)?;
        let node = parser.parse_program()?;
        Ok(Evaluator {
            state: Parsed {
                config: self.state.config,
                node,
            },
        })
    }
}

impl Evaluator<Parsed> {
    /// Parsed program
    pub fn node(&self) -> &Node {
        &self.state.node
    }

    /// Lower the program and check that every free identifier resolves
    pub fn generate(self) -> EvaluatorResult<Evaluator<Generated>> {
        let Parsed { config, node } = self.state;
        let lowered = Generator::new().lower_program(&node, config.result.as_ref())?;
        let env = config.env();
        let unknown: Vec<Ident> = lowered
            .stmt
            .free_idents()
            .into_iter()
            .filter(|ident| {
                !lowered.declared.contains(ident)
                    && config.result.as_ref() != Some(ident)
                    && !env.contains(ident)
            })
            .collect();
        if !unknown.is_empty() {
            return Err(EvaluatorError::UnknownIdents(unknown));
        }
        Ok(Evaluator {
            state: Generated {
                config,
                node,
                lowered,
            },
        })
    }
}

impl Evaluator<Generated> {
    /// Parsed program
    pub fn node(&self) -> &Node {
        &self.state.node
    }

    /// Kernel statement that `perform` will run
    pub fn kernel(&self) -> &Arc<Stmt> {
        &self.state.lowered.stmt
    }

    /// Identifiers declared at the program's outermost scope
    pub fn declared(&self) -> &[Ident] {
        &self.state.lowered.declared
    }

    /// Run the program to completion
    pub fn perform(self) -> EvaluatorResult<Evaluator<Performed>> {
        let Generated {
            config, lowered, ..
        } = self.state;
        let mut entries: Vec<EnvEntry> = lowered
            .declared
            .iter()
            .map(|ident| EnvEntry::new(ident.clone(), Var::new()))
            .collect();
        let result = config.result.as_ref().map(|ident| {
            let var = Var::new();
            entries.push(EnvEntry::new(ident.clone(), var.clone()));
            var
        });
        let env = config.env().extend(entries);

        let mut machine = Machine::new(config.registry());
        machine.push(lowered.stmt, env.clone());
        let started = Instant::now();
        match &config.system {
            Some(system) => {
                let mut host = SystemHost::new(system.clone());
                run_machine(&mut machine, &mut host, &config, true)?;
            }
            None => run_machine(&mut machine, &mut DetachedHost, &config, false)?,
        }
        tracing::debug!(elapsed = ?started.elapsed(), "evaluation finished");
        Ok(Evaluator {
            state: Performed {
                env,
                result,
                elapsed: started.elapsed(),
            },
        })
    }
}

impl Evaluator<Performed> {
    /// Environment the program ran in, including its outermost declarations
    pub fn env(&self) -> &Env {
        &self.state.env
    }

    /// Variable bound to `name` at the outermost scope
    pub fn var_at_name(&self, name: &str) -> Option<&Var> {
        self.state.env.get_by_name(name)
    }

    /// Value bound to `name`, if bound
    pub fn value_of(&self, name: &str) -> Option<Value> {
        self.var_at_name(name).and_then(Var::value)
    }

    /// Value of the program when evaluated as an expression
    pub fn result(&self) -> Option<Value> {
        self.state.result.as_ref().and_then(Var::value)
    }

    /// Wall-clock time spent in `perform`
    pub fn elapsed(&self) -> Duration {
        self.state.elapsed
    }
}

/// Run `machine` until its stack empties
///
/// With `external` set, a wait blocks until some other thread binds the
/// barrier; otherwise a wait can never end and is reported as `Suspended`.
fn run_machine(
    machine: &mut Machine,
    host: &mut dyn MachineHost,
    config: &Config,
    external: bool,
) -> EvaluatorResult<()> {
    let deadline = Instant::now() + config.max_time;
    let budget_ms = config.max_time.as_millis() as u64;
    loop {
        match machine.compute(host, config.time_slice) {
            ComputeEnd::End => return Ok(()),
            ComputeEnd::Preempt => {}
            ComputeEnd::Wait(barrier) => {
                if !external {
                    return Err(EvaluatorError::Suspended);
                }
                if !wait_for_binding(&barrier, deadline) {
                    return Err(EvaluatorError::MaxTimeExceeded(budget_ms));
                }
            }
            ComputeEnd::Halt(halt) => return Err(EvaluatorError::Halted { error: halt.error }),
        }
        if Instant::now() >= deadline {
            return Err(EvaluatorError::MaxTimeExceeded(budget_ms));
        }
    }
}

/// Evaluate `source` as an expression and return its value
pub fn evaluate_expr(source: &str) -> EvaluatorResult<Value> {
    let performed = Evaluator::builder()
        .expr()
        .source(source)
        .parse()?
        .generate()?
        .perform()?;
    match performed.state.result.map(|var| var.resolve()) {
        Some(ValueOrVar::Value(value)) => Ok(value),
        _ => Err(EvaluatorError::Suspended),
    }
}

/// Block until `var` is bound or `deadline` passes; false on timeout
fn wait_for_binding(var: &Var, deadline: Instant) -> bool {
    let signal = Arc::new((Mutex::new(false), Condvar::new()));
    let notify = signal.clone();
    var.on_bind(Box::new(move |_| {
        let (bound, cond) = &*notify;
        *bound.lock() = true;
        cond.notify_all();
    }));
    let (bound, cond) = &*signal;
    let mut guard = bound.lock();
    while !*guard {
        if cond.wait_until(&mut guard, deadline).timed_out() {
            return *guard;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> EvaluatorResult<Value> {
        evaluate_expr(source)
    }

    #[test]
    fn test_arithmetic_expression() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Int32(7));
    }

    #[test]
    fn test_record_selection() {
        assert_eq!(eval("var x = {a: 1, b: 2} x.a").unwrap(), Value::Int32(1));
    }

    #[test]
    fn test_unknown_identifiers_reported() {
        let err = eval("y + 1").unwrap_err();
        let EvaluatorError::UnknownIdents(idents) = err else {
            panic!("expected unknown identifiers, got {err}");
        };
        assert_eq!(idents, vec![Ident::user("y")]);
    }

    #[test]
    fn test_added_vars_are_visible() {
        let x = Var::bound(Value::Int32(41));
        let performed = Evaluator::builder()
            .add_var("x", x)
            .result("answer")
            .source("x + 1")
            .parse()
            .unwrap()
            .generate()
            .unwrap()
            .perform()
            .unwrap();
        assert_eq!(performed.result(), Some(Value::Int32(42)));
        assert_eq!(performed.value_of("answer"), Some(Value::Int32(42)));
    }

    #[test]
    fn test_statement_program_exposes_declarations() {
        let performed = Evaluator::builder()
            .source("var a = 1\nvar b = a + 1")
            .parse()
            .unwrap()
            .generate()
            .unwrap()
            .perform()
            .unwrap();
        assert_eq!(performed.value_of("b"), Some(Value::Int32(2)));
        assert!(performed.result().is_none());
    }

    #[test]
    fn test_waiting_without_system_is_suspended() {
        let pending = Var::new();
        let err = Evaluator::builder()
            .add_var("p", pending)
            .expr()
            .source("p + 1")
            .parse()
            .unwrap()
            .generate()
            .unwrap()
            .perform()
            .unwrap_err();
        assert!(matches!(err, EvaluatorError::Suspended));
    }

    #[test]
    fn test_uncaught_throw_halts() {
        let err = eval("throw 'boom'").unwrap_err();
        assert!(matches!(err, EvaluatorError::Halted { error } if error == Value::str("boom")));
    }

    #[test]
    fn test_endless_loop_exceeds_budget() {
        let err = Evaluator::builder()
            .max_time(Duration::from_millis(50))
            .time_slice(1_000)
            .source("while true do skip end")
            .parse()
            .unwrap()
            .generate()
            .unwrap()
            .perform()
            .unwrap_err();
        assert!(matches!(err, EvaluatorError::MaxTimeExceeded(50)));
    }
}
