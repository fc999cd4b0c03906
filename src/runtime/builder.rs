//! Actor builder
//!
//! Turns actor source text into a running actor. Like the evaluator, the
//! builder is a type-state chain where each stage only offers the calls that
//! are legal next:
//!
//! ```text
//! ActorBuilder::new(system)      Init
//!     .source("actor ...")       Ready
//!     .parse()?                  Parsed
//!     .rewrite()?                Rewritten
//!     .generate()?               Generated
//!     .construct()?              Constructed
//!     .configure(args)?          Configured
//!     .spawn()                   Spawned
//! ```
//!
//! The source may contain imports and declarations; its last statement must
//! be an actor definition.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::ActorSystem;
use super::envelope::{ActorRefHandle, Address};
use super::error::{BuilderError, RuntimeResult};
use crate::interpreter::ast::{Node, NodeKind};
use crate::interpreter::error::EvaluatorError;
use crate::interpreter::generator::{Generator, Lowered};
use crate::interpreter::parser::Parser;
use crate::kernel::env::{Env, EnvEntry};
use crate::kernel::ident::Ident;
use crate::kernel::machine::{ComputeEnd, DetachedHost, Machine};
use crate::kernel::value::{ActorCfg, ActorCfgtr, Feature, Value, ValueOrVar};
use crate::kernel::var::Var;
use crate::util::span::SourceText;

/// Configuration stage
#[derive(Debug, Clone)]
pub struct Init {
    system: ActorSystem,
    address: Option<Address>,
}

/// Source set
#[derive(Debug, Clone)]
pub struct Ready {
    init: Init,
    source: SourceText,
}

/// Parsed source
#[derive(Debug, Clone)]
pub struct Parsed {
    init: Init,
    node: Node,
}

/// Source whose last statement is an actor expression
#[derive(Debug, Clone)]
pub struct Rewritten {
    init: Init,
    node: Node,
}

/// Lowered source
#[derive(Debug, Clone)]
pub struct Generated {
    init: Init,
    lowered: Lowered,
    result: Ident,
}

/// Configurator extracted from the evaluated source
#[derive(Debug)]
pub struct Constructed {
    init: Init,
    cfgtr: Arc<ActorCfgtr>,
}

/// Configurator applied to its construction arguments
#[derive(Debug)]
pub struct Configured {
    init: Init,
    cfg: Arc<ActorCfg>,
}

/// Running actor
#[derive(Debug)]
pub struct Spawned {
    actor: ActorRefHandle,
}

/// Actor builder in stage `S`
#[derive(Debug)]
pub struct ActorBuilder<S> {
    state: S,
}

impl ActorBuilder<Init> {
    /// Builder for an actor in `system`
    pub fn new(system: &ActorSystem) -> Self {
        Self {
            state: Init {
                system: system.clone(),
                address: None,
            },
        }
    }

    /// Address to spawn at; a unique one is chosen otherwise
    pub fn address(mut self, address: Address) -> Self {
        self.state.address = Some(address);
        self
    }

    /// Actor source text
    pub fn source(self, source: &str) -> ActorBuilder<Ready> {
        ActorBuilder {
            state: Ready {
                init: self.state,
                source: SourceText::new(source),
            },
        }
    }
}

impl ActorBuilder<Ready> {
    /// Parse the source
    pub fn parse(self) -> RuntimeResult<ActorBuilder<Parsed>> {
        let node = Parser::new(self.state.source)
            .and_then(|mut parser| parser.parse_program())
            .map_err(|err| BuilderError::Evaluation(err.into()))?;
        Ok(ActorBuilder {
            state: Parsed {
                init: self.state.init,
                node,
            },
        })
    }
}

impl ActorBuilder<Parsed> {
    /// Parsed source
    pub fn node(&self) -> &Node {
        &self.state.node
    }

    /// Make the trailing actor definition the value of the program
    ///
    /// A named definition stays a statement and its name is appended as the
    /// final expression, so the handlers can still refer to the name.
    pub fn rewrite(self) -> RuntimeResult<ActorBuilder<Rewritten>> {
        let Parsed { init, node } = self.state;
        let node = rewrite_trailing_actor(node)?;
        Ok(ActorBuilder {
            state: Rewritten { init, node },
        })
    }
}

impl ActorBuilder<Rewritten> {
    /// Rewritten source
    pub fn node(&self) -> &Node {
        &self.state.node
    }

    /// Lower the source
    pub fn generate(self) -> RuntimeResult<ActorBuilder<Generated>> {
        let Rewritten { init, node } = self.state;
        let result = Ident::system("actor", 0);
        let lowered = Generator::new()
            .lower_program(&node, Some(&result))
            .map_err(|err| BuilderError::Evaluation(err.into()))?;
        let unknown: Vec<Ident> = lowered
            .stmt
            .free_idents()
            .into_iter()
            .filter(|ident| *ident != result && !lowered.declared.contains(ident))
            .collect();
        if !unknown.is_empty() {
            return Err(BuilderError::Evaluation(EvaluatorError::UnknownIdents(unknown)).into());
        }
        Ok(ActorBuilder {
            state: Generated {
                init,
                lowered,
                result,
            },
        })
    }
}

impl ActorBuilder<Generated> {
    /// Run the source and extract the actor configurator
    pub fn construct(self) -> RuntimeResult<ActorBuilder<Constructed>> {
        let Generated {
            init,
            lowered,
            result,
        } = self.state;
        let result_var = Var::new();
        let mut entries: Vec<EnvEntry> = lowered
            .declared
            .iter()
            .map(|ident| EnvEntry::new(ident.clone(), Var::new()))
            .collect();
        entries.push(EnvEntry::new(result, result_var.clone()));

        let config = init.system.config();
        let mut machine = Machine::new(init.system.registry().clone());
        machine.push(lowered.stmt, Env::new(entries));
        let budget = Duration::from_millis(config.max_evaluation_time_ms);
        let deadline = Instant::now() + budget;
        loop {
            match machine.compute(&mut DetachedHost, config.time_slice) {
                ComputeEnd::End => break,
                ComputeEnd::Preempt => {}
                ComputeEnd::Wait(_) => {
                    return Err(BuilderError::Evaluation(EvaluatorError::Suspended).into());
                }
                ComputeEnd::Halt(halt) => {
                    let error = EvaluatorError::Halted { error: halt.error };
                    return Err(BuilderError::Evaluation(error).into());
                }
            }
            if Instant::now() >= deadline {
                let error = EvaluatorError::MaxTimeExceeded(config.max_evaluation_time_ms);
                return Err(BuilderError::Evaluation(error).into());
            }
        }

        let cfgtr = extract_cfgtr(&result_var)?;
        Ok(ActorBuilder {
            state: Constructed { init, cfgtr },
        })
    }
}

impl ActorBuilder<Constructed> {
    /// Number of construction arguments the actor declares
    pub fn arg_count(&self) -> usize {
        self.state.cfgtr.arg_count()
    }

    /// Apply the configurator to complete construction arguments
    pub fn configure(self, args: Vec<Value>) -> RuntimeResult<ActorBuilder<Configured>> {
        let Constructed { init, cfgtr } = self.state;
        let expected = cfgtr.arg_count();
        if args.len() != expected {
            return Err(BuilderError::ArgCount {
                expected,
                found: args.len(),
            }
            .into());
        }
        let args = args
            .into_iter()
            .enumerate()
            .map(|(index, arg)| {
                arg.check_complete()
                    .map_err(|_| BuilderError::IncompleteArgument(index))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ActorBuilder {
            state: Configured {
                init,
                cfg: Arc::new(ActorCfg {
                    ctor: cfgtr.ctor.clone(),
                    args,
                }),
            },
        })
    }
}

impl ActorBuilder<Configured> {
    /// Configuration that will be spawned
    pub fn cfg(&self) -> &Arc<ActorCfg> {
        &self.state.cfg
    }

    /// Start the actor
    pub fn spawn(self) -> ActorBuilder<Spawned> {
        let Configured { init, cfg } = self.state;
        let address = init
            .address
            .unwrap_or_else(|| init.system.unique_address());
        let actor = init.system.spawn_at(address, cfg);
        ActorBuilder {
            state: Spawned { actor },
        }
    }
}

impl ActorBuilder<Spawned> {
    /// Reference to the running actor
    pub fn actor_ref(&self) -> &ActorRefHandle {
        &self.state.actor
    }

    /// Take the reference
    pub fn into_actor_ref(self) -> ActorRefHandle {
        self.state.actor
    }
}

/// Build and spawn an actor from `source` in one go
pub fn spawn_actor(
    system: &ActorSystem,
    source: &str,
    args: Vec<Value>,
) -> RuntimeResult<ActorRefHandle> {
    Ok(ActorBuilder::new(system)
        .source(source)
        .parse()?
        .rewrite()?
        .generate()?
        .construct()?
        .configure(args)?
        .spawn()
        .into_actor_ref())
}

fn rewrite_trailing_actor(node: Node) -> Result<Node, BuilderError> {
    match node.kind {
        NodeKind::Seq(mut items) => {
            let Some(last) = items.pop() else {
                return Err(BuilderError::NotAnActor("empty source".to_string()));
            };
            items.extend(actor_as_expr(last)?);
            Ok(Node {
                kind: NodeKind::Seq(items),
                ..node
            })
        }
        _ => {
            let id = node.id;
            let span = node.span.clone();
            let items = actor_as_expr(node)?;
            match <[Node; 1]>::try_from(items) {
                Ok([only]) => Ok(only),
                Err(items) => Ok(Node {
                    id,
                    span,
                    kind: NodeKind::Seq(items),
                }),
            }
        }
    }
}

/// `actor Name ... end` becomes `actor Name ... end Name`
fn actor_as_expr(node: Node) -> Result<Vec<Node>, BuilderError> {
    match &node.kind {
        NodeKind::Actor { name: None, .. } => Ok(vec![node]),
        NodeKind::Actor {
            name: Some(name), ..
        } => {
            let reference = Node {
                id: node.id,
                span: node.span.clone(),
                kind: NodeKind::Ident(name.clone()),
            };
            Ok(vec![node, reference])
        }
        _ => Err(BuilderError::NotAnActor(node.span.text().to_string())),
    }
}

fn extract_cfgtr(result: &Var) -> Result<Arc<ActorCfgtr>, BuilderError> {
    let not_an_actor = |what: String| BuilderError::NotAnActor(what);
    let value = match result.resolve() {
        ValueOrVar::Value(value) => value,
        ValueOrVar::Var(_) => return Err(not_an_actor("source produced no value".to_string())),
    };
    let Value::Rec(rec) = &value else {
        return Err(not_an_actor(value.to_string()));
    };
    match rec.get(&Feature::str("cfg")).map(ValueOrVar::resolve) {
        Some(ValueOrVar::Value(Value::ActorCfgtr(cfgtr))) => Ok(cfgtr),
        _ => Err(not_an_actor(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ActorSystemConfig, Executor, Job};

    struct Discard;

    impl Executor for Discard {
        fn execute(&self, _job: Job) {}
    }

    fn system() -> ActorSystem {
        ActorSystem::new(ActorSystemConfig::default(), Arc::new(Discard))
    }

    fn constructed(source: &str) -> RuntimeResult<ActorBuilder<Constructed>> {
        ActorBuilder::new(&system())
            .source(source)
            .parse()?
            .rewrite()?
            .generate()?
            .construct()
    }

    #[test]
    fn test_named_actor_is_rewritten_to_expression() {
        let rewritten = ActorBuilder::new(&system())
            .source("actor Echo() in ask x in x end end")
            .parse()
            .unwrap()
            .rewrite()
            .unwrap();
        let NodeKind::Seq(items) = &rewritten.node().kind else {
            panic!("expected a sequence");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].kind, NodeKind::Ident("Echo".to_string()));
    }

    #[test]
    fn test_construct_counts_arguments() {
        let builder =
            constructed("var step = 2\nactor (a, b) in ask x in a + b + step end end").unwrap();
        assert_eq!(builder.arg_count(), 2);
        let err = builder.configure(vec![Value::Int32(1)]).unwrap_err();
        assert!(err.to_string().contains("expects 2"));
    }

    #[test]
    fn test_incomplete_argument_rejected() {
        let builder = constructed("actor (a) in tell x in skip end end").unwrap();
        let partial = Value::Rec(Arc::new(crate::kernel::value::Rec::tuple(
            None,
            vec![ValueOrVar::Var(Var::new())],
        )));
        let err = builder.configure(vec![partial]).unwrap_err();
        assert!(matches!(
            err,
            crate::runtime::RuntimeError::Builder(BuilderError::IncompleteArgument(0))
        ));
    }

    #[test]
    fn test_non_actor_source_rejected() {
        let err = ActorBuilder::new(&system())
            .source("var x = 1")
            .parse()
            .unwrap()
            .rewrite()
            .unwrap_err();
        assert!(matches!(
            err,
            crate::runtime::RuntimeError::Builder(BuilderError::NotAnActor(_))
        ));
    }
}
