//! Actor runtime
//!
//! An [`ActorSystem`] is the explicit context every actor and host-side
//! client is created in: it names the system, carries its configuration,
//! shares the module registry, and owns the executor dispatcher jobs run on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub mod actor;
pub mod builder;
pub mod client;
pub mod envelope;
pub mod error;
pub mod mailbox;

pub use actor::{ActorState, LocalActor};
pub use builder::ActorBuilder;
pub use client::RequestClient;
pub use envelope::{ActorRef, ActorRefHandle, Address, ControlMessage, Envelope, Message, RequestId};
pub use error::{BuilderError, RuntimeError, RuntimeResult};

use crate::kernel::machine::DEFAULT_TIME_SLICE;
use crate::kernel::registry::ModuleRegistry;
use crate::kernel::value::ActorCfg;
use actor::Shipped;
use envelope::Configure;

/// Configuration for an actor system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorSystemConfig {
    /// System name used in every actor address
    pub name: String,

    /// Statements per dispatcher activation before an actor yields
    pub time_slice: usize,

    /// Budget for host-side evaluations run against this system
    pub max_evaluation_time_ms: u64,
}

impl Default for ActorSystemConfig {
    fn default() -> Self {
        Self {
            name: "torq".to_string(),
            time_slice: DEFAULT_TIME_SLICE,
            max_evaluation_time_ms: 30_000,
        }
    }
}

impl ActorSystemConfig {
    /// Read a configuration file
    pub fn load(path: &Path) -> RuntimeResult<Self> {
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)?;
        if config.time_slice == 0 {
            return Err(RuntimeError::Config(format!(
                "{}: time_slice must be positive",
                path.display()
            )));
        }
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> RuntimeResult<()> {
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

/// Unit of work submitted to an executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs dispatcher activations
pub trait Executor: Send + Sync {
    /// Run `job` at some point, on some thread
    fn execute(&self, job: Job);
}

/// Executor backed by a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    /// Executor spawning onto `handle`
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Executor for the runtime the caller is running in
    pub fn current() -> RuntimeResult<Self> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|err| RuntimeError::Executor(err.to_string()))
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, job: Job) {
        self.handle.spawn(async move { job() });
    }
}

struct SystemInner {
    config: ActorSystemConfig,
    executor: Arc<dyn Executor>,
    registry: Arc<ModuleRegistry>,
}

/// Shared context for actors and clients
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

impl ActorSystem {
    /// System with the built-in module registry
    pub fn new(config: ActorSystemConfig, executor: Arc<dyn Executor>) -> Self {
        Self::with_registry(config, executor, Arc::new(ModuleRegistry::with_system()))
    }

    /// System with a caller-supplied module registry
    pub fn with_registry(
        config: ActorSystemConfig,
        executor: Arc<dyn Executor>,
        registry: Arc<ModuleRegistry>,
    ) -> Self {
        tracing::debug!(system = %config.name, "actor system created");
        Self {
            inner: Arc::new(SystemInner {
                config,
                executor,
                registry,
            }),
        }
    }

    /// System on the current tokio runtime with default configuration
    pub fn current() -> RuntimeResult<Self> {
        Ok(Self::new(
            ActorSystemConfig::default(),
            Arc::new(TokioExecutor::current()?),
        ))
    }

    /// System name
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// System configuration
    pub fn config(&self) -> &ActorSystemConfig {
        &self.inner.config
    }

    /// Module registry shared by every machine in the system
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.inner.registry
    }

    /// Executor dispatcher jobs run on
    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.inner.executor
    }

    /// Address of `name` in this system
    pub fn address(&self, name: &str) -> Address {
        Address::new(self.name(), name)
    }

    /// Fresh unique address in this system
    pub fn unique_address(&self) -> Address {
        Address::unique(self.name())
    }

    /// Create an unconfigured actor at `address`
    pub fn create_actor(&self, address: Address) -> Arc<LocalActor> {
        tracing::debug!(actor = %address, "actor created");
        LocalActor::new(self.clone(), address)
    }

    /// Create an actor at `address` and send it its configuration
    pub fn spawn_at(&self, address: Address, cfg: Arc<ActorCfg>) -> ActorRefHandle {
        let actor: ActorRefHandle = self.create_actor(address);
        let shipped = Shipped::new(&cfg.ctor);
        let cfg = Arc::new(ActorCfg {
            ctor: shipped.closure.clone(),
            args: cfg.args.clone(),
        });
        let configure = Configure {
            cfg,
            placeholders: shipped.placeholders.clone(),
        };
        actor.send(Envelope::control(ControlMessage::Configure(configure)));
        shipped.arm(&actor);
        tracing::info!(actor = %actor.address(), "actor spawned");
        actor
    }

    /// Spawn at a fresh unique address
    pub fn spawn(&self, cfg: Arc<ActorCfg>) -> ActorRefHandle {
        self.spawn_at(self.unique_address(), cfg)
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("config", &self.inner.config)
            .finish()
    }
}
