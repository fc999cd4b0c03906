//! Local actors
//!
//! A [`LocalActor`] owns one kernel machine and one mailbox. Sends only
//! touch the mailbox and the lifecycle state under a short lock; the
//! dispatcher runs on the system executor and holds the machine lock while
//! it computes, so an actor never runs concurrently with itself.
//!
//! Lifecycle:
//!
//! ```text
//! Waiting -> Scheduled -> Active -> Waiting | Scheduled | Successful | Failed
//! ```
//!
//! While a computation is in progress (preempted, blocked on a barrier, or
//! holding an incomplete result) the actor is *busy* and only takes control
//! messages and responses.
//!
//! A `Stop` closes the actor to new requests and notifies as soon as it is
//! sent. Work queued before it still runs; the actor then finishes as
//! `Successful`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use super::ActorSystem;
use super::envelope::{
    ActRequest, ActorRef, ActorRefHandle, Address, Category, Configure, ControlMessage, Envelope,
    Message, RequestId,
};
use super::mailbox::Mailbox;
use crate::kernel::env::{Env, EnvEntry};
use crate::kernel::error::MachineResult;
use crate::kernel::machine::{ComputeEnd, Halt, Machine, MachineHost};
use crate::kernel::stmt::{CompleteOrIdent, Stmt, StmtKind};
use crate::kernel::unify::unify;
use crate::kernel::value::{ActorCfg, Closure, FailedValue, Feature, Value, ValueOrVar};
use crate::kernel::var::Var;
use crate::util::span::Span;

/// Actor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Idle with nothing selectable
    Waiting,
    /// Queued on the executor
    Scheduled,
    /// Dispatcher running
    Active,
    /// Stopped normally; terminal
    Successful,
    /// Halted on an uncaught error; terminal
    Failed,
}

impl ActorState {
    /// Whether the actor accepts no more work
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActorState::Successful | ActorState::Failed)
    }
}

struct Shared {
    state: ActorState,
    mailbox: Mailbox,
    busy: bool,
    failure: Option<Value>,
    /// A `Stop` has arrived; later requests and notifies are refused
    closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Configure,
    Handle,
    Act,
}

enum Activity {
    Idle,
    Running {
        purpose: Purpose,
        result: Option<Var>,
        reply: Option<(ActorRefHandle, RequestId)>,
    },
}

/// State the machine host needs while computing
#[derive(Default)]
struct Session {
    pending: HashMap<RequestId, ValueOrVar>,
    placeholders: HashMap<u64, Var>,
}

struct Core {
    machine: Machine,
    handlers: Option<(Value, Value)>,
    activity: Activity,
    stopping: bool,
    session: Session,
}

enum Outcome {
    Continue { busy: bool, stopping: bool },
    Failed(Value),
}

/// Actor running on the local executor
pub struct LocalActor {
    address: Address,
    system: ActorSystem,
    me: Weak<LocalActor>,
    shared: Mutex<Shared>,
    core: Mutex<Core>,
}

impl LocalActor {
    pub(crate) fn new(system: ActorSystem, address: Address) -> Arc<Self> {
        let machine = Machine::new(system.registry().clone());
        Arc::new_cyclic(|me| Self {
            address,
            system,
            me: me.clone(),
            shared: Mutex::new(Shared {
                state: ActorState::Waiting,
                mailbox: Mailbox::new(),
                busy: false,
                failure: None,
                closed: false,
            }),
            core: Mutex::new(Core {
                machine,
                handlers: None,
                activity: Activity::Idle,
                stopping: false,
                session: Session::default(),
            }),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> ActorState {
        self.shared.lock().state
    }

    /// Failure value, once the actor has failed
    pub fn failure(&self) -> Option<Value> {
        self.shared.lock().failure.clone()
    }

    /// Ask the actor to stop once already-queued work is done
    pub fn stop(&self) {
        self.send(Envelope::control(ControlMessage::Stop));
    }

    fn schedule(&self) {
        if let Some(actor) = self.me.upgrade() {
            self.system
                .executor()
                .execute(Box::new(move || actor.run()));
        }
    }

    /// One dispatcher activation: select a batch, process it, settle state
    fn run(self: Arc<Self>) {
        let batch = {
            let mut shared = self.shared.lock();
            if shared.state.is_terminal() {
                return;
            }
            shared.state = ActorState::Active;
            let busy = shared.busy;
            let Some(first) = shared.mailbox.remove_selectable(busy) else {
                shared.state = ActorState::Waiting;
                return;
            };
            let recovering = busy && first.category() == Category::Response;
            let mut batch = vec![first];
            if recovering {
                batch.extend(shared.mailbox.drain_responses());
            }
            batch
        };

        let outcome = {
            let mut core = self.core.lock();
            self.process(&mut core, batch)
        };

        let (leftover, state, failure) = {
            let mut shared = self.shared.lock();
            match outcome {
                Outcome::Continue { busy, stopping } => {
                    shared.busy = busy;
                    if stopping && !busy && shared.mailbox.is_empty() {
                        shared.state = ActorState::Successful;
                        tracing::debug!(actor = %self.address, "actor stopped");
                    } else if shared.mailbox.has_selectable(busy) {
                        shared.state = ActorState::Scheduled;
                    } else {
                        shared.state = ActorState::Waiting;
                    }
                }
                Outcome::Failed(failure) => {
                    shared.state = ActorState::Failed;
                    shared.failure = Some(failure);
                }
            }
            let leftover = if shared.state.is_terminal() {
                shared.mailbox.drain_all()
            } else {
                Vec::new()
            };
            (leftover, shared.state, shared.failure.clone())
        };

        if state == ActorState::Scheduled {
            self.schedule();
        }
        for envelope in leftover {
            self.reject(envelope, state, failure.as_ref());
        }
    }

    fn process(self: &Arc<Self>, core: &mut Core, batch: Vec<Envelope>) -> Outcome {
        for envelope in batch {
            self.accept(core, envelope);
        }
        match self.advance(core) {
            Ok(busy) => Outcome::Continue {
                busy,
                stopping: core.stopping,
            },
            Err(failure) => Outcome::Failed(failure),
        }
    }

    fn accept(&self, core: &mut Core, envelope: Envelope) {
        let category = envelope.category();
        let Envelope {
            message,
            requester,
            request_id,
        } = envelope;
        let reply = requester.zip(request_id);
        match message {
            Message::Control(control) => self.control(core, control, reply),
            Message::Value(value) => match (category, request_id) {
                (Category::Response, Some(id)) => self.bind_response(core, id, value),
                _ => self.dispatch(core, value, reply),
            },
        }
    }

    fn control(
        &self,
        core: &mut Core,
        control: ControlMessage,
        reply: Option<(ActorRefHandle, RequestId)>,
    ) {
        match control {
            ControlMessage::Configure(Configure { cfg, placeholders }) => {
                tracing::debug!(actor = %self.address, "configuring actor");
                register(&mut core.session, placeholders);
                let handlers = Var::new();
                let mut args: Vec<ValueOrVar> =
                    cfg.args.iter().cloned().map(ValueOrVar::Value).collect();
                args.push(ValueOrVar::Var(handlers.clone()));
                let span = cfg.ctor.def.span.clone();
                core.machine
                    .push_apply(Value::Closure(cfg.ctor.clone()), args, span);
                core.activity = Activity::Running {
                    purpose: Purpose::Configure,
                    result: Some(handlers),
                    reply,
                };
            }
            ControlMessage::Act(ActRequest {
                closure,
                placeholders,
            }) => {
                register(&mut core.session, placeholders);
                let result = Var::new();
                let span = closure.def.span.clone();
                core.machine.push_apply(
                    Value::Closure(closure),
                    vec![ValueOrVar::Var(result.clone())],
                    span,
                );
                core.activity = Activity::Running {
                    purpose: Purpose::Act,
                    result: Some(result),
                    reply,
                };
            }
            ControlMessage::Stop => core.stopping = true,
            ControlMessage::Resume => {}
            ControlMessage::SyncVar { id, value } => {
                match core.session.placeholders.remove(&id) {
                    Some(var) => {
                        if let Err(err) = var.bind_to_value(value) {
                            tracing::warn!(
                                actor = %self.address,
                                %err,
                                "placeholder already bound"
                            );
                        }
                    }
                    None => {
                        tracing::warn!(actor = %self.address, id, "sync for unknown placeholder")
                    }
                }
            }
        }
    }

    fn bind_response(&self, core: &mut Core, id: RequestId, value: Value) {
        let Some(target) = core.session.pending.remove(&id) else {
            tracing::warn!(actor = %self.address, %id, "undeliverable response");
            return;
        };
        if let Err(err) = unify(&target, &ValueOrVar::Value(value)) {
            // Raise the mismatch inside the running computation
            let throw = Stmt::arc(
                StmtKind::Throw {
                    error: CompleteOrIdent::Value(err.to_value()),
                },
                Span::none(),
            );
            core.machine.push(throw, Env::empty());
        }
    }

    fn dispatch(
        &self,
        core: &mut Core,
        message: Value,
        reply: Option<(ActorRefHandle, RequestId)>,
    ) {
        let Some((ask, tell)) = core.handlers.clone() else {
            let error = Value::error(
                "ActorNotConfiguredError",
                format!("actor {} has no handlers", self.address),
                vec![],
            );
            if let Some((requester, id)) = reply {
                requester.send(Envelope::response(self.failed(error), id));
            }
            return;
        };
        let span = Span::none();
        match reply {
            Some(reply) => {
                let result = Var::new();
                core.machine.push_apply(
                    ask,
                    vec![ValueOrVar::Value(message), ValueOrVar::Var(result.clone())],
                    span,
                );
                core.activity = Activity::Running {
                    purpose: Purpose::Handle,
                    result: Some(result),
                    reply: Some(reply),
                };
            }
            None => {
                core.machine
                    .push_apply(tell, vec![ValueOrVar::Value(message)], span);
                core.activity = Activity::Running {
                    purpose: Purpose::Handle,
                    result: None,
                    reply: None,
                };
            }
        }
    }

    /// Compute until the machine stops making progress; `Ok(busy)` or the
    /// failure value
    fn advance(self: &Arc<Self>, core: &mut Core) -> Result<bool, Value> {
        let time_slice = self.system.config().time_slice;
        loop {
            if !core.machine.is_idle() {
                let mut host = ActorHost {
                    actor: self,
                    session: &mut core.session,
                };
                match core.machine.compute(&mut host, time_slice) {
                    ComputeEnd::End => {}
                    ComputeEnd::Preempt => {
                        self.send(Envelope::control(ControlMessage::Resume));
                        return Ok(true);
                    }
                    ComputeEnd::Wait(_) => return Ok(true),
                    ComputeEnd::Halt(halt) => return Err(self.fail(core, halt)),
                }
                continue;
            }
            let Activity::Running {
                purpose,
                result,
                reply,
            } = std::mem::replace(&mut core.activity, Activity::Idle)
            else {
                return Ok(false);
            };
            let value = match &result {
                None => None,
                Some(var) => match var.resolve() {
                    ValueOrVar::Value(value) => match value.check_complete() {
                        Ok(value) => Some(value),
                        Err(_) => {
                            core.activity = Activity::Running {
                                purpose,
                                result,
                                reply,
                            };
                            return Ok(true);
                        }
                    },
                    ValueOrVar::Var(_) => {
                        core.activity = Activity::Running {
                            purpose,
                            result,
                            reply,
                        };
                        return Ok(true);
                    }
                },
            };
            self.complete(core, purpose, value, reply);
        }
    }

    fn complete(
        &self,
        core: &mut Core,
        purpose: Purpose,
        value: Option<Value>,
        reply: Option<(ActorRefHandle, RequestId)>,
    ) {
        match purpose {
            Purpose::Configure => {
                core.handlers = value.as_ref().and_then(handler_pair);
                if core.handlers.is_some() {
                    tracing::info!(actor = %self.address, "actor configured");
                } else {
                    tracing::error!(actor = %self.address, "constructor produced no handlers");
                }
            }
            Purpose::Handle => {}
            Purpose::Act => core.stopping = true,
        }
        if let (Some(value), Some((requester, id))) = (value, reply) {
            requester.send(Envelope::response(value, id));
        }
    }

    fn fail(&self, core: &mut Core, halt: Halt) -> Value {
        tracing::error!(actor = %self.address, error = %halt.error, "actor failed");
        let failure = Value::Failed(Arc::new(halt.to_failed_value(&self.address.to_string())));
        if let Activity::Running {
            reply: Some((requester, id)),
            ..
        } = std::mem::replace(&mut core.activity, Activity::Idle)
        {
            requester.send(Envelope::response(failure.clone(), id));
        }
        failure
    }

    fn failed(&self, error: Value) -> Value {
        Value::Failed(Arc::new(FailedValue {
            address: self.address.to_string(),
            error,
            stack: Vec::new(),
            parent: None,
            native_cause: None,
        }))
    }

    /// Answer mail that reached a finished actor
    fn reject(&self, envelope: Envelope, state: ActorState, failure: Option<&Value>) {
        match envelope.category() {
            Category::Request | Category::ControlRequest => {
                let answer = match (state, failure) {
                    (ActorState::Failed, Some(failure)) => failure.clone(),
                    _ => self.failed(Value::error(
                        "ActorStoppedError",
                        format!("actor {} has stopped", self.address),
                        vec![],
                    )),
                };
                envelope.reply(answer);
            }
            Category::Response => {
                tracing::debug!(actor = %self.address, ?state, "response to finished actor dropped")
            }
            category => {
                tracing::warn!(
                    actor = %self.address,
                    ?state,
                    ?category,
                    "mail rejected by finished actor"
                )
            }
        }
    }
}

impl ActorRef for LocalActor {
    fn address(&self) -> &Address {
        &self.address
    }

    fn send(&self, envelope: Envelope) {
        let mut shared = self.shared.lock();
        if shared.state.is_terminal() {
            let state = shared.state;
            let failure = shared.failure.clone();
            drop(shared);
            self.reject(envelope, state, failure.as_ref());
            return;
        }
        match envelope.category() {
            Category::Request | Category::Notify if shared.closed => {
                drop(shared);
                self.reject(envelope, ActorState::Successful, None);
                return;
            }
            _ => {}
        }
        if matches!(envelope.message, Message::Control(ControlMessage::Stop)) {
            shared.closed = true;
        }
        shared.mailbox.add(envelope);
        let wake =
            shared.state == ActorState::Waiting && shared.mailbox.has_selectable(shared.busy);
        if wake {
            shared.state = ActorState::Scheduled;
        }
        drop(shared);
        if wake {
            self.schedule();
        }
    }
}

impl fmt::Debug for LocalActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalActor")
            .field("address", &self.address.to_string())
            .field("state", &self.state())
            .finish()
    }
}

fn register(session: &mut Session, placeholders: Vec<Var>) {
    for var in placeholders {
        session.placeholders.insert(var.id(), var);
    }
}

fn handler_pair(handlers: &Value) -> Option<(Value, Value)> {
    let Value::Rec(rec) = handlers else {
        return None;
    };
    let ask = rec.get(&Feature::Int(0))?.resolve();
    let tell = rec.get(&Feature::Int(1))?.resolve();
    match (ask, tell) {
        (ValueOrVar::Value(ask), ValueOrVar::Value(tell)) => Some((ask, tell)),
        _ => None,
    }
}

/// Closure ready to cross into another actor
pub(crate) struct Shipped {
    pub(crate) closure: Arc<Closure>,
    pub(crate) placeholders: Vec<Var>,
    forwards: Vec<(Var, u64)>,
}

impl Shipped {
    /// Copy complete captured values; stand in placeholders for the rest
    pub(crate) fn new(closure: &Closure) -> Self {
        let mut placeholders = Vec::new();
        let mut forwards = Vec::new();
        let entries = closure
            .env
            .visible_entries()
            .into_iter()
            .map(|entry| {
                let complete = match entry.var.resolve() {
                    ValueOrVar::Value(value) => value.check_complete().ok(),
                    ValueOrVar::Var(_) => None,
                };
                let var = match complete {
                    Some(value) => Var::bound(value),
                    None => {
                        let placeholder = Var::new();
                        forwards.push((entry.var.clone(), placeholder.id()));
                        placeholders.push(placeholder.clone());
                        placeholder
                    }
                };
                EnvEntry::new(entry.ident, var)
            })
            .collect();
        Self {
            closure: Arc::new(Closure {
                def: closure.def.clone(),
                env: Env::new(entries),
            }),
            placeholders,
            forwards,
        }
    }

    /// Start forwarding parent values once the shipping envelope is sent
    pub(crate) fn arm(self, child: &ActorRefHandle) {
        for (source, id) in self.forwards {
            forward_when_complete(source, id, child.clone());
        }
    }
}

/// Send `source` to the child's placeholder `id` once it is complete,
/// re-arming on each blocking variable along the way
fn forward_when_complete(source: Var, id: u64, child: ActorRefHandle) {
    let blocking = match source.resolve() {
        ValueOrVar::Value(value) => match value.check_complete() {
            Ok(value) => {
                child.send(Envelope::control(ControlMessage::SyncVar { id, value }));
                return;
            }
            Err(blocking) => blocking,
        },
        ValueOrVar::Var(unbound) => unbound,
    };
    blocking.on_bind(Box::new(move |_| forward_when_complete(source, id, child)));
}

/// Machine host for a computation running inside an actor
struct ActorHost<'a> {
    actor: &'a Arc<LocalActor>,
    session: &'a mut Session,
}

impl ActorHost<'_> {
    fn me(&self) -> ActorRefHandle {
        self.actor.clone()
    }
}

impl MachineHost for ActorHost<'_> {
    fn self_ref(&self) -> Option<ActorRefHandle> {
        Some(self.me())
    }

    fn act(&mut self, closure: Arc<Closure>, target: Var) -> MachineResult<bool> {
        let child = self.actor.system.create_actor(self.actor.address.child());
        let child_ref: ActorRefHandle = child;
        let shipped = Shipped::new(&closure);
        let id = RequestId::next();
        self.session.pending.insert(id, ValueOrVar::Var(target));
        let request = ActRequest {
            closure: shipped.closure.clone(),
            placeholders: shipped.placeholders.clone(),
        };
        child_ref.send(Envelope::control_request(
            ControlMessage::Act(request),
            self.me(),
            id,
        ));
        shipped.arm(&child_ref);
        Ok(true)
    }

    fn spawn(&mut self, cfg: Arc<ActorCfg>) -> MachineResult<ActorRefHandle> {
        Ok(self
            .actor
            .system
            .spawn_at(self.actor.address.child(), cfg))
    }

    fn send_request(
        &mut self,
        target: &ActorRefHandle,
        message: Value,
        response: ValueOrVar,
    ) -> MachineResult<()> {
        let id = RequestId::next();
        self.session.pending.insert(id, response);
        target.send(Envelope::request(message, self.me(), id));
        Ok(())
    }

    fn send_notify(&mut self, target: &ActorRefHandle, message: Value) -> MachineResult<()> {
        target.send(Envelope::notify(message));
        Ok(())
    }
}
