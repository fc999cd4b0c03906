//! Host-side access to actors
//!
//! A [`RequestClient`] is an [`ActorRef`] that lives outside every actor: it
//! sends requests on behalf of Rust code and routes the responses either to
//! a `oneshot` channel (for [`RequestClient::ask`]) or into a dataflow
//! variable (for evaluator programs talking to a system).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;

use super::ActorSystem;
use super::envelope::{ActorRef, ActorRefHandle, Address, Envelope, Message, RequestId};
use super::error::{RuntimeError, RuntimeResult};
use crate::kernel::error::MachineResult;
use crate::kernel::machine::MachineHost;
use crate::kernel::unify::unify;
use crate::kernel::value::{ActorCfg, Closure, Value, ValueOrVar};
use crate::kernel::var::Var;

enum Reply {
    Channel(oneshot::Sender<Value>),
    Bind(ValueOrVar),
}

/// Requester for code running outside the actor system
pub struct RequestClient {
    address: Address,
    me: Weak<RequestClient>,
    pending: Mutex<HashMap<RequestId, Reply>>,
}

impl RequestClient {
    /// Client with a unique address in `system`
    pub fn new(system: &ActorSystem) -> Arc<Self> {
        let address = system.unique_address();
        Arc::new_cyclic(|me| Self {
            address,
            me: me.clone(),
            pending: Mutex::new(HashMap::new()),
        })
    }

    fn handle(&self) -> Option<ActorRefHandle> {
        self.me.upgrade().map(|me| me as ActorRefHandle)
    }

    fn request(&self, target: &ActorRefHandle, message: Value, reply: Reply) -> RuntimeResult<()> {
        let requester = self.handle().ok_or_else(|| {
            RuntimeError::ResponseDropped(format!("client {} is gone", self.address))
        })?;
        let id = RequestId::next();
        self.pending.lock().insert(id, reply);
        target.send(Envelope::request(message, requester, id));
        Ok(())
    }

    /// Send `message` as a request and wait for the response
    ///
    /// The request is sent before this returns; the future only waits.
    /// Failures inside the target come back as `Value::Failed`, not as errors.
    pub fn ask(
        &self,
        target: &ActorRefHandle,
        message: Value,
    ) -> impl Future<Output = RuntimeResult<Value>> + Send + use<> {
        let (tx, rx) = oneshot::channel();
        let sent = self.request(target, message, Reply::Channel(tx));
        let address = target.address().to_string();
        async move {
            sent?;
            rx.await.map_err(|_| RuntimeError::ResponseDropped(address))
        }
    }

    /// Send `message` as a notification
    pub fn tell(&self, target: &ActorRefHandle, message: Value) {
        target.send(Envelope::notify(message));
    }

    /// Requests still waiting for a response
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl ActorRef for RequestClient {
    fn address(&self) -> &Address {
        &self.address
    }

    fn send(&self, envelope: Envelope) {
        let (Message::Value(value), Some(id)) = (envelope.message, envelope.request_id) else {
            tracing::warn!(client = %self.address, "client ignores non-response mail");
            return;
        };
        let Some(reply) = self.pending.lock().remove(&id) else {
            tracing::warn!(client = %self.address, %id, "undeliverable response");
            return;
        };
        match reply {
            Reply::Channel(tx) => {
                if tx.send(value).is_err() {
                    tracing::debug!(client = %self.address, %id, "asker went away");
                }
            }
            Reply::Bind(target) => {
                if let Err(err) = unify(&target, &ValueOrVar::Value(value)) {
                    tracing::warn!(client = %self.address, %id, %err, "response does not unify");
                }
            }
        }
    }
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("address", &self.address.to_string())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Machine host for evaluator programs that talk to an actor system
pub struct SystemHost {
    system: ActorSystem,
    client: Arc<RequestClient>,
}

impl SystemHost {
    /// Host bound to `system`
    pub fn new(system: ActorSystem) -> Self {
        let client = RequestClient::new(&system);
        Self { system, client }
    }
}

impl MachineHost for SystemHost {
    fn self_ref(&self) -> Option<ActorRefHandle> {
        None
    }

    fn act(&mut self, _closure: Arc<Closure>, _target: Var) -> MachineResult<bool> {
        Ok(false)
    }

    fn spawn(&mut self, cfg: Arc<ActorCfg>) -> MachineResult<ActorRefHandle> {
        Ok(self.system.spawn(cfg))
    }

    fn send_request(
        &mut self,
        target: &ActorRefHandle,
        message: Value,
        response: ValueOrVar,
    ) -> MachineResult<()> {
        // The client lives as long as the host, so the upgrade cannot fail here
        if let Err(err) = self.client.request(target, message, Reply::Bind(response)) {
            tracing::error!(%err, "request not sent");
        }
        Ok(())
    }

    fn send_notify(&mut self, target: &ActorRefHandle, message: Value) -> MachineResult<()> {
        self.client.tell(target, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::envelope::Category;

    #[derive(Debug)]
    struct Echo {
        address: Address,
    }

    impl ActorRef for Echo {
        fn address(&self) -> &Address {
            &self.address
        }

        fn send(&self, envelope: Envelope) {
            if let Message::Value(value) = &envelope.message {
                assert_eq!(envelope.category(), Category::Request);
                envelope.reply(value.clone());
            }
        }
    }

    #[tokio::test]
    async fn test_ask_receives_reply() {
        let system = ActorSystem::current().unwrap();
        let client = RequestClient::new(&system);
        let echo: ActorRefHandle = Arc::new(Echo {
            address: system.address("echo"),
        });
        let answer = client.ask(&echo, Value::str("hi")).await.unwrap();
        assert_eq!(answer, Value::str("hi"));
        assert_eq!(client.pending(), 0);
    }

    #[tokio::test]
    async fn test_system_host_binds_response() {
        let system = ActorSystem::current().unwrap();
        let mut host = SystemHost::new(system.clone());
        let echo: ActorRefHandle = Arc::new(Echo {
            address: system.address("echo"),
        });
        let result = Var::new();
        host.send_request(&echo, Value::Int32(3), ValueOrVar::Var(result.clone()))
            .unwrap();
        assert_eq!(result.value(), Some(Value::Int32(3)));
    }
}
