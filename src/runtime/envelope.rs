//! Actor references, addresses, and message envelopes
//!
//! An [`Envelope`] is the only thing that travels between actors. Its
//! category is derived from its fields:
//!
//! | message   | requester | request id | category        |
//! |-----------|-----------|------------|-----------------|
//! | control   | none      | none       | control notify  |
//! | control   | some      | some       | control request |
//! | value     | none      | none       | notify          |
//! | value     | some      | some       | request         |
//! | value     | none      | some       | response        |

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::kernel::value::{ActorCfg, Closure, Value};
use crate::kernel::var::Var;

/// Anything that accepts envelopes
pub trait ActorRef: Send + Sync + fmt::Debug {
    /// Address of the receiver
    fn address(&self) -> &Address;

    /// Deliver an envelope; never blocks and never fails
    fn send(&self, envelope: Envelope);
}

/// Shared handle to an actor reference
pub type ActorRefHandle = Arc<dyn ActorRef>;

/// Actor address, displayed as `torq://system/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    system: Arc<str>,
    name: Arc<str>,
}

impl Address {
    /// Address of `name` within `system`
    pub fn new(system: &str, name: &str) -> Self {
        Self {
            system: system.into(),
            name: name.into(),
        }
    }

    /// Address with a random unique name within `system`
    pub fn unique(system: &str) -> Self {
        Self::new(system, &uuid::Uuid::new_v4().to_string())
    }

    /// Unique address nested under this one
    pub fn child(&self) -> Self {
        let name = format!("{}/{}", self.name, uuid::Uuid::new_v4());
        Self::new(&self.system, &name)
    }

    /// System name
    pub fn system(&self) -> &str {
        &self.system
    }

    /// Actor name within the system
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "torq://{}/{}", self.system, self.name)
    }
}

/// Correlates a response with its request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Process-unique request id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        RequestId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Request to run a computation in a child actor
#[derive(Debug, Clone)]
pub struct ActRequest {
    /// One-parameter procedure binding the result
    pub closure: Arc<Closure>,
    /// Placeholders in the closure's environment, bound later by `SyncVar`
    pub placeholders: Vec<Var>,
}

/// Configuration delivered to a freshly created actor
#[derive(Debug, Clone)]
pub struct Configure {
    /// Handler constructor and its arguments
    pub cfg: Arc<ActorCfg>,
    /// Placeholders in the constructor's environment, bound later by `SyncVar`
    pub placeholders: Vec<Var>,
}

/// Lifecycle and bookkeeping messages; they bypass the compiled handlers
#[derive(Debug, Clone)]
pub enum ControlMessage {
    /// Run the handler constructor
    Configure(Configure),
    /// Run a child computation and respond with its result
    Act(ActRequest),
    /// Finish after already-queued work
    Stop,
    /// Continue a preempted computation
    Resume,
    /// Bind a placeholder variable to the completed parent value
    SyncVar {
        /// Placeholder variable id
        id: u64,
        /// Complete value
        value: Value,
    },
}

/// Envelope payload
#[derive(Debug, Clone)]
pub enum Message {
    /// Application value
    Value(Value),
    /// Control message
    Control(ControlMessage),
}

/// Envelope category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Control message without a reply
    ControlNotify,
    /// Control message expecting a reply
    ControlRequest,
    /// Value without a reply
    Notify,
    /// Value expecting a reply
    Request,
    /// Reply to an earlier request
    Response,
}

/// Message plus routing information
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Payload
    pub message: Message,
    /// Who to answer, for requests
    pub requester: Option<ActorRefHandle>,
    /// Correlation id, for requests and responses
    pub request_id: Option<RequestId>,
}

impl Envelope {
    /// Notify carrying `value`
    pub fn notify(value: Value) -> Self {
        Self {
            message: Message::Value(value),
            requester: None,
            request_id: None,
        }
    }

    /// Request carrying `value`
    pub fn request(value: Value, requester: ActorRefHandle, id: RequestId) -> Self {
        Self {
            message: Message::Value(value),
            requester: Some(requester),
            request_id: Some(id),
        }
    }

    /// Response carrying `value`
    pub fn response(value: Value, id: RequestId) -> Self {
        Self {
            message: Message::Value(value),
            requester: None,
            request_id: Some(id),
        }
    }

    /// Control notify
    pub fn control(message: ControlMessage) -> Self {
        Self {
            message: Message::Control(message),
            requester: None,
            request_id: None,
        }
    }

    /// Control request
    pub fn control_request(
        message: ControlMessage,
        requester: ActorRefHandle,
        id: RequestId,
    ) -> Self {
        Self {
            message: Message::Control(message),
            requester: Some(requester),
            request_id: Some(id),
        }
    }

    /// Whether the payload is a control message
    pub fn is_control(&self) -> bool {
        matches!(self.message, Message::Control(_))
    }

    /// Derived category
    pub fn category(&self) -> Category {
        match (self.is_control(), &self.requester, &self.request_id) {
            (true, Some(_), _) => Category::ControlRequest,
            (true, None, _) => Category::ControlNotify,
            (false, Some(_), _) => Category::Request,
            (false, None, Some(_)) => Category::Response,
            (false, None, None) => Category::Notify,
        }
    }

    /// Reply to the requester, if any
    pub fn reply(&self, value: Value) -> bool {
        match (&self.requester, self.request_id) {
            (Some(requester), Some(id)) => {
                requester.send(Envelope::response(value, id));
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug)]
    struct Sink {
        address: Address,
        received: Mutex<Vec<Envelope>>,
    }

    impl ActorRef for Sink {
        fn address(&self) -> &Address {
            &self.address
        }

        fn send(&self, envelope: Envelope) {
            self.received.lock().push(envelope);
        }
    }

    fn sink() -> Arc<Sink> {
        Arc::new(Sink {
            address: Address::new("test", "sink"),
            received: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_address_display() {
        assert_eq!(Address::new("torq", "counter").to_string(), "torq://torq/counter");
        let child = Address::new("torq", "parent").child();
        assert!(child.name().starts_with("parent/"));
        assert_eq!(child.system(), "torq");
    }

    #[test]
    fn test_categories() {
        let requester: ActorRefHandle = sink();
        let id = RequestId::next();
        assert_eq!(Envelope::notify(Value::Null).category(), Category::Notify);
        assert_eq!(
            Envelope::request(Value::Null, requester.clone(), id).category(),
            Category::Request
        );
        assert_eq!(Envelope::response(Value::Null, id).category(), Category::Response);
        assert_eq!(
            Envelope::control(ControlMessage::Stop).category(),
            Category::ControlNotify
        );
        assert_eq!(
            Envelope::control_request(ControlMessage::Resume, requester, id).category(),
            Category::ControlRequest
        );
    }

    #[test]
    fn test_reply_routes_to_requester() {
        let target = sink();
        let id = RequestId::next();
        let request = Envelope::request(Value::Int32(1), target.clone(), id);
        assert!(request.reply(Value::Int32(2)));
        let received = target.received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].request_id, Some(id));
        assert_eq!(received[0].category(), Category::Response);
        assert!(!Envelope::notify(Value::Null).reply(Value::Null));
    }
}
