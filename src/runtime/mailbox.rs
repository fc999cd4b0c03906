//! Priority mailbox
//!
//! Control envelopes come out before responses, responses before requests
//! and notifies. Each class keeps arrival order.

use std::collections::VecDeque;

use super::envelope::{Category, Envelope};

/// Per-actor message queue
#[derive(Debug, Default)]
pub struct Mailbox {
    control: VecDeque<Envelope>,
    responses: VecDeque<Envelope>,
    requests: VecDeque<Envelope>,
}

impl Mailbox {
    /// Empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an envelope in its priority class
    pub fn add(&mut self, envelope: Envelope) {
        match envelope.category() {
            Category::ControlNotify | Category::ControlRequest => self.control.push_back(envelope),
            Category::Response => self.responses.push_back(envelope),
            Category::Request | Category::Notify => self.requests.push_back(envelope),
        }
    }

    /// Highest-priority envelope
    pub fn remove_next(&mut self) -> Option<Envelope> {
        self.remove_selectable(false)
    }

    /// Highest-priority envelope allowed while `busy`; a busy actor only
    /// takes control messages and responses
    pub fn remove_selectable(&mut self, busy: bool) -> Option<Envelope> {
        if let Some(envelope) = self.control.pop_front() {
            return Some(envelope);
        }
        if let Some(envelope) = self.responses.pop_front() {
            return Some(envelope);
        }
        if busy {
            return None;
        }
        self.requests.pop_front()
    }

    /// Whether `remove_selectable(busy)` would return an envelope
    pub fn has_selectable(&self, busy: bool) -> bool {
        !self.control.is_empty()
            || !self.responses.is_empty()
            || (!busy && !self.requests.is_empty())
    }

    /// Take every queued response, in arrival order
    pub fn drain_responses(&mut self) -> Vec<Envelope> {
        self.responses.drain(..).collect()
    }

    /// Take everything, highest priority first
    pub fn drain_all(&mut self) -> Vec<Envelope> {
        self.control
            .drain(..)
            .chain(self.responses.drain(..))
            .chain(self.requests.drain(..))
            .collect()
    }

    /// Number of queued envelopes
    pub fn len(&self) -> usize {
        self.control.len() + self.responses.len() + self.requests.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::value::Value;
    use crate::runtime::envelope::{ControlMessage, Message, RequestId};

    fn tag(envelope: &Envelope) -> Value {
        match &envelope.message {
            Message::Value(value) => value.clone(),
            Message::Control(ControlMessage::SyncVar { value, .. }) => value.clone(),
            Message::Control(_) => Value::Null,
        }
    }

    fn sync(n: i32) -> Envelope {
        Envelope::control(ControlMessage::SyncVar {
            id: 0,
            value: Value::Int32(n),
        })
    }

    #[test]
    fn test_priority_then_fifo() {
        let mut mailbox = Mailbox::new();
        mailbox.add(Envelope::notify(Value::Int32(1)));
        mailbox.add(Envelope::response(Value::Int32(2), RequestId(1)));
        mailbox.add(sync(3));
        mailbox.add(Envelope::notify(Value::Int32(4)));
        mailbox.add(Envelope::response(Value::Int32(5), RequestId(2)));
        mailbox.add(sync(6));

        let order: Vec<Value> = std::iter::from_fn(|| mailbox.remove_next())
            .map(|envelope| tag(&envelope))
            .collect();
        let expected: Vec<Value> = [3, 6, 2, 5, 1, 4].into_iter().map(Value::Int32).collect();
        assert_eq!(order, expected);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_busy_mailbox_holds_requests() {
        let mut mailbox = Mailbox::new();
        mailbox.add(Envelope::notify(Value::Int32(1)));
        assert!(!mailbox.has_selectable(true));
        assert!(mailbox.remove_selectable(true).is_none());
        mailbox.add(Envelope::response(Value::Int32(2), RequestId(9)));
        assert!(mailbox.has_selectable(true));
        assert_eq!(
            mailbox.remove_selectable(true).map(|e| tag(&e)),
            Some(Value::Int32(2))
        );
        assert_eq!(mailbox.len(), 1);
        assert!(mailbox.remove_selectable(false).is_some());
    }

    #[test]
    fn test_drain_responses_keeps_others() {
        let mut mailbox = Mailbox::new();
        mailbox.add(Envelope::response(Value::Int32(1), RequestId(1)));
        mailbox.add(Envelope::notify(Value::Int32(2)));
        mailbox.add(Envelope::response(Value::Int32(3), RequestId(2)));
        let drained: Vec<Value> = mailbox.drain_responses().iter().map(tag).collect();
        assert_eq!(drained, vec![Value::Int32(1), Value::Int32(3)]);
        assert_eq!(mailbox.drain_all().len(), 1);
    }
}
