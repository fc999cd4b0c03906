//! Property tests for variables, unification and mailbox ordering

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use torq::interpreter::{Evaluator, EvaluatorError};
use torq::kernel::unify::unify;
use torq::kernel::{Feature, Rec, Value, ValueOrVar, Var};
use torq::runtime::envelope::{Category, ControlMessage, Envelope, Message, RequestId};
use torq::runtime::mailbox::Mailbox;

/// Tuple whose fields are either integers or fresh variables
fn build(fields: &[Option<i32>]) -> (ValueOrVar, Vec<Option<Var>>) {
    let mut holes = Vec::new();
    let items = fields
        .iter()
        .map(|field| match field {
            Some(n) => {
                holes.push(None);
                ValueOrVar::Value(Value::Int32(*n))
            }
            None => {
                let var = Var::new();
                holes.push(Some(var.clone()));
                ValueOrVar::Var(var)
            }
        })
        .collect();
    let rec = Rec::tuple(Some(Feature::str("t")), items);
    (ValueOrVar::Value(Value::Rec(Arc::new(rec))), holes)
}

fn resolved(holes: &[Option<Var>]) -> Vec<Option<Value>> {
    holes
        .iter()
        .map(|hole| hole.as_ref().and_then(Var::value))
        .collect()
}

fn field() -> impl Strategy<Value = Option<i32>> {
    prop::option::of(0..3i32)
}

fn tag(envelope: &Envelope) -> i64 {
    match &envelope.message {
        Message::Value(Value::Int32(n)) => *n as i64,
        Message::Control(ControlMessage::SyncVar { id, .. }) => *id as i64,
        other => panic!("unexpected message {other:?}"),
    }
}

fn rank(category: Category) -> u8 {
    match category {
        Category::ControlNotify | Category::ControlRequest => 0,
        Category::Response => 1,
        Category::Notify | Category::Request => 2,
    }
}

fn perform(input: Var) -> Result<Option<Value>, EvaluatorError> {
    Evaluator::builder()
        .add_var("input", input)
        .max_time(Duration::from_secs(5))
        .expr()
        .source("input * 2 + 1")
        .parse()?
        .generate()?
        .perform()
        .map(|performed| performed.result())
}

proptest! {
    #[test]
    fn prop_var_binds_once(first in any::<i32>(), second in any::<i32>()) {
        let var = Var::new();
        prop_assert!(var.bind_to_value(Value::Int32(first)).is_ok());
        prop_assert!(var.bind_to_value(Value::Int32(second)).is_err());
        prop_assert_eq!(var.value(), Some(Value::Int32(first)));
    }

    #[test]
    fn prop_unify_is_symmetric(
        pairs in prop::collection::vec((field(), field()), 0..6),
    ) {
        let (left, right): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();

        let (a, a_holes) = build(&left);
        let (b, b_holes) = build(&right);
        let forward = unify(&a, &b).is_ok();

        let (c, c_holes) = build(&left);
        let (d, d_holes) = build(&right);
        let backward = unify(&d, &c).is_ok();

        prop_assert_eq!(forward, backward);
        let clash = left
            .iter()
            .zip(&right)
            .any(|pair| matches!(pair, (Some(x), Some(y)) if x != y));
        prop_assert_eq!(forward, !clash);
        if forward {
            prop_assert_eq!(resolved(&a_holes), resolved(&c_holes));
            prop_assert_eq!(resolved(&b_holes), resolved(&d_holes));
        }
    }

    #[test]
    fn prop_late_binding_matches_early_binding(n in -1000..1000i32) {
        let early = perform(Var::bound(Value::Int32(n))).unwrap();

        let late = Var::new();
        prop_assert!(matches!(perform(late.clone()), Err(EvaluatorError::Suspended)));
        late.bind_to_value(Value::Int32(n)).unwrap();
        let resumed = perform(late).unwrap();

        prop_assert_eq!(early, resumed);
    }

    #[test]
    fn prop_mailbox_orders_by_priority_then_arrival(kinds in prop::collection::vec(0..3u8, 0..24)) {
        let mut mailbox = Mailbox::new();
        for (index, kind) in kinds.iter().enumerate() {
            let index = index as i32;
            mailbox.add(match kind {
                0 => Envelope::control(ControlMessage::SyncVar {
                    id: index as u64,
                    value: Value::Null,
                }),
                1 => Envelope::response(Value::Int32(index), RequestId(index as u64)),
                _ => Envelope::notify(Value::Int32(index)),
            });
        }

        let mut seen = Vec::new();
        while let Some(envelope) = mailbox.remove_next() {
            seen.push((rank(envelope.category()), tag(&envelope)));
        }
        prop_assert_eq!(seen.len(), kinds.len());
        let mut sorted = seen.clone();
        sorted.sort();
        prop_assert_eq!(seen, sorted);
    }
}
