//! Host messages built as preserves values and sent to actors

use std::sync::Arc;
use std::time::Duration;

use preserves::IOValue;
use torq::interpreter::{EvaluatorError, evaluate_expr};
use torq::kernel::{FailedValue, Value};
use torq::runtime::builder::spawn_actor;
use torq::runtime::{ActorSystem, RequestClient};
use torq::util::io_value::{io_to_value, value_to_io};

#[tokio::test(flavor = "multi_thread")]
async fn test_preserves_request_and_reply() {
    let source = r#"
        actor Greeter() in
            handle ask greet#[name] in ['hello', name] end
        end
    "#;
    let system = ActorSystem::current().unwrap();
    let actor = spawn_actor(&system, source, vec![]).unwrap();
    let client = RequestClient::new(&system);

    let request = IOValue::record(
        IOValue::symbol("greet"),
        vec![IOValue::new("ada".to_string())],
    );
    let message = io_to_value(&request).unwrap();
    let answer = tokio::time::timeout(Duration::from_secs(10), client.ask(&actor, message))
        .await
        .expect("actor answered in time")
        .unwrap();

    let reply = value_to_io(&answer).unwrap();
    assert!(reply.is_sequence());
    assert_eq!(reply.len(), 2);
    assert_eq!(
        IOValue::from(reply.index(1))
            .as_string()
            .map(|s| s.to_string()),
        Some("ada".to_string())
    );
}

#[test]
fn test_failure_keeps_address_and_error() {
    let err = evaluate_expr("{a: 1}.b").unwrap_err();
    let EvaluatorError::Halted { error } = err else {
        panic!("expected a halt, got {err}");
    };
    let failed = Value::Failed(Arc::new(FailedValue {
        address: "torq://torq/worker".to_string(),
        error: error.clone(),
        stack: Vec::new(),
        parent: None,
        native_cause: None,
    }));

    let io = value_to_io(&failed).unwrap();
    assert_eq!(
        IOValue::from(io.label()).as_symbol().map(|s| s.as_ref().to_string()),
        Some("torq:failed".to_string())
    );
    let Value::Failed(back) = io_to_value(&io).unwrap() else {
        panic!("expected a failed value");
    };
    assert_eq!(back.address, "torq://torq/worker");
    assert_eq!(back.error, error);
    assert_eq!(back.error_name().as_deref(), Some("FeatureNotFoundError"));
}
