//! Integration tests for actors
//!
//! Actors are built from source, spawned on a tokio-backed system and
//! driven from the host through a `RequestClient`.

use std::sync::Arc;
use std::time::Duration;

use torq::interpreter::Evaluator;
use torq::kernel::{Feature, Value};
use torq::runtime::builder::spawn_actor;
use torq::runtime::{
    ActorBuilder, ActorRef, ActorRefHandle, ActorState, ActorSystem, ActorSystemConfig,
    ControlMessage, Envelope, RequestClient, TokioExecutor,
};

fn system() -> ActorSystem {
    ActorSystem::current().unwrap()
}

async fn ask(client: &RequestClient, actor: &ActorRefHandle, message: Value) -> Value {
    tokio::time::timeout(Duration::from_secs(10), client.ask(actor, message))
        .await
        .expect("actor answered in time")
        .unwrap()
}

fn failure_name(value: &Value) -> Option<String> {
    match value {
        Value::Failed(failed) => failed.error_name().map(|name| name.to_string()),
        _ => None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unhandled_ask_fails_actor() {
    let system = system();
    let actor = spawn_actor(&system, "actor () in ask 'ping' in 'pong' end end", vec![]).unwrap();
    let client = RequestClient::new(&system);

    assert_eq!(ask(&client, &actor, Value::str("ping")).await, Value::str("pong"));

    let answer = ask(&client, &actor, Value::str("hello")).await;
    assert_eq!(failure_name(&answer).as_deref(), Some("AskNotHandledError"));

    // Failure is terminal: later requests get the same failure
    let answer = ask(&client, &actor, Value::str("ping")).await;
    assert_eq!(failure_name(&answer).as_deref(), Some("AskNotHandledError"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_counter_keeps_state_between_messages() {
    let source = r#"
        import system.Cell
        actor Counter(start) in
            var n = Cell.new(start)
            handle ask 'get' in @n end
            handle tell 'inc' in n := @n + 1 end
        end
    "#;
    let system = system();
    let actor = ActorBuilder::new(&system)
        .address(system.address("counter"))
        .source(source)
        .parse()
        .unwrap()
        .rewrite()
        .unwrap()
        .generate()
        .unwrap()
        .construct()
        .unwrap()
        .configure(vec![Value::Int32(10)])
        .unwrap()
        .spawn()
        .into_actor_ref();
    assert_eq!(actor.address().to_string(), "torq://torq/counter");

    let client = RequestClient::new(&system);
    client.tell(&actor, Value::str("inc"));
    client.tell(&actor, Value::str("inc"));
    assert_eq!(ask(&client, &actor, Value::str("get")).await, Value::Int32(12));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_guarded_handlers_and_destructuring() {
    let source = r#"
        actor Calc() in
            handle ask {op: 'add', a: x, b: y} in x + y end
            handle ask {op: 'div', a: x, b: y} when y != 0 in x / y end
            handle ask {op: 'div', a: _, b: _} in 'undefined' end
        end
    "#;
    let system = system();
    let actor = spawn_actor(&system, source, vec![]).unwrap();
    let client = RequestClient::new(&system);

    let request = |op: &str, a: i32, b: i32| {
        Value::rec(
            None,
            vec![
                (Feature::str("op"), Value::str(op)),
                (Feature::str("a"), Value::Int32(a)),
                (Feature::str("b"), Value::Int32(b)),
            ],
        )
        .unwrap()
    };
    assert_eq!(ask(&client, &actor, request("add", 2, 3)).await, Value::Int32(5));
    assert_eq!(ask(&client, &actor, request("div", 9, 3)).await, Value::Int32(3));
    assert_eq!(
        ask(&client, &actor, request("div", 1, 0)).await,
        Value::str("undefined")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_actor_asks_another_actor() {
    let source = r#"
        actor Front() in
            var back = spawn(actor () in ask x in x * 2 end end.cfg())
            handle ask n in back.ask(n) + 1 end
        end
    "#;
    let system = system();
    let actor = spawn_actor(&system, source, vec![]).unwrap();
    let client = RequestClient::new(&system);
    assert_eq!(ask(&client, &actor, Value::Int32(20)).await, Value::Int32(41));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_act_runs_in_child_actor() {
    let source = r#"
        actor Worker() in
            handle ask n in
                var a = act n * n end
                var b = act n + n end
                a + b
            end
        end
    "#;
    let system = system();
    let actor = spawn_actor(&system, source, vec![]).unwrap();
    let client = RequestClient::new(&system);
    assert_eq!(ask(&client, &actor, Value::Int32(3)).await, Value::Int32(15));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_act_waits_for_values_bound_after_it_starts() {
    // `x` is bound after the child starts, to a record whose field is bound
    // later still, so the value reaches the child in two steps
    let source = r#"
        actor Late() in
            handle ask n in
                var x
                var y
                var z
                var a = act x.v * y end
                x = {v: z}
                y = 3
                z = n
                a
            end
        end
    "#;
    let system = system();
    let actor = spawn_actor(&system, source, vec![]).unwrap();
    let client = RequestClient::new(&system);
    assert_eq!(ask(&client, &actor, Value::Int32(7)).await, Value::Int32(21));
    assert_eq!(ask(&client, &actor, Value::Int32(2)).await, Value::Int32(6));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_finishes_queued_work_and_refuses_later_requests() {
    let source = r#"
        import system.Cell
        actor Counter(start) in
            var n = Cell.new(start)
            handle ask 'get' in @n end
            handle tell 'inc' in n := @n + 1 end
        end
    "#;
    let system = system();
    let actor = spawn_actor(&system, source, vec![Value::Int32(10)]).unwrap();
    let client = RequestClient::new(&system);

    client.tell(&actor, Value::str("inc"));
    let before = client.ask(&actor, Value::str("get"));
    actor.send(Envelope::control(ControlMessage::Stop));
    let after = client.ask(&actor, Value::str("get"));

    let before = tokio::time::timeout(Duration::from_secs(10), before)
        .await
        .expect("queued request answered")
        .unwrap();
    assert_eq!(before, Value::Int32(11));
    let after = tokio::time::timeout(Duration::from_secs(10), after)
        .await
        .expect("late request answered")
        .unwrap();
    assert_eq!(failure_name(&after).as_deref(), Some("ActorStoppedError"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_evaluator_spawns_and_asks_through_system() {
    let system = ActorSystem::new(
        ActorSystemConfig::default(),
        Arc::new(TokioExecutor::current().unwrap()),
    );
    let source = r#"
        actor Echo() in handle ask m in ['echo', m] end end
        var e = spawn(Echo.cfg())
        e.ask('hi')
    "#;
    let result = tokio::task::spawn_blocking(move || {
        Evaluator::builder()
            .actor_system(system)
            .max_time(Duration::from_secs(10))
            .expr()
            .source(source)
            .parse()
            .and_then(|parsed| parsed.generate())
            .and_then(|generated| generated.perform())
            .map(|performed| performed.result())
    })
    .await
    .unwrap()
    .unwrap();
    let expected = Value::tuple(None, vec![Value::str("echo"), Value::str("hi")]);
    assert_eq!(result, Some(expected));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_answers_later_requests_with_stopped_error() {
    let system = system();
    let actor = system.create_actor(system.unique_address());
    actor.stop();
    for _ in 0..200 {
        if actor.state() == ActorState::Successful {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(actor.state(), ActorState::Successful);

    let handle: ActorRefHandle = actor.clone();
    let client = RequestClient::new(&system);
    let answer = ask(&client, &handle, Value::str("anything")).await;
    assert_eq!(failure_name(&answer).as_deref(), Some("ActorStoppedError"));
}
