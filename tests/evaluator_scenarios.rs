//! End-to-end evaluation of small programs
//!
//! Each test runs source text through parse, generate and perform on a
//! detached machine and checks the value the program produces.

use std::sync::Arc;

use torq::interpreter::{EvaluatorError, Evaluator, evaluate_expr};
use torq::kernel::{FailedValue, Value, Var};

fn int(n: i32) -> Value {
    Value::Int32(n)
}

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(evaluate_expr("1 + 2 * 3").unwrap(), int(7));
    assert_eq!(evaluate_expr("(1 + 2) * 3").unwrap(), int(9));
    assert_eq!(evaluate_expr("7 % 4 - 10 / 5").unwrap(), int(1));
}

#[test]
fn test_record_selection() {
    assert_eq!(evaluate_expr("var x = {a: 1, b: 2} x.a").unwrap(), int(1));
}

#[test]
fn test_for_visits_each_element_in_order() {
    let source = r#"
        import system.Cell
        var count = Cell.new(0)
        var order = Cell.new(0)
        for i in [1, 2, 3] do
            count := @count + 1
            order := @order * 10 + i
        end
        [@count, @order]
    "#;
    let expected = Value::tuple(None, vec![int(3), int(123)]);
    assert_eq!(evaluate_expr(source).unwrap(), expected);
}

#[test]
fn test_break_leaves_loop_early() {
    let source = r#"
        import system.Cell
        var visited = Cell.new(0)
        for i in [1, 2, 3] do
            if i == 2 then break end
            visited := @visited + 1
        end
        @visited
    "#;
    assert_eq!(evaluate_expr(source).unwrap(), int(1));
}

#[test]
fn test_continue_skips_rest_of_body() {
    let source = r#"
        import system.Cell
        var sum = Cell.new(0)
        for i in [1, 2, 3, 4] do
            if i % 2 == 0 then continue end
            sum := @sum + i
        end
        @sum
    "#;
    assert_eq!(evaluate_expr(source).unwrap(), int(4));
}

#[test]
fn test_short_circuit_skips_right_operand() {
    let source = r#"
        import system.Cell
        var calls = Cell.new(0)
        var touch = func () in
            calls := @calls + 1
            true
        end
        var a = false && touch()
        var b = true || touch()
        [a, b, @calls]
    "#;
    let expected = Value::tuple(None, vec![Value::Bool(false), Value::Bool(true), int(0)]);
    assert_eq!(evaluate_expr(source).unwrap(), expected);
}

#[test]
fn test_recursive_function() {
    let source = r#"
        func fact(n) in
            if n <= 1 then 1 else n * fact(n - 1) end
        end
        fact(5)
    "#;
    assert_eq!(evaluate_expr(source).unwrap(), int(120));
}

#[test]
fn test_return_from_inside_loop() {
    let source = r#"
        import system.Cell
        func first_over(limit) in
            var i = Cell.new(0)
            while true do
                i := @i + 1
                if @i > limit then return @i end
            end
            0
        end
        first_over(3)
    "#;
    assert_eq!(evaluate_expr(source).unwrap(), int(4));
}

#[test]
fn test_case_destructures_records() {
    let source = r#"
        var point = {x: 3, y: 4}
        case point
            of {x: a, y: b} then a * a + b * b
            else 0
        end
    "#;
    assert_eq!(evaluate_expr(source).unwrap(), int(25));
}

#[test]
fn test_try_catches_thrown_value() {
    let source = "try throw 'oops' catch e then 'caught ' + e end";
    assert_eq!(evaluate_expr(source).unwrap(), Value::str("caught oops"));
}

#[test]
fn test_kernel_errors_are_catchable() {
    let source = r#"
        var r = {a: 1}
        try r.b catch e then e.name end
    "#;
    assert_eq!(
        evaluate_expr(source).unwrap(),
        Value::str("FeatureNotFoundError")
    );
}

#[test]
fn test_act_runs_inline_without_actor() {
    assert_eq!(evaluate_expr("var x = act 1 + 2 end x").unwrap(), int(3));
}

#[test]
fn test_uncaught_error_halts_with_record() {
    let err = evaluate_expr("1 / 0").unwrap_err();
    let EvaluatorError::Halted { error } = err else {
        panic!("expected a halt, got {err}");
    };
    assert_eq!(error.error_name().as_deref(), Some("ArithmeticError"));
}

#[test]
fn test_bound_var_feeds_program() {
    let input = Var::bound(Value::tuple(None, vec![int(2), int(5)]));
    let performed = Evaluator::builder()
        .add_var("input", input)
        .result("out")
        .source("input.0 * input.1")
        .parse()
        .unwrap()
        .generate()
        .unwrap()
        .perform()
        .unwrap();
    assert_eq!(performed.value_of("out"), Some(int(10)));
}

#[test]
fn test_late_binding_resumes_computation() {
    // Bind the input only after the first run suspended on it
    let input = Var::new();
    let err = Evaluator::builder()
        .add_var("input", input.clone())
        .expr()
        .source("input + 1")
        .parse()
        .unwrap()
        .generate()
        .unwrap()
        .perform()
        .unwrap_err();
    assert!(matches!(err, EvaluatorError::Suspended));

    input.bind_to_value(int(41)).unwrap();
    let performed = Evaluator::builder()
        .add_var("input", input)
        .expr()
        .source("input + 1")
        .parse()
        .unwrap()
        .generate()
        .unwrap()
        .perform()
        .unwrap();
    assert_eq!(performed.result(), Some(int(42)));
}

fn catch_failed(source: &str) -> Value {
    let failed = Value::Failed(Arc::new(FailedValue {
        address: "torq://torq/worker".to_string(),
        error: Value::error("AskNotHandledError", "not handled", vec![]),
        stack: Vec::new(),
        parent: None,
        native_cause: None,
    }));
    Evaluator::builder()
        .add_var("f", Var::bound(failed))
        .expr()
        .source(source)
        .parse()
        .unwrap()
        .generate()
        .unwrap()
        .perform()
        .unwrap()
        .result()
        .unwrap()
}

#[test]
fn test_catch_pattern_destructures_failed_value() {
    let source = "try f + 1 catch 'error'#{name: n, ...} then n end";
    assert_eq!(catch_failed(source), Value::str("AskNotHandledError"));
}

#[test]
fn test_catch_falls_through_to_next_clause() {
    let source = r#"
        try f + 1
        catch 'error'#{name: 'ArithmeticError', ...} then 'arith'
        catch {name: _} then 'unlabelled'
        catch e then 'other'
        end
    "#;
    assert_eq!(catch_failed(source), Value::str("other"));
}
