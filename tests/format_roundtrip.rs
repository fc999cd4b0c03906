//! Formatting round trips
//!
//! Formatted text must parse back to the same tree, and formatting that
//! text again must not change it.

use proptest::prelude::*;
use torq::interpreter::{format, parse};
use torq::kernel::ident::is_keyword;

fn check(source: &str) -> Result<(), TestCaseError> {
    let tree = parse(source).map_err(|err| TestCaseError::fail(format!("{err}\n{source}")))?;
    let text = format(&tree);
    let reparsed = parse(&text).map_err(|err| TestCaseError::fail(format!("{err}\n{text}")))?;
    prop_assert_eq!(&reparsed, &tree, "formatted text:\n{}", text);
    prop_assert_eq!(format(&reparsed), text);
    Ok(())
}

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,4}".prop_filter("keywords are reserved", |name| !is_keyword(name))
}

fn expr() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        name(),
        (0u32..100_000).prop_map(|n| n.to_string()),
        "[a-z ]{0,6}".prop_map(|text| format!("'{text}'")),
        prop::bool::ANY.prop_map(|b| b.to_string()),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            (
                inner.clone(),
                prop::sample::select(vec!["+", "-", "*", "/", "%", "&&", "||"]),
                inner.clone()
            )
                .prop_map(|(l, op, r)| format!("({l} {op} {r})")),
            prop::collection::vec(inner.clone(), 0..4)
                .prop_map(|items| format!("[{}]", items.join(", "))),
            (name(), inner.clone()).prop_map(|(k, v)| format!("{{{k}: {v}}}")),
            (inner.clone(), name()).prop_map(|(e, f)| format!("({e}).{f}")),
            (name(), prop::collection::vec(inner, 0..3))
                .prop_map(|(f, args)| format!("{f}({})", args.join(", "))),
        ]
    })
}

#[test]
fn test_program_round_trips() {
    let source = r#"
        import system.Cell
        actor Counter(start) in
            var n = Cell.new(start)
            handle ask 'get' in @n end
            handle tell 'inc' in n := @n + 1 end
        end
        for i in [1, 2] do
            while false do skip end
        end
        try throw 'x' catch e then e finally 0 end
    "#;
    check(source).unwrap();
}

proptest! {
    #[test]
    fn prop_expression_round_trips(source in expr()) {
        check(&source)?;
    }

    #[test]
    fn prop_var_statements_round_trip(names in prop::collection::vec((name(), expr()), 1..4)) {
        let source: Vec<String> = names
            .into_iter()
            .map(|(name, value)| format!("var {name} = {value}"))
            .collect();
        check(&source.join("\n"))?;
    }
}
