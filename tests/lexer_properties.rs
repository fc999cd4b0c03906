//! Property tests for the lexer

use proptest::prelude::*;
use torq::interpreter::{Lexer, TokenKind};
use torq::kernel::ident::is_keyword;
use torq::util::span::SourceText;

fn lex(text: &str) -> Vec<(TokenKind, String)> {
    Lexer::new(SourceText::new(text))
        .tokenize(true)
        .unwrap()
        .into_iter()
        .map(|token| (token.kind, token.text().to_string()))
        .collect()
}

#[test]
fn test_longest_symbol_wins() {
    assert_eq!(
        lex("a<=b"),
        vec![
            (TokenKind::Ident, "a".to_string()),
            (TokenKind::TwoChar, "<=".to_string()),
            (TokenKind::Ident, "b".to_string()),
        ]
    );
    assert_eq!(lex("..."), vec![(TokenKind::ThreeChar, "...".to_string())]);
    assert_eq!(
        lex("x:=y"),
        vec![
            (TokenKind::Ident, "x".to_string()),
            (TokenKind::TwoChar, ":=".to_string()),
            (TokenKind::Ident, "y".to_string()),
        ]
    );
}

#[test]
fn test_comments_are_kept_on_request() {
    let tokens = Lexer::new(SourceText::new("x // note\ny"))
        .tokenize(false)
        .unwrap();
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TokenKind::Ident, TokenKind::Comment, TokenKind::Ident]);
    assert_eq!(tokens[1].text(), "// note");
}

proptest! {
    #[test]
    fn prop_identifier_is_one_token(name in "[a-zA-Z_][a-zA-Z0-9_]{0,12}") {
        let tokens = lex(&name);
        prop_assert_eq!(tokens.len(), 1);
        let expected = if is_keyword(&name) { TokenKind::Keyword } else { TokenKind::Ident };
        prop_assert_eq!(tokens[0].0, expected);
        prop_assert_eq!(&tokens[0].1, &name);
    }

    #[test]
    fn prop_integer_is_one_token(n in 0u64..u64::MAX) {
        let text = n.to_string();
        let tokens = lex(&text);
        prop_assert_eq!(tokens, vec![(TokenKind::Int, text)]);
    }

    #[test]
    fn prop_two_char_symbol_between_names(
        symbol in prop::sample::select(vec![":=", "==", "!=", "<=", ">=", "&&", "||", "->"]),
    ) {
        let tokens = lex(&format!("left{symbol}right"));
        prop_assert_eq!(tokens.len(), 3);
        prop_assert_eq!(tokens[1].0, TokenKind::TwoChar);
        prop_assert_eq!(tokens[1].1.as_str(), symbol);
    }

    #[test]
    fn prop_token_texts_rebuild_spaced_source(
        words in prop::collection::vec(
            prop_oneof![
                "[a-z][a-z0-9]{0,6}",
                "[0-9]{1,6}",
                "'[a-z ]{0,6}'",
                prop::sample::select(vec!["+", "*", "(", ")", "==", "..."]).prop_map(String::from),
            ],
            1..12,
        ),
    ) {
        let source = words.join(" ");
        let texts: Vec<String> = lex(&source).into_iter().map(|(_, text)| text).collect();
        prop_assert_eq!(texts.join(" "), source);
    }

    #[test]
    fn prop_arbitrary_input_does_not_panic(text in "\\PC{0,40}") {
        let _ = Lexer::new(SourceText::new(text.as_str())).tokenize(false);
    }
}
