//! Lexer
//!
//! Turns source text into [`Token`]s on demand. The lexer never backtracks:
//! each call to [`Lexer::next_token`] scans forward from the current
//! position. Literal text is kept verbatim in the token; numbers in
//! particular are parsed later, when the generator needs their value.

use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::error::{LexerError, LexerErrorKind};
use crate::kernel::ident::is_keyword;
use crate::util::span::{SourceText, Span};

const THREE_CHAR_SYMBOLS: &[&str] = &["..."];
const TWO_CHAR_SYMBOLS: &[&str] = &[":=", "==", "!=", "<=", ">=", "&&", "||", "->"];
const ONE_CHAR_SYMBOLS: &str = "=<>+-*/%!@.,:;()[]{}#~";

/// Token category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    /// Identifier
    Ident,
    /// Backtick-quoted identifier
    QuotedIdent,
    /// Reserved word
    Keyword,
    /// String literal (either quote style)
    Str,
    /// Character literal (`&c`)
    Char,
    /// Integer literal, possibly hex or `L`-suffixed
    Int,
    /// Floating point literal
    Flt,
    /// Decimal literal (`m` suffix)
    Dec,
    /// One-character symbol
    OneChar,
    /// Two-character symbol
    TwoChar,
    /// Three-character symbol
    ThreeChar,
    /// Line or block comment
    Comment,
    /// End of input
    Eof,
}

/// Token: a kind plus the span of its text
///
/// Equality and hashing use the kind and the covered text, not the position.
#[derive(Debug, Clone)]
pub struct Token {
    /// Category
    pub kind: TokenKind,
    /// Source covered
    pub span: Span,
}

impl Token {
    /// Source text of the token
    pub fn text(&self) -> &str {
        self.span.text()
    }

    /// Whether this is the keyword `word`
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text() == word
    }

    /// Whether this is the symbol `symbol`
    pub fn is_symbol(&self, symbol: &str) -> bool {
        matches!(
            self.kind,
            TokenKind::OneChar | TokenKind::TwoChar | TokenKind::ThreeChar
        ) && self.text() == symbol
    }

    /// Whether this is end of input
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.text() == other.text()
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.text().hash(state);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.text())
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.kind, self.text(), &self.span).serialize(serializer)
    }
}

/// Forward-only scanner over one source text
pub struct Lexer {
    source: SourceText,
    pos: usize,
}

impl Lexer {
    /// Scanner positioned at the start of `source`
    pub fn new(source: SourceText) -> Self {
        Self { source, pos: 0 }
    }

    /// Source being scanned
    pub fn source(&self) -> &SourceText {
        &self.source
    }

    fn rest(&self) -> &str {
        &self.source.as_str()[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.rest().chars().nth(offset)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn span_from(&self, begin: usize) -> Span {
        Span::new(self.source.clone(), begin, self.pos)
    }

    fn token(&self, kind: TokenKind, begin: usize) -> Token {
        Token {
            kind,
            span: self.span_from(begin),
        }
    }

    fn error(&self, kind: LexerErrorKind, begin: usize) -> LexerError {
        LexerError {
            kind,
            span: self.span_from(begin),
        }
    }

    /// Scan the next token; comments are skipped when `skip_comments` is set
    pub fn next_token(&mut self, skip_comments: bool) -> Result<Token, LexerError> {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            }
            let begin = self.pos;
            let Some(ch) = self.peek() else {
                return Ok(self.token(TokenKind::Eof, begin));
            };
            let token = match ch {
                '/' if self.peek_at(1) == Some('/') => self.line_comment(begin),
                '/' if self.peek_at(1) == Some('*') => self.block_comment(begin)?,
                '\'' | '"' => self.string(begin, ch)?,
                '`' => self.quoted_ident(begin)?,
                '&' if self.peek_at(1) != Some('&') => self.char_literal(begin)?,
                c if c.is_ascii_digit() => self.number(begin)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.ident(begin),
                _ => self.symbol(begin)?,
            };
            if token.kind == TokenKind::Comment && skip_comments {
                continue;
            }
            return Ok(token);
        }
    }

    /// Scan every remaining token, excluding the final `Eof`
    pub fn tokenize(mut self, skip_comments: bool) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token(skip_comments)?;
            if token.is_eof() {
                return Ok(tokens);
            }
            tokens.push(token);
        }
    }

    fn line_comment(&mut self, begin: usize) -> Token {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
        self.token(TokenKind::Comment, begin)
    }

    fn block_comment(&mut self, begin: usize) -> Result<Token, LexerError> {
        self.pos += 2;
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(self.token(TokenKind::Comment, begin));
                }
                Some(_) => {}
                None => return Err(self.error(LexerErrorKind::UnterminatedComment, begin)),
            }
        }
    }

    fn escape(&mut self, begin: usize) -> Result<(), LexerError> {
        match self.bump() {
            Some('n' | 'r' | 't' | 'b' | 'f' | '\\' | '\'' | '"' | '`') => Ok(()),
            Some('u') => {
                for _ in 0..4 {
                    match self.bump() {
                        Some(c) if c.is_ascii_hexdigit() => {}
                        _ => return Err(self.error(LexerErrorKind::InvalidEscape, begin)),
                    }
                }
                Ok(())
            }
            _ => Err(self.error(LexerErrorKind::InvalidEscape, begin)),
        }
    }

    fn delimited(
        &mut self,
        begin: usize,
        quote: char,
        kind: TokenKind,
        unterminated: LexerErrorKind,
    ) -> Result<Token, LexerError> {
        self.bump();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(self.token(kind, begin)),
                Some('\\') => self.escape(begin)?,
                Some(_) => {}
                None => return Err(self.error(unterminated, begin)),
            }
        }
    }

    fn string(&mut self, begin: usize, quote: char) -> Result<Token, LexerError> {
        self.delimited(begin, quote, TokenKind::Str, LexerErrorKind::UnterminatedString)
    }

    fn quoted_ident(&mut self, begin: usize) -> Result<Token, LexerError> {
        self.delimited(
            begin,
            '`',
            TokenKind::QuotedIdent,
            LexerErrorKind::UnterminatedIdent,
        )
    }

    fn char_literal(&mut self, begin: usize) -> Result<Token, LexerError> {
        self.bump();
        match self.bump() {
            Some('\\') => self.escape(begin)?,
            Some(c) if !c.is_whitespace() => {}
            _ => return Err(self.error(LexerErrorKind::InvalidChar, begin)),
        }
        Ok(self.token(TokenKind::Char, begin))
    }

    fn digits(&mut self, radix: u32) -> usize {
        let mut count = 0;
        while self.peek().is_some_and(|c| c.is_digit(radix) || c == '_') {
            self.bump();
            count += 1;
        }
        count
    }

    fn number(&mut self, begin: usize) -> Result<Token, LexerError> {
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.pos += 2;
            if self.digits(16) == 0 {
                return Err(self.error(LexerErrorKind::MalformedNumber, begin));
            }
            if matches!(self.peek(), Some('L' | 'l')) {
                self.bump();
            }
            return self.number_end(TokenKind::Int, begin);
        }
        self.digits(10);
        let mut kind = TokenKind::Int;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.digits(10);
            kind = TokenKind::Flt;
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += digit_at;
                self.digits(10);
                kind = TokenKind::Flt;
            } else {
                self.bump();
                return Err(self.error(LexerErrorKind::MalformedNumber, begin));
            }
        }
        match self.peek() {
            Some('L' | 'l') if kind == TokenKind::Int => {
                self.bump();
            }
            Some('f' | 'F' | 'd' | 'D') => {
                self.bump();
                kind = TokenKind::Flt;
            }
            Some('m' | 'M') => {
                self.bump();
                kind = TokenKind::Dec;
            }
            _ => {}
        }
        self.number_end(kind, begin)
    }

    fn number_end(&mut self, kind: TokenKind, begin: usize) -> Result<Token, LexerError> {
        if self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
            return Err(self.error(LexerErrorKind::InvalidNumberSuffix, begin));
        }
        Ok(self.token(kind, begin))
    }

    fn ident(&mut self, begin: usize) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        let kind = if is_keyword(&self.source.as_str()[begin..self.pos]) {
            TokenKind::Keyword
        } else {
            TokenKind::Ident
        };
        self.token(kind, begin)
    }

    fn symbol(&mut self, begin: usize) -> Result<Token, LexerError> {
        let rest = self.rest();
        for (table, kind, len) in [
            (THREE_CHAR_SYMBOLS, TokenKind::ThreeChar, 3),
            (TWO_CHAR_SYMBOLS, TokenKind::TwoChar, 2),
        ] {
            if table.iter().any(|symbol| rest.starts_with(symbol)) {
                self.pos += len;
                return Ok(self.token(kind, begin));
            }
        }
        match self.bump() {
            Some(c) if ONE_CHAR_SYMBOLS.contains(c) => Ok(self.token(TokenKind::OneChar, begin)),
            _ => Err(self.error(LexerErrorKind::UnexpectedChar, begin)),
        }
    }
}

/// Decode the body of a string, quoted identifier, or character literal
///
/// `text` excludes the delimiters; escapes were validated by the lexer.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> Vec<(TokenKind, String)> {
        Lexer::new(SourceText::new(text))
            .tokenize(true)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text().to_string()))
            .collect()
    }

    fn lex_err(text: &str) -> LexerErrorKind {
        Lexer::new(SourceText::new(text))
            .tokenize(true)
            .unwrap_err()
            .kind
    }

    #[test]
    fn test_longest_match_symbols() {
        assert_eq!(
            lex("a<=b"),
            vec![
                (TokenKind::Ident, "a".into()),
                (TokenKind::TwoChar, "<=".into()),
                (TokenKind::Ident, "b".into()),
            ]
        );
        assert_eq!(lex("..."), vec![(TokenKind::ThreeChar, "...".into())]);
        assert_eq!(
            lex("< ="),
            vec![
                (TokenKind::OneChar, "<".into()),
                (TokenKind::OneChar, "=".into()),
            ]
        );
    }

    #[test]
    fn test_numbers_and_suffixes() {
        let kinds: Vec<TokenKind> = lex("1 0x1F 12L 1.5 2e10 3f 4d 5m 1.25m")
            .into_iter()
            .map(|(kind, _)| kind)
            .collect();
        use TokenKind::*;
        assert_eq!(kinds, vec![Int, Int, Int, Flt, Flt, Flt, Flt, Dec, Dec]);
        assert_eq!(lex_err("12q"), LexerErrorKind::InvalidNumberSuffix);
        assert_eq!(lex_err("0x"), LexerErrorKind::MalformedNumber);
    }

    #[test]
    fn test_strings_chars_and_comments() {
        assert_eq!(
            lex("'a\\'b' \"c\" &x &\\n // done\n`odd name`"),
            vec![
                (TokenKind::Str, "'a\\'b'".into()),
                (TokenKind::Str, "\"c\"".into()),
                (TokenKind::Char, "&x".into()),
                (TokenKind::Char, "&\\n".into()),
                (TokenKind::QuotedIdent, "`odd name`".into()),
            ]
        );
        assert_eq!(lex_err("'abc"), LexerErrorKind::UnterminatedString);
        assert_eq!(lex_err("'\\q'"), LexerErrorKind::InvalidEscape);
        assert_eq!(lex_err("/* open"), LexerErrorKind::UnterminatedComment);
        assert_eq!(lex_err("`x"), LexerErrorKind::UnterminatedIdent);
    }

    #[test]
    fn test_keywords_and_comment_tokens() {
        let tokens = Lexer::new(SourceText::new("var x /* c */ end"))
            .tokenize(false)
            .unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword,
                TokenKind::Ident,
                TokenKind::Comment,
                TokenKind::Keyword
            ]
        );
    }

    #[test]
    fn test_token_equality_is_textual() {
        let tokens = Lexer::new(SourceText::new("x + x")).tokenize(true).unwrap();
        assert_eq!(tokens[0], tokens[2]);
        assert_ne!(tokens[0].span.begin, tokens[2].span.begin);
        assert_ne!(tokens[0], tokens[1]);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a\\tb\\u0041\\\\"), "a\tbA\\");
    }
}
