//! Error types for the language front end
//!
//! Each compiler stage has its own error type carrying the span of the
//! offending source. None of them is recoverable: the first error aborts
//! the compilation.

use serde::Serialize;
use thiserror::Error;

use super::lexer::Token;
use crate::kernel::ident::Ident;
use crate::kernel::value::Value;
use crate::util::span::Span;

/// Category of a lexical error
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LexerErrorKind {
    /// String literal without its closing quote
    #[error("unterminated string")]
    UnterminatedString,
    /// Backtick identifier without its closing backtick
    #[error("unterminated quoted identifier")]
    UnterminatedIdent,
    /// Block comment without `*/`
    #[error("unterminated comment")]
    UnterminatedComment,
    /// Unknown or malformed backslash escape
    #[error("invalid escape sequence")]
    InvalidEscape,
    /// Letter directly after a number that is not a known suffix
    #[error("invalid numeric suffix")]
    InvalidNumberSuffix,
    /// `0x` with no hex digits, or exponent with no digits
    #[error("malformed number")]
    MalformedNumber,
    /// `&` not followed by a character
    #[error("invalid character literal")]
    InvalidChar,
    /// Character that starts no token
    #[error("unexpected character")]
    UnexpectedChar,
}

/// Lexical error with the span of the malformed text
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{kind} at {span}")]
pub struct LexerError {
    /// Error category
    pub kind: LexerErrorKind,
    /// Offending source
    pub span: Span,
}

/// Closed catalog of syntax errors
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParserErrorKind {
    /// Missing `end`
    #[error("'end' expected")]
    EndExpected,
    /// Missing `in`
    #[error("'in' expected")]
    InExpected,
    /// Missing `then`
    #[error("'then' expected")]
    ThenExpected,
    /// Missing `do`
    #[error("'do' expected")]
    DoExpected,
    /// Missing `of`
    #[error("'of' expected")]
    OfExpected,
    /// Missing `(`
    #[error("'(' expected")]
    LeftParenExpected,
    /// Missing `)`
    #[error("')' expected")]
    RightParenExpected,
    /// Missing `]`
    #[error("']' expected")]
    RightBracketExpected,
    /// Missing `}`
    #[error("'}}' expected")]
    RightBraceExpected,
    /// Missing `:` after a record feature
    #[error("':' expected")]
    ColonExpected,
    /// Missing identifier
    #[error("identifier expected")]
    IdentExpected,
    /// Missing expression
    #[error("expression expected")]
    ExprExpected,
    /// Missing pattern
    #[error("pattern expected")]
    PatExpected,
    /// Missing record feature
    #[error("feature expected")]
    FeatureExpected,
    /// Record or tuple label that is not a literal
    #[error("label expected")]
    LabelExpected,
    /// Missing type annotation
    #[error("type annotation expected")]
    TypeExpected,
    /// `handle` not followed by `ask` or `tell`
    #[error("'ask' or 'tell' expected")]
    AskOrTellExpected,
    /// `...` in a value (non-pattern) record or tuple
    #[error("partial arity is only allowed in patterns")]
    PartialArityNotAllowed,
    /// Token that cannot continue the current construct
    #[error("unexpected token")]
    UnexpectedToken,
}

/// Syntax error with the offending token
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{kind} at {} ('{}')", token.span, token.text())]
pub struct ParserError {
    /// Error category
    pub kind: ParserErrorKind,
    /// Token where parsing failed
    pub token: Token,
}

/// Any error raised while turning source text into an AST
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Lexical error
    #[error("lexer error: {0}")]
    Lexer(#[from] LexerError),
    /// Syntax error
    #[error("parser error: {0}")]
    Parser(#[from] ParserError),
}

impl ParseError {
    /// Span of the offending source
    pub fn span(&self) -> &Span {
        match self {
            ParseError::Lexer(err) => &err.span,
            ParseError::Parser(err) => &err.token.span,
        }
    }
}

/// Convenience result alias for parsing
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Error raised while lowering the AST into kernel statements
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeneratorError {
    /// `break` outside a loop body
    #[error("break not allowed at {0}")]
    BreakNotAllowed(Span),
    /// `continue` outside a loop body
    #[error("continue not allowed at {0}")]
    ContinueNotAllowed(Span),
    /// `return` outside a function or procedure body
    #[error("return not allowed at {0}")]
    ReturnNotAllowed(Span),
    /// Escaped identifier (`~x`) where a plain identifier is required
    #[error("invalid escape at {0}")]
    InvalidEscape(Span),
    /// Construct used where an identifier is required
    #[error("identifier required at {0}")]
    NotIdent(Span),
    /// Statement used where a value is required
    #[error("expression required at {0}")]
    NotExpr(Span),
    /// Expression used where only a statement is allowed
    #[error("statement required at {0}")]
    NotStmt(Span),
    /// Numeric literal whose text does not denote a value of its type
    #[error("invalid literal '{text}' at {span}")]
    InvalidLiteral {
        /// Literal text
        text: String,
        /// Literal location
        span: Span,
    },
    /// Pattern shape that cannot be compiled
    #[error("invalid pattern at {span}: {reason}")]
    InvalidPattern {
        /// Why the pattern is rejected
        reason: String,
        /// Pattern location
        span: Span,
    },
}

impl GeneratorError {
    /// Span of the offending node
    pub fn span(&self) -> &Span {
        match self {
            GeneratorError::BreakNotAllowed(span)
            | GeneratorError::ContinueNotAllowed(span)
            | GeneratorError::ReturnNotAllowed(span)
            | GeneratorError::InvalidEscape(span)
            | GeneratorError::NotIdent(span)
            | GeneratorError::NotExpr(span)
            | GeneratorError::NotStmt(span) => span,
            GeneratorError::InvalidLiteral { span, .. }
            | GeneratorError::InvalidPattern { span, .. } => span,
        }
    }
}

/// Convenience result alias for generation
pub type GeneratorResult<T> = std::result::Result<T, GeneratorError>;

/// Error raised by the standalone evaluator
#[derive(Debug, Error)]
pub enum EvaluatorError {
    /// Source failed to parse
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// AST failed to generate
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    /// Program refers to identifiers that are neither declared nor in the root environment
    #[error("unknown identifiers: {}", join_idents(.0))]
    UnknownIdents(Vec<Ident>),
    /// An error escaped the program
    #[error("uncaught error: {error}")]
    Halted {
        /// Uncaught error value
        error: Value,
    },
    /// The program blocked on a variable nothing will bind
    #[error("computation suspended on an unbound variable")]
    Suspended,
    /// The program ran past its time budget
    #[error("maximum evaluation time of {0} ms exceeded")]
    MaxTimeExceeded(u64),
}

/// Convenience result alias for evaluation
pub type EvaluatorResult<T> = std::result::Result<T, EvaluatorError>;
fn join_idents(idents: &[Ident]) -> String {
    idents
        .iter()
        .map(|ident| ident.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

