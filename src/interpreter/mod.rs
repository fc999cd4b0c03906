//! Language front end
//!
//! Source text flows through the [`lexer`] and [`parser`] into an AST, the
//! [`generator`] lowers the AST to kernel statements, and the [`evaluator`]
//! runs those statements on a kernel machine outside any actor. The
//! [`format`] module prints an AST back as canonical source.

/// Abstract syntax tree
pub mod ast;
/// Front-end error types
pub mod error;
/// Standalone evaluator
pub mod evaluator;
/// Canonical source formatter
pub mod format;
/// AST to kernel lowering
pub mod generator;
/// Tokenizer
pub mod lexer;
/// Recursive-descent parser
pub mod parser;

pub use ast::{Node, NodeId, NodeKind, TypeTable};
pub use error::{
    EvaluatorError, EvaluatorResult, GeneratorError, GeneratorResult, LexerError, ParseError,
    ParseResult, ParserError,
};
pub use evaluator::{Evaluator, evaluate_expr};
pub use format::format;
pub use generator::Generator;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{Parser, parse};
