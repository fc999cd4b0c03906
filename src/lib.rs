//! Torq – a dataflow programming language with an actor runtime
//!
//! This crate implements:
//! - A lexer, parser and canonical formatter for Torq source text
//! - A generator lowering the AST to a small kernel language
//! - A kernel machine over single-assignment dataflow variables with
//!   cooperative suspension and time-sliced preemption
//! - An actor runtime with priority mailboxes, request/response messaging,
//!   and first-class failed values
//! - A standalone evaluator and an actor builder for host code

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Language front end: lexing, parsing, lowering and evaluation
pub mod interpreter;
/// Kernel data model and machine
pub mod kernel;
/// Actor runtime
pub mod runtime;
/// Shared utilities
pub mod util;

// Re-export key types for convenience
pub use interpreter::{Evaluator, evaluate_expr, parse};
pub use kernel::{Value, Var};
pub use runtime::{ActorBuilder, ActorSystem, ActorSystemConfig, RequestClient};

/// Current version of the Torq runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
