//! Error types for the actor runtime
//!
//! Domain errors use thiserror; kernel and evaluator errors convert in at
//! the builder boundary.

use std::io;
use thiserror::Error;

use crate::interpreter::error::EvaluatorError;

/// Top-level runtime error
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Actor construction failed
    #[error("Builder error: {0}")]
    Builder(#[from] BuilderError),

    /// No executor could be obtained
    #[error("Executor unavailable: {0}")]
    Executor(String),

    /// The actor answering a request went away without replying
    #[error("Response for request {0} was dropped")]
    ResponseDropped(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration (de)serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Actor builder errors
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Parsing, generating or running the actor source failed
    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvaluatorError),

    /// The source did not produce an actor
    #[error("Source does not define an actor: {0}")]
    NotAnActor(String),

    /// Wrong number of construction arguments
    #[error("Actor expects {expected} construction arguments, got {found}")]
    ArgCount {
        /// Arguments the constructor declares
        expected: usize,
        /// Arguments supplied
        found: usize,
    },

    /// A construction argument still contains unbound variables
    #[error("Construction argument {0} is not complete")]
    IncompleteArgument(usize),
}

/// Convenience result alias for runtime operations
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
