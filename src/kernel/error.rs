//! Kernel structural errors
//!
//! These are raised while the machine executes statements. They are never
//! retried: the machine converts each one into an error record and throws
//! it, so user `try` blocks can catch them like any other error.

use thiserror::Error;

use super::ident::Ident;
use super::value::Value;
use super::var::VarError;

/// Structural error raised by a kernel statement
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MachineError {
    /// Operands could not be unified
    #[error("cannot unify {left} with {right}")]
    Unification {
        /// Left operand, rendered
        left: String,
        /// Right operand, rendered
        right: String,
    },

    /// Select on a missing feature
    #[error("feature {feature} not found in {rec}")]
    FeatureNotFound {
        /// Requested feature
        feature: String,
        /// Record (or object) searched
        rec: String,
    },

    /// Apply on something that is not a procedure
    #[error("not a procedure: {0}")]
    NotProc(String),

    /// Wrong number of actual arguments
    #[error("arity mismatch: expected {expected} arguments, found {found}")]
    ArityMismatch {
        /// Formal parameter count
        expected: usize,
        /// Actual argument count
        found: usize,
    },

    /// Value that cannot serve as a record feature
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Record construction with a repeated feature
    #[error("duplicate feature: {0}")]
    DuplicateFeature(String),

    /// Operand of the wrong type
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected type name
        expected: &'static str,
        /// Offending value, rendered
        found: String,
    },

    /// Overflow or division by zero
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// Identifier missing from the environment
    #[error("identifier not found: {0}")]
    IdentNotFound(Ident),

    /// Import of an unregistered module
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// Import of a name the module does not export
    #[error("module {module} does not export {name}")]
    NotExported {
        /// Module path
        module: String,
        /// Requested name
        name: String,
    },

    /// Actor-only operation evaluated outside an actor
    #[error("{0} requires an actor context")]
    NotInActor(&'static str),

    /// Jump with no enclosing catch for its label
    #[error("jump {0} has no enclosing target")]
    InvalidJump(u32),

    /// Bind of an already bound variable
    #[error("{0}")]
    AlreadyBound(#[from] VarError),
}

/// Convenience result alias for kernel operations
pub type MachineResult<T> = std::result::Result<T, MachineError>;

impl MachineError {
    /// Error name used in the thrown error record
    pub fn name(&self) -> &'static str {
        match self {
            MachineError::Unification { .. } => "UnificationError",
            MachineError::FeatureNotFound { .. } => "FeatureNotFoundError",
            MachineError::NotProc(_) => "NotProcError",
            MachineError::ArityMismatch { .. } => "ArityMismatchError",
            MachineError::InvalidKey(_) => "InvalidKeyError",
            MachineError::DuplicateFeature(_) => "DuplicateFeatureError",
            MachineError::TypeMismatch { .. } => "TypeError",
            MachineError::Arithmetic(_) => "ArithmeticError",
            MachineError::IdentNotFound(_) => "IdentNotFoundError",
            MachineError::ModuleNotFound(_) => "ModuleNotFoundError",
            MachineError::NotExported { .. } => "NotExportedError",
            MachineError::NotInActor(_) => "NotInActorError",
            MachineError::InvalidJump(_) => "InvalidJumpError",
            MachineError::AlreadyBound(_) => "AlreadyBoundError",
        }
    }

    /// Catchable error record `'error'#{name: ..., message: ...}`
    pub fn to_value(&self) -> Value {
        Value::error(self.name(), self.to_string(), vec![])
    }

    /// Type mismatch helper
    pub fn type_mismatch(expected: &'static str, found: &Value) -> Self {
        MachineError::TypeMismatch {
            expected,
            found: found.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_record_carries_name_and_message() {
        let err = MachineError::Arithmetic("integer overflow".into());
        let value = err.to_value();
        assert_eq!(value.error_name().as_deref(), Some("ArithmeticError"));
        assert_eq!(
            value.to_string(),
            "'error'#{message: 'arithmetic error: integer overflow', name: 'ArithmeticError'}"
        );
    }
}
