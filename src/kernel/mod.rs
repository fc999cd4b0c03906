//! Kernel data model and machine
//!
//! This module holds everything the generated code runs on: dataflow
//! variables, values, environments, kernel statements, unification, and the
//! stack machine that executes statements with cooperative suspension.

pub mod builtins;
pub mod decimal;
pub mod env;
pub mod error;
pub mod ident;
pub mod machine;
pub mod ops;
pub mod registry;
pub mod stmt;
pub mod unify;
pub mod value;
pub mod var;

pub use env::{Env, EnvEntry};
pub use error::{MachineError, MachineResult};
pub use ident::Ident;
pub use machine::{ComputeEnd, Halt, Interrupt, Machine, MachineHost};
pub use registry::ModuleRegistry;
pub use stmt::{CompleteOrIdent, Stmt, StmtKind};
pub use value::{FailedValue, Feature, Rec, Value, ValueOrVar};
pub use var::Var;
