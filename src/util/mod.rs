//! Shared utilities

/// Host value bridge to `preserves::IOValue`
pub mod io_value;
/// Source text and spans
pub mod span;
