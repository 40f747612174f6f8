//! Error types for rv-core
//!
//! Re-exports the unified error type from rv-error.

pub use rv_error::{Result, RevisitError};
