//! # Error Handling
//!
//! Error types for the instance broker, defined with `thiserror`. Every
//! error carries its kind and, where one exists, the wrapped underlying cause.

pub mod types;

pub use types::{BoxError, BrokerError, Result, StatementFailure};
