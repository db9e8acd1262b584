//! # Observability Infrastructure
//!
//! Structured logging through `tracing` and lifecycle counters through the
//! `metrics` facade.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, log_config_info};
pub use metrics::MetricsRecorder;
