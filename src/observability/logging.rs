//! # Structured Logging
//!
//! Subscriber setup and span macros built on the tracing ecosystem.
//!
//! `RUST_LOG` takes precedence over the configured level when set, so
//! individual modules can be turned up without touching broker settings.

use crate::config::ObservabilityConfig;
use crate::errors::{BrokerError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Create a tracing span for an instance lifecycle operation.
///
/// `plan_id` and `adapter` start empty and can be recorded once the instance
/// has been resolved:
///
/// ```rust,ignore
/// let span = provision_span!("create", instance_id);
/// span.record("plan_id", plan_id);
/// ```
#[macro_export]
macro_rules! provision_span {
    ($operation:expr, $instance_id:expr) => {
        tracing::info_span!(
            "instance_operation",
            operation = %$operation,
            instance_id = %$instance_id,
            plan_id = tracing::field::Empty,
            adapter = tracing::field::Empty
        )
    };
    ($operation:expr, $instance_id:expr, $($field:tt)*) => {
        tracing::info_span!(
            "instance_operation",
            operation = %$operation,
            instance_id = %$instance_id,
            plan_id = tracing::field::Empty,
            adapter = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// Fails when a global subscriber is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| {
            BrokerError::config_with_source(
                format!("Invalid log level '{}'", config.log_level),
                Box::new(e),
            )
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_logs {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    installed.map_err(|e| {
        BrokerError::config_with_source("Logging is already initialized", Box::new(e))
    })
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::BrokerConfig) {
    tracing::info!(
        db_plan_id = %config.db_plan_id,
        teardown_policy = %config.teardown_policy,
        log_level = %config.log_level,
        json_logs = %config.json_logs,
        "Broker configuration loaded"
    );
}
