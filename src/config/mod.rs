//! # Configuration Management
//!
//! Process settings come from `BROKER_*` variables ([`BrokerConfig`]); backend
//! connection parameters for shared plans come from per-plan variables
//! ([`attach_backends_from_env`]).

pub mod plans;
pub mod settings;

pub use plans::{attach_backends, attach_backends_from_env};
pub use settings::{BrokerConfig, ObservabilityConfig, ENV_PREFIX};
