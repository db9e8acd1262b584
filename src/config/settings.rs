//! # Configuration Settings
//!
//! Defines the broker's process configuration, read from `BROKER_*`
//! environment variables.

use crate::adapters::TeardownPolicy;
use crate::errors::{BrokerError, Result};
use crate::services::credential_cipher::CredentialCipher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::Validate;

/// Environment variable prefix for broker settings
pub const ENV_PREFIX: &str = "BROKER";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main broker configuration
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct BrokerConfig {
    /// Base64 encoded 32-byte master key for credential encryption
    #[validate(length(min = 1, message = "Encryption key cannot be empty"))]
    pub encryption_key: String,

    /// Shared plan whose backend hosts the broker's own instance table
    #[validate(length(min = 1, message = "Broker database plan id cannot be empty"))]
    pub db_plan_id: String,

    /// What happens to the record when teardown statements fail
    #[serde(default)]
    pub teardown_policy: TeardownPolicy,

    /// JSON object of tags applied to every dedicated instance
    #[serde(default)]
    pub instance_tags: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    #[serde(default)]
    pub json_logs: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("encryption_key", &"[REDACTED]")
            .field("db_plan_id", &self.db_plan_id)
            .field("teardown_policy", &self.teardown_policy)
            .field("instance_tags", &self.instance_tags)
            .field("log_level", &self.log_level)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

impl BrokerConfig {
    /// Load from the process environment.
    ///
    /// A `.env` file is honoured when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(None)
    }

    /// Load from an explicit variable map instead of the process environment
    pub fn from_source(source: Option<config::Map<String, String>>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX).try_parsing(true).source(source),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(BrokerError::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(BrokerError::validation_field(
                format!("Unknown log level '{}'", self.log_level),
                "log_level",
            ));
        }

        self.cipher()?;
        self.instance_tags()?;
        Ok(())
    }

    /// Cipher keyed with the configured master key
    pub fn cipher(&self) -> Result<CredentialCipher> {
        CredentialCipher::from_base64(&self.encryption_key)
    }

    pub fn instance_tags(&self) -> Result<BTreeMap<String, String>> {
        match self.instance_tags.as_deref().map(str::trim) {
            None | Some("") => Ok(BTreeMap::new()),
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                BrokerError::validation_field(
                    format!("Instance tags must be a JSON object of strings: {}", e),
                    "instance_tags",
                )
            }),
        }
    }

    pub fn observability(&self) -> ObservabilityConfig {
        ObservabilityConfig { log_level: self.log_level.to_lowercase(), json_logs: self.json_logs }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: default_log_level(), json_logs: false }
    }
}
