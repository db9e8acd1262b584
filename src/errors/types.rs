//! # Error Types
//!
//! Error taxonomy for the instance broker using `thiserror`.

use std::fmt;

/// Boxed error used to carry underlying causes across backend seams
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Custom result type for broker operations
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Main error type for the instance broker
#[derive(thiserror::Error, Debug)]
pub enum BrokerError {
    /// Create requested for an id that already has a live record
    #[error("Instance '{instance_id}' already exists")]
    DuplicateInstance { instance_id: String },

    /// No persisted record for the given id
    #[error("Instance '{instance_id}' not found")]
    InstanceNotFound { instance_id: String },

    /// Plan id is not part of the catalog
    #[error("Plan '{plan_id}' not found")]
    PlanNotFound { plan_id: String },

    /// Unknown backend kind
    #[error("Adapter not found for backend kind '{kind}'")]
    AdapterNotFound { kind: String },

    /// Pool has no entry for the plan, or the backend failed its liveness check
    #[error("Backend unavailable for plan '{plan_id}': {reason}")]
    BackendUnavailable {
        plan_id: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A backend create statement failed
    #[error("Provisioning of instance '{instance_id}' failed at step '{step}'")]
    ProvisioningFailed {
        instance_id: String,
        step: String,
        #[source]
        source: BoxError,
    },

    /// Secret could not be encrypted
    #[error("Encryption failed: {message}")]
    EncryptionFailed { message: String },

    /// Secret could not be decrypted (key/salt mismatch or malformed ciphertext)
    #[error("Decryption failed: {message}")]
    DecryptionFailed { message: String },

    /// Capability exists in the contract but has no backing integration
    #[error("Not implemented: {operation}")]
    NotImplemented { operation: String },

    /// One or more drop statements failed
    #[error("Teardown of instance '{instance_id}' failed: {}", join_failures(.failures))]
    TeardownFailed { instance_id: String, failures: Vec<StatementFailure> },

    /// Operation observed a lifecycle state it cannot act on
    #[error("Instance '{instance_id}' cannot move from {current} to {requested}")]
    InvalidState { instance_id: String, current: String, requested: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },
}

/// A single backend statement that failed, identified by step name.
///
/// The statement text is never kept because it may embed a secret.
#[derive(Debug)]
pub struct StatementFailure {
    pub step: String,
    pub source: BoxError,
}

impl StatementFailure {
    pub fn new<S: Into<String>>(step: S, source: BoxError) -> Self {
        Self { step: step.into(), source }
    }
}

impl fmt::Display for StatementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.source)
    }
}

fn join_failures(failures: &[StatementFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl BrokerError {
    /// Create a duplicate instance error
    pub fn duplicate_instance<S: Into<String>>(instance_id: S) -> Self {
        Self::DuplicateInstance { instance_id: instance_id.into() }
    }

    /// Create an instance not found error
    pub fn instance_not_found<S: Into<String>>(instance_id: S) -> Self {
        Self::InstanceNotFound { instance_id: instance_id.into() }
    }

    /// Create a plan not found error
    pub fn plan_not_found<S: Into<String>>(plan_id: S) -> Self {
        Self::PlanNotFound { plan_id: plan_id.into() }
    }

    /// Create an adapter not found error
    pub fn adapter_not_found<S: Into<String>>(kind: S) -> Self {
        Self::AdapterNotFound { kind: kind.into() }
    }

    /// Create a backend unavailable error without an underlying cause
    pub fn backend_unavailable<P: Into<String>, R: Into<String>>(plan_id: P, reason: R) -> Self {
        Self::BackendUnavailable { plan_id: plan_id.into(), reason: reason.into(), source: None }
    }

    /// Create a backend unavailable error wrapping the cause
    pub fn backend_unavailable_with_source<P: Into<String>, R: Into<String>>(
        plan_id: P,
        reason: R,
        source: BoxError,
    ) -> Self {
        Self::BackendUnavailable {
            plan_id: plan_id.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Create a provisioning failure for the given step
    pub fn provisioning_failed<I: Into<String>, S: Into<String>>(
        instance_id: I,
        step: S,
        source: BoxError,
    ) -> Self {
        Self::ProvisioningFailed { instance_id: instance_id.into(), step: step.into(), source }
    }

    /// Create an encryption error
    pub fn encryption<S: Into<String>>(message: S) -> Self {
        Self::EncryptionFailed { message: message.into() }
    }

    /// Create a decryption error
    pub fn decryption<S: Into<String>>(message: S) -> Self {
        Self::DecryptionFailed { message: message.into() }
    }

    /// Create a not implemented error
    pub fn not_implemented<S: Into<String>>(operation: S) -> Self {
        Self::NotImplemented { operation: operation.into() }
    }

    /// Create a teardown failure from collected statement failures
    pub fn teardown_failed<S: Into<String>>(
        instance_id: S,
        failures: Vec<StatementFailure>,
    ) -> Self {
        Self::TeardownFailed { instance_id: instance_id.into(), failures }
    }

    /// Create an invalid state error
    pub fn invalid_state<I, C, R>(instance_id: I, current: C, requested: R) -> Self
    where
        I: Into<String>,
        C: fmt::Display,
        R: fmt::Display,
    {
        Self::InvalidState {
            instance_id: instance_id.into(),
            current: current.to_string(),
            requested: requested.to_string(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(message: S, source: BoxError) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a database error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    /// Short machine-readable name of the error kind, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateInstance { .. } => "duplicate_instance",
            Self::InstanceNotFound { .. } => "instance_not_found",
            Self::PlanNotFound { .. } => "plan_not_found",
            Self::AdapterNotFound { .. } => "adapter_not_found",
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::ProvisioningFailed { .. } => "provisioning_failed",
            Self::EncryptionFailed { .. } => "encryption_failed",
            Self::DecryptionFailed { .. } => "decryption_failed",
            Self::NotImplemented { .. } => "not_implemented",
            Self::TeardownFailed { .. } => "teardown_failed",
            Self::InvalidState { .. } => "invalid_state",
            Self::Config { .. } => "config",
            Self::Validation { .. } => "validation",
            Self::Database { .. } => "database",
        }
    }
}

// Error conversions for common external error types
impl From<sqlx::Error> for BrokerError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<config::ConfigError> for BrokerError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for BrokerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
