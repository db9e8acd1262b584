//! Instance domain types
//!
//! An instance is a logical database plus its access principal, created on
//! behalf of a caller under a plan. The record carries the instance's
//! encrypted secret and its lifecycle state.

use crate::domain::plan::{AdapterKind, BackendDescriptor, Plan};
use crate::errors::{BrokerError, Result};
use crate::services::credential_cipher::{CredentialCipher, Salt};
use crate::utils::{random_identifier, validate_identifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of an instance.
///
/// ```text
/// NotCreated ──► InProgress ──► Ready ──► Gone
///      └────────────────────────►┘
/// ```
///
/// `NotCreated` is never persisted and `Gone` is never stored either: reaching
/// it removes the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    NotCreated,
    InProgress,
    Ready,
    Gone,
}

impl InstanceState {
    /// Get the database representation of this state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotCreated => "not_created",
            Self::InProgress => "in_progress",
            Self::Ready => "ready",
            Self::Gone => "gone",
        }
    }

    pub fn can_transition_to(&self, next: InstanceState) -> bool {
        matches!(
            (self, next),
            (Self::NotCreated, Self::InProgress)
                | (Self::NotCreated, Self::Ready)
                | (Self::InProgress, Self::Ready)
                | (Self::Ready, Self::Gone)
        )
    }

    /// Whether a record in this state may be written to storage
    pub fn is_persistable(&self) -> bool {
        matches!(self, Self::InProgress | Self::Ready)
    }
}

impl FromStr for InstanceState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "not_created" => Ok(Self::NotCreated),
            "in_progress" => Ok(Self::InProgress),
            "ready" => Ok(Self::Ready),
            "gone" => Ok(Self::Gone),
            _ => Err(format!("Unknown instance state: {}", s)),
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller-supplied data for a new instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInstance {
    /// Globally unique external identifier
    pub instance_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub org_guid: Option<String>,
    #[serde(default)]
    pub space_guid: Option<String>,
    /// Database name; generated as `db` + random suffix when absent
    #[serde(default)]
    pub database: Option<String>,
    /// Principal name; generated as `u` + random suffix when absent
    #[serde(default)]
    pub username: Option<String>,
}

impl NewInstance {
    pub fn new(instance_id: impl Into<String>, plan_id: impl Into<String>) -> Self {
        Self { instance_id: instance_id.into(), plan_id: plan_id.into(), ..Default::default() }
    }

    pub fn with_org(mut self, org_guid: impl Into<String>, space_guid: impl Into<String>) -> Self {
        self.org_guid = Some(org_guid.into());
        self.space_guid = Some(space_guid.into());
        self
    }

    pub fn with_identity(mut self, database: impl Into<String>, username: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self.username = Some(username.into());
        self
    }
}

/// Flat persisted form of an [`InstanceRecord`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredInstance {
    pub instance_id: String,
    pub database: String,
    pub username: String,
    pub encrypted_secret: Option<String>,
    pub salt: String,
    pub plan_id: String,
    pub adapter: String,
    pub state: InstanceState,
    pub org_guid: Option<String>,
    pub space_guid: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A provisioned (or provisioning) instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub instance_id: String,
    pub database: String,
    pub username: String,
    encrypted_secret: Option<String>,
    salt: String,
    pub plan_id: String,
    pub adapter: String,
    state: InstanceState,
    pub org_guid: Option<String>,
    pub space_guid: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstanceRecord {
    /// Build a fresh `NotCreated` record for `plan`.
    ///
    /// The salt is generated here and nowhere else.
    pub fn new(request: NewInstance, plan: &Plan, cipher: &CredentialCipher) -> Result<Self> {
        if request.instance_id.trim().is_empty() {
            return Err(BrokerError::validation_field(
                "Instance id cannot be empty",
                "instance_id",
            ));
        }

        let kind: AdapterKind =
            plan.adapter_kind().map_err(|_| BrokerError::adapter_not_found(&plan.adapter))?;

        let database = request.database.unwrap_or_else(|| random_identifier("db"));
        let username = request.username.unwrap_or_else(|| random_identifier("u"));
        validate_identifier(&database, "database")?;
        validate_identifier(&username, "username")?;

        let salt = cipher.generate_salt()?;
        let now = Utc::now();

        let mut record = Self {
            instance_id: request.instance_id,
            database,
            username,
            encrypted_secret: None,
            salt: salt.to_base64(),
            plan_id: plan.id.clone(),
            adapter: kind.as_str().to_string(),
            state: InstanceState::NotCreated,
            org_guid: request.org_guid,
            space_guid: request.space_guid,
            host: None,
            port: None,
            db_type: None,
            created_at: now,
            updated_at: now,
        };

        if let Some(backend) = &plan.backend {
            record.set_endpoint(backend);
        }

        Ok(record)
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn salt(&self) -> Result<Salt> {
        Salt::from_base64(&self.salt)
    }

    pub fn salt_base64(&self) -> &str {
        &self.salt
    }

    pub fn encrypted_secret(&self) -> Option<&str> {
        self.encrypted_secret.as_deref()
    }

    pub fn adapter_kind(&self) -> Result<AdapterKind> {
        self.adapter.parse().map_err(|_| BrokerError::adapter_not_found(&self.adapter))
    }

    /// Encrypt and store the instance secret.
    ///
    /// The salt is also the nonce, so a secret can only be set once per record.
    pub fn set_secret(&mut self, plaintext: &str, cipher: &CredentialCipher) -> Result<()> {
        if self.encrypted_secret.is_some() {
            return Err(BrokerError::validation_field(
                format!("Secret for instance '{}' is already set", self.instance_id),
                "password",
            ));
        }
        let salt = self.salt()?;
        self.encrypted_secret = Some(cipher.encrypt(plaintext, &salt)?);
        Ok(())
    }

    /// Decrypt the stored secret
    pub fn secret(&self, cipher: &CredentialCipher) -> Result<String> {
        let ciphertext = self.encrypted_secret.as_deref().ok_or_else(|| {
            BrokerError::decryption(format!(
                "Instance '{}' has no stored secret",
                self.instance_id
            ))
        })?;
        cipher.decrypt(ciphertext, &self.salt()?)
    }

    /// Move to `next`, failing on any transition the lifecycle does not allow
    pub fn transition_to(&mut self, next: InstanceState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(BrokerError::invalid_state(&self.instance_id, self.state, next));
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Fail unless the record is currently in `expected`
    pub fn ensure_state(&self, expected: InstanceState, requested: InstanceState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BrokerError::invalid_state(&self.instance_id, self.state, requested))
        }
    }

    /// Record where the instance is reachable
    pub fn set_endpoint(&mut self, backend: &BackendDescriptor) {
        self.set_address(&backend.host, backend.port, &backend.db_type);
    }

    pub fn set_address(&mut self, host: &str, port: u16, db_type: &str) {
        self.host = Some(host.to_string());
        self.port = Some(port);
        self.db_type = Some(db_type.to_string());
        self.updated_at = Utc::now();
    }

    pub fn to_stored(&self) -> StoredInstance {
        StoredInstance {
            instance_id: self.instance_id.clone(),
            database: self.database.clone(),
            username: self.username.clone(),
            encrypted_secret: self.encrypted_secret.clone(),
            salt: self.salt.clone(),
            plan_id: self.plan_id.clone(),
            adapter: self.adapter.clone(),
            state: self.state,
            org_guid: self.org_guid.clone(),
            space_guid: self.space_guid.clone(),
            host: self.host.clone(),
            port: self.port,
            db_type: self.db_type.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<StoredInstance> for InstanceRecord {
    fn from(stored: StoredInstance) -> Self {
        Self {
            instance_id: stored.instance_id,
            database: stored.database,
            username: stored.username,
            encrypted_secret: stored.encrypted_secret,
            salt: stored.salt,
            plan_id: stored.plan_id,
            adapter: stored.adapter,
            state: stored.state,
            org_guid: stored.org_guid,
            space_guid: stored.space_guid,
            host: stored.host,
            port: stored.port,
            db_type: stored.db_type,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}
