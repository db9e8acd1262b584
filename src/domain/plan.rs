//! Plan domain types
//!
//! A plan is a provisioning profile: it selects the backend kind that serves
//! instances created under it and, for shared plans, the physical backend
//! those instances live on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Database engine served by a backend. Only Postgres is supported.
pub const POSTGRES_DB_TYPE: &str = "postgres";

/// Default port for Postgres backends
pub const DEFAULT_BACKEND_PORT: u16 = 5432;

/// Backend kind a plan provisions against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// One physical server hosting many logical databases
    Shared,
    /// A separately provisioned managed database per instance
    Dedicated,
}

impl AdapterKind {
    /// Get the database representation of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Dedicated => "dedicated",
        }
    }
}

impl FromStr for AdapterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared" => Ok(Self::Shared),
            "dedicated" => Ok(Self::Dedicated),
            _ => Err(format!("Unknown adapter kind: {}", s)),
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transport-security mode for backend connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Require,
    #[default]
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disable" => Ok(Self::Disable),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            _ => Err(format!("Unknown SSL mode: {}", s)),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Physical backend a shared plan routes to
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub db_type: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub db_name: String,
    #[serde(default)]
    pub ssl_mode: SslMode,
}

impl BackendDescriptor {
    /// Descriptor for a Postgres backend with the default SSL mode
    pub fn postgres(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        db_name: impl Into<String>,
    ) -> Self {
        Self {
            db_type: POSTGRES_DB_TYPE.to_string(),
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            db_name: db_name.into(),
            ssl_mode: SslMode::default(),
        }
    }

    pub fn with_ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.ssl_mode = ssl_mode;
        self
    }

    /// `host:port/db_name`, safe to log
    pub fn address(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.db_name)
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("db_name", &self.db_name)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// A provisioning plan as supplied by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Backend kind as configured; parsed by the adapter factory
    pub adapter: String,
    /// Managed instance class for dedicated plans (e.g. `db.t2.micro`)
    #[serde(default)]
    pub instance_class: Option<String>,
    /// Connection parameters for shared plans
    #[serde(default)]
    pub backend: Option<BackendDescriptor>,
    /// Tags forwarded to dedicated provisioning requests
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Plan {
    /// Create a shared plan routed to the given backend
    pub fn shared(
        id: impl Into<String>,
        name: impl Into<String>,
        backend: Option<BackendDescriptor>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            adapter: AdapterKind::Shared.as_str().to_string(),
            instance_class: None,
            backend,
            tags: BTreeMap::new(),
        }
    }

    /// Create a dedicated plan provisioning the given instance class
    pub fn dedicated(
        id: impl Into<String>,
        name: impl Into<String>,
        instance_class: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            adapter: AdapterKind::Dedicated.as_str().to_string(),
            instance_class: Some(instance_class.into()),
            backend: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Parsed backend kind, or the raw string when it is not a known kind
    pub fn adapter_kind(&self) -> Result<AdapterKind, String> {
        self.adapter.parse()
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.adapter_kind(), Ok(AdapterKind::Shared))
    }

    /// Environment variable prefix for this plan's backend parameters.
    ///
    /// `shared-psql` becomes `SHARED_PSQL`.
    pub fn env_prefix(&self) -> String {
        self.name.to_uppercase().replace('-', "_")
    }
}
