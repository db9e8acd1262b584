//! # Backend Connection Management
//!
//! Opens sqlx Postgres pools for backend descriptors and exposes them to the
//! rest of the broker through the [`BackendSession`] seam.

use crate::domain::plan::{BackendDescriptor, SslMode, POSTGRES_DB_TYPE};
use crate::errors::{BoxError, BrokerError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{ConnectOptions, PgPool, Postgres};
use std::sync::Arc;
use std::time::Duration;

/// Type alias for the database connection pool
pub type DbPool = sqlx::Pool<Postgres>;

/// Connections per backend pool
pub const BACKEND_MAX_CONNECTIONS: u32 = 10;

const BACKEND_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// An open handle to one physical backend.
///
/// Statements run with the backend's administrative principal. Errors are
/// returned boxed so callers can wrap them with their own context.
#[async_trait]
pub trait BackendSession: Send + Sync + std::fmt::Debug {
    /// Execute a single statement that returns no rows
    async fn execute(&self, statement: &str) -> std::result::Result<(), BoxError>;

    /// Liveness check
    async fn ping(&self) -> std::result::Result<(), BoxError>;

    /// The underlying Postgres pool, for sessions backed by one
    fn pg_pool(&self) -> Option<&PgPool> {
        None
    }
}

/// Opens [`BackendSession`]s for descriptors
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, descriptor: &BackendDescriptor) -> Result<Arc<dyn BackendSession>>;
}

/// Postgres session over an sqlx pool
#[derive(Debug, Clone)]
pub struct PgBackendSession {
    pool: PgPool,
}

impl PgBackendSession {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BackendSession for PgBackendSession {
    async fn execute(&self, statement: &str) -> std::result::Result<(), BoxError> {
        // Simple-query protocol: CREATE/DROP DATABASE cannot be prepared
        sqlx::raw_sql(statement).execute(&self.pool).await?;
        Ok(())
    }

    async fn ping(&self) -> std::result::Result<(), BoxError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn pg_pool(&self) -> Option<&PgPool> {
        Some(&self.pool)
    }
}

/// Connector producing [`PgBackendSession`]s
#[derive(Debug, Clone, Default)]
pub struct PgConnector;

#[async_trait]
impl BackendConnector for PgConnector {
    async fn connect(&self, descriptor: &BackendDescriptor) -> Result<Arc<dyn BackendSession>> {
        let pool = create_backend_pool(descriptor).await?;
        Ok(Arc::new(PgBackendSession::new(pool)))
    }
}

/// Create a connection pool for a backend descriptor
pub async fn create_backend_pool(descriptor: &BackendDescriptor) -> Result<DbPool> {
    validate_descriptor(descriptor)?;

    let connect_options = PgConnectOptions::new()
        .host(&descriptor.host)
        .port(descriptor.port)
        .username(&descriptor.username)
        .password(&descriptor.password)
        .database(&descriptor.db_name)
        .ssl_mode(pg_ssl_mode(descriptor.ssl_mode))
        // CREATE USER statements carry plaintext passwords
        .disable_statement_logging();

    let pool = PgPoolOptions::new()
        .max_connections(BACKEND_MAX_CONNECTIONS)
        .acquire_timeout(BACKEND_ACQUIRE_TIMEOUT)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                address = %descriptor.address(),
                "Failed to create backend pool"
            );
            BrokerError::database(
                e,
                format!("Failed to connect to backend: {}", descriptor.address()),
            )
        })?;

    tracing::info!(
        address = %descriptor.address(),
        ssl_mode = %descriptor.ssl_mode,
        max_connections = BACKEND_MAX_CONNECTIONS,
        "Backend connection pool created"
    );

    Ok(pool)
}

fn pg_ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Require => PgSslMode::Require,
        SslMode::VerifyCa => PgSslMode::VerifyCa,
        SslMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

/// Validate backend descriptor
fn validate_descriptor(descriptor: &BackendDescriptor) -> Result<()> {
    if descriptor.db_type != POSTGRES_DB_TYPE {
        return Err(BrokerError::validation_field(
            format!("Cannot connect. Unsupported DB type: ({})", descriptor.db_type),
            "db_type",
        ));
    }

    if descriptor.host.is_empty() {
        return Err(BrokerError::validation_field("backend host cannot be empty", "host"));
    }

    if descriptor.db_name.is_empty() {
        return Err(BrokerError::validation_field("backend database cannot be empty", "db_name"));
    }

    Ok(())
}
