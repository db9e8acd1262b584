//! # Storage and Persistence
//!
//! Backend connections for shared plans, the plan-keyed connection pool, and
//! persistence of instance records.

pub mod connection_pool;
pub mod migrations;
pub mod pool;
pub mod repositories;

pub use connection_pool::{ConnectionPool, PlanConnection};
pub use migrations::run_migrations;
pub use pool::{
    create_backend_pool, BackendConnector, BackendSession, DbPool, PgBackendSession, PgConnector,
};
pub use repositories::{InMemoryInstanceRepository, InstanceRepository, SqlxInstanceRepository};
