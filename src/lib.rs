//! # Instance Broker
//!
//! Provisions, binds and deprovisions logical database instances on behalf of
//! callers. Each instance is a database plus an access principal whose
//! password is stored encrypted under a process-wide master key.
//!
//! ## Architecture
//!
//! ```text
//! ProvisioningService ──► AdapterFactory ──► Adapter (shared | dedicated)
//!        │                                      │
//!        ├─► CredentialCipher                   ├─► ConnectionPool ──► backend
//!        ├─► InstanceLocks                      └─► control plane (dedicated)
//!        └─► InstanceRepository
//! ```
//!
//! ## Core Components
//!
//! - **Domain**: plans, the plan catalog, instance records and their lifecycle
//! - **Adapters**: backend operations per plan kind
//! - **Services**: credential encryption, per-instance locking, orchestration
//! - **Storage**: backend connections and instance persistence (SQLx, Postgres)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use instance_broker::{startup, BrokerConfig, NewInstance, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = BrokerConfig::from_env()?;
//!     let service = startup::bootstrap(&config).await?;
//!     let record = service
//!         .create_instance(NewInstance::new("abc", "44d24fc7-f7a4-4ac1-b7a0-de82836e89a3"), "S3cret!")
//!         .await?;
//!     let credentials = service.bind_instance(&record.instance_id).await?;
//!     println!("{}", credentials.uri);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod services;
pub mod startup;
pub mod storage;
pub mod utils;

// Re-export commonly used types and traits
pub use adapters::{Adapter, AdapterFactory, TeardownPolicy};
pub use config::BrokerConfig;
pub use domain::{Credentials, InstanceRecord, InstanceState, NewInstance, Plan, PlanCatalog};
pub use errors::{BrokerError, Result};
pub use services::{CredentialCipher, ProvisioningService};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
