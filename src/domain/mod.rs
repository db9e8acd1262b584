//! Domain layer
//!
//! Plans, instance records and their lifecycle, and the credential map handed
//! to binding callers. Nothing here performs I/O.
//!
//! ## Module Organization
//!
//! - `plan`: plans, backend kinds and backend descriptors
//! - `catalog`: the immutable plan catalog
//! - `instance`: instance records and the lifecycle state machine
//! - `credentials`: binding credentials

pub mod catalog;
pub mod credentials;
pub mod instance;
pub mod plan;

pub use catalog::PlanCatalog;
pub use credentials::Credentials;
pub use instance::{InstanceRecord, InstanceState, NewInstance, StoredInstance};
pub use plan::{AdapterKind, BackendDescriptor, Plan, SslMode};
