//! Business logic services
//!
//! Credential encryption, per-instance locking and the provisioning
//! orchestration that ties adapters to persistence.

pub mod credential_cipher;
pub mod instance_locks;
pub mod provisioning;

pub use credential_cipher::{CredentialCipher, Salt};
pub use instance_locks::{InstanceGuard, InstanceLocks};
pub use provisioning::{ProvisioningService, ReconcileSummary};
