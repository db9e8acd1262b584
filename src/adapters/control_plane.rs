//! Managed-database control plane seam
//!
//! Dedicated plans provision a separate managed database per instance. The
//! request is asynchronous: it is submitted, the instance sits in
//! `InProgress`, and reconciliation later polls for the endpoint.
//!
//! No control plane integration ships with the broker;
//! [`UnimplementedControlPlane`] reports `NotImplemented` for every call.

use crate::errors::{BrokerError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

/// Storage allocated to every managed instance, in GiB
pub const DEFAULT_ALLOCATED_STORAGE_GB: u32 = 10;

/// Parameters of a managed instance request
#[derive(Clone, PartialEq, Eq)]
pub struct ManagedInstanceRequest {
    pub identifier: String,
    pub instance_class: String,
    pub engine: String,
    pub master_username: String,
    pub master_password: String,
    pub allocated_storage_gb: u32,
    pub multi_az: bool,
    pub storage_encrypted: bool,
    pub tags: BTreeMap<String, String>,
}

impl fmt::Debug for ManagedInstanceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedInstanceRequest")
            .field("identifier", &self.identifier)
            .field("instance_class", &self.instance_class)
            .field("engine", &self.engine)
            .field("master_username", &self.master_username)
            .field("master_password", &"[REDACTED]")
            .field("allocated_storage_gb", &self.allocated_storage_gb)
            .field("multi_az", &self.multi_az)
            .field("storage_encrypted", &self.storage_encrypted)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Where a managed instance can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedEndpoint {
    pub host: String,
    pub port: u16,
}

/// Provisioning status reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningStatus {
    Pending,
    Available(ManagedEndpoint),
    Failed { reason: String },
}

/// External managed-database control plane
#[async_trait]
pub trait ManagedDatabaseControlPlane: Send + Sync + fmt::Debug {
    /// Submit a create request; returns once the request is accepted
    async fn submit_create(&self, request: &ManagedInstanceRequest) -> Result<()>;

    /// Status of a previously submitted instance
    async fn poll(&self, identifier: &str) -> Result<ProvisioningStatus>;

    /// Submit a delete request
    async fn submit_delete(&self, identifier: &str) -> Result<()>;
}

/// Control plane used when no managed-database integration is configured
#[derive(Debug, Clone, Default)]
pub struct UnimplementedControlPlane;

#[async_trait]
impl ManagedDatabaseControlPlane for UnimplementedControlPlane {
    async fn submit_create(&self, request: &ManagedInstanceRequest) -> Result<()> {
        tracing::warn!(
            identifier = %request.identifier,
            instance_class = %request.instance_class,
            "Dedicated instance requested but no control plane is configured"
        );
        Err(BrokerError::not_implemented("dedicated instance provisioning"))
    }

    async fn poll(&self, _identifier: &str) -> Result<ProvisioningStatus> {
        Err(BrokerError::not_implemented("dedicated instance status"))
    }

    async fn submit_delete(&self, _identifier: &str) -> Result<()> {
        Err(BrokerError::not_implemented("dedicated instance deletion"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ManagedInstanceRequest {
        ManagedInstanceRequest {
            identifier: "db1".to_string(),
            instance_class: "db.t2.micro".to_string(),
            engine: "postgres".to_string(),
            master_username: "u1".to_string(),
            master_password: "hunter2".to_string(),
            allocated_storage_gb: DEFAULT_ALLOCATED_STORAGE_GB,
            multi_az: true,
            storage_encrypted: true,
            tags: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_unimplemented_control_plane() {
        let control_plane = UnimplementedControlPlane;
        assert!(matches!(
            control_plane.submit_create(&request()).await,
            Err(BrokerError::NotImplemented { .. })
        ));
        assert!(control_plane.poll("db1").await.is_err());
        assert!(control_plane.submit_delete("db1").await.is_err());
    }

    #[test]
    fn test_request_debug_redacts_password() {
        assert!(!format!("{:?}", request()).contains("hunter2"));
    }
}
