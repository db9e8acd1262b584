//! Dedicated backend adapter
//!
//! Each instance gets its own managed database, requested from a
//! [`ManagedDatabaseControlPlane`]. Creation only submits the request and
//! leaves the instance `InProgress`; the endpoint is filled in when
//! reconciliation sees the instance become available.

use super::control_plane::{
    ManagedDatabaseControlPlane, ManagedInstanceRequest, ProvisioningStatus,
    DEFAULT_ALLOCATED_STORAGE_GB,
};
use super::{Adapter, TeardownReport};
use crate::domain::credentials::Credentials;
use crate::domain::instance::{InstanceRecord, InstanceState};
use crate::domain::plan::{AdapterKind, POSTGRES_DB_TYPE};
use crate::errors::{BrokerError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct DedicatedAdapter {
    instance_class: String,
    tags: BTreeMap<String, String>,
    control_plane: Arc<dyn ManagedDatabaseControlPlane>,
}

impl DedicatedAdapter {
    pub fn new(
        instance_class: impl Into<String>,
        tags: BTreeMap<String, String>,
        control_plane: Arc<dyn ManagedDatabaseControlPlane>,
    ) -> Self {
        Self { instance_class: instance_class.into(), tags, control_plane }
    }

    fn request_for(&self, instance: &InstanceRecord, secret: &str) -> ManagedInstanceRequest {
        let mut tags = self.tags.clone();
        tags.insert("instance_id".to_string(), instance.instance_id.clone());
        if let Some(org) = &instance.org_guid {
            tags.insert("organization_guid".to_string(), org.clone());
        }
        if let Some(space) = &instance.space_guid {
            tags.insert("space_guid".to_string(), space.clone());
        }

        ManagedInstanceRequest {
            identifier: instance.database.clone(),
            instance_class: self.instance_class.clone(),
            engine: POSTGRES_DB_TYPE.to_string(),
            master_username: instance.username.clone(),
            master_password: secret.to_string(),
            allocated_storage_gb: DEFAULT_ALLOCATED_STORAGE_GB,
            multi_az: true,
            storage_encrypted: true,
            tags,
        }
    }
}

#[async_trait]
impl Adapter for DedicatedAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Dedicated
    }

    #[instrument(
        skip(self, instance, secret),
        fields(instance_id = %instance.instance_id, instance_class = %self.instance_class)
    )]
    async fn create_db(&self, instance: &InstanceRecord, secret: &str) -> Result<InstanceState> {
        let request = self.request_for(instance, secret);
        self.control_plane.submit_create(&request).await?;

        info!(identifier = %request.identifier, "Dedicated instance requested");
        Ok(InstanceState::InProgress)
    }

    async fn bind_db_to_app(&self, instance: &InstanceRecord, secret: &str) -> Result<Credentials> {
        instance.ensure_state(InstanceState::Ready, InstanceState::Ready)?;

        match (&instance.host, instance.port) {
            (Some(host), Some(port)) => {
                Credentials::postgres(&instance.username, secret, host, port, &instance.database)
            }
            _ => Err(BrokerError::backend_unavailable(
                &instance.plan_id,
                format!("Dedicated instance '{}' has no endpoint yet", instance.instance_id),
            )),
        }
    }

    #[instrument(skip(self, instance), fields(instance_id = %instance.instance_id))]
    async fn delete_db(&self, instance: &InstanceRecord) -> Result<TeardownReport> {
        self.control_plane.submit_delete(&instance.database).await?;

        let mut report = TeardownReport::new(&instance.instance_id);
        report.attempted.push("delete_instance".to_string());
        Ok(report)
    }

    async fn poll_status(&self, instance: &InstanceRecord) -> Result<ProvisioningStatus> {
        self.control_plane.poll(&instance.database).await
    }
}
