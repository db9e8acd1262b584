//! Adapter selection
//!
//! Maps a plan to the adapter that serves it. Shared adapters borrow the
//! plan's connection from the [`ConnectionPool`]; dedicated adapters share
//! the configured control plane.

use super::control_plane::{ManagedDatabaseControlPlane, UnimplementedControlPlane};
use super::{Adapter, DedicatedAdapter, SharedAdapter};
use crate::domain::catalog::PlanCatalog;
use crate::domain::instance::InstanceRecord;
use crate::domain::plan::{AdapterKind, Plan};
use crate::errors::{BrokerError, Result};
use crate::storage::ConnectionPool;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AdapterFactory {
    pool: ConnectionPool,
    control_plane: Arc<dyn ManagedDatabaseControlPlane>,
    instance_tags: BTreeMap<String, String>,
}

impl AdapterFactory {
    /// Factory without a managed-database integration
    pub fn new(pool: ConnectionPool) -> Self {
        Self::with_control_plane(pool, Arc::new(UnimplementedControlPlane))
    }

    pub fn with_control_plane(
        pool: ConnectionPool,
        control_plane: Arc<dyn ManagedDatabaseControlPlane>,
    ) -> Self {
        Self { pool, control_plane, instance_tags: BTreeMap::new() }
    }

    /// Tags applied to every dedicated instance; plan tags take precedence
    pub fn with_instance_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.instance_tags = tags;
        self
    }

    /// Adapter for instances created under `plan`
    pub fn create_adapter(&self, plan: &Plan) -> Result<Box<dyn Adapter>> {
        let kind = plan.adapter_kind().map_err(|_| BrokerError::adapter_not_found(&plan.adapter))?;

        match kind {
            AdapterKind::Shared => {
                let connection = self.pool.find_by_plan_id(&plan.id)?;
                Ok(Box::new(SharedAdapter::new(connection)))
            }
            AdapterKind::Dedicated => {
                let instance_class = plan.instance_class.clone().ok_or_else(|| {
                    BrokerError::config(format!(
                        "Dedicated plan '{}' ({}) has no instance class",
                        plan.name, plan.id
                    ))
                })?;

                let mut tags = self.instance_tags.clone();
                tags.extend(plan.tags.iter().map(|(k, v)| (k.clone(), v.clone())));

                Ok(Box::new(DedicatedAdapter::new(
                    instance_class,
                    tags,
                    Arc::clone(&self.control_plane),
                )))
            }
        }
    }

    /// Adapter for an existing instance, resolved through its plan
    pub fn adapter_for_instance(
        &self,
        instance: &InstanceRecord,
        catalog: &PlanCatalog,
    ) -> Result<Box<dyn Adapter>> {
        let plan = catalog.find_plan(&instance.plan_id)?;
        self.create_adapter(plan)
    }
}
