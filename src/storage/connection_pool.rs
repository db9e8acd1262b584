//! Plan-keyed pool of shared backend connections
//!
//! Built once at startup from the plan catalog and never modified afterwards,
//! so lookups need no locking. Adapters borrow a [`PlanConnection`] for one
//! operation; only the pool owns the handles.

use crate::domain::plan::{BackendDescriptor, Plan};
use crate::errors::{BrokerError, Result};
use crate::storage::pool::{BackendConnector, BackendSession};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// A verified connection to the backend of one shared plan
pub struct PlanConnection {
    plan_id: String,
    descriptor: BackendDescriptor,
    session: Arc<dyn BackendSession>,
}

impl PlanConnection {
    pub fn new(
        plan_id: impl Into<String>,
        descriptor: BackendDescriptor,
        session: Arc<dyn BackendSession>,
    ) -> Self {
        Self { plan_id: plan_id.into(), descriptor, session }
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    pub fn session(&self) -> &dyn BackendSession {
        self.session.as_ref()
    }
}

impl fmt::Debug for PlanConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanConnection")
            .field("plan_id", &self.plan_id)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Immutable map from plan id to [`PlanConnection`]
#[derive(Debug, Clone, Default)]
pub struct ConnectionPool {
    connections: Arc<HashMap<String, Arc<PlanConnection>>>,
}

impl ConnectionPool {
    /// Open and verify one connection for every shared plan.
    ///
    /// Aborts on the first duplicated plan id, missing backend descriptor,
    /// failed connection or failed liveness check. Plans of other kinds are
    /// skipped.
    #[instrument(skip(plans, connector), fields(plan_count = plans.len()))]
    pub async fn initialize_from_plans(
        plans: &[Plan],
        connector: &dyn BackendConnector,
    ) -> Result<Self> {
        let mut connections: HashMap<String, Arc<PlanConnection>> = HashMap::new();

        for plan in plans.iter().filter(|plan| plan.is_shared()) {
            if connections.contains_key(&plan.id) {
                let err = BrokerError::config(format!(
                    "Unable to initialize plan id ({}) of plan name ({}). Already exists.",
                    plan.id, plan.name
                ));
                error!(plan_id = %plan.id, plan_name = %plan.name, "Duplicate shared plan id");
                return Err(err);
            }

            let descriptor = plan.backend.clone().ok_or_else(|| {
                BrokerError::config(format!(
                    "Shared plan '{}' ({}) has no backend connection parameters",
                    plan.name, plan.id
                ))
            })?;

            let session = connector.connect(&descriptor).await.map_err(|e| {
                error!(
                    plan_id = %plan.id,
                    plan_name = %plan.name,
                    error = %e,
                    "Cannot initialize connection to database for plan"
                );
                BrokerError::backend_unavailable_with_source(
                    &plan.id,
                    format!("connection to {} failed", descriptor.address()),
                    Box::new(e),
                )
            })?;

            session.ping().await.map_err(|e| {
                error!(plan_id = %plan.id, error = %e, "Unable to verify connection to database");
                BrokerError::backend_unavailable_with_source(&plan.id, "liveness check failed", e)
            })?;

            info!(
                plan_id = %plan.id,
                plan_name = %plan.name,
                address = %descriptor.address(),
                "Shared backend connection verified"
            );

            connections
                .insert(plan.id.clone(), Arc::new(PlanConnection::new(&plan.id, descriptor, session)));
        }

        Ok(Self { connections: Arc::new(connections) })
    }

    /// Connection for `plan_id`, or `BackendUnavailable` when the pool has none
    pub fn find_by_plan_id(&self, plan_id: &str) -> Result<Arc<PlanConnection>> {
        self.connections.get(plan_id).cloned().ok_or_else(|| {
            BrokerError::backend_unavailable(
                plan_id,
                format!("Unable to find shared connection with plan id: {}", plan_id),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn plan_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.connections.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
