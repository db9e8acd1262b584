//! Shared backend adapter
//!
//! Instances are logical databases on one pooled server. Create and delete
//! run DDL on the plan's [`PlanConnection`]; binding is a pure lookup.

use super::{Adapter, ProvisioningStatus, TeardownReport};
use crate::domain::credentials::Credentials;
use crate::domain::instance::{InstanceRecord, InstanceState};
use crate::domain::plan::AdapterKind;
use crate::errors::{BrokerError, Result, StatementFailure};
use crate::storage::PlanConnection;
use crate::utils::{quote_literal, validate_identifier};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct SharedAdapter {
    connection: Arc<PlanConnection>,
}

impl SharedAdapter {
    pub fn new(connection: Arc<PlanConnection>) -> Self {
        Self { connection }
    }

    fn validate_names(instance: &InstanceRecord) -> Result<()> {
        validate_identifier(&instance.database, "database")?;
        validate_identifier(&instance.username, "username")
    }
}

#[async_trait]
impl Adapter for SharedAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Shared
    }

    #[instrument(
        skip(self, instance, secret),
        fields(instance_id = %instance.instance_id, plan_id = %self.connection.plan_id())
    )]
    async fn create_db(&self, instance: &InstanceRecord, secret: &str) -> Result<InstanceState> {
        Self::validate_names(instance)?;

        let steps = [
            ("create_database", format!("CREATE DATABASE {}", instance.database)),
            (
                "create_role",
                format!("CREATE USER {} WITH PASSWORD {}", instance.username, quote_literal(secret)),
            ),
            (
                "grant_privileges",
                format!(
                    "GRANT ALL PRIVILEGES ON DATABASE {} TO {}",
                    instance.database, instance.username
                ),
            ),
        ];

        for (step, statement) in &steps {
            self.connection.session().execute(statement).await.map_err(|e| {
                warn!(step = %step, error = %e, "Shared provisioning statement failed");
                BrokerError::provisioning_failed(&instance.instance_id, *step, e)
            })?;
            debug!(step = %step, "Shared provisioning statement succeeded");
        }

        info!(database = %instance.database, "Shared database created");
        Ok(InstanceState::Ready)
    }

    async fn bind_db_to_app(&self, instance: &InstanceRecord, secret: &str) -> Result<Credentials> {
        let backend = self.connection.descriptor();
        Credentials::postgres(
            &instance.username,
            secret,
            &backend.host,
            backend.port,
            &instance.database,
        )
    }

    #[instrument(
        skip(self, instance),
        fields(instance_id = %instance.instance_id, plan_id = %self.connection.plan_id())
    )]
    async fn delete_db(&self, instance: &InstanceRecord) -> Result<TeardownReport> {
        Self::validate_names(instance)?;

        let steps = [
            ("drop_database", format!("DROP DATABASE {}", instance.database)),
            ("drop_role", format!("DROP USER {}", instance.username)),
        ];

        let mut report = TeardownReport::new(&instance.instance_id);
        for (step, statement) in steps {
            report.attempted.push(step.to_string());
            if let Err(e) = self.connection.session().execute(&statement).await {
                warn!(step = %step, error = %e, "Shared teardown statement failed");
                report.failures.push(StatementFailure::new(step, e));
            }
        }

        Ok(report)
    }

    async fn poll_status(&self, instance: &InstanceRecord) -> Result<ProvisioningStatus> {
        // Shared instances are created synchronously and never wait on reconciliation
        Err(BrokerError::invalid_state(&instance.instance_id, instance.state(), "reconciled"))
    }
}
