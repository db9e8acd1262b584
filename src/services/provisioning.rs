//! Instance provisioning service
//!
//! Orchestrates the instance lifecycle: plan lookup, adapter selection,
//! credential encryption, backend calls and persistence. Every operation on
//! an instance id holds that id's lock for its whole duration, so two
//! requests for the same id never interleave.

use crate::adapters::{AdapterFactory, ProvisioningStatus, TeardownPolicy};
use crate::domain::catalog::PlanCatalog;
use crate::domain::credentials::Credentials;
use crate::domain::instance::{InstanceRecord, InstanceState, NewInstance};
use crate::domain::plan::POSTGRES_DB_TYPE;
use crate::errors::{BrokerError, Result};
use crate::observability::MetricsRecorder;
use crate::provision_span;
use crate::services::credential_cipher::CredentialCipher;
use crate::services::instance_locks::InstanceLocks;
use crate::storage::InstanceRepository;
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Instrument, Span};

/// Result of a reconciliation sweep over `InProgress` instances
#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub ready: Vec<String>,
    pub pending: Vec<String>,
    pub failed: Vec<(String, BrokerError)>,
}

/// Service for managing instance lifecycles
pub struct ProvisioningService {
    catalog: Arc<PlanCatalog>,
    factory: AdapterFactory,
    repository: Arc<dyn InstanceRepository>,
    cipher: CredentialCipher,
    locks: InstanceLocks,
    teardown_policy: TeardownPolicy,
    metrics: MetricsRecorder,
}

impl ProvisioningService {
    pub fn new(
        catalog: Arc<PlanCatalog>,
        factory: AdapterFactory,
        repository: Arc<dyn InstanceRepository>,
        cipher: CredentialCipher,
    ) -> Self {
        Self {
            catalog,
            factory,
            repository,
            cipher,
            locks: InstanceLocks::new(),
            teardown_policy: TeardownPolicy::default(),
            metrics: MetricsRecorder::new(),
        }
    }

    pub fn with_teardown_policy(mut self, policy: TeardownPolicy) -> Self {
        self.teardown_policy = policy;
        self
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn teardown_policy(&self) -> TeardownPolicy {
        self.teardown_policy
    }

    /// Create an instance under `request.plan_id` using `secret` as the
    /// principal's password.
    ///
    /// Returns the persisted record, in `Ready` or `InProgress`. Nothing is
    /// persisted when the backend fails, and a taken id is rejected before
    /// the backend is touched.
    pub async fn create_instance(&self, request: NewInstance, secret: &str) -> Result<InstanceRecord> {
        let span = provision_span!("create", request.instance_id);
        let result = self.create_locked(request, secret).instrument(span).await;
        if let Err(e) = &result {
            self.metrics.record_failure("create", e.kind());
        }
        result
    }

    async fn create_locked(&self, request: NewInstance, secret: &str) -> Result<InstanceRecord> {
        if secret.is_empty() {
            return Err(BrokerError::validation_field("Password cannot be empty", "password"));
        }

        let _guard = self.locks.acquire(&request.instance_id).await;

        if self.repository.find(&request.instance_id).await?.is_some() {
            warn!("Instance already exists");
            return Err(BrokerError::duplicate_instance(&request.instance_id));
        }

        let plan = self.catalog.find_plan(&request.plan_id)?;
        let adapter = self.factory.create_adapter(plan)?;
        Span::current().record("plan_id", plan.id.as_str());
        Span::current().record("adapter", adapter.kind().as_str());

        let mut record = InstanceRecord::new(request, plan, &self.cipher)?;
        record.set_secret(secret, &self.cipher)?;

        let state = adapter.create_db(&record, secret).await.map_err(|e| {
            error!(error = %e, "Backend provisioning failed; instance not created");
            e
        })?;
        record.transition_to(state)?;

        if let Err(e) = self.repository.insert(&record).await {
            error!(error = %e, "Failed to persist instance; rolling back backend objects");
            match adapter.delete_db(&record).await {
                Ok(report) if !report.is_clean() => {
                    warn!(failures = report.failures.len(), "Rollback left backend objects behind")
                }
                Err(rollback) => warn!(error = %rollback, "Rollback could not be attempted"),
                Ok(_) => {}
            }
            return Err(e);
        }

        self.metrics.record_instance_created(&record.adapter, state.as_str());
        info!(
            database = %record.database,
            username = %record.username,
            state = %state,
            "Instance created"
        );
        Ok(record)
    }

    /// Credentials for binding an application to a `Ready` instance
    #[instrument(skip(self), fields(operation = "bind"))]
    pub async fn bind_instance(&self, instance_id: &str) -> Result<Credentials> {
        let result = self.bind_locked(instance_id).await;
        if let Err(e) = &result {
            self.metrics.record_failure("bind", e.kind());
        }
        result
    }

    async fn bind_locked(&self, instance_id: &str) -> Result<Credentials> {
        let _guard = self.locks.acquire(instance_id).await;
        let record = self.load(instance_id).await?;

        if record.state() != InstanceState::Ready {
            return Err(BrokerError::invalid_state(instance_id, record.state(), "bound"));
        }

        let adapter = self.factory.adapter_for_instance(&record, &self.catalog)?;
        let secret = record.secret(&self.cipher)?;
        let credentials = adapter.bind_db_to_app(&record, &secret).await?;

        self.metrics.record_binding(&record.adapter);
        info!(plan_id = %record.plan_id, "Instance bound");
        Ok(credentials)
    }

    /// Tear down a `Ready` instance and remove its record.
    ///
    /// Drop-statement failures are logged and, under
    /// [`TeardownPolicy::Strict`], keep the record and fail with
    /// `TeardownFailed`.
    pub async fn delete_instance(&self, instance_id: &str) -> Result<InstanceState> {
        let span = provision_span!("delete", instance_id, policy = %self.teardown_policy);
        let result = self.delete_locked(instance_id).instrument(span).await;
        if let Err(e) = &result {
            self.metrics.record_failure("delete", e.kind());
        }
        result
    }

    async fn delete_locked(&self, instance_id: &str) -> Result<InstanceState> {
        let _guard = self.locks.acquire(instance_id).await;
        let mut record = self.load(instance_id).await?;
        Span::current().record("plan_id", record.plan_id.as_str());
        Span::current().record("adapter", record.adapter.as_str());

        if !record.state().can_transition_to(InstanceState::Gone) {
            return Err(BrokerError::invalid_state(instance_id, record.state(), InstanceState::Gone));
        }

        let adapter = self.factory.adapter_for_instance(&record, &self.catalog)?;
        let report = adapter.delete_db(&record).await?;
        let attempted = report.attempted.len();

        let failures = report.enforce(self.teardown_policy).inspect_err(|e| {
            error!(error = %e, "Teardown failed; instance record kept");
        })?;
        if !failures.is_empty() {
            self.metrics.record_teardown_statement_failures(failures.len());
            for failure in &failures {
                warn!(step = %failure.step, error = %failure.source, "Teardown statement failed");
            }
        }

        record.transition_to(InstanceState::Gone)?;
        self.repository.delete(instance_id).await?;

        self.metrics.record_instance_deleted(&record.adapter);
        info!(attempted, failed = failures.len(), "Instance deleted");
        Ok(InstanceState::Gone)
    }

    /// Get an instance record by id
    pub async fn find_instance(&self, instance_id: &str) -> Result<InstanceRecord> {
        self.load(instance_id).await
    }

    /// Advance an `InProgress` instance once its backend reports it available.
    ///
    /// `Ready` instances are returned unchanged. A backend-reported failure is
    /// returned as `ProvisioningFailed` and the record is kept.
    #[instrument(skip(self), fields(operation = "reconcile"))]
    pub async fn reconcile(&self, instance_id: &str) -> Result<InstanceState> {
        let _guard = self.locks.acquire(instance_id).await;
        let mut record = self.load(instance_id).await?;

        if record.state() != InstanceState::InProgress {
            return Ok(record.state());
        }

        let adapter = self.factory.adapter_for_instance(&record, &self.catalog)?;
        match adapter.poll_status(&record).await? {
            ProvisioningStatus::Pending => Ok(InstanceState::InProgress),
            ProvisioningStatus::Available(endpoint) => {
                record.set_address(&endpoint.host, endpoint.port, POSTGRES_DB_TYPE);
                record.transition_to(InstanceState::Ready)?;
                self.repository.update(&record).await?;
                info!(host = %endpoint.host, port = endpoint.port, "Instance became ready");
                Ok(InstanceState::Ready)
            }
            ProvisioningStatus::Failed { reason } => {
                error!(reason = %reason, "Backend reported provisioning failure");
                Err(BrokerError::provisioning_failed(instance_id, "provision_instance", reason.into()))
            }
        }
    }

    /// Reconcile every `InProgress` instance
    pub async fn reconcile_pending(&self) -> Result<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();

        for record in self.repository.list_by_state(InstanceState::InProgress).await? {
            match self.reconcile(&record.instance_id).await {
                Ok(InstanceState::Ready) => summary.ready.push(record.instance_id),
                Ok(_) => summary.pending.push(record.instance_id),
                Err(e) => {
                    self.metrics.record_failure("reconcile", e.kind());
                    summary.failed.push((record.instance_id, e));
                }
            }
        }

        info!(
            ready = summary.ready.len(),
            pending = summary.pending.len(),
            failed = summary.failed.len(),
            "Reconciliation sweep finished"
        );
        Ok(summary)
    }

    async fn load(&self, instance_id: &str) -> Result<InstanceRecord> {
        self.repository
            .find(instance_id)
            .await?
            .ok_or_else(|| BrokerError::instance_not_found(instance_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ManagedDatabaseControlPlane, ManagedInstanceRequest};
    use crate::domain::plan::Plan;
    use crate::services::credential_cipher::KEY_SIZE;
    use crate::storage::{ConnectionPool, InMemoryInstanceRepository, PgConnector};
    use async_trait::async_trait;
    use tracing_test::traced_test;

    #[derive(Debug)]
    struct AcceptingControlPlane;

    #[async_trait]
    impl ManagedDatabaseControlPlane for AcceptingControlPlane {
        async fn submit_create(&self, _request: &ManagedInstanceRequest) -> Result<()> {
            Ok(())
        }

        async fn poll(&self, _identifier: &str) -> Result<ProvisioningStatus> {
            Ok(ProvisioningStatus::Pending)
        }

        async fn submit_delete(&self, _identifier: &str) -> Result<()> {
            Ok(())
        }
    }

    async fn dedicated_service() -> ProvisioningService {
        let catalog = PlanCatalog::new(vec![Plan::dedicated("d1", "dedicated", "db.t2.micro")]);
        let pool = ConnectionPool::initialize_from_plans(catalog.plans(), &PgConnector)
            .await
            .unwrap();
        ProvisioningService::new(
            Arc::new(catalog),
            AdapterFactory::with_control_plane(pool, Arc::new(AcceptingControlPlane)),
            Arc::new(InMemoryInstanceRepository::new()),
            CredentialCipher::new(&[7u8; KEY_SIZE]).unwrap(),
        )
    }

    #[tokio::test]
    #[traced_test]
    async fn test_create_logs_without_secret() {
        let service = dedicated_service().await;

        let record =
            service.create_instance(NewInstance::new("abc", "d1"), "hunter2-secret").await.unwrap();

        assert_eq!(record.state(), InstanceState::InProgress);
        assert!(logs_contain("Instance created"));
        assert!(logs_contain("instance_id"));
        assert!(!logs_contain("hunter2-secret"));
    }

    #[tokio::test]
    async fn test_reconcile_unknown_instance_is_not_found() {
        let service = dedicated_service().await;

        assert!(matches!(
            service.reconcile("missing").await,
            Err(BrokerError::InstanceNotFound { .. })
        ));
    }
}
