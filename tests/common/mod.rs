//! Common test utilities for all integration tests.
//!
//! Provides recording backends, a scriptable control plane and a service
//! builder wired to in-memory storage.

#![allow(dead_code)]

#[cfg(feature = "postgres_tests")]
pub mod postgres;

use async_trait::async_trait;
use instance_broker::adapters::{
    AdapterFactory, ManagedDatabaseControlPlane, ManagedInstanceRequest, ProvisioningStatus,
};
use instance_broker::domain::{BackendDescriptor, Plan, PlanCatalog};
use instance_broker::errors::{BoxError, Result};
use instance_broker::services::credential_cipher::KEY_SIZE;
use instance_broker::storage::{
    BackendConnector, BackendSession, ConnectionPool, InMemoryInstanceRepository,
};
use instance_broker::{CredentialCipher, ProvisioningService, TeardownPolicy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const SHARED_PLAN_ID: &str = "shared-plan-1";
pub const DEDICATED_PLAN_ID: &str = "dedicated-plan-1";
pub const SHARED_HOST: &str = "h1";

/// Backend session that records every statement and fails the ones
/// starting with a scripted prefix
#[derive(Debug, Default)]
pub struct RecordingSession {
    statements: Mutex<Vec<String>>,
    failing_prefixes: Mutex<Vec<String>>,
}

impl RecordingSession {
    pub fn fail_on(&self, prefix: &str) {
        self.failing_prefixes.lock().unwrap().push(prefix.to_string());
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendSession for RecordingSession {
    async fn execute(&self, statement: &str) -> std::result::Result<(), BoxError> {
        self.statements.lock().unwrap().push(statement.to_string());
        let failing = self
            .failing_prefixes
            .lock()
            .unwrap()
            .iter()
            .find(|prefix| statement.starts_with(prefix.as_str()))
            .cloned();
        match failing {
            Some(prefix) => Err(format!("simulated failure on {}", prefix).into()),
            None => Ok(()),
        }
    }

    async fn ping(&self) -> std::result::Result<(), BoxError> {
        Ok(())
    }
}

/// Connector handing out one [`RecordingSession`] per host
#[derive(Default)]
pub struct RecordingConnector {
    sessions: Mutex<HashMap<String, Arc<RecordingSession>>>,
}

impl RecordingConnector {
    pub fn session(&self, host: &str) -> Arc<RecordingSession> {
        Arc::clone(self.sessions.lock().unwrap().entry(host.to_string()).or_default())
    }
}

#[async_trait]
impl BackendConnector for RecordingConnector {
    async fn connect(&self, descriptor: &BackendDescriptor) -> Result<Arc<dyn BackendSession>> {
        let session: Arc<dyn BackendSession> = self.session(&descriptor.host);
        Ok(session)
    }
}

/// Control plane that accepts every request and reports scripted statuses
#[derive(Debug, Default)]
pub struct FakeControlPlane {
    requests: Mutex<Vec<ManagedInstanceRequest>>,
    deleted: Mutex<Vec<String>>,
    statuses: Mutex<HashMap<String, ProvisioningStatus>>,
}

impl FakeControlPlane {
    pub fn set_status(&self, identifier: &str, status: ProvisioningStatus) {
        self.statuses.lock().unwrap().insert(identifier.to_string(), status);
    }

    pub fn requests(&self) -> Vec<ManagedInstanceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManagedDatabaseControlPlane for FakeControlPlane {
    async fn submit_create(&self, request: &ManagedInstanceRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn poll(&self, identifier: &str) -> Result<ProvisioningStatus> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(identifier)
            .cloned()
            .unwrap_or(ProvisioningStatus::Pending))
    }

    async fn submit_delete(&self, identifier: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(identifier.to_string());
        Ok(())
    }
}

pub fn test_cipher() -> CredentialCipher {
    CredentialCipher::new(&[0x42u8; KEY_SIZE]).unwrap()
}

pub fn shared_plan(id: &str, host: &str) -> Plan {
    Plan::shared(id, id, Some(BackendDescriptor::postgres(host, 5432, "admin", "admin-pw", "postgres")))
}

pub fn test_catalog() -> PlanCatalog {
    PlanCatalog::new(vec![
        shared_plan(SHARED_PLAN_ID, SHARED_HOST),
        Plan::dedicated(DEDICATED_PLAN_ID, "dedicated-psql", "db.t2.micro"),
    ])
}

/// A service over [`test_catalog`] with recording backends
pub struct TestBroker {
    pub service: Arc<ProvisioningService>,
    pub session: Arc<RecordingSession>,
    pub repository: Arc<InMemoryInstanceRepository>,
    pub control_plane: Arc<FakeControlPlane>,
    pub cipher: CredentialCipher,
}

pub async fn test_broker(policy: TeardownPolicy) -> TestBroker {
    test_broker_with(test_catalog(), policy, true).await
}

/// Build a broker; `with_control_plane = false` leaves dedicated plans
/// unimplemented
pub async fn test_broker_with(
    catalog: PlanCatalog,
    policy: TeardownPolicy,
    with_control_plane: bool,
) -> TestBroker {
    let connector = RecordingConnector::default();
    let pool = ConnectionPool::initialize_from_plans(catalog.plans(), &connector).await.unwrap();
    let session = connector.session(SHARED_HOST);

    let control_plane = Arc::new(FakeControlPlane::default());
    let factory = if with_control_plane {
        AdapterFactory::with_control_plane(pool, control_plane.clone())
    } else {
        AdapterFactory::new(pool)
    };

    let repository = Arc::new(InMemoryInstanceRepository::new());
    let cipher = test_cipher();
    let service = ProvisioningService::new(
        Arc::new(catalog),
        factory,
        repository.clone(),
        cipher.clone(),
    )
    .with_teardown_policy(policy);

    TestBroker { service: Arc::new(service), session, repository, control_plane, cipher }
}
