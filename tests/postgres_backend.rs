//! End-to-end checks against a real PostgreSQL server.
//!
//! Requires Docker. Run with `cargo test --features postgres_tests`.

#![cfg(feature = "postgres_tests")]

mod common;

use common::postgres::TestBackend;
use common::test_cipher;
use instance_broker::adapters::AdapterFactory;
use instance_broker::domain::{InstanceRecord, InstanceState, NewInstance, Plan, PlanCatalog};
use instance_broker::errors::BrokerError;
use instance_broker::storage::{
    ConnectionPool, InstanceRepository, PgConnector, SqlxInstanceRepository,
};
use instance_broker::{ProvisioningService, TeardownPolicy};
use std::sync::Arc;
use tracing_test::traced_test;

const PLAN_ID: &str = "pg-shared";

fn record_for(backend: &TestBackend, instance_id: &str) -> InstanceRecord {
    let plan = Plan::shared(PLAN_ID, PLAN_ID, Some(backend.descriptor.clone()));
    let mut record =
        InstanceRecord::new(NewInstance::new(instance_id, PLAN_ID), &plan, &test_cipher()).unwrap();
    record.set_secret("S3cret!", &test_cipher()).unwrap();
    record.transition_to(InstanceState::Ready).unwrap();
    record
}

#[tokio::test]
async fn repository_persists_instance_lifecycle() {
    let backend = TestBackend::start("repository_lifecycle").await;
    let repository = SqlxInstanceRepository::new(backend.migrated_pool().await);

    let record = record_for(&backend, "abc");
    repository.insert(&record).await.unwrap();

    let found = repository.find("abc").await.unwrap().expect("record persisted");
    assert_eq!(found.database, record.database);
    assert_eq!(found.username, record.username);
    assert_eq!(found.state(), InstanceState::Ready);
    assert_eq!(found.salt_base64(), record.salt_base64());
    assert_eq!(found.secret(&test_cipher()).unwrap(), "S3cret!");

    assert!(matches!(
        repository.insert(&record).await,
        Err(BrokerError::DuplicateInstance { .. })
    ));

    assert_eq!(repository.list_by_state(InstanceState::Ready).await.unwrap().len(), 1);
    assert!(repository.list_by_state(InstanceState::InProgress).await.unwrap().is_empty());

    repository.delete("abc").await.unwrap();
    assert!(repository.find("abc").await.unwrap().is_none());
    assert!(matches!(
        repository.delete("abc").await,
        Err(BrokerError::InstanceNotFound { .. })
    ));
}

#[tokio::test]
async fn repository_update_moves_pending_record_to_ready() {
    let backend = TestBackend::start("repository_update").await;
    let repository = SqlxInstanceRepository::new(backend.migrated_pool().await);

    let plan = Plan::dedicated("pg-dedicated", "pg-dedicated", "db.t2.micro");
    let mut record =
        InstanceRecord::new(NewInstance::new("pending", "pg-dedicated"), &plan, &test_cipher())
            .unwrap();
    record.set_secret("pw", &test_cipher()).unwrap();
    record.transition_to(InstanceState::InProgress).unwrap();
    repository.insert(&record).await.unwrap();

    record.set_address("rds.internal", 5433, "postgres");
    record.transition_to(InstanceState::Ready).unwrap();
    repository.update(&record).await.unwrap();

    let found = repository.find("pending").await.unwrap().unwrap();
    assert_eq!(found.state(), InstanceState::Ready);
    assert_eq!(found.host.as_deref(), Some("rds.internal"));
    assert_eq!(found.port, Some(5433));
}

async fn real_service(
    backend: &TestBackend,
    repository: Arc<SqlxInstanceRepository>,
) -> ProvisioningService {
    let catalog = PlanCatalog::new(vec![Plan::shared(
        PLAN_ID,
        PLAN_ID,
        Some(backend.descriptor.clone()),
    )]);
    let pool = ConnectionPool::initialize_from_plans(catalog.plans(), &PgConnector).await.unwrap();
    ProvisioningService::new(
        Arc::new(catalog),
        AdapterFactory::new(pool),
        repository,
        test_cipher(),
    )
    .with_teardown_policy(TeardownPolicy::Strict)
}

#[tokio::test]
async fn shared_plan_provisions_real_database() {
    let backend = TestBackend::start("shared_provisioning").await;
    let repository = Arc::new(SqlxInstanceRepository::new(backend.migrated_pool().await));
    let service = real_service(&backend, repository.clone()).await;

    let record = service.create_instance(NewInstance::new("e2e", PLAN_ID), "S3cret!").await.unwrap();
    assert_eq!(record.state(), InstanceState::Ready);

    let credentials = service.bind_instance("e2e").await.unwrap();
    let app_pool = sqlx::PgPool::connect(&credentials.uri).await.unwrap();
    let (one,): (i32,) = sqlx::query_as("SELECT 1").fetch_one(&app_pool).await.unwrap();
    assert_eq!(one, 1);
    app_pool.close().await;

    assert_eq!(service.delete_instance("e2e").await.unwrap(), InstanceState::Gone);
    assert!(repository.find("e2e").await.unwrap().is_none());
}

#[tokio::test]
#[traced_test]
async fn backend_statements_never_log_the_password() {
    let backend = TestBackend::start("statement_logging").await;
    let repository = Arc::new(SqlxInstanceRepository::new(backend.migrated_pool().await));
    let service = real_service(&backend, repository).await;

    service.create_instance(NewInstance::new("quiet", PLAN_ID), "TopSecretPw_42").await.unwrap();
    service.delete_instance("quiet").await.unwrap();

    assert!(logs_contain("Instance created"));
    assert!(!logs_contain("TopSecretPw_42"));
    assert!(!logs_contain("WITH PASSWORD"));
}
