//! Startup sequence for the broker
//!
//! Builds everything a [`ProvisioningService`] needs, in dependency order:
//! plan catalog with backends attached, verified shared connections, the
//! broker's own instance table (migrated), and finally the service itself.
//! Any failure aborts startup.

use crate::adapters::AdapterFactory;
use crate::config::{attach_backends_from_env, BrokerConfig};
use crate::domain::catalog::PlanCatalog;
use crate::errors::{BrokerError, Result};
use crate::observability::MetricsRecorder;
use crate::services::ProvisioningService;
use crate::storage::{
    run_migrations, BackendConnector, ConnectionPool, DbPool, InstanceRepository, PgConnector,
    SqlxInstanceRepository,
};
use std::sync::Arc;
use tracing::info;

/// Reference catalog with shared backends read from the environment
pub fn load_catalog() -> Result<PlanCatalog> {
    let mut catalog = PlanCatalog::reference();
    attach_backends_from_env(&mut catalog)?;
    Ok(catalog)
}

/// Open and verify every shared backend in `catalog`
pub async fn connect_backends(
    catalog: &PlanCatalog,
    connector: &dyn BackendConnector,
) -> Result<ConnectionPool> {
    let pool = ConnectionPool::initialize_from_plans(catalog.plans(), connector).await?;
    MetricsRecorder::new().update_backend_connections(pool.len());
    info!(plans = ?pool.plan_ids(), "Shared backends connected");
    Ok(pool)
}

/// Borrow the pooled connection of `config.db_plan_id` for the broker's own
/// table and apply pending migrations
pub async fn open_broker_database(
    config: &BrokerConfig,
    catalog: &PlanCatalog,
    pool: &ConnectionPool,
) -> Result<DbPool> {
    let plan = catalog.find_plan(&config.db_plan_id)?;
    if plan.backend.is_none() {
        return Err(BrokerError::config(format!(
            "Broker database plan '{}' ({}) has no backend connection parameters",
            plan.name, plan.id
        )));
    }

    let connection = pool.find_by_plan_id(&plan.id)?;
    let db = connection.session().pg_pool().cloned().ok_or_else(|| {
        BrokerError::config(format!(
            "Broker database plan '{}' ({}) is not backed by a Postgres pool",
            plan.name, plan.id
        ))
    })?;

    run_migrations(&db).await?;
    Ok(db)
}

/// Wire a service from already-initialized parts
pub fn assemble_service(
    config: &BrokerConfig,
    catalog: PlanCatalog,
    pool: ConnectionPool,
    repository: Arc<dyn InstanceRepository>,
) -> Result<ProvisioningService> {
    let factory = AdapterFactory::new(pool).with_instance_tags(config.instance_tags()?);
    let service =
        ProvisioningService::new(Arc::new(catalog), factory, repository, config.cipher()?)
            .with_teardown_policy(config.teardown_policy);
    Ok(service)
}

/// Full startup against real Postgres backends
pub async fn bootstrap(config: &BrokerConfig) -> Result<ProvisioningService> {
    MetricsRecorder::new().register_broker_metrics();

    let catalog = load_catalog()?;
    let pool = connect_backends(&catalog, &PgConnector).await?;
    let db = open_broker_database(config, &catalog, &pool).await?;
    let repository: Arc<dyn InstanceRepository> = Arc::new(SqlxInstanceRepository::new(db));

    let service = assemble_service(config, catalog, pool, repository)?;
    info!(teardown_policy = %service.teardown_policy(), "Broker ready");
    Ok(service)
}
