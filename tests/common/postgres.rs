//! PostgreSQL test backend using Testcontainers.
//!
//! Each `TestBackend` starts a fresh container. Keep it alive for the whole
//! test; the container is removed when it is dropped.

use instance_broker::domain::{BackendDescriptor, SslMode};
use instance_broker::storage::{create_backend_pool, run_migrations, DbPool};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

pub struct TestBackend {
    pub descriptor: BackendDescriptor,
    _container: ContainerAsync<Postgres>,
}

impl TestBackend {
    pub async fn start(prefix: &str) -> Self {
        let container = Postgres::default().start().await.unwrap_or_else(|e| {
            panic!("Failed to start PostgreSQL container for {}: {}", prefix, e)
        });

        let host = container
            .get_host()
            .await
            .unwrap_or_else(|e| panic!("Failed to get container host for {}: {}", prefix, e));
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .unwrap_or_else(|e| panic!("Failed to get container port for {}: {}", prefix, e));

        let descriptor =
            BackendDescriptor::postgres(host.to_string(), port, "postgres", "postgres", "postgres")
                .with_ssl_mode(SslMode::Disable);

        Self { descriptor, _container: container }
    }

    /// Pool on the admin database with broker migrations applied
    pub async fn migrated_pool(&self) -> DbPool {
        let pool = create_backend_pool(&self.descriptor).await.expect("create backend pool");
        run_migrations(&pool).await.expect("run migrations");
        pool
    }
}
