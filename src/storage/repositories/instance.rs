//! Instance repository
//!
//! Persists [`InstanceRecord`]s. Only `in_progress` and `ready` records are
//! ever written; deleting an instance removes its row. The external instance
//! id is unique at the storage layer as well as in the service.

use crate::domain::instance::{InstanceRecord, InstanceState, StoredInstance};
use crate::errors::{BrokerError, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sqlx::FromRow;
use std::sync::Arc;
use tracing::instrument;

/// Storage seam for instance records
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Get an instance by external id
    async fn find(&self, instance_id: &str) -> Result<Option<InstanceRecord>>;

    /// Insert a new record; `DuplicateInstance` if the id is taken
    async fn insert(&self, record: &InstanceRecord) -> Result<()>;

    /// Persist state and endpoint changes of an existing record
    async fn update(&self, record: &InstanceRecord) -> Result<()>;

    /// Remove a record; `InstanceNotFound` if there is none
    async fn delete(&self, instance_id: &str) -> Result<()>;

    /// All records currently in `state`
    async fn list_by_state(&self, state: InstanceState) -> Result<Vec<InstanceRecord>>;
}

fn ensure_persistable(record: &InstanceRecord) -> Result<()> {
    if record.state().is_persistable() {
        Ok(())
    } else {
        Err(BrokerError::invalid_state(&record.instance_id, record.state(), "stored"))
    }
}

/// Database row structure for instances
#[derive(Debug, Clone, FromRow)]
struct InstanceRow {
    pub instance_id: String,
    pub database_name: String,
    pub username: String,
    pub password: Option<String>,
    pub salt: String,
    pub plan_id: String,
    pub org_guid: Option<String>,
    pub space_guid: Option<String>,
    pub adapter: String,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub db_type: Option<String>,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<InstanceRow> for InstanceRecord {
    type Error = BrokerError;

    fn try_from(row: InstanceRow) -> Result<Self> {
        let state = row
            .state
            .parse::<InstanceState>()
            .map_err(|e| BrokerError::validation_field(e, "state"))?;
        let port = row
            .port
            .map(u16::try_from)
            .transpose()
            .map_err(|_| BrokerError::validation_field("Stored port out of range", "port"))?;

        Ok(InstanceRecord::from(StoredInstance {
            instance_id: row.instance_id,
            database: row.database_name,
            username: row.username,
            encrypted_secret: row.password,
            salt: row.salt,
            plan_id: row.plan_id,
            adapter: row.adapter,
            state,
            org_guid: row.org_guid,
            space_guid: row.space_guid,
            host: row.host,
            port,
            db_type: row.db_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}

const SELECT_COLUMNS: &str = "instance_id, database_name, username, password, salt, plan_id, \
     org_guid, space_guid, adapter, host, port, db_type, state, created_at, updated_at";

/// Postgres-backed instance repository
#[derive(Debug, Clone)]
pub struct SqlxInstanceRepository {
    pool: DbPool,
}

impl SqlxInstanceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstanceRepository for SqlxInstanceRepository {
    #[instrument(skip(self), name = "db_find_instance")]
    async fn find(&self, instance_id: &str) -> Result<Option<InstanceRecord>> {
        let row = sqlx::query_as::<_, InstanceRow>(&format!(
            "SELECT {} FROM service_instances WHERE instance_id = $1",
            SELECT_COLUMNS
        ))
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            BrokerError::database(e, format!("Failed to get instance '{}'", instance_id))
        })?;

        row.map(InstanceRecord::try_from).transpose()
    }

    #[instrument(skip(self, record), fields(instance_id = %record.instance_id), name = "db_insert_instance")]
    async fn insert(&self, record: &InstanceRecord) -> Result<()> {
        ensure_persistable(record)?;

        sqlx::query(
            "INSERT INTO service_instances (instance_id, database_name, username, password, salt, plan_id, \
             org_guid, space_guid, adapter, host, port, db_type, state, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(&record.instance_id)
        .bind(&record.database)
        .bind(&record.username)
        .bind(record.encrypted_secret())
        .bind(record.salt_base64())
        .bind(&record.plan_id)
        .bind(&record.org_guid)
        .bind(&record.space_guid)
        .bind(&record.adapter)
        .bind(&record.host)
        .bind(record.port.map(i32::from))
        .bind(&record.db_type)
        .bind(record.state().as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                BrokerError::duplicate_instance(&record.instance_id)
            }
            e => {
                tracing::error!(error = %e, instance_id = %record.instance_id, "Failed to insert instance");
                BrokerError::database(
                    e,
                    format!("Failed to insert instance '{}'", record.instance_id),
                )
            }
        })?;

        tracing::info!(
            instance_id = %record.instance_id,
            state = %record.state(),
            "Persisted instance record"
        );

        Ok(())
    }

    #[instrument(skip(self, record), fields(instance_id = %record.instance_id), name = "db_update_instance")]
    async fn update(&self, record: &InstanceRecord) -> Result<()> {
        ensure_persistable(record)?;

        let result = sqlx::query(
            "UPDATE service_instances SET state = $2, host = $3, port = $4, db_type = $5, updated_at = $6 \
             WHERE instance_id = $1",
        )
        .bind(&record.instance_id)
        .bind(record.state().as_str())
        .bind(&record.host)
        .bind(record.port.map(i32::from))
        .bind(&record.db_type)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            BrokerError::database(e, format!("Failed to update instance '{}'", record.instance_id))
        })?;

        if result.rows_affected() == 0 {
            return Err(BrokerError::instance_not_found(&record.instance_id));
        }
        Ok(())
    }

    #[instrument(skip(self), name = "db_delete_instance")]
    async fn delete(&self, instance_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM service_instances WHERE instance_id = $1")
            .bind(instance_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                BrokerError::database(e, format!("Failed to delete instance '{}'", instance_id))
            })?;

        if result.rows_affected() == 0 {
            return Err(BrokerError::instance_not_found(instance_id));
        }
        Ok(())
    }

    #[instrument(skip(self), name = "db_list_instances_by_state")]
    async fn list_by_state(&self, state: InstanceState) -> Result<Vec<InstanceRecord>> {
        let rows = sqlx::query_as::<_, InstanceRow>(&format!(
            "SELECT {} FROM service_instances WHERE state = $1 ORDER BY created_at",
            SELECT_COLUMNS
        ))
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BrokerError::database(e, format!("Failed to list {} instances", state)))?;

        rows.into_iter().map(InstanceRecord::try_from).collect()
    }
}

/// In-process instance repository for tests and local runs
#[derive(Debug, Clone, Default)]
pub struct InMemoryInstanceRepository {
    records: Arc<DashMap<String, InstanceRecord>>,
}

impl InMemoryInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl InstanceRepository for InMemoryInstanceRepository {
    async fn find(&self, instance_id: &str) -> Result<Option<InstanceRecord>> {
        Ok(self.records.get(instance_id).map(|entry| entry.value().clone()))
    }

    async fn insert(&self, record: &InstanceRecord) -> Result<()> {
        ensure_persistable(record)?;
        match self.records.entry(record.instance_id.clone()) {
            Entry::Occupied(_) => Err(BrokerError::duplicate_instance(&record.instance_id)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, record: &InstanceRecord) -> Result<()> {
        ensure_persistable(record)?;
        match self.records.get_mut(&record.instance_id) {
            Some(mut entry) => {
                *entry = record.clone();
                Ok(())
            }
            None => Err(BrokerError::instance_not_found(&record.instance_id)),
        }
    }

    async fn delete(&self, instance_id: &str) -> Result<()> {
        self.records
            .remove(instance_id)
            .map(|_| ())
            .ok_or_else(|| BrokerError::instance_not_found(instance_id))
    }

    async fn list_by_state(&self, state: InstanceState) -> Result<Vec<InstanceRecord>> {
        let mut records: Vec<InstanceRecord> = self
            .records
            .iter()
            .filter(|entry| entry.value().state() == state)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instance::NewInstance;
    use crate::domain::plan::{BackendDescriptor, Plan};
    use crate::services::credential_cipher::{CredentialCipher, KEY_SIZE};

    fn record(id: &str) -> InstanceRecord {
        let cipher = CredentialCipher::new(&[0x42u8; KEY_SIZE]).unwrap();
        let plan = Plan::shared(
            "shared-plan-1",
            "shared-psql",
            Some(BackendDescriptor::postgres("h1", 5432, "admin", "pw", "postgres")),
        );
        let mut record = InstanceRecord::new(NewInstance::new(id, "shared-plan-1"), &plan, &cipher)
            .unwrap();
        record.set_secret("pw", &cipher).unwrap();
        record
    }

    #[tokio::test]
    async fn test_in_memory_rejects_unpersistable_state() {
        let repo = InMemoryInstanceRepository::new();
        let result = repo.insert(&record("abc")).await;
        assert!(matches!(result, Err(BrokerError::InvalidState { .. })));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_insert_find_delete() {
        let repo = InMemoryInstanceRepository::new();
        let mut record = record("abc");
        record.transition_to(InstanceState::Ready).unwrap();

        repo.insert(&record).await.unwrap();
        assert_eq!(repo.find("abc").await.unwrap(), Some(record.clone()));

        assert!(matches!(
            repo.insert(&record).await,
            Err(BrokerError::DuplicateInstance { .. })
        ));

        repo.delete("abc").await.unwrap();
        assert!(repo.find("abc").await.unwrap().is_none());
        assert!(matches!(repo.delete("abc").await, Err(BrokerError::InstanceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_in_memory_update_and_list() {
        let repo = InMemoryInstanceRepository::new();
        let mut pending = record("pending");
        pending.transition_to(InstanceState::InProgress).unwrap();
        repo.insert(&pending).await.unwrap();

        let mut ready = record("ready");
        ready.transition_to(InstanceState::Ready).unwrap();
        repo.insert(&ready).await.unwrap();

        let in_progress = repo.list_by_state(InstanceState::InProgress).await.unwrap();
        assert_eq!(in_progress.len(), 1);
        assert_eq!(in_progress[0].instance_id, "pending");

        pending.transition_to(InstanceState::Ready).unwrap();
        repo.update(&pending).await.unwrap();
        assert_eq!(repo.list_by_state(InstanceState::Ready).await.unwrap().len(), 2);

        let mut missing = record("missing");
        missing.transition_to(InstanceState::Ready).unwrap();
        assert!(matches!(
            repo.update(&missing).await,
            Err(BrokerError::InstanceNotFound { .. })
        ));
    }
}
