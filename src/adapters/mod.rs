//! Backend adapters
//!
//! An [`Adapter`] performs the backend side of create, bind and delete for one
//! plan kind. The [`AdapterFactory`] picks the variant from the plan and wires
//! its dependencies; call sites only ever see `dyn Adapter`.
//!
//! - [`SharedAdapter`]: logical databases on a pooled shared server
//! - [`DedicatedAdapter`]: managed instances requested from an external
//!   control plane, completed later by reconciliation

pub mod control_plane;
pub mod dedicated;
pub mod factory;
pub mod shared;

pub use control_plane::{
    ManagedDatabaseControlPlane, ManagedEndpoint, ManagedInstanceRequest, ProvisioningStatus,
    UnimplementedControlPlane,
};
pub use dedicated::DedicatedAdapter;
pub use factory::AdapterFactory;
pub use shared::SharedAdapter;

use crate::domain::credentials::Credentials;
use crate::domain::instance::{InstanceRecord, InstanceState};
use crate::domain::plan::AdapterKind;
use crate::errors::{BrokerError, Result, StatementFailure};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend operations for one plan kind
#[async_trait]
pub trait Adapter: Send + Sync + fmt::Debug {
    fn kind(&self) -> AdapterKind;

    /// Provision the instance's database and principal.
    ///
    /// `Ok` carries `Ready` or `InProgress`; an error means the instance is
    /// still `NotCreated` and nothing may be persisted.
    async fn create_db(&self, instance: &InstanceRecord, secret: &str) -> Result<InstanceState>;

    /// Credentials for an application binding to the instance
    async fn bind_db_to_app(&self, instance: &InstanceRecord, secret: &str) -> Result<Credentials>;

    /// Tear the instance down. Statement failures are collected in the
    /// report; an error means teardown could not be attempted at all.
    async fn delete_db(&self, instance: &InstanceRecord) -> Result<TeardownReport>;

    /// Current provisioning status of an `InProgress` instance
    async fn poll_status(&self, instance: &InstanceRecord) -> Result<ProvisioningStatus>;
}

/// Whether drop-statement failures block removal of the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownPolicy {
    /// Log failures and remove the record anyway
    #[default]
    BestEffort,
    /// Keep the record and report `TeardownFailed`
    Strict,
}

impl TeardownPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BestEffort => "best_effort",
            Self::Strict => "strict",
        }
    }
}

impl FromStr for TeardownPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "best_effort" => Ok(Self::BestEffort),
            "strict" => Ok(Self::Strict),
            _ => Err(format!("Unknown teardown policy: {}", s)),
        }
    }
}

impl fmt::Display for TeardownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a teardown attempt
#[derive(Debug)]
pub struct TeardownReport {
    pub instance_id: String,
    pub attempted: Vec<String>,
    pub failures: Vec<StatementFailure>,
}

impl TeardownReport {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self { instance_id: instance_id.into(), attempted: Vec::new(), failures: Vec::new() }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Apply `policy`: `Ok` means the record may be removed.
    ///
    /// Under `BestEffort` the failures are handed back for logging.
    pub fn enforce(self, policy: TeardownPolicy) -> Result<Vec<StatementFailure>> {
        match policy {
            TeardownPolicy::Strict if !self.failures.is_empty() => {
                Err(BrokerError::teardown_failed(self.instance_id, self.failures))
            }
            _ => Ok(self.failures),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_report() -> TeardownReport {
        let mut report = TeardownReport::new("abc");
        report.attempted = vec!["drop_database".to_string(), "drop_role".to_string()];
        report.failures.push(StatementFailure::new("drop_role", "role does not exist".into()));
        report
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("strict".parse::<TeardownPolicy>().unwrap(), TeardownPolicy::Strict);
        assert_eq!("best_effort".parse::<TeardownPolicy>().unwrap(), TeardownPolicy::BestEffort);
        assert!("lenient".parse::<TeardownPolicy>().is_err());
        assert_eq!(TeardownPolicy::default(), TeardownPolicy::BestEffort);
    }

    #[test]
    fn test_best_effort_allows_removal() {
        let failures = failed_report().enforce(TeardownPolicy::BestEffort).unwrap();
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn test_strict_blocks_removal() {
        let result = failed_report().enforce(TeardownPolicy::Strict);
        assert!(matches!(result, Err(BrokerError::TeardownFailed { .. })));
    }

    #[test]
    fn test_clean_report_passes_strict() {
        let report = TeardownReport::new("abc");
        assert!(report.is_clean());
        assert!(report.enforce(TeardownPolicy::Strict).unwrap().is_empty());
    }
}
