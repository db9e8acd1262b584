//! Plan catalog
//!
//! The set of plans the broker offers. Presentation metadata (costs, display
//! names, bullets) belongs to the catalog endpoint and is not modelled here.

use crate::domain::plan::Plan;
use crate::errors::{BrokerError, Result};

/// Id of the reference shared Postgres plan
pub const SHARED_PSQL_PLAN_ID: &str = "44d24fc7-f7a4-4ac1-b7a0-de82836e89a3";
/// Id of the reference dedicated micro plan
pub const MICRO_PSQL_PLAN_ID: &str = "da91e15c-98c9-46a9-b114-02b8d28062c6";
/// Id of the reference dedicated medium plan
pub const MEDIUM_PSQL_PLAN_ID: &str = "332e0168-6969-4bd7-b07f-29f08c4bf78e";

/// Immutable list of plans
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn new(plans: Vec<Plan>) -> Self {
        Self { plans }
    }

    /// The reference plans: one shared Postgres plan and two dedicated sizes.
    ///
    /// The shared plan has no backend attached yet; see
    /// [`crate::config::attach_backends_from_env`].
    pub fn reference() -> Self {
        Self::new(vec![
            Plan::shared(SHARED_PSQL_PLAN_ID, "shared-psql", None)
                .with_description("Shared infrastructure for Postgres DB"),
            Plan::dedicated(MICRO_PSQL_PLAN_ID, "micro-psql", "db.t2.micro")
                .with_description("Dedicated Micro RDS Postgres DB Instance"),
            Plan::dedicated(MEDIUM_PSQL_PLAN_ID, "medium-psql", "db.m3.medium")
                .with_description("Dedicated Medium RDS Postgres DB Instance"),
        ])
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    pub fn plans_mut(&mut self) -> &mut [Plan] {
        &mut self.plans
    }

    /// First plan with the given id
    pub fn find_plan(&self, plan_id: &str) -> Result<&Plan> {
        self.plans
            .iter()
            .find(|plan| plan.id == plan_id)
            .ok_or_else(|| BrokerError::plan_not_found(plan_id))
    }
}
