//! Backend parameters for shared plans
//!
//! Each shared plan reads its backend from variables named after the plan:
//! `shared-psql` reads `SHARED_PSQL_DB_URL`, `SHARED_PSQL_DB_USER` and so on.
//!
//! | Suffix       | Meaning              | Default     |
//! |--------------|----------------------|-------------|
//! | `_DB_TYPE`   | engine               | `postgres`  |
//! | `_DB_URL`    | host                 | required    |
//! | `_DB_PORT`   | port                 | `5432`      |
//! | `_DB_USER`   | admin username       | required    |
//! | `_DB_PASS`   | admin password       | required    |
//! | `_DB_NAME`   | admin database       | required    |
//! | `_DB_SSLMODE`| transport security   | `verify-ca` |

use crate::domain::catalog::PlanCatalog;
use crate::domain::plan::{BackendDescriptor, Plan, SslMode, DEFAULT_BACKEND_PORT, POSTGRES_DB_TYPE};
use crate::errors::{BrokerError, Result};
use tracing::{debug, warn};

/// Attach backend descriptors from the process environment
pub fn attach_backends_from_env(catalog: &mut PlanCatalog) -> Result<()> {
    attach_backends(catalog, |name| std::env::var(name).ok())
}

/// Attach a backend descriptor to every shared plan that has a
/// `<PREFIX>_DB_URL` in `lookup`.
///
/// Plans that already carry a backend are left alone. Shared plans without a
/// URL stay detached; connection pool initialization reports them.
pub fn attach_backends<F>(catalog: &mut PlanCatalog, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    for plan in catalog.plans_mut().iter_mut().filter(|plan| plan.is_shared()) {
        if plan.backend.is_some() {
            continue;
        }

        match backend_for_plan(plan, &lookup)? {
            Some(descriptor) => {
                debug!(plan_id = %plan.id, address = %descriptor.address(), "Backend attached to plan");
                plan.backend = Some(descriptor);
            }
            None => {
                warn!(
                    plan_id = %plan.id,
                    variable = %format!("{}_DB_URL", plan.env_prefix()),
                    "No backend configured for shared plan"
                );
            }
        }
    }
    Ok(())
}

fn backend_for_plan<F>(plan: &Plan, lookup: &F) -> Result<Option<BackendDescriptor>>
where
    F: Fn(&str) -> Option<String>,
{
    let prefix = plan.env_prefix();
    let var = |suffix: &str| {
        lookup(&format!("{}_DB_{}", prefix, suffix)).filter(|value| !value.trim().is_empty())
    };
    let required = |suffix: &str| {
        var(suffix).ok_or_else(|| {
            BrokerError::config(format!(
                "Plan '{}' is missing {}_DB_{}",
                plan.name, prefix, suffix
            ))
        })
    };

    let Some(host) = var("URL") else {
        return Ok(None);
    };

    let db_type = var("TYPE").unwrap_or_else(|| POSTGRES_DB_TYPE.to_string());
    if db_type != POSTGRES_DB_TYPE {
        return Err(BrokerError::config(format!(
            "Plan '{}' requests unsupported database type '{}'",
            plan.name, db_type
        )));
    }

    let port = match var("PORT") {
        Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
            BrokerError::config(format!("Invalid {}_DB_PORT '{}': {}", prefix, raw, e))
        })?,
        None => DEFAULT_BACKEND_PORT,
    };

    let ssl_mode = match var("SSLMODE") {
        Some(raw) => raw.parse::<SslMode>().map_err(BrokerError::config)?,
        None => SslMode::default(),
    };

    let descriptor =
        BackendDescriptor::postgres(host, port, required("USER")?, required("PASS")?, required("NAME")?)
            .with_ssl_mode(ssl_mode);

    Ok(Some(descriptor))
}
