//! Plain-text output for CLI commands

use crate::domain::instance::InstanceRecord;
use crate::domain::plan::Plan;
use crate::services::ReconcileSummary;

pub fn print_plans(plans: &[Plan]) {
    println!("{:<38} {:<14} {:<10} {:<14} BACKEND", "ID", "NAME", "ADAPTER", "CLASS");
    for plan in plans {
        let backend = plan
            .backend
            .as_ref()
            .map(|backend| backend.address())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<38} {:<14} {:<10} {:<14} {}",
            plan.id,
            plan.name,
            plan.adapter,
            plan.instance_class.as_deref().unwrap_or("-"),
            backend
        );
    }
}

pub fn print_record(record: &InstanceRecord) {
    println!("Instance:  {}", record.instance_id);
    println!("State:     {}", record.state());
    println!("Plan:      {}", record.plan_id);
    println!("Database:  {}", record.database);
    println!("Username:  {}", record.username);
    if let (Some(host), Some(port)) = (&record.host, record.port) {
        println!("Endpoint:  {}:{}", host, port);
    }
}

pub fn print_reconcile_summary(summary: &ReconcileSummary) {
    for id in &summary.ready {
        println!("ready      {}", id);
    }
    for id in &summary.pending {
        println!("pending    {}", id);
    }
    for (id, error) in &summary.failed {
        println!("failed     {} ({})", id, error);
    }
    println!(
        "{} ready, {} pending, {} failed",
        summary.ready.len(),
        summary.pending.len(),
        summary.failed.len()
    );
}
