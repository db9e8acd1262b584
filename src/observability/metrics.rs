//! # Metrics Collection
//!
//! Counters for instance lifecycle operations, recorded through the `metrics`
//! facade. Without an installed recorder every call is a no-op.

use metrics::{counter, describe_counter, describe_gauge, gauge, Unit};

pub const INSTANCES_CREATED: &str = "broker_instances_created_total";
pub const INSTANCES_DELETED: &str = "broker_instances_deleted_total";
pub const INSTANCE_BINDINGS: &str = "broker_instance_bindings_total";
pub const OPERATION_FAILURES: &str = "broker_operation_failures_total";
pub const TEARDOWN_STATEMENT_FAILURES: &str = "broker_teardown_statement_failures_total";
pub const BACKEND_CONNECTIONS: &str = "broker_backend_connections";

/// Metrics recorder for broker operations
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record a created instance and the state it reached
    pub fn record_instance_created(&self, adapter: &str, state: &str) {
        let labels = [("adapter", adapter.to_string()), ("state", state.to_string())];
        counter!(INSTANCES_CREATED, &labels).increment(1);
    }

    pub fn record_instance_deleted(&self, adapter: &str) {
        let labels = [("adapter", adapter.to_string())];
        counter!(INSTANCES_DELETED, &labels).increment(1);
    }

    pub fn record_binding(&self, adapter: &str) {
        let labels = [("adapter", adapter.to_string())];
        counter!(INSTANCE_BINDINGS, &labels).increment(1);
    }

    /// Record a failed operation, labelled with the error kind
    pub fn record_failure(&self, operation: &str, kind: &str) {
        let labels = [("operation", operation.to_string()), ("kind", kind.to_string())];
        counter!(OPERATION_FAILURES, &labels).increment(1);
    }

    pub fn record_teardown_statement_failures(&self, count: usize) {
        counter!(TEARDOWN_STATEMENT_FAILURES).increment(count as u64);
    }

    pub fn update_backend_connections(&self, count: usize) {
        gauge!(BACKEND_CONNECTIONS).set(count as f64);
    }

    /// Register descriptions so exporters show the series before any event
    pub fn register_broker_metrics(&self) {
        describe_counter!(INSTANCES_CREATED, Unit::Count, "Instances created, by adapter and state");
        describe_counter!(INSTANCES_DELETED, Unit::Count, "Instances deleted, by adapter");
        describe_counter!(INSTANCE_BINDINGS, Unit::Count, "Credentials handed out, by adapter");
        describe_counter!(
            OPERATION_FAILURES,
            Unit::Count,
            "Failed lifecycle operations, by operation and error kind"
        );
        describe_counter!(
            TEARDOWN_STATEMENT_FAILURES,
            Unit::Count,
            "Drop statements that failed during teardown"
        );
        describe_gauge!(BACKEND_CONNECTIONS, Unit::Count, "Verified shared backend connections");

        counter!(TEARDOWN_STATEMENT_FAILURES).absolute(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let recorder = MetricsRecorder::new();
        recorder.register_broker_metrics();
        recorder.record_instance_created("shared", "ready");
        recorder.record_instance_deleted("shared");
        recorder.record_binding("dedicated");
        recorder.record_failure("create", "duplicate_instance");
        recorder.record_teardown_statement_failures(2);
        recorder.update_backend_connections(1);
    }
}
