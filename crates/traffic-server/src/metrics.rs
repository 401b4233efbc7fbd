//! Prometheus metrics

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use traffic_core::{RecordKind, RecordStore};

pub const WRITES_TOTAL: &str = "traffic_ledger_writes_total";
pub const WRITE_DURATION: &str = "traffic_ledger_write_duration_seconds";
pub const RECORDS: &str = "traffic_ledger_records";
pub const VERIFIED_RECORDS: &str = "traffic_ledger_verified_records";
pub const SNAPSHOT_FAILURES: &str = "traffic_ledger_snapshot_failures_total";
pub const RELAY_TOTAL: &str = "traffic_ledger_relay_total";
pub const WS_SUBSCRIBERS: &str = "traffic_ledger_ws_subscribers";

/// Install the global Prometheus recorder. Call once per process.
pub fn init_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(WRITES_TOTAL, "Ledger writes by operation, kind and outcome code");
    describe_histogram!(WRITE_DURATION, "Time spent in a ledger write, including snapshot");
    describe_gauge!(RECORDS, "Records stored, by kind");
    describe_gauge!(VERIFIED_RECORDS, "Records verified, by kind");
    describe_counter!(SNAPSHOT_FAILURES, "Snapshot writes that failed");
    describe_counter!(RELAY_TOTAL, "Relayer verification attempts by outcome");
    describe_gauge!(WS_SUBSCRIBERS, "Connected event stream subscribers");

    Ok(handle)
}

pub fn record_write(op: &'static str, kind: RecordKind, outcome: &'static str, elapsed: Duration) {
    counter!(WRITES_TOTAL, "op" => op, "kind" => kind.as_str(), "outcome" => outcome).increment(1);
    histogram!(WRITE_DURATION, "op" => op).record(elapsed.as_secs_f64());
}

pub fn update_record_gauges(store: &RecordStore) {
    for kind in RecordKind::ALL {
        gauge!(RECORDS, "kind" => kind.as_str()).set(store.len(kind) as f64);
        gauge!(VERIFIED_RECORDS, "kind" => kind.as_str()).set(store.verified_count(kind) as f64);
    }
}

pub fn record_snapshot_failure() {
    counter!(SNAPSHOT_FAILURES).increment(1);
}

pub fn record_relay(outcome: &'static str) {
    counter!(RELAY_TOTAL, "outcome" => outcome).increment(1);
}

pub fn set_ws_subscribers(count: usize) {
    gauge!(WS_SUBSCRIBERS).set(count as f64);
}
