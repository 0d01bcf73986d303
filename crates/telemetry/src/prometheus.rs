// Path: crates/telemetry/src/prometheus.rs

//! A concrete implementation of the metrics sinks using the Prometheus crate.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_gauge, register_histogram, register_int_counter,
    register_int_counter_vec, Gauge, Histogram, IntCounter, IntCounterVec,
};

// --- Metric Statics ---
// OnceCell holds the collectors; `install` initializes them exactly once.

static MEMPOOL_SIZE: OnceCell<Gauge> = OnceCell::new();
static MEMPOOL_BYTE_SIZE: OnceCell<Gauge> = OnceCell::new();
static MEMPOOL_CACHE_SIZE: OnceCell<Gauge> = OnceCell::new();
static MEMPOOL_TXS_REJECTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static MEMPOOL_TXS_REAPED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static PUSH_POOL_SIZE: OnceCell<Gauge> = OnceCell::new();
static PUSH_NOTES_REJECTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static ENDORSEMENTS_REGISTERED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static PUSH_TXS_BUILT_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static FETCHES_IN_FLIGHT: OnceCell<Gauge> = OnceCell::new();
static DRY_RUN_DURATION_SECONDS: OnceCell<Histogram> = OnceCell::new();

/// The Prometheus-backed metrics sink.
#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

// Getting a metric before `install()` is a critical setup error.
macro_rules! get_metric {
    ($metric:ident) => {
        $metric
            .get()
            .expect("Prometheus sink not initialized. Call telemetry::prometheus::install() first.")
    };
}

impl MempoolMetricsSink for PrometheusSink {
    fn set_pool_size(&self, count: f64) {
        get_metric!(MEMPOOL_SIZE).set(count);
    }
    fn set_pool_byte_size(&self, bytes: f64) {
        get_metric!(MEMPOOL_BYTE_SIZE).set(bytes);
    }
    fn set_cache_size(&self, count: f64) {
        get_metric!(MEMPOOL_CACHE_SIZE).set(count);
    }
    fn inc_txs_rejected(&self, code: &str) {
        get_metric!(MEMPOOL_TXS_REJECTED_TOTAL)
            .with_label_values(&[code])
            .inc();
    }
    fn inc_txs_reaped(&self, count: u64) {
        get_metric!(MEMPOOL_TXS_REAPED_TOTAL).inc_by(count);
    }
}

impl RemoteMetricsSink for PrometheusSink {
    fn set_push_pool_size(&self, count: f64) {
        get_metric!(PUSH_POOL_SIZE).set(count);
    }
    fn inc_notes_rejected(&self, code: &str) {
        get_metric!(PUSH_NOTES_REJECTED_TOTAL)
            .with_label_values(&[code])
            .inc();
    }
    fn inc_endorsements_registered(&self) {
        get_metric!(ENDORSEMENTS_REGISTERED_TOTAL).inc();
    }
    fn inc_push_txs_built(&self) {
        get_metric!(PUSH_TXS_BUILT_TOTAL).inc();
    }
    fn set_fetches_in_flight(&self, count: f64) {
        get_metric!(FETCHES_IN_FLIGHT).set(count);
    }
    fn observe_dry_run_duration(&self, duration_secs: f64) {
        get_metric!(DRY_RUN_DURATION_SECONDS).observe(duration_secs);
    }
}

impl MetricsSink for PrometheusSink {}

static PROMETHEUS_SINK: PrometheusSink = PrometheusSink;

/// Registers every collector with the default registry and installs the
/// sink globally. Idempotent; later calls are no-ops.
pub fn install() -> Result<(), prometheus::Error> {
    MEMPOOL_SIZE.get_or_try_init(|| {
        register_gauge!("gitmesh_mempool_size", "Number of pooled transactions")
    })?;
    MEMPOOL_BYTE_SIZE.get_or_try_init(|| {
        register_gauge!(
            "gitmesh_mempool_byte_size",
            "Aggregate economic size of the pool in bytes"
        )
    })?;
    MEMPOOL_CACHE_SIZE.get_or_try_init(|| {
        register_gauge!(
            "gitmesh_mempool_cache_size",
            "Number of parked future-nonce transactions"
        )
    })?;
    MEMPOOL_TXS_REJECTED_TOTAL.get_or_try_init(|| {
        register_int_counter_vec!(
            "gitmesh_mempool_txs_rejected_total",
            "Transactions rejected at admission, by error code",
            &["code"]
        )
    })?;
    MEMPOOL_TXS_REAPED_TOTAL.get_or_try_init(|| {
        register_int_counter!(
            "gitmesh_mempool_txs_reaped_total",
            "Transactions reaped into block batches"
        )
    })?;
    PUSH_POOL_SIZE.get_or_try_init(|| {
        register_gauge!(
            "gitmesh_push_pool_size",
            "Push notes awaiting endorsement quorum"
        )
    })?;
    PUSH_NOTES_REJECTED_TOTAL.get_or_try_init(|| {
        register_int_counter_vec!(
            "gitmesh_push_notes_rejected_total",
            "Push notes rejected by the pipeline, by error code",
            &["code"]
        )
    })?;
    ENDORSEMENTS_REGISTERED_TOTAL.get_or_try_init(|| {
        register_int_counter!(
            "gitmesh_endorsements_registered_total",
            "Endorsements accepted into the registry"
        )
    })?;
    PUSH_TXS_BUILT_TOTAL.get_or_try_init(|| {
        register_int_counter!(
            "gitmesh_push_txs_built_total",
            "Push transactions assembled from endorsement quorums"
        )
    })?;
    FETCHES_IN_FLIGHT.get_or_try_init(|| {
        register_gauge!("gitmesh_fetches_in_flight", "Object fetches in flight")
    })?;
    DRY_RUN_DURATION_SECONDS.get_or_try_init(|| {
        register_histogram!(
            "gitmesh_dry_run_duration_seconds",
            "Duration of git-receive-pack dry runs",
            exponential_buckets(0.01, 2.0, 12)?
        )
    })?;

    let _ = SINK.set(&PROMETHEUS_SINK);
    Ok(())
}
