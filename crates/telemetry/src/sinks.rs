// Path: crates/telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `MetricsSink` implementation.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns a static reference to the configured mempool metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn mempool_metrics() -> &'static dyn MempoolMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured remote-server metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn remote_metrics() -> &'static dyn RemoteMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

// --- Trait Definitions ---

/// A sink for metrics related to the transaction pool.
pub trait MempoolMetricsSink: Send + Sync + std::fmt::Debug {
    /// Sets the gauge for the current number of pooled transactions.
    fn set_pool_size(&self, count: f64);
    /// Sets the gauge for the pool's aggregate economic size in bytes.
    fn set_pool_byte_size(&self, bytes: f64);
    /// Sets the gauge for the number of parked future-nonce transactions.
    fn set_cache_size(&self, count: f64);
    /// Increments the counter for rejected transactions, labeled by error code.
    fn inc_txs_rejected(&self, code: &str);
    /// Increments the counter for transactions reaped into block batches.
    fn inc_txs_reaped(&self, count: u64);
}
impl MempoolMetricsSink for NopSink {
    fn set_pool_size(&self, _count: f64) {}
    fn set_pool_byte_size(&self, _bytes: f64) {}
    fn set_cache_size(&self, _count: f64) {}
    fn inc_txs_rejected(&self, _code: &str) {}
    fn inc_txs_reaped(&self, _count: u64) {}
}

/// A sink for metrics related to the push pipeline and endorsements.
pub trait RemoteMetricsSink: Send + Sync + std::fmt::Debug {
    /// Sets the gauge for push notes awaiting endorsement.
    fn set_push_pool_size(&self, count: f64);
    /// Increments the counter for push notes rejected, labeled by error code.
    fn inc_notes_rejected(&self, code: &str);
    /// Increments the counter for endorsements registered.
    fn inc_endorsements_registered(&self);
    /// Increments the counter for push transactions assembled.
    fn inc_push_txs_built(&self);
    /// Sets the gauge for in-flight object fetches.
    fn set_fetches_in_flight(&self, count: f64);
    /// Observes the duration of a git-receive-pack dry run.
    fn observe_dry_run_duration(&self, duration_secs: f64);
}
impl RemoteMetricsSink for NopSink {
    fn set_push_pool_size(&self, _count: f64) {}
    fn inc_notes_rejected(&self, _code: &str) {}
    fn inc_endorsements_registered(&self) {}
    fn inc_push_txs_built(&self) {}
    fn set_fetches_in_flight(&self, _count: f64) {}
    fn observe_dry_run_duration(&self, _duration_secs: f64) {}
}

/// The unified sink the node installs once at startup.
pub trait MetricsSink: MempoolMetricsSink + RemoteMetricsSink {}
impl MetricsSink for NopSink {}
