// Path: crates/telemetry/src/lib.rs

//! # gitmesh telemetry
//!
//! Observability infrastructure for the gitmesh node: structured logging
//! initialization and abstract metric sinks that decouple instrumentation
//! from the Prometheus backend.

/// The initialization routine for global structured logging.
pub mod init;
/// The concrete implementation of metrics sinks using the `prometheus` crate.
pub mod prometheus;
/// Abstract traits (`*MetricsSink`) that define the contract for metrics reporting.
pub mod sinks;

pub use sinks::{mempool_metrics, remote_metrics};
