// Path: crates/telemetry/src/init.rs

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Filter applied when `RUST_LOG` is unset: the node's own targets at
/// debug, everything else at info.
const DEFAULT_FILTER: &str = "info,mempool=debug,push=debug,endorse=debug,gitserve=debug";

/// Initializes the global `tracing` subscriber for structured JSON logging,
/// bridging `log` records from dependencies into the same stream.
pub fn init_tracing() -> Result<(), anyhow::Error> {
    let fmt_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
