//! Tracing subscriber setup for processes embedding the core
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! embedding process's call. This helper wires the usual fmt layer filtered
//! by `RUST_LOG` (default: info).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize console tracing
///
/// Safe to call more than once: later calls leave the first subscriber in
/// place and return an error instead of panicking.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "headliner tracing initialized"
    );

    Ok(())
}
