//! Tracing initialization (fmt subscriber with env-filter).
//!
//! Log verbosity is controlled via the standard `RUST_LOG` environment
//! variable and defaults to `info`:
//!
//! ```bash
//! RUST_LOG=alumctl=debug,tower_http=debug alumctl -f config.yaml
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global tracing subscriber.
///
/// Safe to call once per process; returns an error if a subscriber has
/// already been installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
