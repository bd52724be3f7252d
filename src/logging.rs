//! Log subscriber setup.
//!
//! Library code only emits `tracing` events; the binary installs the
//! subscriber here. `RUST_LOG` takes precedence over the level passed in.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static TRACING: OnceLock<()> = OnceLock::new();

/// Install the global subscriber. Later calls are no-ops.
pub fn init(level: &str, json: bool) {
    TRACING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr);
        let _ = if json {
            builder.json().try_init()
        } else {
            builder.compact().try_init()
        };
        tracing::debug!(json, "tracing initialized");
    });
}
