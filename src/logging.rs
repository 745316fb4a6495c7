//! Logging initialization for the gateway.
//!
//! The gateway is a library; embedding applications that already install a
//! tracing subscriber should skip this and let their own subscriber collect
//! the gateway's spans and events.

use tracing_subscriber::EnvFilter;

/// Initializes stderr logging with an environment-controlled filter.
///
/// Honors `RUST_LOG`; defaults to `info` when unset. Safe to call more than
/// once: later calls are no-ops if a global subscriber is already installed.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
