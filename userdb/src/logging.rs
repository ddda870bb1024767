//! Logging initialization for userdb
//!
//! Thin setup helpers over `tracing-subscriber`. Library code only emits
//! `tracing` events; whether and where they go is decided once here by the
//! embedding binary. Log output never includes secrets or hashes.

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

/// Global initialization flag so logging is only set up once
static INIT: Once = Once::new();

/// Initialize logging with the given default filter directive, overridable
/// through the `RUST_LOG` environment variable.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    INIT.call_once(|| {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    });
}

/// Initialize logging with sensible defaults (`info` level)
pub fn init_default_logging() {
    init_logging("info");
}
