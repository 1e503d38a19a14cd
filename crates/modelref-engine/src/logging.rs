//! Tracing subscriber setup
//!
//! Logs go to stderr so stdout stays free for query output. `RUST_LOG`
//! overrides the default level.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber
///
/// Panics if a global subscriber is already set; use [`try_init`] when that
/// may happen (tests, embedding hosts).
pub fn init(default_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter(default_level))
        .init();
}

/// Install the global subscriber unless one is already set
pub fn try_init(default_level: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter(default_level))
        .try_init()
}
