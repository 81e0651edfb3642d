//! Logging setup.
//!
//! All output goes to **stderr**; stdout belongs to the host. Filtering
//! follows `RUST_LOG`, for example:
//!
//! ```bash
//! RUST_LOG=coveo_provider=debug ./my-host
//! RUST_LOG=warn,coveo_provider::client=debug ./my-host
//! ```
//!
//! The API key is never logged. Error response bodies are truncated before
//! they reach a log line.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LEVEL: &str = "info";

/// Filter from `RUST_LOG`, or `default_level` when unset or unparsable.
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn try_init_with(default_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
        .is_ok()
}

/// Install the global subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Like [`init_logging`], with a different fallback level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    if !try_init_with(default_level) {
        panic!("a global tracing subscriber is already installed");
    }
}

/// Install the global subscriber, returning `false` if one is already set.
///
/// Safe to call from every test.
pub fn try_init_logging() -> bool {
    try_init_with(DEFAULT_LEVEL)
}
