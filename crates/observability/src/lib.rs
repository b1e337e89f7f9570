//! Tracing and logging setup shared by every binary and test harness.

/// Initialize process-wide logging from the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops. A malformed
/// configuration falls back to the defaults rather than aborting.
pub fn init() {
    let config = LogConfig::from_env().unwrap_or_default();
    tracing::init_with(&config);
}

/// Logging configuration (filter directives, output format).
pub mod config;

/// Subscriber installation.
pub mod tracing;

pub use config::{LogConfig, LogFormat};
