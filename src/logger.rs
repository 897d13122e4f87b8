//! Centralized logging configuration for landmark-localizer binaries
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the host. Binaries call [`init_logger`].

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Initialize the tracing subscriber with the standard configuration
///
/// Default log level: INFO (overrideable via RUST_LOG environment variable)
///
/// # Example
/// ```no_run
/// use landmark_localizer::init_logger;
///
/// init_logger();
/// tracing::info!("Localizer started");
/// ```
///
/// # Environment Variables
/// ```bash
/// RUST_LOG=debug cargo run --bin localize_scenario
/// RUST_LOG=landmark_localizer=trace cargo run --bin localize_scenario
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a custom default level
///
/// Only the first call installs a subscriber; later calls (a second binary
/// entry point, several tests in one process) are no-ops.
///
/// # Arguments
/// * `default_level` - The default log level (overrideable via RUST_LOG)
pub fn init_logger_with_level(default_level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(default_level).into())
        .from_env_lossy();

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(level = %default_level, "logger initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_logger_with_level(Level::DEBUG);
        init_logger();
        tracing::info!("still logging after a second init");
    }
}
