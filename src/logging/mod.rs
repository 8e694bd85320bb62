// Logging module for structured logging using the tracing crate

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the tracing subscriber for structured logging
///
/// `RUST_LOG` takes precedence over the configured level. Output goes to
/// stderr so CLI results on stdout stay machine-readable.
///
/// # Errors
///
/// Returns an error if the configured level is not a valid filter or a
/// global subscriber is already installed.
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), String> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| e.to_string())?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    }
    .map_err(|e| e.to_string())
}
