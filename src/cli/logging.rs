//! Log output for the CLI
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` takes precedence over `--log-level`.

use tracing_subscriber::{EnvFilter, fmt};

use super::error::CliError;

pub fn init_logging(level: &str) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| CliError::InvalidArgument(format!("Invalid log level '{}': {}", level, e)))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| CliError::IoError(format!("Failed to install logger: {}", e)))
}
