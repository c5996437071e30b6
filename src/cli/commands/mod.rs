//! CLI command implementations

pub mod init;
pub mod pipeline;
pub mod plan;
pub mod report;

use std::path::Path;

use crate::cli::error::CliError;
use crate::config::{ConfigError, DwhConfig};
use crate::warehouse::OutputFormat;

/// Load the configuration file, mapping a missing file to a helpful error
pub(crate) fn load_config(path: &Path) -> Result<DwhConfig, CliError> {
    DwhConfig::load(path).map_err(|e| match e {
        ConfigError::NotFound(_) => CliError::ConfigNotFound(path.to_path_buf()),
        other => CliError::Config(other),
    })
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

/// Parse an output format, accepting only table and JSON
pub(crate) fn parse_format(format: &str) -> Result<OutputFormat, CliError> {
    match format.parse().map_err(CliError::InvalidArgument)? {
        OutputFormat::Csv => Err(CliError::InvalidArgument(
            "csv output is not supported for this command".to_string(),
        )),
        other => Ok(other),
    }
}
