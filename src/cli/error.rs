//! CLI-specific error types

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::pipeline::PipelineError;
use crate::warehouse::WarehouseError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Config file not found: {0}. Run 'dwh-etl init-config' to create one.")]
    ConfigNotFound(PathBuf),

    #[error("Refusing to overwrite existing file {0} (use --force)")]
    FileExists(PathBuf),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(String),
}
