//! Song-play warehouse ETL - statement catalog and pipeline runner
//!
//! Provides:
//! - Configuration loading (`dwh.toml` plus environment overrides)
//! - The statement catalog for a staged star schema on Redshift
//! - A warehouse connection seam with a PostgreSQL wire-protocol backend
//! - A sequential, fail-fast pipeline runner and table-count report

pub mod catalog;
pub mod config;
pub mod pipeline;
pub mod warehouse;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use catalog::{CatalogError, Dialect, Phase, Statement, StatementCatalog, Table, TableKind};
pub use config::{ClusterSettings, ConfigError, DwhConfig, LoadSettings};
pub use pipeline::{Pipeline, PipelineError, RunOptions, RunReport, StatementOutcome};
pub use warehouse::{QueryResult, TableCount, Warehouse, WarehouseError};

#[cfg(feature = "postgres-backend")]
pub use warehouse::PostgresWarehouse;
