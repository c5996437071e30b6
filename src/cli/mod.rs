//! Command-line interface support for `dwh-etl`

pub mod commands;
pub mod error;
pub mod logging;
