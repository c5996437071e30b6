//! `plan` command
//!
//! Prints the statement catalog the pipeline would execute, without
//! connecting to the warehouse.

use std::path::PathBuf;

use serde::Serialize;

use crate::catalog::{Dialect, Phase, Statement, StatementCatalog};
use crate::cli::error::CliError;
use crate::warehouse::OutputFormat;

use super::{load_config, parse_format};

/// Plan command arguments
#[derive(Debug, Clone)]
pub struct PlanArgs {
    pub config: PathBuf,
    /// Restrict output to one phase
    pub phase: Option<String>,
    /// Override the configured dialect
    pub dialect: Option<String>,
    /// Output format (table, json)
    pub format: String,
}

#[derive(Serialize)]
struct Plan<'a> {
    dialect: Dialect,
    fingerprint: String,
    statements: Vec<&'a Statement>,
}

pub fn handle_plan(args: &PlanArgs) -> Result<(), CliError> {
    let format = parse_format(&args.format)?;
    let phase: Option<Phase> = args
        .phase
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(CliError::InvalidArgument)?;

    let config = load_config(&args.config)?;
    let dialect = match args.dialect.as_deref() {
        Some(d) => d.parse().map_err(CliError::InvalidArgument)?,
        None => config.cluster.dialect,
    };

    let catalog = StatementCatalog::build(&config.load_settings()?, dialect)?;
    println!("{}", render_plan(&catalog, phase, format)?);
    Ok(())
}

fn render_plan(
    catalog: &StatementCatalog,
    phase: Option<Phase>,
    format: OutputFormat,
) -> Result<String, CliError> {
    let statements: Vec<&Statement> = match phase {
        Some(p) => catalog.phase(p).iter().collect(),
        None => catalog.iter().collect(),
    };

    if format == OutputFormat::Json {
        let plan = Plan {
            dialect: catalog.dialect(),
            fingerprint: catalog.fingerprint(),
            statements,
        };
        return serde_json::to_string_pretty(&plan)
            .map_err(|e| CliError::IoError(format!("Failed to serialize plan: {}", e)));
    }

    let mut output = String::new();
    for (i, statement) in statements.iter().enumerate() {
        output.push_str(&format!(
            "-- [{}] {} / {}\n{}\n\n",
            i + 1,
            statement.phase,
            statement.name,
            statement.sql.trim()
        ));
    }
    output.push_str(&format!(
        "-- {} statements, dialect {}, catalog {}",
        statements.len(),
        catalog.dialect(),
        catalog.fingerprint()
    ));
    Ok(output)
}
