//! Pipeline commands: `create-tables`, `etl` and `run`
//!
//! Each command builds the catalog from the configuration, connects to the
//! cluster, and runs its span of phases. The first failing statement stops
//! the command with a non-zero exit.

use std::path::PathBuf;

use crate::catalog::{Phase, StatementCatalog};
use crate::cli::error::CliError;
use crate::config::{ClusterSettings, DwhConfig};
use crate::pipeline::{Pipeline, RunOptions, RunReport};
use crate::warehouse::{OutputFormat, PostgresWarehouse, QueryResult, format_query_result};

use super::report::{print_counts, report_counts};
use super::{load_config, runtime};

/// Arguments shared by the pipeline commands
#[derive(Debug, Clone)]
pub struct PipelineArgs {
    pub config: PathBuf,
    /// Skip the COPY phase
    pub skip_copy: bool,
}

/// Drop and recreate every table
pub fn handle_create_tables(args: &PipelineArgs) -> Result<(), CliError> {
    run_phases(args, Phase::Drop, Phase::Create, false)
}

/// Load staging, then populate the star schema
pub fn handle_etl(args: &PipelineArgs) -> Result<(), CliError> {
    run_phases(args, Phase::Copy, Phase::Insert, false)
}

/// Full refresh followed by the table-count report
pub fn handle_run(args: &PipelineArgs) -> Result<(), CliError> {
    run_phases(args, Phase::Drop, Phase::Insert, true)
}

fn run_phases(args: &PipelineArgs, from: Phase, to: Phase, report: bool) -> Result<(), CliError> {
    let config = load_config(&args.config)?;
    let (catalog, cluster) = prepare(&config)?;
    let options = RunOptions {
        skip_copy: args.skip_copy,
    };

    let rt = runtime()?;
    rt.block_on(async {
        let warehouse = PostgresWarehouse::connect(&cluster).await?;
        let pipeline = Pipeline::new(&warehouse, &catalog).with_options(options);

        let run = pipeline.run_span(from, to).await.inspect_err(|e| {
            if e.is_dependency_order_violation() {
                let prerequisites: Vec<&str> =
                    e.missing_prerequisites().iter().map(|t| t.name()).collect();
                tracing::error!(
                    prerequisites = %prerequisites.join(", "),
                    "Fact rows were loaded before their dimension rows"
                );
            }
        })?;
        println!("{}", format_query_result(&outcome_rows(&run), OutputFormat::Table));
        println!(
            "Run {} finished {} statements in {}ms",
            run.run_id,
            run.outcomes.len(),
            run.duration_ms
        );

        if report {
            let counts = report_counts(&warehouse).await?;
            print_counts(&counts, OutputFormat::Table)?;
        }

        Ok::<_, CliError>(())
    })
}

/// Resolve every configuration value before anything connects
fn prepare(config: &DwhConfig) -> Result<(StatementCatalog, ClusterSettings), CliError> {
    let settings = config.load_settings()?;
    let cluster = config.cluster_settings()?;
    let catalog = StatementCatalog::build(&settings, cluster.dialect)?;
    Ok((catalog, cluster))
}

fn outcome_rows(run: &RunReport) -> QueryResult {
    let rows = run
        .outcomes
        .iter()
        .map(|o| {
            serde_json::json!({
                "statement": o.name,
                "phase": o.phase.name(),
                "rows": o.rows_affected,
                "ms": o.elapsed_ms,
            })
        })
        .collect();

    QueryResult::new(
        vec![
            "statement".to_string(),
            "phase".to_string(),
            "rows".to_string(),
            "ms".to_string(),
        ],
        rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Table;
    use crate::pipeline::StatementOutcome;
    use uuid::Uuid;

    #[test]
    fn test_outcome_rows_render_as_table() {
        let run = RunReport {
            run_id: Uuid::new_v4(),
            catalog_fingerprint: String::new(),
            outcomes: vec![StatementOutcome {
                name: "user_table_insert".to_string(),
                phase: Phase::Insert,
                table: Table::Users,
                rows_affected: 96,
                elapsed_ms: 12,
            }],
            skipped_phases: vec![Phase::Copy],
            duration_ms: 12,
        };

        let output = format_query_result(&outcome_rows(&run), OutputFormat::Table);
        assert!(output.starts_with("statement"));
        assert!(output.contains("user_table_insert | insert | 96"));
        assert!(output.contains("(1 rows)"));
    }

    #[test]
    fn test_prepare_requires_cluster_settings() {
        let mut config = DwhConfig::parse(crate::config::sample_config()).unwrap();
        config.cluster.host = None;
        assert!(matches!(prepare(&config), Err(CliError::Config(_))));
    }
}
