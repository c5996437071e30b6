//! `report` command
//!
//! Prints the row count of every star-schema table.

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::pipeline::table_counts;
use crate::warehouse::{
    OutputFormat, PostgresWarehouse, QueryResult, TableCount, Warehouse, format_query_result,
};

use super::{load_config, runtime};

/// Report command arguments
#[derive(Debug, Clone)]
pub struct ReportArgs {
    pub config: PathBuf,
    /// Output format (table, json, csv)
    pub format: String,
}

pub fn handle_report(args: &ReportArgs) -> Result<(), CliError> {
    let format: OutputFormat = args.format.parse().map_err(CliError::InvalidArgument)?;
    let config = load_config(&args.config)?;
    let cluster = config.cluster_settings()?;

    let rt = runtime()?;
    rt.block_on(async {
        let warehouse = PostgresWarehouse::connect(&cluster).await?;
        let counts = report_counts(&warehouse).await?;
        print_counts(&counts, format)
    })
}

pub(crate) async fn report_counts<W: Warehouse>(warehouse: &W) -> Result<Vec<TableCount>, CliError> {
    Ok(table_counts(warehouse).await?)
}

pub(crate) fn print_counts(counts: &[TableCount], format: OutputFormat) -> Result<(), CliError> {
    println!("{}", render_counts(counts, format)?);
    Ok(())
}

fn render_counts(counts: &[TableCount], format: OutputFormat) -> Result<String, CliError> {
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(counts)
            .map_err(|e| CliError::IoError(format!("Failed to serialize report: {}", e)));
    }

    let rows = counts
        .iter()
        .map(|c| serde_json::json!({ "tablename": c.table, "cnt": c.count }))
        .collect();
    let result = QueryResult::new(vec!["tablename".to_string(), "cnt".to_string()], rows);
    Ok(format_query_result(&result, format))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts() -> Vec<TableCount> {
        vec![
            TableCount {
                table: "songplays".to_string(),
                count: 333,
            },
            TableCount {
                table: "users".to_string(),
                count: 104,
            },
        ]
    }

    #[test]
    fn test_render_counts_table() {
        let output = render_counts(&counts(), OutputFormat::Table).unwrap();
        assert!(output.starts_with("tablename | cnt"));
        assert!(output.contains("songplays | 333"));
        assert!(output.ends_with("(2 rows)"));
    }

    #[test]
    fn test_render_counts_csv() {
        let format: OutputFormat = "csv".parse().unwrap();
        let output = render_counts(&counts(), format).unwrap();
        assert_eq!(output, "tablename,cnt\nsongplays,333\nusers,104\n");
    }

    #[test]
    fn test_render_counts_json() {
        let output = render_counts(&counts(), OutputFormat::Json).unwrap();
        let parsed: Vec<TableCount> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed, counts());
    }
}
