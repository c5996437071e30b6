//! Warehouse connection abstraction
//!
//! The pipeline talks to the warehouse through the [`Warehouse`] trait:
//! one statement at a time, each awaited before the next is issued. Engine
//! errors are passed through untouched; this layer does not classify them
//! beyond exposing the SQLSTATE code.
//!
//! Backends:
//! - PostgreSQL wire protocol (Redshift, or PostgreSQL for local runs),
//!   behind the `postgres-backend` feature

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "postgres-backend")]
pub mod postgres;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresWarehouse;

/// SQLSTATE raised on a foreign-key violation
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Error type for warehouse operations
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// Failed to connect to the warehouse
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The engine rejected a statement
    #[error("Statement failed: {message}")]
    StatementFailed {
        message: String,
        sqlstate: Option<String>,
    },
}

impl WarehouseError {
    /// SQLSTATE reported by the engine, if any
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            WarehouseError::StatementFailed { sqlstate, .. } => sqlstate.as_deref(),
            WarehouseError::ConnectionFailed(_) => None,
        }
    }

    /// Whether the engine reported a referential-integrity violation
    ///
    /// This is how a fact load attempted before its dimensions surfaces on
    /// PostgreSQL. Redshift does not enforce foreign keys and never reports it.
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate() == Some(FOREIGN_KEY_VIOLATION)
    }
}

/// Result type for warehouse operations
pub type WarehouseResult<T> = Result<T, WarehouseError>;

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    /// Create an empty result
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Row count of one star-schema table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,
    pub count: i64,
}

impl TableCount {
    /// Parse the rows returned by the table-count report query
    ///
    /// Counts may arrive as JSON numbers or as text, depending on the
    /// driver's type mapping. Column names are matched case-insensitively.
    pub fn from_query_result(result: &QueryResult) -> Result<Vec<TableCount>, String> {
        let mut counts = Vec::with_capacity(result.row_count());

        for row in &result.rows {
            let object = row
                .as_object()
                .ok_or_else(|| format!("Expected an object row, got {}", row))?;
            let field = |name: &str| {
                object
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            };

            let table = field("tablename")
                .and_then(|v| v.as_str())
                .ok_or_else(|| format!("Row has no table name: {}", row))?
                .to_string();

            let count = match field("cnt") {
                Some(serde_json::Value::Number(n)) => n.as_i64(),
                Some(serde_json::Value::String(s)) => s.parse().ok(),
                _ => None,
            }
            .ok_or_else(|| format!("Row has no count: {}", row))?;

            counts.push(TableCount { table, count });
        }

        Ok(counts)
    }
}

/// Warehouse connection used by the pipeline runner
///
/// Implementations issue exactly one statement per call and return only
/// after the engine has finished with it.
#[async_trait(?Send)]
pub trait Warehouse {
    /// Execute a statement that returns no rows
    ///
    /// # Returns
    /// Number of rows affected, where the engine reports it
    async fn execute(&self, sql: &str) -> WarehouseResult<u64>;

    /// Execute a query and return its rows
    async fn query(&self, sql: &str) -> WarehouseResult<QueryResult>;

    /// Check if the warehouse is reachable
    async fn health_check(&self) -> WarehouseResult<bool>;

    /// Backend type name
    fn backend_type(&self) -> &'static str;
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Format query results for display
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn format_as_csv(result: &QueryResult) -> String {
    let mut output = String::new();

    output.push_str(&result.columns.join(","));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .map(|col| match row.get(col).unwrap_or(&serde_json::Value::Null) {
                serde_json::Value::String(s) => {
                    if s.contains(',') || s.contains('"') || s.contains('\n') {
                        format!("\"{}\"", s.replace('"', "\"\""))
                    } else {
                        s.clone()
                    }
                }
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    for row in &result.rows {
        for (i, col) in result.columns.iter().enumerate() {
            let value = row.get(col).unwrap_or(&serde_json::Value::Null);
            widths[i] = widths[i].max(cell_text(value).len());
        }
    }

    let mut output = String::new();

    let header: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:width$}", c, width = widths[i]))
        .collect();
    output.push_str(&header.join(" | "));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&separator.join("-+-"));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let value = row.get(col).unwrap_or(&serde_json::Value::Null);
                format!("{:width$}", cell_text(value), width = widths[i])
            })
            .collect();
        output.push_str(&values.join(" | "));
        output.push('\n');
    }

    output.push_str(&format!("({} rows)", result.row_count()));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn counts_result() -> QueryResult {
        QueryResult::new(
            vec!["tablename".to_string(), "cnt".to_string()],
            vec![
                serde_json::json!({"tablename": "songplays", "cnt": 0}),
                serde_json::json!({"tablename": "users", "cnt": "97"}),
            ],
        )
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("table").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("csv").unwrap(), OutputFormat::Csv);
        assert!(OutputFormat::from_str("yaml").is_err());
    }

    #[test]
    fn test_table_counts_from_result() {
        let counts = TableCount::from_query_result(&counts_result()).unwrap();
        assert_eq!(
            counts,
            vec![
                TableCount {
                    table: "songplays".to_string(),
                    count: 0
                },
                TableCount {
                    table: "users".to_string(),
                    count: 97
                },
            ]
        );
    }

    #[test]
    fn test_table_counts_accept_uppercase_columns() {
        let result = QueryResult::new(
            vec!["Tablename".to_string(), "CNT".to_string()],
            vec![serde_json::json!({"Tablename": "time", "CNT": 3})],
        );
        let counts = TableCount::from_query_result(&result).unwrap();
        assert_eq!(counts[0].table, "time");
        assert_eq!(counts[0].count, 3);
    }

    #[test]
    fn test_table_counts_reject_missing_count() {
        let result = QueryResult::new(
            vec!["tablename".to_string()],
            vec![serde_json::json!({"tablename": "time"})],
        );
        assert!(TableCount::from_query_result(&result).is_err());
    }

    #[test]
    fn test_format_as_table() {
        let output = format_as_table(&counts_result());
        assert!(output.contains("tablename"));
        assert!(output.contains("songplays"));
        assert!(output.contains("(2 rows)"));
        assert_eq!(format_as_table(&QueryResult::empty()), "(0 rows)");
    }

    #[test]
    fn test_format_as_csv() {
        let result = QueryResult::new(
            vec!["tablename".to_string(), "note".to_string()],
            vec![serde_json::json!({"tablename": "users", "note": "a, b"})],
        );
        let output = format_as_csv(&result);
        assert!(output.starts_with("tablename,note\n"));
        assert!(output.contains("users,\"a, b\""));
    }

    #[test]
    fn test_foreign_key_classification() {
        let err = WarehouseError::StatementFailed {
            message: "insert or update on table \"songplays\" violates foreign key constraint"
                .to_string(),
            sqlstate: Some(FOREIGN_KEY_VIOLATION.to_string()),
        };
        assert!(err.is_foreign_key_violation());
        assert!(!WarehouseError::ConnectionFailed("refused".to_string()).is_foreign_key_violation());
    }
}
