//! Pipeline runner tests against an in-memory recording warehouse

use std::cell::RefCell;

use async_trait::async_trait;
use dwh_etl::pipeline::table_counts;
use dwh_etl::warehouse::{FOREIGN_KEY_VIOLATION, QueryResult, WarehouseResult};
use dwh_etl::{
    Dialect, LoadSettings, Phase, Pipeline, PipelineError, RunOptions, StatementCatalog, Table,
    TableCount, Warehouse, WarehouseError,
};
use serde_json::json;

/// Records every statement; optionally fails the first one containing a marker
#[derive(Default)]
struct RecordingWarehouse {
    executed: RefCell<Vec<String>>,
    fail_on: Option<(&'static str, &'static str)>,
    report: Option<QueryResult>,
    unhealthy: bool,
}

impl RecordingWarehouse {
    fn failing_on(marker: &'static str, sqlstate: &'static str) -> Self {
        Self {
            fail_on: Some((marker, sqlstate)),
            ..Self::default()
        }
    }

    fn with_report(rows: Vec<serde_json::Value>) -> Self {
        Self {
            report: Some(QueryResult::new(
                vec!["tablename".to_string(), "cnt".to_string()],
                rows,
            )),
            ..Self::default()
        }
    }

    fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Warehouse for RecordingWarehouse {
    async fn execute(&self, sql: &str) -> WarehouseResult<u64> {
        self.executed.borrow_mut().push(sql.to_string());

        if let Some((marker, sqlstate)) = self.fail_on
            && sql.contains(marker)
        {
            return Err(WarehouseError::StatementFailed {
                message: format!("rejected: {}", marker),
                sqlstate: Some(sqlstate.to_string()),
            });
        }
        Ok(1)
    }

    async fn query(&self, _sql: &str) -> WarehouseResult<QueryResult> {
        Ok(self.report.clone().unwrap_or_else(QueryResult::empty))
    }

    async fn health_check(&self) -> WarehouseResult<bool> {
        Ok(!self.unhealthy)
    }

    fn backend_type(&self) -> &'static str {
        "recording"
    }
}

fn catalog() -> StatementCatalog {
    let settings = LoadSettings::new(
        "arn:aws:iam::x",
        "s3://bucket/log",
        "s3://bucket/jsonpath.json",
        "s3://bucket/song",
    );
    StatementCatalog::build(&settings, Dialect::Redshift).unwrap()
}

#[tokio::test]
async fn test_run_all_issues_every_statement_in_catalog_order() {
    let warehouse = RecordingWarehouse::default();
    let catalog = catalog();

    let report = Pipeline::new(&warehouse, &catalog).run_all().await.unwrap();

    let expected: Vec<String> = catalog.iter().map(|s| s.sql.clone()).collect();
    assert_eq!(warehouse.executed(), expected);
    assert_eq!(
        report.phases_run(),
        vec![Phase::Drop, Phase::Create, Phase::Copy, Phase::Insert]
    );
    assert_eq!(report.statement_names().first(), Some(&"songplay_table_drop"));
    assert_eq!(report.statement_names().last(), Some(&"songplay_table_insert"));
    assert_eq!(report.catalog_fingerprint, catalog.fingerprint());
    assert!(report.outcomes.iter().all(|o| o.rows_affected == 1));
}

#[tokio::test]
async fn test_etl_runs_copy_then_insert() {
    let warehouse = RecordingWarehouse::default();
    let catalog = catalog();

    let report = Pipeline::new(&warehouse, &catalog).etl().await.unwrap();

    assert_eq!(report.phases_run(), vec![Phase::Copy, Phase::Insert]);
    assert_eq!(report.statement_names()[..2], ["staging_events_copy", "staging_songs_copy"]);
    assert_eq!(warehouse.executed().len(), 7);
}

#[tokio::test]
async fn test_skip_copy_loads_from_existing_staging() {
    let warehouse = RecordingWarehouse::default();
    let catalog = catalog();

    let report = Pipeline::new(&warehouse, &catalog)
        .with_options(RunOptions { skip_copy: true })
        .etl()
        .await
        .unwrap();

    assert_eq!(report.skipped_phases, vec![Phase::Copy]);
    assert_eq!(report.phases_run(), vec![Phase::Insert]);
    assert!(warehouse.executed().iter().all(|sql| !sql.starts_with("COPY")));
}

#[tokio::test]
async fn test_first_failure_stops_the_run() {
    let warehouse = RecordingWarehouse::failing_on("INSERT INTO users", "XX000");
    let catalog = catalog();

    let err = Pipeline::new(&warehouse, &catalog)
        .run_all()
        .await
        .unwrap_err();

    match &err {
        PipelineError::Statement {
            phase,
            name,
            table,
            source,
        } => {
            assert_eq!(*phase, Phase::Insert);
            assert_eq!(name, "user_table_insert");
            assert_eq!(*table, Table::Users);
            assert_eq!(source.sqlstate(), Some("XX000"));
        }
        other => panic!("expected a statement failure, got {:?}", other),
    }
    assert!(!err.is_dependency_order_violation());
    assert!(err.missing_prerequisites().is_empty());

    // Drop, create and copy ran; the failing insert was the last statement issued
    let executed = warehouse.executed();
    assert_eq!(executed.len(), 7 + 7 + 2 + 1);
    assert!(executed.last().unwrap().starts_with("INSERT INTO users"));
    assert!(executed.iter().all(|sql| !sql.starts_with("INSERT INTO songplays")));
}

#[tokio::test]
async fn test_failed_create_never_reaches_loads() {
    let warehouse = RecordingWarehouse::failing_on("CREATE TABLE IF NOT EXISTS time", "42601");
    let catalog = catalog();

    let err = Pipeline::new(&warehouse, &catalog)
        .run_all()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("time_table_create"));
    assert!(warehouse.executed().iter().all(|sql| !sql.starts_with("COPY")));
}

#[tokio::test]
async fn test_foreign_key_failure_is_reported_as_dependency_violation() {
    let warehouse = RecordingWarehouse::failing_on("INSERT INTO songplays", FOREIGN_KEY_VIOLATION);
    let catalog = catalog();

    let err = Pipeline::new(&warehouse, &catalog)
        .run_span(Phase::Insert, Phase::Insert)
        .await
        .unwrap_err();

    assert!(err.is_dependency_order_violation());
    assert_eq!(err.missing_prerequisites(), vec![Table::Users, Table::Time]);
}

#[tokio::test]
async fn test_unhealthy_warehouse_runs_nothing() {
    let warehouse = RecordingWarehouse {
        unhealthy: true,
        ..RecordingWarehouse::default()
    };
    let catalog = catalog();

    let err = Pipeline::new(&warehouse, &catalog)
        .run_all()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Warehouse(WarehouseError::ConnectionFailed(_))
    ));
    assert!(warehouse.executed().is_empty());

    let err = table_counts(&warehouse).await.unwrap_err();
    assert!(err.to_string().contains("recording warehouse failed its health check"));
}

#[tokio::test]
async fn test_each_run_gets_its_own_id() {
    let warehouse = RecordingWarehouse::default();
    let catalog = catalog();
    let pipeline = Pipeline::new(&warehouse, &catalog);

    let first = pipeline.create_tables().await.unwrap();
    let second = pipeline.create_tables().await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.statement_names(), second.statement_names());
}

#[tokio::test]
async fn test_reversed_span_issues_nothing() {
    let warehouse = RecordingWarehouse::default();
    let catalog = catalog();

    let err = Pipeline::new(&warehouse, &catalog)
        .run_span(Phase::Copy, Phase::Drop)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::PhaseOrder {
            from: Phase::Copy,
            to: Phase::Drop
        }
    ));
    assert!(warehouse.executed().is_empty());
}

#[tokio::test]
async fn test_report_orders_counts_by_table() {
    let warehouse = RecordingWarehouse::with_report(vec![
        json!({"tablename": "time", "cnt": 6813}),
        json!({"tablename": "users", "cnt": "104"}),
        json!({"tablename": "songplays", "cnt": 0}),
        json!({"tablename": "artists", "cnt": 10025}),
        json!({"tablename": "songs", "cnt": 14896}),
    ]);
    let catalog = catalog();

    let counts = Pipeline::new(&warehouse, &catalog).report().await.unwrap();

    let tables: Vec<&str> = counts.iter().map(|c| c.table.as_str()).collect();
    assert_eq!(tables, StatementCatalog::dwh_table_list());
    assert_eq!(
        counts[1],
        TableCount {
            table: "users".to_string(),
            count: 104
        }
    );
}

#[tokio::test]
async fn test_report_rejects_unreadable_rows() {
    let warehouse = RecordingWarehouse::with_report(vec![json!({"tablename": "users"})]);

    let err = table_counts(&warehouse).await.unwrap_err();
    assert!(matches!(err, PipelineError::Report(_)));
}
