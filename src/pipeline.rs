//! Sequential pipeline runner
//!
//! Executes catalog statements against a [`Warehouse`], one at a time, in
//! phase order. The first failure aborts the run and is returned with the
//! name and phase of the failing statement; nothing is retried or rolled
//! back. Re-running from the drop phase is the recovery path.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::catalog::graph::TableGraph;
use crate::catalog::{CatalogError, Phase, Statement, StatementCatalog, Table};
use crate::config::ConfigError;
use crate::warehouse::{TableCount, Warehouse, WarehouseError};

/// Error type for pipeline runs
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A statement failed; the run stopped there
    #[error("Statement '{name}' ({phase} phase) failed: {source}")]
    Statement {
        phase: Phase,
        name: String,
        table: Table,
        #[source]
        source: WarehouseError,
    },

    /// Phases requested out of execution order
    #[error("Phase '{from}' cannot run before phase '{to}'")]
    PhaseOrder { from: Phase, to: Phase },

    /// The report query returned rows that could not be read
    #[error("Unexpected report result: {0}")]
    Report(String),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl PipelineError {
    /// Whether the run failed on a fact load whose dimensions were missing
    ///
    /// Only engines that enforce foreign keys report this, such as
    /// PostgreSQL. Redshift accepts the constraints but does not enforce
    /// them, so there the load succeeds with dangling references.
    pub fn is_dependency_order_violation(&self) -> bool {
        matches!(
            self,
            PipelineError::Statement { phase: Phase::Insert, source, .. }
                if source.is_foreign_key_violation()
        )
    }

    /// Tables that must be loaded before the table whose load failed
    ///
    /// Empty unless the failure is a dependency order violation.
    pub fn missing_prerequisites(&self) -> Vec<Table> {
        match self {
            PipelineError::Statement { table, .. } if self.is_dependency_order_violation() => {
                TableGraph::new().prerequisites(*table)
            }
            _ => Vec::new(),
        }
    }
}

/// Result type for pipeline runs
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Knobs for a pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Skip the COPY phase, for staging data loaded by other means
    pub skip_copy: bool,
}

/// Outcome of one executed statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementOutcome {
    pub name: String,
    pub phase: Phase,
    pub table: Table,
    pub rows_affected: u64,
    pub elapsed_ms: u64,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Fingerprint of the catalog that was executed
    pub catalog_fingerprint: String,
    pub outcomes: Vec<StatementOutcome>,
    /// Phases that were requested but skipped
    pub skipped_phases: Vec<Phase>,
    pub duration_ms: u64,
}

impl RunReport {
    /// Phases that actually ran, in order
    pub fn phases_run(&self) -> Vec<Phase> {
        let mut phases: Vec<Phase> = Vec::new();
        for outcome in &self.outcomes {
            if phases.last() != Some(&outcome.phase) {
                phases.push(outcome.phase);
            }
        }
        phases
    }

    /// Statement names in the order they ran
    pub fn statement_names(&self) -> Vec<&str> {
        self.outcomes.iter().map(|o| o.name.as_str()).collect()
    }
}

/// Runs catalog phases against a warehouse
pub struct Pipeline<'a, W: Warehouse> {
    warehouse: &'a W,
    catalog: &'a StatementCatalog,
    options: RunOptions,
}

impl<'a, W: Warehouse> Pipeline<'a, W> {
    pub fn new(warehouse: &'a W, catalog: &'a StatementCatalog) -> Self {
        Self {
            warehouse,
            catalog,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Drop and recreate every table
    pub async fn create_tables(&self) -> PipelineResult<RunReport> {
        self.run_span(Phase::Drop, Phase::Create).await
    }

    /// Load staging from S3, then populate the star schema
    pub async fn etl(&self) -> PipelineResult<RunReport> {
        self.run_span(Phase::Copy, Phase::Insert).await
    }

    /// Full refresh: every phase in order
    pub async fn run_all(&self) -> PipelineResult<RunReport> {
        self.run_span(Phase::Drop, Phase::Insert).await
    }

    /// Run phases `from` through `to`, inclusive, in execution order
    pub async fn run_span(&self, from: Phase, to: Phase) -> PipelineResult<RunReport> {
        let phases = Phase::span(from, to).ok_or(PipelineError::PhaseOrder { from, to })?;

        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id, backend = self.warehouse.backend_type());

        self.execute_phases(run_id, &phases).instrument(span).await
    }

    async fn execute_phases(&self, run_id: Uuid, phases: &[Phase]) -> PipelineResult<RunReport> {
        let started = Instant::now();
        let fingerprint = self.catalog.fingerprint();
        info!(
            phases = ?phases,
            dialect = %self.catalog.dialect(),
            catalog = %fingerprint,
            "Starting pipeline run"
        );

        ensure_healthy(self.warehouse).await?;

        let mut outcomes = Vec::new();
        let mut skipped_phases = Vec::new();

        for phase in phases {
            if *phase == Phase::Copy && self.options.skip_copy {
                info!(phase = %phase, "Skipping phase");
                skipped_phases.push(*phase);
                continue;
            }

            for statement in self.catalog.phase(*phase) {
                outcomes.push(self.execute_statement(statement).await?);
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            statements = outcomes.len(),
            duration_ms, "Pipeline run complete"
        );

        Ok(RunReport {
            run_id,
            catalog_fingerprint: fingerprint,
            outcomes,
            skipped_phases,
            duration_ms,
        })
    }

    async fn execute_statement(&self, statement: &Statement) -> PipelineResult<StatementOutcome> {
        debug!(statement = %statement.name, phase = %statement.phase, "Executing statement");
        let started = Instant::now();

        match self.warehouse.execute(&statement.sql).await {
            Ok(rows_affected) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                info!(
                    statement = %statement.name,
                    rows_affected,
                    elapsed_ms,
                    "Statement complete"
                );
                Ok(StatementOutcome {
                    name: statement.name.clone(),
                    phase: statement.phase,
                    table: statement.table,
                    rows_affected,
                    elapsed_ms,
                })
            }
            Err(e) => {
                error!(
                    statement = %statement.name,
                    phase = %statement.phase,
                    sqlstate = e.sqlstate().unwrap_or("-"),
                    "Statement failed: {}",
                    e
                );
                Err(PipelineError::Statement {
                    phase: statement.phase,
                    name: statement.name.clone(),
                    table: statement.table,
                    source: e,
                })
            }
        }
    }

    /// Row counts for every star-schema table
    pub async fn report(&self) -> PipelineResult<Vec<TableCount>> {
        table_counts(self.warehouse).await
    }
}

/// Run the reporting query and return counts in star-schema order
///
/// Needs no catalog, so it can run against a warehouse whose S3 settings
/// are not configured.
pub async fn table_counts<W: Warehouse>(warehouse: &W) -> PipelineResult<Vec<TableCount>> {
    ensure_healthy(warehouse).await?;

    let result = warehouse
        .query(&StatementCatalog::count_all_tables())
        .await?;
    let mut counts = TableCount::from_query_result(&result).map_err(PipelineError::Report)?;

    // UNION gives no ordering guarantee
    let rank = |name: &str| {
        StatementCatalog::dwh_table_list()
            .iter()
            .position(|t| *t == name)
            .unwrap_or(usize::MAX)
    };
    counts.sort_by_key(|c| rank(&c.table));

    Ok(counts)
}

/// Refuse to start when the warehouse does not answer its health check
async fn ensure_healthy<W: Warehouse>(warehouse: &W) -> PipelineResult<()> {
    if warehouse.health_check().await? {
        return Ok(());
    }
    Err(PipelineError::Warehouse(WarehouseError::ConnectionFailed(
        format!("{} warehouse failed its health check", warehouse.backend_type()),
    )))
}
