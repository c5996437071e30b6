//! Statement catalog for the song-play warehouse
//!
//! The catalog is the complete, ordered set of SQL statements a pipeline run
//! issues, grouped into four phases that always execute in the same order:
//!
//! 1. **Drop** every table (dependents first, cascading on referenced tables)
//! 2. **Create** every table (referenced tables first)
//! 3. **Copy** raw JSON from S3 into the staging tables
//! 4. **Insert** from staging into the star schema (dimensions before facts)
//!
//! Within a phase, the order comes from the declared table dependency graph
//! rather than from list position, so `time` and `users` are always loaded
//! before `songplays`.

pub mod graph;
pub mod loads;
pub mod tables;
pub mod template;
pub mod time;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::LoadSettings;
use graph::TableGraph;
pub use tables::{Dialect, Table, TableKind};

/// Error type for catalog construction
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A template placeholder had no value
    #[error("Template '{template}' has no value for placeholder '{placeholder}'")]
    UnboundPlaceholder {
        template: &'static str,
        placeholder: String,
    },

    /// A value was bound to a placeholder the template does not have
    #[error("Template '{template}' has no placeholder '{placeholder}'")]
    UnknownPlaceholder {
        template: &'static str,
        placeholder: String,
    },

    /// Rendered text is not a single well-formed statement
    #[error("Template '{template}' rendered a malformed statement: {message}")]
    MalformedStatement {
        template: &'static str,
        message: String,
    },

    /// Table dependencies contain a cycle
    #[error("Table dependency cycle involving: {}", .0.join(", "))]
    Cycle(Vec<&'static str>),

    /// COPY requested for a non-staging table
    #[error("Table '{0}' is not a staging table")]
    NotStaging(&'static str),

    /// INSERT requested for a staging table
    #[error("Table '{0}' is not loaded from staging")]
    NotLoadable(&'static str),
}

/// Execution phase; variants are declared in execution order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Drop,
    Create,
    Copy,
    Insert,
}

impl Phase {
    /// All phases in execution order
    pub const ALL: [Phase; 4] = [Phase::Drop, Phase::Create, Phase::Copy, Phase::Insert];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Drop => "drop",
            Phase::Create => "create",
            Phase::Copy => "copy",
            Phase::Insert => "insert",
        }
    }

    /// Phases from `from` through `to`, inclusive
    ///
    /// Returns `None` when `from` comes after `to`.
    pub fn span(from: Phase, to: Phase) -> Option<Vec<Phase>> {
        if from > to {
            return None;
        }
        Some(
            Phase::ALL
                .into_iter()
                .filter(|p| *p >= from && *p <= to)
                .collect(),
        )
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(Phase::Drop),
            "create" => Ok(Phase::Create),
            "copy" => Ok(Phase::Copy),
            "insert" => Ok(Phase::Insert),
            _ => Err(format!("Unknown phase: {}", s)),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A named SQL statement bound to one table and one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Stable name used in logs and errors, e.g. `songplay_table_insert`
    pub name: String,
    pub phase: Phase,
    pub table: Table,
    pub sql: String,
}

impl Statement {
    fn new(phase: Phase, table: Table, sql: String) -> Self {
        let suffix = match phase {
            Phase::Drop => "table_drop",
            Phase::Create => "table_create",
            Phase::Copy => "copy",
            Phase::Insert => "table_insert",
        };
        Self {
            name: format!("{}_{}", table.statement_prefix(), suffix),
            phase,
            table,
            sql,
        }
    }
}

/// The full, ordered statement catalog for one configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementCatalog {
    dialect: Dialect,
    drop: Vec<Statement>,
    create: Vec<Statement>,
    copy: Vec<Statement>,
    insert: Vec<Statement>,
}

impl StatementCatalog {
    /// Build every statement from resolved load settings
    pub fn build(settings: &LoadSettings, dialect: Dialect) -> Result<Self, CatalogError> {
        let graph = TableGraph::new();
        let load_order = graph.load_order()?;
        let drop_order = graph.drop_order()?;

        let drop = drop_order
            .iter()
            .map(|t| Statement::new(Phase::Drop, *t, t.drop_sql()))
            .collect();

        let create = load_order
            .iter()
            .map(|t| Statement::new(Phase::Create, *t, t.create_sql(dialect)))
            .collect();

        let copy = load_order
            .iter()
            .filter(|t| t.kind() == TableKind::Staging)
            .map(|t| Ok(Statement::new(Phase::Copy, *t, loads::copy_sql(*t, settings)?)))
            .collect::<Result<Vec<_>, CatalogError>>()?;

        let insert = load_order
            .iter()
            .filter(|t| t.kind() != TableKind::Staging)
            .map(|t| Ok(Statement::new(Phase::Insert, *t, loads::insert_sql(*t)?)))
            .collect::<Result<Vec<_>, CatalogError>>()?;

        let catalog = Self {
            dialect,
            drop,
            create,
            copy,
            insert,
        };

        tracing::debug!(
            dialect = %dialect,
            statements = catalog.len(),
            "Built statement catalog"
        );

        Ok(catalog)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn drop(&self) -> &[Statement] {
        &self.drop
    }

    pub fn create(&self) -> &[Statement] {
        &self.create
    }

    pub fn copy(&self) -> &[Statement] {
        &self.copy
    }

    pub fn insert(&self) -> &[Statement] {
        &self.insert
    }

    /// Statements of one phase
    pub fn phase(&self, phase: Phase) -> &[Statement] {
        match phase {
            Phase::Drop => &self.drop,
            Phase::Create => &self.create,
            Phase::Copy => &self.copy,
            Phase::Insert => &self.insert,
        }
    }

    /// Every statement in execution order
    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        Phase::ALL.into_iter().flat_map(move |p| self.phase(p).iter())
    }

    /// Look up a statement by name
    pub fn get(&self, name: &str) -> Option<&Statement> {
        self.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.drop.len() + self.create.len() + self.copy.len() + self.insert.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SHA-256 over every statement, in execution order
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for statement in self.iter() {
            hasher.update(statement.name.as_bytes());
            hasher.update(b"\n");
            hasher.update(statement.sql.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    /// Names of the staging tables
    pub fn staging_table_list() -> Vec<&'static str> {
        Table::STAGING.iter().map(|t| t.name()).collect()
    }

    /// Names of the star-schema tables, fact table first
    pub fn dwh_table_list() -> Vec<&'static str> {
        Table::DWH.iter().map(|t| t.name()).collect()
    }

    /// Row counts for every star-schema table as `(tablename, cnt)` rows
    pub fn count_all_tables() -> String {
        let selects: Vec<String> = Table::DWH
            .iter()
            .map(|t| {
                format!(
                    "SELECT '{name}' AS tablename, COUNT(*) AS cnt FROM {name}",
                    name = t.name()
                )
            })
            .collect();
        format!("{};", selects.join("\nUNION\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> StatementCatalog {
        let settings = LoadSettings::new(
            "arn:aws:iam::123:role/dwh",
            "'s3://udacity-dend/log_data'",
            "'s3://udacity-dend/log_json_path.json'",
            "'s3://udacity-dend/song_data'",
        );
        StatementCatalog::build(&settings, Dialect::Redshift).unwrap()
    }

    #[test]
    fn test_group_sizes() {
        let c = catalog();
        assert_eq!(c.drop().len(), 7);
        assert_eq!(c.create().len(), 7);
        assert_eq!(c.copy().len(), 2);
        assert_eq!(c.insert().len(), 5);
        assert_eq!(c.len(), 21);
        assert!(!c.is_empty());
    }

    #[test]
    fn test_statement_names() {
        let c = catalog();
        for name in [
            "staging_events_table_drop",
            "time_table_create",
            "staging_songs_copy",
            "songplay_table_insert",
            "user_table_insert",
        ] {
            assert!(c.get(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn test_iter_follows_phase_order() {
        let phases: Vec<Phase> = catalog().iter().map(|s| s.phase).collect();
        let mut sorted = phases.clone();
        sorted.sort();
        assert_eq!(phases, sorted);
    }

    #[test]
    fn test_insert_loads_dimensions_before_fact() {
        let names: Vec<&str> = catalog().insert().iter().map(|s| s.table.name()).collect();
        assert_eq!(names, vec!["users", "songs", "artists", "time", "songplays"]);
    }

    #[test]
    fn test_phase_span() {
        assert_eq!(
            Phase::span(Phase::Drop, Phase::Create),
            Some(vec![Phase::Drop, Phase::Create])
        );
        assert_eq!(Phase::span(Phase::Insert, Phase::Insert), Some(vec![Phase::Insert]));
        assert_eq!(Phase::span(Phase::Insert, Phase::Drop), None);
    }

    #[test]
    fn test_fingerprint_depends_on_dialect() {
        let settings = LoadSettings::new("a", "b", "c", "d");
        let redshift = StatementCatalog::build(&settings, Dialect::Redshift).unwrap();
        let postgres = StatementCatalog::build(&settings, Dialect::Postgres).unwrap();
        assert_eq!(redshift.fingerprint().len(), 64);
        assert_eq!(redshift.fingerprint(), redshift.fingerprint());
        assert_ne!(redshift.fingerprint(), postgres.fingerprint());
    }

    #[test]
    fn test_count_all_tables() {
        let sql = StatementCatalog::count_all_tables();
        assert_eq!(sql.matches("UNION").count(), 4);
        for name in StatementCatalog::dwh_table_list() {
            assert!(sql.contains(&format!("FROM {}", name)));
        }
        assert!(!sql.contains("stg_"));
    }

    #[test]
    fn test_table_lists() {
        assert_eq!(
            StatementCatalog::staging_table_list(),
            vec!["stg_events", "stg_songs"]
        );
        assert_eq!(
            StatementCatalog::dwh_table_list(),
            vec!["songplays", "users", "songs", "artists", "time"]
        );
    }
}
