//! Warehouse table definitions
//!
//! Column layouts for the two staging tables and the five star-schema
//! tables, rendered as `CREATE`/`DROP` statements for a given SQL dialect.
//! Physical-layout hints (`sortkey distkey`) only exist in the Redshift
//! rendering; they carry no logical meaning.

use serde::{Deserialize, Serialize};

/// Target SQL dialect for DDL rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Amazon Redshift (default)
    #[default]
    Redshift,
    /// Plain PostgreSQL, without Redshift layout hints
    Postgres,
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redshift" => Ok(Dialect::Redshift),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            _ => Err(format!(
                "Unknown SQL dialect: {}. Use 'redshift' or 'postgres'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Redshift => write!(f, "redshift"),
            Dialect::Postgres => write!(f, "postgres"),
        }
    }
}

/// Role a table plays in the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// Raw landing table, no constraints
    Staging,
    /// Descriptive dimension
    Dimension,
    /// Event fact table
    Fact,
}

/// Column constraint, as far as the DDL needs to know
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Plain,
    NotNull,
    /// Primary key; also the sort and distribution key on Redshift
    PrimaryKey,
    /// Auto-incrementing primary key
    Identity,
    /// `NOT NULL REFERENCES <table> (<column>)`
    References(Table, &'static str),
}

/// A single column definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub data_type: &'static str,
    pub role: ColumnRole,
}

const fn col(name: &'static str, data_type: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        data_type,
        role: ColumnRole::Plain,
    }
}

const fn col_with(name: &'static str, data_type: &'static str, role: ColumnRole) -> ColumnDef {
    ColumnDef {
        name,
        data_type,
        role,
    }
}

const STG_EVENTS_COLUMNS: &[ColumnDef] = &[
    col("artist", "VARCHAR"),
    col("auth", "VARCHAR"),
    col("firstName", "VARCHAR"),
    col("gender", "VARCHAR"),
    col("itemInSession", "INT"),
    col("lastName", "VARCHAR"),
    col("length", "NUMERIC"),
    col("level", "VARCHAR"),
    col("location", "VARCHAR"),
    col("method", "VARCHAR"),
    col("page", "VARCHAR"),
    col("registration", "NUMERIC"),
    col("sessionId", "INT"),
    col("song", "VARCHAR"),
    col("status", "INT"),
    col("ts", "NUMERIC"),
    col("userAgent", "VARCHAR"),
    col("userId", "INT"),
];

const STG_SONGS_COLUMNS: &[ColumnDef] = &[
    col("num_songs", "INT"),
    col("artist_id", "VARCHAR"),
    col("artist_latitude", "NUMERIC"),
    col("artist_longitude", "NUMERIC"),
    col("artist_location", "VARCHAR"),
    col("artist_name", "VARCHAR"),
    col("song_id", "VARCHAR"),
    col("title", "VARCHAR"),
    col("duration", "NUMERIC"),
    col("year", "INT"),
];

const USERS_COLUMNS: &[ColumnDef] = &[
    col_with("user_id", "INT", ColumnRole::PrimaryKey),
    col("first_name", "VARCHAR"),
    col("last_name", "VARCHAR"),
    col("gender", "VARCHAR"),
    col("level", "VARCHAR"),
];

const SONGS_COLUMNS: &[ColumnDef] = &[
    col_with("song_id", "VARCHAR", ColumnRole::PrimaryKey),
    col("title", "VARCHAR"),
    col_with("artist_id", "VARCHAR", ColumnRole::NotNull),
    col("year", "INT"),
    col("duration", "NUMERIC"),
];

const ARTISTS_COLUMNS: &[ColumnDef] = &[
    col_with("artist_id", "VARCHAR", ColumnRole::PrimaryKey),
    col("name", "VARCHAR"),
    col("location", "VARCHAR"),
    col("latitude", "NUMERIC"),
    col("longitude", "NUMERIC"),
];

const TIME_COLUMNS: &[ColumnDef] = &[
    col_with("start_time", "TIMESTAMP", ColumnRole::PrimaryKey),
    col("hour", "INT"),
    col("day", "INT"),
    col("week", "INT"),
    col("month", "INT"),
    col("year", "INT"),
    col("weekday", "INT"),
];

const SONGPLAYS_COLUMNS: &[ColumnDef] = &[
    col_with("songplay_id", "INT", ColumnRole::Identity),
    col_with(
        "start_time",
        "TIMESTAMP",
        ColumnRole::References(Table::Time, "start_time"),
    ),
    col_with(
        "user_id",
        "INT",
        ColumnRole::References(Table::Users, "user_id"),
    ),
    col("level", "VARCHAR"),
    col("song_id", "VARCHAR"),
    col("artist_id", "VARCHAR"),
    col("session_id", "INT"),
    col("location", "VARCHAR"),
    col("user_agent", "VARCHAR"),
];

/// Every table the pipeline manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    StgEvents,
    StgSongs,
    Users,
    Songs,
    Artists,
    Time,
    Songplays,
}

impl Table {
    /// All tables in declaration order
    pub const ALL: [Table; 7] = [
        Table::StgEvents,
        Table::StgSongs,
        Table::Users,
        Table::Songs,
        Table::Artists,
        Table::Time,
        Table::Songplays,
    ];

    /// Staging tables, in load order
    pub const STAGING: [Table; 2] = [Table::StgEvents, Table::StgSongs];

    /// Star-schema tables, fact table first (reporting order)
    pub const DWH: [Table; 5] = [
        Table::Songplays,
        Table::Users,
        Table::Songs,
        Table::Artists,
        Table::Time,
    ];

    /// Warehouse table name
    pub fn name(&self) -> &'static str {
        match self {
            Table::StgEvents => "stg_events",
            Table::StgSongs => "stg_songs",
            Table::Users => "users",
            Table::Songs => "songs",
            Table::Artists => "artists",
            Table::Time => "time",
            Table::Songplays => "songplays",
        }
    }

    /// Prefix used to build statement names, e.g. `user_table_insert`
    pub fn statement_prefix(&self) -> &'static str {
        match self {
            Table::StgEvents => "staging_events",
            Table::StgSongs => "staging_songs",
            Table::Users => "user",
            Table::Songs => "song",
            Table::Artists => "artist",
            Table::Time => "time",
            Table::Songplays => "songplay",
        }
    }

    pub fn kind(&self) -> TableKind {
        match self {
            Table::StgEvents | Table::StgSongs => TableKind::Staging,
            Table::Songplays => TableKind::Fact,
            _ => TableKind::Dimension,
        }
    }

    pub fn columns(&self) -> &'static [ColumnDef] {
        match self {
            Table::StgEvents => STG_EVENTS_COLUMNS,
            Table::StgSongs => STG_SONGS_COLUMNS,
            Table::Users => USERS_COLUMNS,
            Table::Songs => SONGS_COLUMNS,
            Table::Artists => ARTISTS_COLUMNS,
            Table::Time => TIME_COLUMNS,
            Table::Songplays => SONGPLAYS_COLUMNS,
        }
    }

    /// Tables this table holds foreign keys into
    pub fn references(&self) -> Vec<Table> {
        self.columns()
            .iter()
            .filter_map(|c| match c.role {
                ColumnRole::References(target, _) => Some(target),
                _ => None,
            })
            .collect()
    }

    /// Whether any other table declares a foreign key into this one
    pub fn is_referenced(&self) -> bool {
        Table::ALL.iter().any(|t| t.references().contains(self))
    }

    /// `DROP TABLE IF EXISTS`, cascading when other tables reference this one
    pub fn drop_sql(&self) -> String {
        if self.is_referenced() {
            format!("DROP TABLE IF EXISTS {} CASCADE;", self.name())
        } else {
            format!("DROP TABLE IF EXISTS {};", self.name())
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` with column types and key annotations
    pub fn create_sql(&self, dialect: Dialect) -> String {
        let columns: Vec<String> = self
            .columns()
            .iter()
            .map(|c| format!("    {}", render_column(c, dialect)))
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {}\n(\n{}\n);",
            self.name(),
            columns.join(",\n")
        )
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn render_column(column: &ColumnDef, dialect: Dialect) -> String {
    let constraint = match (column.role, dialect) {
        (ColumnRole::Plain, _) => String::new(),
        (ColumnRole::NotNull, _) => " NOT NULL".to_string(),
        (ColumnRole::PrimaryKey, Dialect::Redshift) => " PRIMARY KEY sortkey distkey".to_string(),
        (ColumnRole::PrimaryKey, Dialect::Postgres) => " PRIMARY KEY".to_string(),
        (ColumnRole::Identity, Dialect::Redshift) => {
            " GENERATED BY DEFAULT AS IDENTITY(0,1) PRIMARY KEY sortkey distkey".to_string()
        }
        (ColumnRole::Identity, Dialect::Postgres) => {
            " GENERATED BY DEFAULT AS IDENTITY (START WITH 0 MINVALUE 0) PRIMARY KEY".to_string()
        }
        (ColumnRole::References(target, target_column), _) => {
            format!(" NOT NULL REFERENCES {} ({})", target.name(), target_column)
        }
    };

    format!("{} {}{}", column.name, column.data_type, constraint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_only_on_referenced_tables() {
        let cascading: Vec<Table> = Table::ALL
            .into_iter()
            .filter(|t| t.drop_sql().contains("CASCADE"))
            .collect();
        assert_eq!(cascading, vec![Table::Users, Table::Time]);
        assert_eq!(Table::Songs.drop_sql(), "DROP TABLE IF EXISTS songs;");
    }

    #[test]
    fn test_songplays_references() {
        assert_eq!(
            Table::Songplays.references(),
            vec![Table::Time, Table::Users]
        );
        assert!(Table::Songs.references().is_empty());
    }

    #[test]
    fn test_redshift_create_has_layout_hints() {
        let sql = Table::Users.create_sql(Dialect::Redshift);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS users"));
        assert!(sql.contains("user_id INT PRIMARY KEY sortkey distkey"));

        let songplays = Table::Songplays.create_sql(Dialect::Redshift);
        assert!(songplays.contains("IDENTITY(0,1)"));
        assert!(songplays.contains("start_time TIMESTAMP NOT NULL REFERENCES time (start_time)"));
    }

    #[test]
    fn test_postgres_create_drops_layout_hints() {
        for table in Table::ALL {
            let sql = table.create_sql(Dialect::Postgres);
            assert!(!sql.contains("sortkey"), "{} kept sortkey", table);
            assert!(!sql.contains("distkey"), "{} kept distkey", table);
        }
    }

    #[test]
    fn test_staging_tables_have_no_constraints() {
        for table in Table::STAGING {
            let sql = table.create_sql(Dialect::Redshift);
            assert!(!sql.contains("PRIMARY KEY"));
            assert!(!sql.contains("NOT NULL"));
            assert_eq!(table.kind(), TableKind::Staging);
        }
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("Redshift".parse::<Dialect>().unwrap(), Dialect::Redshift);
        assert_eq!("postgresql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("mysql".parse::<Dialect>().is_err());
    }
}
