//! Bulk-load and transform statements
//!
//! COPY statements move raw JSON from S3 into the staging tables; INSERT
//! statements project staging rows into the star schema.

use super::CatalogError;
use super::tables::Table;
use super::template::{SqlTemplate, SqlValue, unquote};
use super::time::{CalendarField, NEXT_SONG_PAGE, extract_sql, start_time_sql};
use crate::config::LoadSettings;

/// Region of the source bucket
pub const COPY_REGION: &str = "us-west-2";

/// JSON format descriptor letting the warehouse match keys to columns
pub const JSON_AUTO: &str = "auto";

/// Bulk-ingest command shape shared by both staging loads
pub const COPY_TEMPLATE: SqlTemplate = SqlTemplate::new(
    "copy",
    "COPY {table}\nFROM {source}\nCREDENTIALS {credentials}\nJSON {json_format}\nCOMPUPDATE ON REGION {region};",
);

/// Render the COPY statement for a staging table
///
/// `stg_events` uses the explicit JSON-path mapping from configuration,
/// `stg_songs` uses automatic key matching.
pub fn copy_sql(table: Table, settings: &LoadSettings) -> Result<String, CatalogError> {
    let (source, json_format) = match table {
        Table::StgEvents => (settings.log_data.as_str(), settings.log_jsonpath.as_str()),
        Table::StgSongs => (settings.song_data.as_str(), JSON_AUTO),
        other => return Err(CatalogError::NotStaging(other.name())),
    };

    COPY_TEMPLATE.render(&[
        ("table", SqlValue::ident(table.name())),
        ("source", SqlValue::literal(source)),
        (
            "credentials",
            SqlValue::literal(format!("aws_iam_role={}", unquote(&settings.arn))),
        ),
        ("json_format", SqlValue::literal(json_format)),
        ("region", SqlValue::literal(COPY_REGION)),
    ])
}

/// Render the INSERT … SELECT populating a star-schema table
pub fn insert_sql(table: Table) -> Result<String, CatalogError> {
    let sql = match table {
        Table::Songplays => format!(
            "INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)\n\
             SELECT {start_time} AS start_time, stg_events.userId, stg_events.level, stg_songs.song_id, stg_songs.artist_id, stg_events.sessionId, stg_events.location, stg_events.userAgent\n\
             FROM stg_events\n\
             JOIN stg_songs ON stg_events.song = stg_songs.title\n\
             WHERE stg_events.page = '{page}';",
            start_time = start_time_sql("stg_events.ts"),
            page = NEXT_SONG_PAGE,
        ),
        Table::Users => "INSERT INTO users (user_id, first_name, last_name, gender, level)\n\
             SELECT DISTINCT userId, firstName, lastName, gender, level FROM stg_events WHERE userId IS NOT NULL;"
            .to_string(),
        Table::Songs => "INSERT INTO songs (song_id, title, artist_id, year, duration)\n\
             SELECT DISTINCT song_id, title, artist_id, year, duration FROM stg_songs;"
            .to_string(),
        Table::Artists => "INSERT INTO artists (artist_id, name, location, latitude, longitude)\n\
             SELECT DISTINCT artist_id, artist_name, artist_location, artist_latitude, artist_longitude FROM stg_songs;"
            .to_string(),
        Table::Time => {
            let mut projections = vec![format!("{} AS start_time", start_time_sql("ts"))];
            projections.extend(
                CalendarField::ALL
                    .iter()
                    .map(|f| format!("{} AS {}", extract_sql(*f, "ts"), f.column())),
            );
            let columns: Vec<&str> = CalendarField::ALL.iter().map(|f| f.column()).collect();

            format!(
                "INSERT INTO time (start_time, {columns})\n\
                 SELECT DISTINCT\n    {projections}\n\
                 FROM stg_events WHERE page = '{page}';",
                columns = columns.join(", "),
                projections = projections.join(",\n    "),
                page = NEXT_SONG_PAGE,
            )
        }
        other => return Err(CatalogError::NotLoadable(other.name())),
    };

    Ok(sql)
}
