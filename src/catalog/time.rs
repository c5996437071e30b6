//! Event timestamp derivation
//!
//! Listening events carry `ts`, an integer epoch in milliseconds. The start
//! time of a play is `epoch + (ts / 1000) seconds` with the division
//! truncating toward zero, and the `time` dimension decomposes that instant
//! into calendar fields. The same rule exists here twice: as SQL expressions
//! shared by the `songplays` and `time` inserts, and as a Rust function for
//! checking results outside the warehouse.

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Page value marking a song play; other log lines are navigation noise
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// Calendar field extracted into the `time` dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarField {
    Hour,
    Day,
    Week,
    Month,
    Year,
    Weekday,
}

impl CalendarField {
    /// Fields in `time` table column order
    pub const ALL: [CalendarField; 6] = [
        CalendarField::Hour,
        CalendarField::Day,
        CalendarField::Week,
        CalendarField::Month,
        CalendarField::Year,
        CalendarField::Weekday,
    ];

    /// Column name in the `time` table
    pub fn column(&self) -> &'static str {
        match self {
            CalendarField::Hour => "hour",
            CalendarField::Day => "day",
            CalendarField::Week => "week",
            CalendarField::Month => "month",
            CalendarField::Year => "year",
            CalendarField::Weekday => "weekday",
        }
    }

    /// Field keyword for SQL `EXTRACT`
    pub fn extract_keyword(&self) -> &'static str {
        match self {
            CalendarField::Hour => "HOUR",
            CalendarField::Day => "DAY",
            CalendarField::Week => "WEEK",
            CalendarField::Month => "MONTH",
            CalendarField::Year => "YEAR",
            CalendarField::Weekday => "DOW",
        }
    }
}

/// SQL expression converting a millisecond epoch column into a timestamp
pub fn start_time_sql(ts_column: &str) -> String {
    format!(
        "TIMESTAMP WITHOUT TIME ZONE 'epoch' + TRUNC({} / 1000) * INTERVAL '1 second'",
        ts_column
    )
}

/// SQL expression extracting one calendar field from a millisecond epoch column
pub fn extract_sql(field: CalendarField, ts_column: &str) -> String {
    format!(
        "EXTRACT({} FROM {})",
        field.extract_keyword(),
        start_time_sql(ts_column)
    )
}

/// A play's start time and its calendar decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTime {
    pub start_time: NaiveDateTime,
    pub hour: u32,
    pub day: u32,
    /// ISO-8601 week number
    pub week: u32,
    pub month: u32,
    pub year: i32,
    /// Day of week with Sunday = 0, as SQL `DOW`
    pub weekday: u32,
}

impl EventTime {
    /// Derive from an epoch in milliseconds
    ///
    /// Sub-second precision is dropped by truncating toward zero. Returns
    /// `None` when the instant is outside the representable range.
    pub fn from_epoch_millis(ts: i64) -> Option<Self> {
        let seconds = ts / 1000;
        let start_time = DateTime::from_timestamp(seconds, 0)?.naive_utc();

        Some(Self {
            start_time,
            hour: start_time.hour(),
            day: start_time.day(),
            week: start_time.iso_week().week(),
            month: start_time.month(),
            year: start_time.year(),
            weekday: start_time.weekday().num_days_from_sunday(),
        })
    }

    /// Value of a single calendar field
    pub fn field(&self, field: CalendarField) -> i64 {
        match field {
            CalendarField::Hour => self.hour as i64,
            CalendarField::Day => self.day as i64,
            CalendarField::Week => self.week as i64,
            CalendarField::Month => self.month as i64,
            CalendarField::Year => self.year as i64,
            CalendarField::Weekday => self.weekday as i64,
        }
    }
}
