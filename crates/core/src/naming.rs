use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

use crate::job::DumpFormat;

/// Zero-padded, most-significant-first, so plain string order is time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Builds `<database>_<timestamp><ext>`, unique to the second for one database.
///
/// Path separators and NUL in the database name become `_`, so the result is
/// always a single path component.
pub fn artifact_name<Tz>(database: &str, timestamp: &DateTime<Tz>, format: DumpFormat) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_{}{}",
        sanitize_component(database),
        timestamp.format(TIMESTAMP_FORMAT),
        format.extension()
    )
}

fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}

pub fn artifact_path<Tz>(
    output_dir: &Path,
    database: &str,
    timestamp: &DateTime<Tz>,
    format: DumpFormat,
) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    output_dir.join(artifact_name(database, timestamp, format))
}
