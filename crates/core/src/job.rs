use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Output format understood by `pg_dump --format`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DumpFormat {
    Plain,
    Tar,
    Directory,
    #[default]
    Custom,
}

impl DumpFormat {
    /// Parses a configured format name. Anything unrecognized becomes `Custom`.
    pub fn from_config(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "plain" => Self::Plain,
            "tar" => Self::Tar,
            "directory" => Self::Directory,
            _ => Self::Custom,
        }
    }

    pub fn as_flag(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Tar => "tar",
            Self::Directory => "directory",
            Self::Custom => "custom",
        }
    }

    /// Suffix appended to artifact names. Directory dumps have none.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Plain => ".sql",
            Self::Tar => ".tar",
            Self::Directory => "",
            Self::Custom => ".dump",
        }
    }
}

impl From<String> for DumpFormat {
    fn from(value: String) -> Self {
        Self::from_config(&value)
    }
}

impl From<DumpFormat> for String {
    fn from(value: DumpFormat) -> Self {
        value.as_flag().to_owned()
    }
}

impl fmt::Display for DumpFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag())
    }
}

#[derive(Clone)]
pub struct DatabaseParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub name: String,
}

// Hand-written so the password never ends up in logs.
impl fmt::Debug for DatabaseParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("name", &self.name)
            .finish()
    }
}

/// Everything one scheduler needs to run backups. Built once at startup and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub database: DatabaseParams,
    pub output_dir: PathBuf,
    pub format: DumpFormat,
    pub retention_days: u32,
    pub interval: Duration,
    pub dump_program: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_falls_back_to_custom() {
        assert_eq!(DumpFormat::from_config("plain"), DumpFormat::Plain);
        assert_eq!(DumpFormat::from_config("TAR"), DumpFormat::Tar);
        assert_eq!(DumpFormat::from_config("directory"), DumpFormat::Directory);
        assert_eq!(DumpFormat::from_config("custom"), DumpFormat::Custom);
        assert_eq!(DumpFormat::from_config("zip"), DumpFormat::Custom);
        assert_eq!(DumpFormat::from_config(""), DumpFormat::Custom);
    }

    #[test]
    fn debug_output_redacts_password() {
        let params = DatabaseParams {
            host: "db.internal".to_owned(),
            port: 5432,
            user: "backup".to_owned(),
            password: Some("hunter2".to_owned()),
            name: "app".to_owned(),
        };
        let rendered = format!("{params:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
