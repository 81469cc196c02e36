use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use pg_backup_core::{BackupJob, DatabaseParams, DumpFormat};
use serde::Deserialize;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_RETENTION_DAYS: u32 = 7;
pub const DEFAULT_DUMP_PROGRAM: &str = "pg_dump";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub backup: BackupConfig,
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct BackupConfig {
    pub output_dir: Option<String>,
    pub interval_secs: Option<u64>,
    pub retention_days: Option<u32>,
    pub format: Option<DumpFormat>,
    pub dump_program: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub file_path: Option<String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading config file {path:?}"))?;
    toml::from_str(&contents).with_context(|| format!("parsing config file {path:?}"))
}

impl Config {
    /// Validates the config and resolves defaults and environment overrides.
    pub fn into_job(self) -> Result<BackupJob> {
        self.into_job_with_env(|key| env::var(key).ok())
    }

    pub fn into_job_with_env(self, var: impl Fn(&str) -> Option<String>) -> Result<BackupJob> {
        let Config {
            database, backup, ..
        } = self;

        let name = match database.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => bail!("database.name is required"),
        };

        let output_dir = match var("PG_BACKUP_OUTPUT_DIR").or(backup.output_dir) {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => bail!("backup.output_dir is required"),
        };

        let interval = match backup.interval_secs {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            Some(_) => bail!("backup.interval_secs must be greater than zero"),
            None => bail!("backup.interval_secs is required"),
        };

        // Zero means "unset", same as leaving the key out.
        let retention_days = var("PG_BACKUP_RETENTION_DAYS")
            .and_then(|v| v.parse::<u32>().ok())
            .or(backup.retention_days)
            .filter(|days| *days > 0)
            .unwrap_or(DEFAULT_RETENTION_DAYS);

        Ok(BackupJob {
            database: DatabaseParams {
                host: database
                    .host
                    .filter(|h| !h.is_empty())
                    .unwrap_or_else(|| DEFAULT_HOST.to_owned()),
                port: database
                    .port
                    .filter(|p| *p != 0)
                    .unwrap_or(DEFAULT_PORT),
                user: database.user.unwrap_or_default(),
                password: var("PG_BACKUP_PASSWORD").or(database.password),
                name,
            },
            output_dir,
            format: backup.format.unwrap_or_default(),
            retention_days,
            interval,
            dump_program: backup
                .dump_program
                .unwrap_or_else(|| DEFAULT_DUMP_PROGRAM.to_owned()),
        })
    }
}
