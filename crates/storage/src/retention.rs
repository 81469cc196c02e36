use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Days, Local, TimeDelta, TimeZone, Utc};
use tracing::{debug, info, warn};

/// Outcome of one pass over the output directory.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub cutoff: DateTime<Local>,
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    pub skipped_dirs: usize,
}

/// `now` minus `retention_days` calendar days in `now`'s time zone.
///
/// Calendar arithmetic keeps the wall-clock time of day across DST changes.
/// If that wall-clock time does not exist on the target day, fall back to
/// whole 24h periods. A window reaching past the representable range clamps
/// to the earliest instant, so nothing is ever considered expired.
pub fn retention_cutoff<Tz: TimeZone>(now: DateTime<Tz>, retention_days: u32) -> DateTime<Tz> {
    let tz = now.timezone();
    now.clone()
        .checked_sub_days(Days::new(u64::from(retention_days)))
        .or_else(|| now.checked_sub_signed(TimeDelta::days(i64::from(retention_days))))
        .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC.with_timezone(&tz))
}

/// Deletes regular entries in `dir` last modified strictly before the cutoff.
///
/// Only the top level is examined and directories are skipped outright, so
/// directory-format dumps are never pruned here. Failures on individual
/// entries are logged and recorded in the report; only an unreadable `dir`
/// is an error.
pub fn sweep_expired(dir: &Path, retention_days: u32, now: DateTime<Local>) -> Result<SweepReport> {
    let cutoff = retention_cutoff(now, retention_days);
    let entries =
        fs::read_dir(dir).with_context(|| format!("read backup directory: {}", dir.display()))?;

    let mut report = SweepReport {
        cutoff,
        removed: Vec::new(),
        failed: Vec::new(),
        skipped_dirs: 0,
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, dir = %dir.display(), "failed to read directory entry");
                continue;
            }
        };
        let path = entry.path();

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to stat backup, skipping");
                report.failed.push(path);
                continue;
            }
        };
        if metadata.is_dir() {
            debug!(path = %path.display(), "skipping directory");
            report.skipped_dirs += 1;
            continue;
        }

        let modified = match metadata.modified() {
            Ok(t) => DateTime::<Local>::from(t),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "modification time unavailable, skipping");
                report.failed.push(path);
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), %modified, "removed old backup");
                report.removed.push(path);
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to remove old backup");
                report.failed.push(path);
            }
        }
    }

    Ok(report)
}
