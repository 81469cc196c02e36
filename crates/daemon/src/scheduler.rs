use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use pg_backup_core::{artifact_path, BackupJob, Clock};
use pg_backup_dump::{run_dump, CommandRunner};
use pg_backup_storage::{ensure_output_dir, sweep_expired, SweepReport};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

/// What happened during one backup-and-sweep cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub run_id: Uuid,
    pub dump: Result<PathBuf, String>,
    pub sweep: Result<SweepReport, String>,
}

/// Drives backups for a single [`BackupJob`].
///
/// The process runner and clock are injected so the loop can be exercised
/// without a real `pg_dump` or real time.
pub struct Scheduler {
    job: BackupJob,
    runner: Arc<dyn CommandRunner>,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(job: BackupJob, runner: Arc<dyn CommandRunner>, clock: Arc<dyn Clock>) -> Self {
        Self { job, runner, clock }
    }

    /// Prepares the output directory. Failing here is fatal to the process.
    pub fn start(&self) -> Result<()> {
        info!(
            output_dir = %self.job.output_dir.display(),
            database = %self.job.database.name,
            format = %self.job.format,
            retention_days = self.job.retention_days,
            interval_secs = self.job.interval.as_secs(),
            "starting backup tool"
        );
        ensure_output_dir(&self.job.output_dir)
    }

    /// Dumps, then sweeps whether or not the dump succeeded. Never fails;
    /// both outcomes are logged and returned.
    pub async fn run_cycle(&self) -> CycleReport {
        let run_id = Uuid::new_v4();
        let target = artifact_path(
            &self.job.output_dir,
            &self.job.database.name,
            &self.clock.now(),
            self.job.format,
        );
        info!(%run_id, target = %target.display(), "starting backup");

        let dump = match run_dump(self.runner.as_ref(), &self.job, &target).await {
            Ok(path) => {
                info!(%run_id, path = %path.display(), "backup completed successfully");
                Ok(path)
            }
            Err(e) => {
                error!(%run_id, error = %e, "backup failed");
                Err(e.to_string())
            }
        };

        let sweep = match sweep_expired(
            &self.job.output_dir,
            self.job.retention_days,
            self.clock.now(),
        ) {
            Ok(report) => {
                if !report.removed.is_empty() || !report.failed.is_empty() {
                    info!(
                        %run_id,
                        removed = report.removed.len(),
                        failed = report.failed.len(),
                        retention_days = self.job.retention_days,
                        "retention sweep finished"
                    );
                }
                Ok(report)
            }
            Err(e) => {
                warn!(%run_id, error = %format!("{e:#}"), "failed to clean up old backups");
                Err(format!("{e:#}"))
            }
        };

        CycleReport { run_id, dump, sweep }
    }

    /// Starts, runs one cycle immediately, then one per interval until the
    /// future is dropped.
    ///
    /// Cycles never overlap: the next tick is only awaited once the previous
    /// cycle has returned. Ticks missed while a cycle overran are skipped
    /// rather than replayed back-to-back.
    pub async fn run(&self) -> Result<()> {
        self.start()?;

        let mut ticker = interval(self.job.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    pub async fn run_once(&self) -> Result<CycleReport> {
        self.start()?;
        Ok(self.run_cycle().await)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};

    use chrono::{DateTime, Days, Local, TimeZone};
    use pg_backup_core::{DatabaseParams, DumpFormat, FixedClock};
    use pg_backup_dump::{CommandOutput, DumpCommand};

    use super::*;

    /// Writes the `--file` target on success, like pg_dump would.
    struct FakeDump {
        succeed: bool,
        calls: AtomicUsize,
    }

    impl FakeDump {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                succeed,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl CommandRunner for FakeDump {
        async fn run(&self, command: &DumpCommand) -> io::Result<CommandOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.succeed {
                return Ok(CommandOutput {
                    success: false,
                    exit_code: Some(1),
                    combined: "pg_dump: error: connection to server failed".to_owned(),
                });
            }
            let target = command.args().last().expect("--file target");
            std::fs::write(target, b"dump")?;
            Ok(CommandOutput {
                success: true,
                exit_code: Some(0),
                combined: String::new(),
            })
        }
    }

    fn now() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 6, 15, 12, 0, 0)
            .single()
            .expect("unambiguous local time")
    }

    fn job(output_dir: &Path) -> BackupJob {
        BackupJob {
            database: DatabaseParams {
                host: "localhost".to_owned(),
                port: 5432,
                user: "backup".to_owned(),
                password: None,
                name: "app".to_owned(),
            },
            output_dir: output_dir.to_path_buf(),
            format: DumpFormat::Custom,
            retention_days: 7,
            interval: Duration::from_secs(3600),
            dump_program: "pg_dump".to_owned(),
        }
    }

    fn scheduler(output_dir: &Path, runner: Arc<FakeDump>) -> Scheduler {
        Scheduler::new(job(output_dir), runner, Arc::new(FixedClock(now())))
    }

    fn old_file(dir: &Path, name: &str, days: u64) -> PathBuf {
        let path = dir.join(name);
        File::create(&path)
            .and_then(|f| f.set_modified(SystemTime::from(now() - Days::new(days))))
            .expect("old file");
        path
    }

    #[tokio::test]
    async fn successful_cycle_writes_named_artifact() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let out = tmp.path().join("backups");
        let runner = FakeDump::new(true);
        let sched = scheduler(&out, runner.clone());

        let report = sched.run_once().await.expect("start");

        let path = report.dump.expect("dump ok");
        assert_eq!(path, out.join("app_2026-06-15_12-00-00.dump"));
        assert!(path.exists());
        assert!(report.sweep.expect("sweep ok").removed.is_empty());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_dump_still_sweeps() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let expired = old_file(tmp.path(), "app_old.dump", 30);
        let recent = old_file(tmp.path(), "app_recent.dump", 1);
        let sched = scheduler(tmp.path(), FakeDump::new(false));

        let report = sched.run_cycle().await;

        let err = report.dump.unwrap_err();
        assert!(err.contains("connection to server failed"));
        let sweep = report.sweep.expect("sweep ok");
        assert_eq!(sweep.removed, vec![expired.clone()]);
        assert!(!expired.exists());
        assert!(recent.exists());
    }

    #[tokio::test]
    async fn sweep_failure_does_not_panic() {
        let tmp = tempfile::tempdir().expect("tempdir");
        // Output dir never created, so both stages fail.
        let sched = scheduler(&tmp.path().join("missing"), FakeDump::new(true));

        let report = sched.run_cycle().await;

        assert!(report.dump.is_err());
        assert!(report.sweep.is_err());
    }

    #[tokio::test]
    async fn start_fails_when_output_dir_cannot_be_created() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").expect("write");
        let sched = scheduler(&blocker.join("backups"), FakeDump::new(true));

        assert!(sched.run_once().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_every_interval() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let runner = FakeDump::new(false);
        let sched = Arc::new(scheduler(tmp.path(), runner.clone()));

        let handle = tokio::spawn({
            let sched = sched.clone();
            async move { sched.run().await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(3600 * 2)).await;
        assert_eq!(runner.calls.load(Ordering::SeqCst), 3);

        handle.abort();
    }
}
