use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Result};
use pg_backup_core::SystemClock;
use pg_backup_daemon::config::{self, Config, LoggingConfig};
use pg_backup_daemon::{logging, Scheduler};
use pg_backup_dump::ProcessRunner;
use tracing::{error, info};

const USAGE: &str = "Usage: pg-backup-daemon <config-file> [run-once]";

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Service,
    RunOnce,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some((config_path, mode)) = parse_args(&args) else {
        println!("{USAGE}");
        return ExitCode::FAILURE;
    };

    let cfg = match config::load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            logging::init(&LoggingConfig::default());
            error!(error = %format!("{e:#}"), "failed to create backup tool");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&cfg.logging);

    match run(cfg, mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "backup tool stopped");
            ExitCode::FAILURE
        }
    }
}

/// Returns the config path and mode, or `None` when usage should be printed.
fn parse_args(args: &[String]) -> Option<(PathBuf, Mode)> {
    let config_path = PathBuf::from(args.get(1)?);
    let mode = match args.get(2).map(String::as_str) {
        None => Mode::Service,
        Some("run-once") => Mode::RunOnce,
        Some(_) => return None,
    };
    if args.len() > 3 {
        return None;
    }
    Some((config_path, mode))
}

async fn run(cfg: Config, mode: Mode) -> Result<()> {
    let job = cfg.into_job()?;
    let scheduler = Scheduler::new(job, Arc::new(ProcessRunner), Arc::new(SystemClock));

    match mode {
        Mode::RunOnce => {
            let report = scheduler.run_once().await?;
            if let Err(e) = report.dump {
                bail!("backup {} failed: {e}", report.run_id);
            }
            Ok(())
        }
        Mode::Service => {
            tokio::select! {
                res = scheduler.run() => res,
                _ = tokio::signal::ctrl_c() => {
                    info!("received shutdown signal, stopping");
                    Ok(())
                }
            }
        }
    }
}
