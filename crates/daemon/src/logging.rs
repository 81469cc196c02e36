use std::fs::{File, OpenOptions};
use std::io;
use std::sync::Mutex;

use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

const DEFAULT_LEVEL: &str = "info";

/// Where log lines end up.
#[derive(Debug)]
enum LogSink {
    Stdout,
    File(File),
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level. When a log file is configured
/// but cannot be opened, output goes to stdout instead of failing startup.
pub fn init(cfg: &LoggingConfig) {
    let level = cfg.level.as_deref().unwrap_or(DEFAULT_LEVEL);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let (sink, open_error) = select_sink(cfg.file_path.as_deref());
    match sink {
        LogSink::File(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
        LogSink::Stdout => builder.init(),
    }

    if let Some(e) = open_error {
        let path = cfg.file_path.as_deref().unwrap_or_default();
        warn!(error = %e, path, "failed to open log file, using stdout");
    }
}

/// Picks the configured log file, or stdout along with the open error when
/// the file is unusable.
fn select_sink(file_path: Option<&str>) -> (LogSink, Option<io::Error>) {
    match file_path {
        None => (LogSink::Stdout, None),
        Some(path) => match open_log_file(path) {
            Ok(file) => (LogSink::File(file), None),
            Err(e) => (LogSink::Stdout, Some(e)),
        },
    }
}

fn open_log_file(path: &str) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
