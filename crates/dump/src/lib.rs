use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use pg_backup_core::BackupJob;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable libpq reads the password from.
pub const PASSWORD_ENV: &str = "PGPASSWORD";

/// A fully-resolved dump invocation.
///
/// The password is kept apart from `args` and is only ever handed to the child
/// through its environment, so it never shows up in a process listing or in
/// the `Display` rendering used for logs.
#[derive(Clone)]
pub struct DumpCommand {
    program: String,
    args: Vec<String>,
    password: Option<String>,
}

impl DumpCommand {
    pub fn for_job(job: &BackupJob, output_path: &Path) -> Self {
        let db = &job.database;
        let args = vec![
            "-h".to_owned(),
            db.host.clone(),
            "-p".to_owned(),
            db.port.to_string(),
            "-U".to_owned(),
            db.user.clone(),
            "-d".to_owned(),
            db.name.clone(),
            "--verbose".to_owned(),
            "--no-password".to_owned(),
            format!("--format={}", job.format.as_flag()),
            // Same flag for every format: pg_dump treats it as a directory
            // path in directory mode and a file path otherwise.
            "--file".to_owned(),
            output_path.display().to_string(),
        ];

        Self {
            program: job.dump_program.clone(),
            args,
            password: db.password.clone(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Variables appended to the inherited environment of the child.
    pub fn envs(&self) -> Vec<(&'static str, &str)> {
        self.password
            .as_deref()
            .map(|p| vec![(PASSWORD_ENV, p)])
            .unwrap_or_default()
    }
}

impl fmt::Display for DumpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DumpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpCommand")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// What a finished child process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// stdout followed by stderr, lossily decoded.
    pub combined: String,
}

/// Runs a dump command to completion. Implemented by [`ProcessRunner`] for
/// real child processes and by fakes in tests.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &DumpCommand) -> io::Result<CommandOutput>;
}

/// Spawns the dump program as a child process and waits for it.
///
/// No timeout is applied: a hung child blocks the caller until it exits or is
/// killed from outside.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait::async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &DumpCommand) -> io::Result<CommandOutput> {
        let mut c = tokio::process::Command::new(command.program());
        c.args(command.args())
            .envs(command.envs())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let out = c.output().await?;
        let mut combined = String::from_utf8_lossy(&out.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&out.stderr));

        Ok(CommandOutput {
            success: out.status.success(),
            exit_code: out.status.code(),
            combined,
        })
    }
}

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {}, output: {output}", exit_label(.exit_code))]
    Failed {
        program: String,
        exit_code: Option<i32>,
        output: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_owned(),
    }
}

/// Dumps `job`'s database to `output_path`.
///
/// Success is decided solely by the child's exit status. On failure the
/// captured output is returned verbatim inside [`DumpError::Failed`].
pub async fn run_dump(
    runner: &dyn CommandRunner,
    job: &BackupJob,
    output_path: &Path,
) -> Result<PathBuf, DumpError> {
    let command = DumpCommand::for_job(job, output_path);
    info!(command = %command, "running dump");

    let start = Instant::now();
    let out = runner
        .run(&command)
        .await
        .map_err(|source| DumpError::Spawn {
            program: command.program().to_owned(),
            source,
        })?;
    debug!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        exit_code = ?out.exit_code,
        "dump process finished"
    );

    if !out.success {
        return Err(DumpError::Failed {
            program: command.program().to_owned(),
            exit_code: out.exit_code,
            output: out.combined,
        });
    }

    Ok(output_path.to_path_buf())
}
