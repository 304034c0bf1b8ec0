//! Bounded execution of external programs.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::outcome::TaskOutcome;
use crate::task::TaskKind;

/// Longest stderr excerpt kept in an outcome detail.
const MAX_DIAGNOSTIC_CHARS: usize = 2000;

/// How long to keep draining stderr after the process is gone.
const STDERR_GRACE: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub enum Stdout {
    Discard,
    /// Truncate-create the file and stream stdout into it.
    File(PathBuf),
}

#[derive(Clone, Debug)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdout: Stdout,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: &str, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            stdout: Stdout::Discard,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdout_to(mut self, path: &Path) -> Self {
        self.stdout = Stdout::File(path.to_path_buf());
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a supervised process ended. By the time this is returned the process
/// has exited or has been killed and reaped.
#[derive(Debug)]
pub enum ProcessExit {
    Exited { status: ExitStatus, stderr: String },
    /// The executable could not be found or started.
    NotStarted(std::io::Error),
    /// The stdout file could not be created.
    OutputUnavailable(std::io::Error),
    /// Waiting on the child failed.
    WaitFailed(std::io::Error),
    TimedOut { stderr: String },
}

fn tail(text: &str) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= MAX_DIAGNOSTIC_CHARS {
        return trimmed.to_string();
    }
    let skipped: String = trimmed.chars().skip(count - MAX_DIAGNOSTIC_CHARS).collect();
    format!("...{skipped}")
}

pub async fn run_supervised(invocation: &Invocation) -> ProcessExit {
    let stdout = match &invocation.stdout {
        Stdout::Discard => Stdio::null(),
        Stdout::File(path) => match File::create(path) {
            Ok(file) => Stdio::from(file),
            Err(e) => return ProcessExit::OutputUnavailable(e),
        },
    };

    debug!(command = %invocation.command_line(), "spawning");
    let mut child = match Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return ProcessExit::NotStarted(e),
    };

    let mut stderr_pipe = child.stderr.take();
    let stderr_reader = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        String::from_utf8_lossy(&buf).into_owned()
    });

    let waited = tokio::time::timeout(invocation.timeout, child.wait()).await;
    let timed_out = waited.is_err();
    if timed_out {
        warn!(program = %invocation.program, "execution budget exceeded, killing");
        // kill() also reaps the child.
        if let Err(e) = child.kill().await {
            warn!(program = %invocation.program, error = %e, "failed to kill process");
        }
    }

    // A grandchild can hold the pipe open after the child is gone.
    let stderr = match tokio::time::timeout(STDERR_GRACE, stderr_reader).await {
        Ok(Ok(text)) => text,
        _ => String::new(),
    };

    match waited {
        Ok(Ok(status)) => ProcessExit::Exited { status, stderr },
        Ok(Err(e)) => ProcessExit::WaitFailed(e),
        Err(_) => ProcessExit::TimedOut { stderr },
    }
}

fn is_missing_or_empty(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(_) => true,
    }
}

/// Shared classification for tool-backed tasks.
///
/// Success additionally requires a non-empty artifact at `output_path`; an
/// empty one is removed and reported as `EmptyResult`. On any failure a
/// partial artifact is removed too.
pub fn classify(
    kind: TaskKind,
    invocation: &Invocation,
    exit: ProcessExit,
    output_path: &Path,
) -> TaskOutcome {
    let program = invocation.program.as_str();
    let outcome = match exit {
        ProcessExit::NotStarted(e) if e.kind() == std::io::ErrorKind::NotFound => {
            TaskOutcome::tool_missing(
                kind,
                format!("{program} is not installed or not found in PATH"),
            )
        }
        ProcessExit::NotStarted(e) => {
            TaskOutcome::tool_missing(kind, format!("{program} could not be started: {e}"))
        }
        ProcessExit::OutputUnavailable(e) => TaskOutcome::execution_failed(
            kind,
            format!("cannot create output file {}: {e}", output_path.display()),
        ),
        ProcessExit::WaitFailed(e) => {
            TaskOutcome::execution_failed(kind, format!("failed waiting for {program}: {e}"))
        }
        ProcessExit::TimedOut { stderr } => {
            let mut outcome = TaskOutcome::timed_out(kind, program, invocation.timeout);
            let stderr = tail(&stderr);
            if let Some(detail) = outcome.detail.as_mut().filter(|_| !stderr.is_empty()) {
                detail.push_str(": ");
                detail.push_str(&stderr);
            }
            outcome
        }
        ProcessExit::Exited { status, stderr } if !status.success() => {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let stderr = tail(&stderr);
            if stderr.is_empty() {
                TaskOutcome::execution_failed(kind, format!("{program} exited with status {code}"))
            } else {
                TaskOutcome::execution_failed(
                    kind,
                    format!("{program} exited with status {code}: {stderr}"),
                )
            }
        }
        ProcessExit::Exited { .. } if is_missing_or_empty(output_path) => {
            TaskOutcome::empty(kind, format!("{program} completed without producing output"))
        }
        ProcessExit::Exited { .. } => TaskOutcome::success(kind, output_path),
    };

    if outcome.output_path.is_none() && output_path.exists() {
        if let Err(e) = std::fs::remove_file(output_path) {
            warn!(path = %output_path.display(), error = %e, "failed to remove leftover output");
        }
    }
    outcome
}

/// Resolves `program` the way spawning it would: a bare name is searched in
/// `PATH`, anything with a separator must point at an executable file.
pub fn locate(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

pub async fn execute(kind: TaskKind, invocation: &Invocation, output_path: &Path) -> TaskOutcome {
    let exit = run_supervised(invocation).await;
    classify(kind, invocation, exit, output_path)
}
