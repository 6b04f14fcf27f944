//! Subprocess orchestration.
//!
//! Every external command the engine runs (package manager, archive tools,
//! compiler, `flatpak`, `gpg`, custom checkers) goes through [`Runner`]:
//! argv arrays only (no shell interpolation), output streamed to a
//! run-scoped log file, a hard per-invocation timeout, and the child
//! registered with the cleanup registry so a termination signal reaps it.
//!
//! ## Privilege Elevation
//!
//! Strategies that must touch `/usr/local` or the package database set
//! `elevate` on their [`RunSpec`]; the command is then prefixed with
//! `sudo` unless the engine already runs as root. Elevation is always
//! per-invocation — the engine itself never escalates.
//!
//! ## Exit Status Handling
//!
//! A non-zero exit is reported through [`ExecOutput`], not as an `Err`:
//! each caller decides which taxonomy kind a failed command maps to
//! (`INSTALLATION_ERROR` for a failed `dpkg -i`, `COMPILATION_ERROR` for
//! a failed `make`, and so on). Only spawn failures and timeouts are
//! errors at this layer.

use crate::libs::cleanup::CleanupRegistry;
use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::messages::Message;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Captured result of one subprocess invocation.
#[derive(Debug)]
pub struct ExecOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    /// Combined output, stderr last, for error reporting.
    pub fn combined(&self) -> String {
        let mut s = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !s.is_empty() {
                s.push('\n');
            }
            s.push_str(&self.stderr);
        }
        s
    }
}

/// Options for one invocation.
#[derive(Debug, Default)]
pub struct RunSpec {
    /// Working directory for the child.
    pub current_dir: Option<PathBuf>,
    /// Append stdout/stderr lines to this file as they arrive.
    pub log_path: Option<PathBuf>,
    /// Run the command with elevated privileges (prefixed with sudo when
    /// the engine itself is unprivileged).
    pub elevate: bool,
}

/// Subprocess runner bound to the engine's cleanup registry.
#[derive(Clone)]
pub struct Runner {
    cleanup: Arc<CleanupRegistry>,
}

impl Runner {
    pub fn new(cleanup: Arc<CleanupRegistry>) -> Self {
        Self { cleanup }
    }

    /// Checks that an external command exists on PATH.
    pub fn require(&self, program: &str) -> Result<PathBuf> {
        which::which(program)
            .map_err(|_| engine_error(ErrorKind::Dependency, Message::DependencyMissing(program.to_string()).to_string()))
    }

    /// Runs a command to completion within `timeout`.
    ///
    /// A non-zero exit is not an error at this layer; callers inspect
    /// [`ExecOutput::success`] and map failures into their own taxonomy
    /// kind. Exceeding the timeout kills the child and is always an error.
    pub async fn run(&self, program: &str, args: &[String], timeout: Duration, spec: RunSpec) -> Result<ExecOutput> {
        let (program, args) = if spec.elevate { elevated(program, args) } else { (program.to_string(), args.to_vec()) };

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| engine_error(ErrorKind::Installation, Message::CommandFailed { program: program.clone(), detail: e.to_string() }.to_string()))?;

        let pid = child.id();
        if let Some(pid) = pid {
            self.cleanup.register_child(pid);
        }

        let log_file = match &spec.log_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Some(Arc::new(parking_lot::Mutex::new(std::fs::OpenOptions::new().create(true).append(true).open(path)?)))
            }
            None => None,
        };

        let stdout_task = capture_stream(child.stdout.take(), log_file.clone());
        let stderr_task = capture_stream(child.stderr.take(), log_file.clone());

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                if let Some(pid) = pid {
                    self.cleanup.unregister_child(pid);
                }
                return Err(engine_error(
                    ErrorKind::Timeout,
                    Message::CommandTimedOut { program, secs: timeout.as_secs() }.to_string(),
                ));
            }
        };

        if let Some(pid) = pid {
            self.cleanup.unregister_child(pid);
        }

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(ExecOutput {
            success: status.success(),
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Streams one pipe line-by-line into the log file while collecting it.
fn capture_stream<R>(
    stream: Option<R>,
    log_file: Option<Arc<parking_lot::Mutex<std::fs::File>>>,
) -> tokio::task::JoinHandle<String>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut collected = String::new();
        let Some(stream) = stream else {
            return collected;
        };
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(log) = &log_file {
                use std::io::Write;
                let _ = writeln!(log.lock(), "{}", line);
            }
            collected.push_str(&line);
            collected.push('\n');
        }
        collected
    })
}

/// Prefixes a command with `sudo` unless the engine already runs as root.
pub fn elevated(program: &str, args: &[String]) -> (String, Vec<String>) {
    if is_root() {
        return (program.to_string(), args.to_vec());
    }
    let mut sudo_args = vec![program.to_string()];
    sudo_args.extend(args.iter().cloned());
    ("sudo".to_string(), sudo_args)
}

#[cfg(unix)]
pub fn is_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

/// The log file path for one operation of one app.
pub fn log_path(logs_dir: &Path, app_key: &str, operation: &str) -> PathBuf {
    logs_dir.join(format!("{}_{}.log", app_key.to_lowercase(), operation))
}
