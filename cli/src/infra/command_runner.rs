//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution with guaranteed timeout and kill.

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

use crate::application::ports::{CommandRunner, Detached, Invocation};

/// Default timeout for short commands (`kill`, `git`, `mkdir`).
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to keep reading output after the child has exited.
///
/// A command that backgrounds a server hands its stdout to the server; the
/// pipe then never reaches EOF.
const OUTPUT_DRAIN: Duration = Duration::from_secs(1);

/// Production `CommandRunner` — uses tokio for async process execution
/// with guaranteed timeout and kill.
///
/// `tokio::time::timeout` around `.output().await` only drops the future;
/// this implementation uses `tokio::select!` with an explicit `child.kill()`
/// so the process is terminated.
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn execute(&self, invocation: &Invocation) -> Result<Output> {
        let program = invocation.program.as_str();
        let timeout = invocation.timeout.unwrap_or(self.timeout);
        tracing::debug!(command = %invocation.display(), timeout_secs = timeout.as_secs(), "running");

        let mut command = tokio::process::Command::new(program);
        command
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let stdout_task = read_all(child.stdout.take());
        let stderr_task = read_all(child.stderr.take());

        tokio::select! {
            status = child.wait() => {
                let status = status.with_context(|| format!("waiting for {program}"))?;
                let stdout = drain(stdout_task).await;
                let stderr = drain(stderr_task).await;
                tracing::debug!(program, code = ?status.code(), "finished");
                Ok(Output { status, stdout, stderr })
            }
            () = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                anyhow::bail!("{} timed out after {}s", invocation.display(), timeout.as_secs())
            }
        }
    }

    async fn spawn_detached(
        &self,
        invocation: &Invocation,
        log: &Path,
        settle: Duration,
    ) -> Result<Detached> {
        let program = invocation.program.as_str();
        tracing::debug!(command = %invocation.display(), log = %log.display(), "starting detached");

        if let Some(dir) = log.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }
        let stdout = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log)
            .with_context(|| format!("opening log {}", log.display()))?;
        let stderr = stdout
            .try_clone()
            .with_context(|| format!("opening log {}", log.display()))?;

        let mut command = tokio::process::Command::new(program);
        command
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(false);
        #[cfg(unix)]
        command.process_group(0);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;
        let pid = child.id().unwrap_or_default();

        tokio::select! {
            status = child.wait() => {
                let status = status.with_context(|| format!("waiting for {program}"))?;
                tracing::debug!(program, code = ?status.code(), "exited during settle");
                Ok(Detached::Exited(status))
            }
            () = tokio::time::sleep(settle) => {
                tracing::debug!(program, pid, "still running after settle");
                Ok(Detached::Running(pid))
            }
        }
    }
}

fn read_all<R>(handle: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut h) = handle {
            let _ = h.read_to_end(&mut buf).await;
        }
        buf
    })
}

async fn drain(task: JoinHandle<Vec<u8>>) -> Vec<u8> {
    let abort = task.abort_handle();
    match tokio::time::timeout(OUTPUT_DRAIN, task).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(_)) => Vec::new(),
        Err(_) => {
            abort.abort();
            Vec::new()
        }
    }
}
