//! Application service — application server lifecycle.
//!
//! The pipeline never owns the server process: it reads the PID file the
//! server writes, signals a live process, or launches the start command
//! detached so the server outlives `hoist _remote`.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use hoist_common::StepOutcome;

use crate::application::ports::{CommandRunner, Detached, Invocation, LocalFs};
use crate::domain::{DeployConfig, ReleaseLayout, normalize_signal};

/// What the PID file says about the running server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PidState {
    /// No PID file.
    Absent,
    /// The PID file names a process that is alive.
    Live(u32),
    /// The PID file is unparsable or names a dead process.
    Stale(String),
}

/// Inspect the PID file at `pid_path`.
///
/// # Errors
///
/// Returns an error if the PID file exists but cannot be read.
pub async fn read_pid(
    fs: &impl LocalFs,
    runner: &impl CommandRunner,
    pid_path: &Path,
) -> Result<PidState> {
    let Some(contents) = fs
        .read_optional(pid_path)
        .with_context(|| format!("reading PID file {}", pid_path.display()))?
    else {
        return Ok(PidState::Absent);
    };

    let Ok(pid) = contents.trim().parse::<u32>() else {
        return Ok(PidState::Stale(format!(
            "PID file {} does not contain a process id",
            pid_path.display()
        )));
    };
    if pid == 0 {
        return Ok(PidState::Stale(format!(
            "PID file {} contains PID 0",
            pid_path.display()
        )));
    }

    let probe = runner.run("kill", &["-0", &pid.to_string()]).await?;
    if probe.status.success() {
        Ok(PidState::Live(pid))
    } else {
        Ok(PidState::Stale(format!("process {pid} is not running")))
    }
}

/// Deliver `signal` to `pid` once.
///
/// # Errors
///
/// Returns an error if the signal name is unknown or `kill` fails.
pub async fn send_signal(runner: &impl CommandRunner, pid: u32, signal: &str) -> Result<()> {
    let signal = normalize_signal(signal)?;
    tracing::debug!(pid, signal = %signal, "signalling server");
    let output = runner
        .run("kill", &["-s", &signal, &pid.to_string()])
        .await
        .with_context(|| format!("sending SIG{signal} to {pid}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("kill -s {signal} {pid} failed: {}", stderr.trim());
    }
    Ok(())
}

/// Activate step: restart a live server, or start one.
///
/// # Errors
///
/// Returns an error if the PID file cannot be read, or a command cannot be run.
pub async fn activate(
    fs: &impl LocalFs,
    runner: &impl CommandRunner,
    config: &DeployConfig,
    layout: &ReleaseLayout,
) -> Result<StepOutcome> {
    let pid_path = layout.resolve(&config.process.pid_path);
    match read_pid(fs, runner, &pid_path).await? {
        PidState::Live(pid) => {
            send_signal(runner, pid, &config.process.signal).await?;
            Ok(StepOutcome::ok_with(format!(
                "sent SIG{} to process {pid}",
                normalize_signal(&config.process.signal)?
            )))
        }
        PidState::Stale(reason) => {
            tracing::warn!(%reason, "stale PID file, starting a fresh server");
            start_server(runner, config, layout).await
        }
        PidState::Absent => start_server(runner, config, layout).await,
    }
}

async fn start_server(
    runner: &impl CommandRunner,
    config: &DeployConfig,
    layout: &ReleaseLayout,
) -> Result<StepOutcome> {
    let command = &config.process.command;
    let log = layout.server_log();
    let invocation = Invocation::shell(command).cwd(layout.current());
    tracing::debug!(command = %command, log = %log.display(), "starting server");
    let state = runner
        .spawn_detached(
            &invocation,
            &log,
            Duration::from_secs(config.process.settle_secs),
        )
        .await
        .with_context(|| format!("starting server with `{command}`"))?;

    match state {
        Detached::Running(pid) => Ok(StepOutcome::ok_with(format!(
            "started `{command}` as process {pid}"
        ))),
        Detached::Exited(status) if status.success() => {
            Ok(StepOutcome::ok_with(format!("started `{command}`")))
        }
        Detached::Exited(status) => {
            let code = status.code().unwrap_or(1);
            Ok(StepOutcome::failed(
                code,
                format!("`{command}` exited with {code}; see {}", log.display()),
            ))
        }
    }
}
