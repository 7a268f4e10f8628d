//! Application service — the local side of a deployment.
//!
//! Package, transfer, invoke the remote pipeline exactly once, interpret its
//! report and tag the release on success.
//!
//! Imports only from `crate::domain`, `hoist_common` and
//! `crate::application::ports`.

use std::path::Path;
use std::process::Output;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hoist_common::{PipelineReport, ReleaseArgs, RunStatus};

use crate::application::ports::{
    Archiver, CommandRunner, FileHasher, Invocation, LocalFs, ProgressReporter, Transport,
};
use crate::application::services::package::{PackageOptions, package};
use crate::domain::layout::{REMOTE_BINARY, REMOTE_CONFIG};
use crate::domain::release::{parse_report, render_tag};
use crate::domain::{DeployConfig, DeployError, Release};

/// Lines of remote stderr kept in [`DeployError::RemoteUnknown`].
const STDERR_TAIL_LINES: usize = 20;

/// Ports used by the local orchestrator.
pub struct DeployPorts<'a, L, C, A, F, T> {
    pub fs: &'a L,
    pub runner: &'a C,
    pub archiver: &'a A,
    pub hasher: &'a F,
    pub transport: &'a T,
}

/// Inputs that do not come from the config file.
pub struct DeployOptions<'a> {
    pub project_dir: &'a Path,
    /// Scratch directory for the archive and the effective config.
    pub work_dir: &'a Path,
    /// The running `hoist` executable, uploaded to run the remote side.
    pub executable: &'a Path,
    pub now: DateTime<Utc>,
}

/// Result of a deployment whose remote pipeline succeeded.
#[derive(Debug)]
pub struct DeployOutcome {
    pub release: Release,
    pub report: PipelineReport,
    /// Tag created and pushed, if tagging was enabled and worked.
    pub tag: Option<String>,
    /// Set when the release is live but tagging failed.
    pub tag_error: Option<DeployError>,
}

/// Run a full deployment.
///
/// # Errors
///
/// Returns a config, packaging or [`DeployError`] describing the first failure.
/// A tagging failure is not an error: it is returned in
/// [`DeployOutcome::tag_error`].
pub async fn deploy<L, C, A, F, T>(
    config: &DeployConfig,
    opts: &DeployOptions<'_>,
    ports: &DeployPorts<'_, L, C, A, F, T>,
    reporter: &impl ProgressReporter,
) -> Result<DeployOutcome>
where
    L: LocalFs,
    C: CommandRunner,
    A: Archiver,
    F: FileHasher,
    T: Transport,
{
    config.validate_local()?;

    let release = package(
        config,
        &PackageOptions {
            project_dir: opts.project_dir,
            work_dir: opts.work_dir,
            now: opts.now,
        },
        ports.fs,
        ports.runner,
        ports.archiver,
        ports.hasher,
        reporter,
    )
    .await?;

    let deploy_path = config.deploy_path_for(&release.app);
    let config_file = opts.work_dir.join(REMOTE_CONFIG);
    ports
        .fs
        .write(&config_file, &serde_yaml::to_string(config)?)
        .context("writing effective config")?;

    let output = transfer(config, opts, ports.transport, &release, &deploy_path, &config_file, reporter)
        .await?;
    let report = interpret(&output)?;
    relay_steps(&report, reporter);

    match &report.status {
        RunStatus::Succeeded => {}
        RunStatus::Aborted { step, message, .. } => {
            return Err(DeployError::Pipeline {
                step: *step,
                message: message.clone(),
            }
            .into());
        }
        RunStatus::Rejected { message } => {
            return Err(DeployError::Rejected(message.clone()).into());
        }
    }
    reporter.success(&format!("{} {} deployed to {deploy_path}", release.app, release.id));

    let (tag, tag_error) = if config.tag.enabled {
        match tag_release(config, opts.project_dir, ports.runner, &release).await {
            Ok(tag) => {
                reporter.success(&format!("tagged {tag}"));
                (Some(tag), None)
            }
            Err(e) => {
                let err = DeployError::Tag(format!("{e:#}"));
                reporter.warn(&err.to_string());
                (None, Some(err))
            }
        }
    } else {
        (None, None)
    };

    Ok(DeployOutcome {
        release,
        report,
        tag,
        tag_error,
    })
}

/// Prepare, upload, then invoke the remote pipeline once.
///
/// Every upload lands in the run's own directory, so concurrent deploys to
/// the same target never overwrite each other's archive or executable.
async fn transfer(
    config: &DeployConfig,
    opts: &DeployOptions<'_>,
    transport: &impl Transport,
    release: &Release,
    deploy_path: &str,
    config_file: &Path,
    reporter: &impl ProgressReporter,
) -> Result<Output> {
    let host = config.require_host()?;
    let transport_err = |e: anyhow::Error| DeployError::Transport(format!("{e:#}"));

    reporter.step(&format!("uploading to {host}..."));
    let run_dir = transport
        .prepare(deploy_path, &release.id)
        .await
        .map_err(transport_err)?;
    let archive_name = release.archive_name();
    let archive = format!("{run_dir}/{archive_name}");
    let binary = format!("{run_dir}/{REMOTE_BINARY}");
    let remote_config = format!("{run_dir}/{REMOTE_CONFIG}");
    let uploads = [
        (release.archive_path.as_path(), archive.as_str()),
        (opts.executable, binary.as_str()),
        (config_file, remote_config.as_str()),
    ];
    for (local, remote) in uploads {
        tracing::debug!(local = %local.display(), remote, "uploading");
        transport.upload(local, remote).await.map_err(transport_err)?;
    }
    reporter.success(&format!("uploaded {archive_name}"));

    let args = ReleaseArgs {
        archive,
        deploy_path: deploy_path.to_string(),
        app: release.app.clone(),
        release_id: release.id.clone(),
        checksum: release.checksum.clone(),
    };
    let mut argv = vec![binary.as_str(), "_remote", "--config", remote_config.as_str()];
    argv.extend(args.to_argv());

    reporter.step("running remote pipeline...");
    transport.invoke(&argv).await.map_err(|e| transport_err(e).into())
}

/// Turn the remote output into a report, or explain why there is none.
fn interpret(output: &Output) -> Result<PipelineReport> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    if let Some(report) = parse_report(&stdout) {
        if report.succeeded() && !output.status.success() {
            return Err(remote_unknown(output).into());
        }
        return Ok(report);
    }
    Err(remote_unknown(output).into())
}

fn remote_unknown(output: &Output) -> DeployError {
    let status = output
        .status
        .code()
        .map_or_else(|| "killed by signal".to_string(), |c| c.to_string());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
    DeployError::RemoteUnknown {
        status,
        stderr: tail,
    }
}

/// Replay the remote step records through the local reporter.
fn relay_steps(report: &PipelineReport, reporter: &impl ProgressReporter) {
    for record in &report.steps {
        let detail = record
            .outcome
            .message
            .as_deref()
            .map(|m| format!(" ({m})"))
            .unwrap_or_default();
        if record.outcome.is_success() {
            reporter.success(&format!("{}{detail}", record.step.description()));
        } else {
            reporter.warn(&format!("{} failed{detail}", record.step.description()));
        }
    }
    if let RunStatus::Aborted {
        rollback: Some(rollback),
        ..
    } = &report.status
    {
        match (&rollback.restored, &rollback.error) {
            (_, Some(e)) => reporter.warn(&format!("rollback incomplete: {e}")),
            (Some(id), None) => reporter.warn(&format!("rolled back to release {id}")),
            (None, None) => reporter.warn("rolled back: no previous release, current removed"),
        }
    }
}

/// Create an annotated tag and push it.
async fn tag_release(
    config: &DeployConfig,
    project: &Path,
    runner: &impl CommandRunner,
    release: &Release,
) -> Result<String> {
    let tag = render_tag(&config.tag.template, &release.app, &release.version, &release.id);
    let message = format!("{} release {}", release.app, release.id);
    git(runner, project, &["tag", "-a", &tag, "-m", &message]).await?;
    git(runner, project, &["push", &config.tag.remote, &tag]).await?;
    Ok(tag)
}

async fn git(runner: &impl CommandRunner, project: &Path, args: &[&str]) -> Result<()> {
    let output = runner
        .execute(&Invocation::new("git").args(args.iter().copied()).cwd(project))
        .await?;
    if !output.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
