//! Application service — the remote deployment pipeline.
//!
//! Runs on the target host inside `hoist _remote`. Steps run strictly in
//! order through the [`StepRunner`]; the first failure aborts the run. The
//! returned [`PipelineReport`] is the only thing that survives the process.
//!
//! Imports only from `crate::domain`, `hoist_common` and
//! `crate::application::ports`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use hoist_common::{
    PipelineReport, ReleaseArgs, RollbackRecord, RunStatus, Step, StepOutcome, StepRecord,
};

use crate::application::ports::{
    Archiver, CommandRunner, FileHasher, HealthProbe, HookContext, Hooks, ProgressReporter,
    LocalFs,
};
use crate::application::services::activation::{self, PidState};
use crate::application::services::step_runner::StepRunner;
use crate::domain::health::probe_url;
use crate::domain::{DeployConfig, ReleaseLayout, RollbackPolicy, StoreError};

/// Everything the pipeline touches on the host.
pub struct PipelinePorts<'a, S, A, F, C, P, H> {
    pub fs: &'a S,
    pub archiver: &'a A,
    pub hasher: &'a F,
    pub runner: &'a C,
    pub probe: &'a P,
    pub hooks: &'a H,
}

/// State established before the first step.
struct Prepared<L> {
    layout: ReleaseLayout,
    archive: PathBuf,
    release_dir: PathBuf,
    /// Target of `current` before this run.
    previous: Option<PathBuf>,
    _lock: L,
}

/// Run the pipeline for one release.
///
/// Never fails: every outcome, including a rejected start, is described by
/// the returned report. The per-run upload directory holding the archive is
/// removed afterwards, whatever the outcome.
pub async fn run_pipeline<S, A, F, C, P, H>(
    config: &DeployConfig,
    args: &ReleaseArgs,
    ports: &PipelinePorts<'_, S, A, F, C, P, H>,
    reporter: &impl ProgressReporter,
) -> PipelineReport
where
    S: LocalFs,
    A: Archiver,
    F: FileHasher,
    C: CommandRunner,
    P: HealthProbe,
    H: Hooks,
{
    let report = run_release(config, args, ports, reporter).await;
    discard_upload(ports.fs, args);
    report
}

fn discard_upload(fs: &impl LocalFs, args: &ReleaseArgs) {
    if args.validate().is_err() {
        return;
    }
    let layout = ReleaseLayout::new(&args.deploy_path);
    let Some(run_dir) = layout.run_dir_of(&layout.archive_path(&args.archive)) else {
        return;
    };
    if let Err(e) = fs.remove_dir_all(&run_dir) {
        tracing::warn!(dir = %run_dir.display(), error = %format!("{e:#}"), "could not remove upload directory");
    }
}

async fn run_release<S, A, F, C, P, H>(
    config: &DeployConfig,
    args: &ReleaseArgs,
    ports: &PipelinePorts<'_, S, A, F, C, P, H>,
    reporter: &impl ProgressReporter,
) -> PipelineReport
where
    S: LocalFs,
    A: Archiver,
    F: FileHasher,
    C: CommandRunner,
    P: HealthProbe,
    H: Hooks,
{
    let report = |steps: Vec<StepRecord>, status: RunStatus| PipelineReport {
        app: args.app.clone(),
        release_id: args.release_id.clone(),
        steps,
        status,
    };

    let prepared = match prepare(config, args, ports.fs) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "pipeline rejected");
            return report(
                Vec::new(),
                RunStatus::Rejected {
                    message: format!("{e:#}"),
                },
            );
        }
    };

    let ctx = HookContext {
        app: &args.app,
        release_id: &args.release_id,
        release_dir: &prepared.release_dir,
        deploy_path: prepared.layout.root(),
    };
    let mut runner = StepRunner::new(ports.hooks, reporter, ctx);

    for step in Step::ALL {
        let outcome = match step {
            Step::Verify => {
                runner
                    .run(step, async {
                        verify(ports.hasher, &prepared.archive, &args.checksum)
                    })
                    .await
            }
            Step::Extract => {
                runner
                    .run(
                        step,
                        extract(ports.archiver, &prepared.archive, &prepared.release_dir),
                    )
                    .await
            }
            Step::PreDeploy => runner.run(step, ports.hooks.pre_deploy(&ctx)).await,
            Step::Link => {
                runner
                    .run(step, async {
                        link(ports.fs, &prepared.layout, &args.release_id)
                    })
                    .await
            }
            Step::Activate => {
                runner
                    .run(
                        step,
                        activation::activate(ports.fs, ports.runner, config, &prepared.layout),
                    )
                    .await
            }
            Step::Ping => runner.run(step, ping(ports.probe, config)).await,
            Step::PostDeploy => runner.run(step, ports.hooks.post_deploy(&ctx)).await,
        };

        if !outcome.is_success() {
            let message = outcome
                .message
                .unwrap_or_else(|| format!("exited with {}", outcome.code));
            let rollback = recover(step, config, &prepared, ports, reporter).await;
            return report(
                runner.into_records(),
                RunStatus::Aborted {
                    step,
                    message,
                    rollback,
                },
            );
        }
    }

    reporter.success(&format!("release {} is live", args.release_id));
    report(runner.into_records(), RunStatus::Succeeded)
}

/// Pre-run checks and setup. Any error here rejects the run.
fn prepare<S: LocalFs>(
    config: &DeployConfig,
    args: &ReleaseArgs,
    fs: &S,
) -> Result<Prepared<S::Lock>> {
    args.validate()?;
    config.validate_remote()?;

    let layout = ReleaseLayout::new(&args.deploy_path);
    fs
        .create_dir_all(&layout.releases_dir())
        .context("creating releases directory")?;
    fs
        .create_dir_all(&layout.staging_dir())
        .context("creating staging directory")?;

    let lock = fs.acquire_lock(
        &layout.lock_path(),
        &format!("{} {}", args.release_id, std::process::id()),
    )?;

    let previous = fs.read_link(&layout.current())?;
    let release_dir = layout.release_dir(&args.release_id);
    if fs.exists(&release_dir) && !fs.is_empty_dir(&release_dir)? {
        return Err(StoreError::AlreadyExists(args.release_id.clone()).into());
    }
    fs
        .create_dir_all(&release_dir)
        .with_context(|| format!("creating {}", release_dir.display()))?;

    Ok(Prepared {
        archive: layout.archive_path(&args.archive),
        release_dir,
        previous,
        layout,
        _lock: lock,
    })
}

fn verify(hasher: &impl FileHasher, archive: &Path, expected: &str) -> Result<StepOutcome> {
    let actual = hasher
        .sha1_file(archive)
        .with_context(|| format!("hashing {}", archive.display()))?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(StepOutcome::ok())
    } else {
        Ok(StepOutcome::failed(
            1,
            format!("checksum mismatch: expected {expected}, got {actual}"),
        ))
    }
}

async fn extract(archiver: &impl Archiver, archive: &Path, dest: &Path) -> Result<StepOutcome> {
    archiver
        .extract(archive, dest)
        .await
        .with_context(|| format!("extracting {}", archive.display()))?;
    Ok(StepOutcome::ok())
}

fn link(fs: &impl LocalFs, layout: &ReleaseLayout, id: &str) -> Result<StepOutcome> {
    fs
        .replace_symlink(&layout.release_dir(id), &layout.current(), &layout.temp_link(id))
        .context("repointing current")?;
    Ok(StepOutcome::ok())
}

async fn ping(probe: &impl HealthProbe, config: &DeployConfig) -> Result<StepOutcome> {
    tokio::time::sleep(Duration::from_secs(config.health.grace_secs)).await;
    let url = probe_url(config.health.port, &config.health.path);
    let host = config.health_hostname();
    let status = probe
        .probe(&url, &host, Duration::from_secs(config.health.timeout_secs))
        .await;
    if status.is_healthy() {
        Ok(StepOutcome::ok_with(status.describe()))
    } else {
        Ok(StepOutcome::failed(1, status.describe()))
    }
}

/// Clean up after a failed step.
///
/// Before activation the half-built release is removed. After activation
/// `current` is rolled back when the policy allows it.
async fn recover<S, A, F, C, P, H>(
    step: Step,
    config: &DeployConfig,
    prepared: &Prepared<S::Lock>,
    ports: &PipelinePorts<'_, S, A, F, C, P, H>,
    reporter: &impl ProgressReporter,
) -> Option<RollbackRecord>
where
    S: LocalFs,
    C: CommandRunner,
{
    if !step.is_post_activation() {
        if let Err(e) = ports.fs.remove_dir_all(&prepared.release_dir) {
            tracing::warn!(
                dir = %prepared.release_dir.display(),
                error = %format!("{e:#}"),
                "could not remove unactivated release"
            );
        }
        return None;
    }

    if config.rollback == RollbackPolicy::None {
        reporter.warn("rollback disabled; current still points at the failed release");
        return None;
    }

    reporter.step("rolling back...");
    let record = roll_back(config, prepared, ports.fs, ports.runner).await;
    match &record.error {
        Some(e) => reporter.warn(&format!("rollback incomplete: {e}")),
        None => match &record.restored {
            Some(id) => reporter.success(&format!("rolled back to {id}")),
            None => reporter.success("rolled back; no previous release, current removed"),
        },
    }
    Some(record)
}

async fn roll_back<L>(
    config: &DeployConfig,
    prepared: &Prepared<L>,
    fs: &impl LocalFs,
    runner: &impl CommandRunner,
) -> RollbackRecord {
    let layout = &prepared.layout;
    let mut record = RollbackRecord::default();

    let Some(previous) = &prepared.previous else {
        tracing::warn!("no previous release; removing current");
        if let Err(e) = fs.remove_file(&layout.current()) {
            record.error = Some(format!("removing current: {e:#}"));
        }
        return record;
    };

    let id = layout
        .release_id_of(previous)
        .unwrap_or_else(|| previous.display().to_string());
    tracing::warn!(release = %id, "rolling back current");
    let target = if previous.is_absolute() {
        previous.clone()
    } else {
        layout.root().join(previous)
    };
    if let Err(e) = fs.replace_symlink(&target, &layout.current(), &layout.temp_link(&id)) {
        record.error = Some(format!("re-linking current to {id}: {e:#}"));
        return record;
    }
    record.restored = Some(id);

    let pid_path = layout.resolve(&config.process.pid_path);
    match activation::read_pid(fs, runner, &pid_path).await {
        Ok(PidState::Live(pid)) => {
            match activation::send_signal(runner, pid, &config.process.signal).await {
                Ok(()) => record.signalled = true,
                Err(e) => record.error = Some(format!("{e:#}")),
            }
        }
        Ok(PidState::Absent | PidState::Stale(_)) => {}
        Err(e) => record.error = Some(format!("{e:#}")),
    }
    record
}
