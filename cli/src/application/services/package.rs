//! Application service — package the working tree into a release archive.
//!
//! Imports only from `crate::domain`, `hoist_common` and
//! `crate::application::ports`.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hoist_common::{archive_file_name, release_id_at};

use crate::application::ports::{
    Archiver, CommandRunner, FileHasher, Invocation, LocalFs, ProgressReporter,
};
use crate::domain::release::{VersionMarker, parse_version_marker};
use crate::domain::{ConfigError, DeployConfig, IgnoreSet, PackageError, Release};

/// Where to package from and to.
pub struct PackageOptions<'a> {
    /// Project root; every archive entry is relative to it.
    pub project_dir: &'a Path,
    /// Scratch directory receiving the archive.
    pub work_dir: &'a Path,
    /// Timestamp the release id is derived from.
    pub now: DateTime<Utc>,
}

/// Build a checksummed release archive.
///
/// Nothing here touches the remote host.
///
/// # Errors
///
/// Returns [`PackageError`] for checkout, prepare or archive failures and
/// [`ConfigError`] for a missing or empty version marker.
pub async fn package(
    config: &DeployConfig,
    opts: &PackageOptions<'_>,
    fs: &impl LocalFs,
    runner: &impl CommandRunner,
    archiver: &impl Archiver,
    hasher: &impl FileHasher,
    reporter: &impl ProgressReporter,
) -> Result<Release> {
    let project = opts.project_dir;

    if let Some(branch) = config.branch.as_deref() {
        reporter.step(&format!("checking out {branch}..."));
        checkout(runner, project, branch).await?;
    }

    if let Some(command) = config.package.prepare.as_deref() {
        reporter.step(&format!("running `{command}`..."));
        prepare(runner, project, command, config.package.prepare_timeout_secs).await?;
    }

    let marker = read_version(fs, project, &config.package.version_file)?;
    let app = app_name(config, &marker, project)?;
    let id = release_id_at(opts.now);

    let ignore = load_ignore_set(fs, project, &config.package.ignore_files)?;
    let archive_path = opts.work_dir.join(archive_file_name(&app, &marker.version, &id));

    reporter.step(&format!("packaging {app} v{}...", marker.version));
    let entries = archiver
        .build(project, &ignore, &archive_path)
        .await
        .map_err(|e| PackageError::Archive(format!("{e:#}")))?;
    let checksum = hasher
        .sha1_file(&archive_path)
        .context("computing archive checksum")?;
    tracing::info!(archive = %archive_path.display(), entries, %checksum, "archive built");
    reporter.success(&format!("packaged {app} v{} ({id})", marker.version));

    Ok(Release {
        app,
        version: marker.version,
        id,
        archive_path,
        checksum,
    })
}

async fn checkout(runner: &impl CommandRunner, project: &Path, branch: &str) -> Result<()> {
    let output = runner
        .execute(&Invocation::new("git").args(["checkout", branch]).cwd(project))
        .await
        .map_err(|e| PackageError::Checkout {
            branch: branch.to_string(),
            reason: format!("{e:#}"),
        })?;
    if !output.status.success() {
        return Err(PackageError::Checkout {
            branch: branch.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(())
}

async fn prepare(
    runner: &impl CommandRunner,
    project: &Path,
    command: &str,
    timeout_secs: u64,
) -> Result<()> {
    let invocation = Invocation::shell(command)
        .cwd(project)
        .timeout(Duration::from_secs(timeout_secs));
    let output = runner
        .execute(&invocation)
        .await
        .map_err(|e| PackageError::Prepare {
            command: command.to_string(),
            reason: format!("{e:#}"),
        })?;
    if !output.status.success() {
        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        return Err(PackageError::Prepare {
            command: command.to_string(),
            reason: format!(
                "exit {code}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
        .into());
    }
    Ok(())
}

fn read_version(fs: &impl LocalFs, project: &Path, version_file: &str) -> Result<VersionMarker> {
    let path = project.join(version_file);
    let contents = fs
        .read_optional(&path)?
        .ok_or_else(|| ConfigError::MissingVersionFile(path.display().to_string()))?;
    parse_version_marker(version_file, &contents)
}

/// `app` from config, else the version marker's name, else the directory name.
///
/// Scoped package names (`@scope/name`) keep only the last segment.
fn app_name(config: &DeployConfig, marker: &VersionMarker, project: &Path) -> Result<String> {
    let dir_name = || {
        project
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    };
    config
        .app
        .clone()
        .or_else(|| marker.name.clone())
        .or_else(dir_name)
        .map(|n| n.trim().rsplit('/').next().unwrap_or_default().to_string())
        .filter(|n| !n.is_empty())
        .context("cannot determine the application name; set `app` in hoist.yaml")
}

fn load_ignore_set(fs: &impl LocalFs, project: &Path, sources: &[String]) -> Result<IgnoreSet> {
    let mut ignore = IgnoreSet::builtin();
    for source in sources {
        let path = project.join(source);
        let Some(contents) = fs.read_optional(&path)? else {
            tracing::debug!(file = %path.display(), "ignore file not present");
            continue;
        };
        for skipped in ignore.add_source(&contents) {
            tracing::debug!(file = %source, pattern = %skipped, "unsupported ignore pattern skipped");
        }
    }
    Ok(ignore)
}
