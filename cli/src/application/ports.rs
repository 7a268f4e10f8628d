//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `hoist_common` — never
//! from `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::Result;
use hoist_common::{Step, StepOutcome};

use crate::domain::{DeployConfig, HealthStatus, IgnoreSet};

// ── Value Types ───────────────────────────────────────────────────────────────

/// A process to run: program, arguments, working directory, extra environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
    /// Overrides the runner's default timeout.
    pub timeout: Option<Duration>,
}

impl Invocation {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// `sh -c <command>`.
    #[must_use]
    pub fn shell(command: &str) -> Self {
        Self::new("sh").args(["-c", command])
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `program arg1 arg2 ...` for logs and error messages.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// State of a detached process once its settle period is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detached {
    /// Still running with this PID; it outlives the caller.
    Running(u32),
    /// Exited within the settle period (daemonizing commands exit 0 here).
    Exited(ExitStatus),
}

impl Detached {
    /// Alive, or exited cleanly.
    #[must_use]
    pub fn started(&self) -> bool {
        match self {
            Detached::Running(_) => true,
            Detached::Exited(status) => status.success(),
        }
    }
}

/// What a hook gets to know about the release it runs for.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub app: &'a str,
    pub release_id: &'a str,
    pub release_dir: &'a Path,
    pub deploy_path: &'a Path,
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run an invocation and capture its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds its timeout.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn execute(&self, invocation: &Invocation) -> Result<Output>;

    /// Start an invocation in its own process group and do not wait for it.
    ///
    /// stdin is closed; stdout and stderr are appended to `log`. After
    /// `settle` the process is reported as running or as exited. A running
    /// process is never killed by the runner.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be opened or the process cannot be spawned.
    async fn spawn_detached(
        &self,
        invocation: &Invocation,
        log: &Path,
        settle: Duration,
    ) -> Result<Detached>;

    /// Run a program with the runner's default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.execute(&Invocation::new(program).args(args.iter().copied()))
            .await
    }

    /// Run a program with a custom timeout override.
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        self.execute(
            &Invocation::new(program)
                .args(args.iter().copied())
                .timeout(timeout),
        )
        .await
    }
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Hooks Port ────────────────────────────────────────────────────────────────

/// User extension points of the remote pipeline. Every method defaults to a no-op.
#[allow(async_fn_in_trait)]
pub trait Hooks {
    /// Runs against the extracted release before activation. Non-zero aborts.
    async fn pre_deploy(&self, _ctx: &HookContext<'_>) -> Result<StepOutcome> {
        Ok(StepOutcome::ok())
    }

    /// Runs after the health check. Non-zero aborts and triggers rollback.
    async fn post_deploy(&self, _ctx: &HookContext<'_>) -> Result<StepOutcome> {
        Ok(StepOutcome::ok())
    }

    /// Notification after every step. Cannot abort the run.
    async fn on_step(&self, _ctx: &HookContext<'_>, _step: Step, _outcome: &StepOutcome) {}
}

/// Hooks that do nothing.
pub struct NoopHooks;

impl Hooks for NoopHooks {}

// ── Local Filesystem Port ─────────────────────────────────────────────────────

/// Filesystem operations on this host: the project tree when packaging,
/// the deploy target when running the pipeline.
pub trait LocalFs {
    /// Held for as long as the deploy lock is owned; releases it on drop.
    type Lock;

    fn exists(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    /// `true` if `path` is a directory with no entries.
    fn is_empty_dir(&self, path: &Path) -> Result<bool>;
    /// Target of the symlink at `path`, or `None` if there is no symlink.
    fn read_link(&self, path: &Path) -> Result<Option<PathBuf>>;
    /// Atomically point `link` at `target`, staging the new link at `temp` first.
    fn replace_symlink(&self, target: &Path, link: &Path, temp: &Path) -> Result<()>;
    /// Remove a file or symlink if present.
    fn remove_file(&self, path: &Path) -> Result<()>;
    /// Contents of `path`, or `None` if it does not exist.
    fn read_optional(&self, path: &Path) -> Result<Option<String>>;
    fn write(&self, path: &Path, contents: &str) -> Result<()>;
    /// Create the lock file exclusively.
    ///
    /// Returns a guard that removes the lock when dropped.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Locked` if the lock file already exists.
    fn acquire_lock(&self, path: &Path, owner: &str) -> Result<Self::Lock>;
}

// ── Archive Ports ─────────────────────────────────────────────────────────────

/// Builds and unpacks release archives.
#[allow(async_fn_in_trait)]
pub trait Archiver {
    /// Pack `source` into a gzip tarball at `dest`, skipping ignored entries.
    /// Returns the number of entries written.
    async fn build(&self, source: &Path, ignore: &IgnoreSet, dest: &Path) -> Result<u64>;
    /// Unpack `archive` into `dest`. Entries escaping `dest` are rejected.
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Abstracts file hashing operations.
pub trait FileHasher {
    /// Lowercase hex SHA-1 of a file's bytes.
    fn sha1_file(&self, path: &Path) -> Result<String>;
}

// ── Health Port ───────────────────────────────────────────────────────────────

/// Abstracts the HTTP health probe so the pipeline can be tested without a server.
#[allow(async_fn_in_trait)]
pub trait HealthProbe {
    /// GET `url` with an explicit `Host` header.
    async fn probe(&self, url: &str, host: &str, timeout: Duration) -> HealthStatus;
}

// ── Transport Port ────────────────────────────────────────────────────────────

/// Moves a release to the remote host and starts the remote pipeline.
///
/// Callers must not `invoke` after a failed `prepare` or `upload`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Create a fresh upload directory for this run under the staging
    /// directory of `deploy_path` and return its remote path.
    ///
    /// Two runs never share an upload directory, even for the same release id.
    async fn prepare(&self, deploy_path: &str, release_id: &str) -> Result<String>;
    /// Copy a local file to `remote` (a path on the target host).
    async fn upload(&self, local: &Path, remote: &str) -> Result<()>;
    /// Run one remote command and capture its output. Non-zero exit is not an error.
    async fn invoke(&self, args: &[&str]) -> Result<Output>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts where `hoist.yaml` lives.
pub trait ConfigStore {
    /// Load the config, falling back to defaults when the file is absent.
    fn load(&self) -> Result<DeployConfig>;
    /// Path the config is read from.
    fn path(&self) -> PathBuf;
}
