//! Domain types and validators for deploy configuration.
//!
//! Pure functions only — no I/O, no async, no filesystem access.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

/// Signals accepted for the restart step, without the `SIG` prefix.
pub const VALID_SIGNALS: &[&str] = &[
    "HUP", "INT", "QUIT", "TERM", "USR1", "USR2", "WINCH", "CONT", "KILL",
];

// ── Config schema ────────────────────────────────────────────────────────────

/// What to do when a step fails after `current` has been repointed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RollbackPolicy {
    /// Re-link `current` to the previous release and re-signal the server.
    #[default]
    Auto,
    /// Leave `current` on the failed release.
    None,
}

/// Top-level configuration stored in `hoist.yaml`.
///
/// Immutable once loaded: the orchestrator and the remote pipeline both take
/// it by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Application name. Falls back to the version file, then the directory name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    /// Remote host to deploy to. Required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// SSH port.
    pub port: u16,
    /// Remote user.
    pub user: String,
    /// SSH identity file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<PathBuf>,
    /// Deploy base directory on the remote host. Defaults to `/var/www/<app>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_path: Option<String>,
    /// Branch to check out locally before packaging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub rollback: RollbackPolicy,
    pub process: ProcessConfig,
    pub health: HealthConfig,
    pub hooks: HooksConfig,
    pub package: PackageConfig,
    pub transport: TransportConfig,
    pub tag: TagConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            app: None,
            host: None,
            port: 22,
            user: "deploy".to_string(),
            identity: None,
            deploy_path: None,
            branch: None,
            rollback: RollbackPolicy::default(),
            process: ProcessConfig::default(),
            health: HealthConfig::default(),
            hooks: HooksConfig::default(),
            package: PackageConfig::default(),
            transport: TransportConfig::default(),
            tag: TagConfig::default(),
        }
    }
}

/// Application server lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Shell command that starts the server when no PID file exists.
    pub command: String,
    /// Signal delivered to a running server to make it restart.
    pub signal: String,
    /// PID file written by the server. Relative paths resolve against the deploy path.
    pub pid_path: String,
    /// A fresh start counts as started if the command is still running, or
    /// exited 0, this long after launch.
    pub settle_secs: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            command: "npm start".to_string(),
            signal: "HUP".to_string(),
            pid_path: "shared/server.pid".to_string(),
            settle_secs: 1,
        }
    }
}

/// HTTP health probe against the freshly activated server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Loopback port the server listens on.
    pub port: u16,
    pub path: String,
    /// `Host` header value. Defaults to the deploy host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub timeout_secs: u64,
    /// Delay between activation and the probe.
    pub grace_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            path: "/".to_string(),
            hostname: None,
            timeout_secs: 5,
            grace_secs: 2,
        }
    }
}

/// Shell commands bound to the pipeline's extension points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_deploy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_deploy: Option<String>,
    /// Notified after every step; its result is ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_step: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            pre_deploy: None,
            post_deploy: None,
            on_step: None,
            timeout_secs: 300,
        }
    }
}

/// Local packaging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// File the release version is read from.
    pub version_file: String,
    /// Dependency bundling command run before archiving.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepare: Option<String>,
    /// Ignore-pattern sources, relative to the project root. Missing files are skipped.
    pub ignore_files: Vec<String>,
    pub prepare_timeout_secs: u64,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            version_file: "package.json".to_string(),
            prepare: None,
            ignore_files: vec![".gitignore".to_string(), ".hoistignore".to_string()],
            prepare_timeout_secs: 600,
        }
    }
}

/// Bounds on the network-facing steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub connect_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub invoke_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            upload_timeout_secs: 600,
            invoke_timeout_secs: 900,
        }
    }
}

/// Release marker created locally after a full round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub enabled: bool,
    /// Supports `{app}`, `{version}` and `{id}` placeholders.
    pub template: String,
    /// Git remote the tag is pushed to.
    pub remote: String,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            template: "release-{id}".to_string(),
            remote: "origin".to_string(),
        }
    }
}

/// Values taken from the command line; each one beats the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub identity: Option<PathBuf>,
    pub branch: Option<String>,
    pub deploy_path: Option<String>,
    pub no_tag: bool,
}

impl DeployConfig {
    /// Apply command-line overrides on top of the file values.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        let o = overrides.clone();
        if o.host.is_some() {
            self.host = o.host;
        }
        if let Some(port) = o.port {
            self.port = port;
        }
        if let Some(user) = o.user {
            self.user = user;
        }
        if o.identity.is_some() {
            self.identity = o.identity;
        }
        if o.branch.is_some() {
            self.branch = o.branch;
        }
        if o.deploy_path.is_some() {
            self.deploy_path = o.deploy_path;
        }
        if o.no_tag {
            self.tag.enabled = false;
        }
        self
    }

    /// The configured host, or [`ConfigError::MissingHost`].
    ///
    /// # Errors
    ///
    /// Returns an error if no host is set or it is blank.
    pub fn require_host(&self) -> Result<&str> {
        match self.host.as_deref().map(str::trim) {
            Some(h) if !h.is_empty() => Ok(h),
            _ => Err(ConfigError::MissingHost.into()),
        }
    }

    /// Deploy base path for `app`.
    #[must_use]
    pub fn deploy_path_for(&self, app: &str) -> String {
        self.deploy_path
            .clone()
            .unwrap_or_else(|| format!("/var/www/{app}"))
    }

    /// `Host` header used by the health probe.
    #[must_use]
    pub fn health_hostname(&self) -> String {
        self.health
            .hostname
            .clone()
            .or_else(|| self.host.clone())
            .unwrap_or_else(|| "localhost".to_string())
    }

    /// Validate everything the local side needs before packaging.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate_local(&self) -> Result<()> {
        self.require_host()?;
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port).into());
        }
        self.validate_remote()
    }

    /// Validate everything the remote pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate_remote(&self) -> Result<()> {
        normalize_signal(&self.process.signal)?;
        if !self.health.path.starts_with('/') {
            return Err(ConfigError::InvalidHealthPath(self.health.path.clone()).into());
        }
        if self.health.port == 0 {
            return Err(ConfigError::InvalidPort(self.health.port).into());
        }
        Ok(())
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Normalizes a signal name: case-insensitive, optional `SIG` prefix.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownSignal`] for anything outside [`VALID_SIGNALS`].
pub fn normalize_signal(name: &str) -> Result<String> {
    let upper = name.trim().to_ascii_uppercase();
    let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
    if VALID_SIGNALS.contains(&bare) {
        Ok(bare.to_string())
    } else {
        Err(ConfigError::UnknownSignal(name.to_string()).into())
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
