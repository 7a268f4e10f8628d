//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use hoist_common::Step;
use thiserror::Error;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors detected before any work begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No target host configured. Pass --host or set `host` in hoist.yaml.")]
    MissingHost,

    #[error("Invalid port {0}: must be between 1 and 65535")]
    InvalidPort(u16),

    #[error("Unknown signal '{0}'. Valid signals: {valid}", valid = super::config::VALID_SIGNALS.join(", "))]
    UnknownSignal(String),

    #[error("Invalid health path '{0}': must start with '/'")]
    InvalidHealthPath(String),

    #[error("Version file not found: {0}")]
    MissingVersionFile(String),

    #[error("No version found in {0}")]
    MissingVersion(String),

    #[error("Cannot read config {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

// ── Packaging errors ──────────────────────────────────────────────────────────

/// Local build failures. None of these leave anything behind on the remote host.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Failed to check out branch '{branch}': {reason}")]
    Checkout { branch: String, reason: String },

    #[error("Prepare command `{command}` failed: {reason}")]
    Prepare { command: String, reason: String },

    #[error("Failed to build archive: {0}")]
    Archive(String),
}

// ── Remote release store errors ───────────────────────────────────────────────

/// Reasons the remote pipeline refuses to start or to touch a path.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Another deployment is in progress (lock file {0}). Remove it if the previous run crashed.")]
    Locked(String),

    #[error("Release {0} already exists and is not empty")]
    AlreadyExists(String),

    #[error("Archive entry escapes the release directory: {0}")]
    UnsafeEntry(String),
}

// ── Deploy errors ─────────────────────────────────────────────────────────────

/// Failures seen by the local orchestrator.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Transfer to remote host failed: {0}")]
    Transport(String),

    #[error("Remote pipeline aborted at {step}: {message}")]
    Pipeline { step: Step, message: String },

    #[error("Remote pipeline rejected the release: {0}")]
    Rejected(String),

    #[error(
        "Remote failed to execute properly (exit status {status}); remote state is unknown.\n{stderr}"
    )]
    RemoteUnknown { status: String, stderr: String },

    #[error("Release deployed but tagging failed: {0}")]
    Tag(String),
}

impl DeployError {
    /// Short machine-readable code for JSON error output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            DeployError::Transport(_) => "TRANSPORT_FAILED",
            DeployError::Pipeline { .. } => "PIPELINE_ABORTED",
            DeployError::Rejected(_) => "PIPELINE_REJECTED",
            DeployError::RemoteUnknown { .. } => "REMOTE_UNKNOWN",
            DeployError::Tag(_) => "TAG_FAILED",
        }
    }
}
