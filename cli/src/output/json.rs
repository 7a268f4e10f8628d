//! JSON output helpers.
//!
//! Used by all `--json` code paths: the deploy result on success, an error
//! object when a command fails.

use anyhow::{Context, Result};
use hoist_common::PipelineReport;
use serde::Serialize;

use crate::domain::{ConfigError, DeployError, PackageError, StoreError};

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Machine-readable code for a command failure.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<DeployError>() {
        e.code()
    } else if err.downcast_ref::<ConfigError>().is_some() {
        "CONFIG_ERROR"
    } else if err.downcast_ref::<PackageError>().is_some() {
        "PACKAGE_FAILED"
    } else if err.downcast_ref::<StoreError>().is_some() {
        "RELEASE_STORE"
    } else {
        "ERROR"
    }
}

/// Successful deployment, as printed by `hoist --json deploy`.
#[derive(Debug, Serialize)]
pub struct DeployJson<'a> {
    pub app: &'a str,
    pub version: &'a str,
    pub release_id: &'a str,
    pub checksum: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_error: Option<String>,
    pub report: &'a PipelineReport,
}

/// Pretty-print any serializable value.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_pretty(value: &impl Serialize) -> Result<String> {
    serde_json::to_string_pretty(value).context("JSON serialization failed")
}
