//! Release identity: ids, archive names and the arguments handed to the remote pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `chrono` format of a release id: `YYYYMMDDHHmm`.
pub const RELEASE_ID_FORMAT: &str = "%Y%m%d%H%M";

/// Length of a lowercase hex SHA-1 digest.
pub const CHECKSUM_LEN: usize = 40;

/// Validation failures for release identity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReleaseError {
    #[error("Invalid release id '{0}': expected 12 digits (YYYYMMDDHHmm)")]
    InvalidId(String),

    #[error("Invalid checksum '{0}': expected 40 hex characters (SHA-1)")]
    InvalidChecksum(String),

    #[error("Application name must not be empty")]
    EmptyApp,

    #[error("Invalid archive name '{0}': must be a file name or a path without '..'")]
    InvalidArchive(String),
}

/// Release id for a point in time.
#[must_use]
pub fn release_id_at(at: DateTime<Utc>) -> String {
    at.format(RELEASE_ID_FORMAT).to_string()
}

/// Archive file name: `<app>-v<version>.<release_id>.tar.gz`.
#[must_use]
pub fn archive_file_name(app: &str, version: &str, release_id: &str) -> String {
    format!("{app}-v{version}.{release_id}.tar.gz")
}

/// Checks a release id is exactly 12 ASCII digits.
///
/// Since the id becomes a directory name on the remote host, this also rules
/// out path traversal.
pub fn validate_release_id(id: &str) -> Result<(), ReleaseError> {
    if id.len() != 12 || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ReleaseError::InvalidId(id.to_string()));
    }
    Ok(())
}

pub fn validate_checksum(checksum: &str) -> Result<(), ReleaseError> {
    if checksum.len() != CHECKSUM_LEN || !checksum.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ReleaseError::InvalidChecksum(checksum.to_string()));
    }
    Ok(())
}

/// Positional arguments of the remote pipeline entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseArgs {
    /// Archive file name, or a path. Relative names resolve against the staging dir.
    pub archive: String,
    /// Deploy base directory on the remote host.
    pub deploy_path: String,
    pub app: String,
    pub release_id: String,
    /// Expected lowercase hex SHA-1 of the archive.
    pub checksum: String,
}

impl ReleaseArgs {
    /// Validates every field that is interpreted as a path or digest.
    pub fn validate(&self) -> Result<(), ReleaseError> {
        if self.app.trim().is_empty() {
            return Err(ReleaseError::EmptyApp);
        }
        validate_release_id(&self.release_id)?;
        validate_checksum(&self.checksum)?;
        if self.archive.is_empty() || self.archive.split('/').any(|c| c == "..") {
            return Err(ReleaseError::InvalidArchive(self.archive.clone()));
        }
        Ok(())
    }

    /// Arguments in the order the remote entry point expects them.
    #[must_use]
    pub fn to_argv(&self) -> [&str; 5] {
        [
            self.archive.as_str(),
            self.deploy_path.as_str(),
            self.app.as_str(),
            self.release_id.as_str(),
            self.checksum.as_str(),
        ]
    }
}
