//! Remote release directory layout.
//!
//! ```text
//! <deploy_path>/
//!   releases/<id>/        one extracted copy per release
//!   current -> releases/<id>
//!   .hoist/               deploy lock, server log
//!     <id>.XXXXXX/        one upload directory per deploy run
//! ```

use std::path::{Path, PathBuf};

/// Staging directory for uploaded artifacts, relative to the deploy path.
pub const STAGING_DIR: &str = ".hoist";
/// Name of the uploaded executable inside the staging directory.
pub const REMOTE_BINARY: &str = "hoist";
/// Name of the uploaded config inside the staging directory.
pub const REMOTE_CONFIG: &str = "hoist.yaml";

const RELEASES_DIR: &str = "releases";
const CURRENT_LINK: &str = "current";
const LOCK_FILE: &str = "deploy.lock";
const SERVER_LOG: &str = "server.log";

/// Paths of one deploy target, rooted at the deploy base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseLayout {
    root: PathBuf,
}

impl ReleaseLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn releases_dir(&self) -> PathBuf {
        self.root.join(RELEASES_DIR)
    }

    #[must_use]
    pub fn release_dir(&self, id: &str) -> PathBuf {
        self.releases_dir().join(id)
    }

    /// The `current` symlink.
    #[must_use]
    pub fn current(&self) -> PathBuf {
        self.root.join(CURRENT_LINK)
    }

    /// Temporary link renamed over `current` during activation.
    #[must_use]
    pub fn temp_link(&self, id: &str) -> PathBuf {
        self.root.join(format!("{CURRENT_LINK}.tmp-{id}"))
    }

    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.staging_dir().join(LOCK_FILE)
    }

    /// Output of a server started by hoist.
    #[must_use]
    pub fn server_log(&self) -> PathBuf {
        self.staging_dir().join(SERVER_LOG)
    }

    /// The per-run upload directory holding `archive`, if it is one.
    ///
    /// Only direct children of the staging directory qualify, so a bare
    /// archive name or a path elsewhere yields `None`.
    #[must_use]
    pub fn run_dir_of(&self, archive: &Path) -> Option<PathBuf> {
        let run_dir = archive.parent()?;
        (run_dir.parent()? == self.staging_dir()).then(|| run_dir.to_path_buf())
    }

    /// Resolve a configured path: absolute paths stay as-is, relative ones hang off the root.
    #[must_use]
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    /// Resolve the archive argument: bare names live in the staging directory.
    #[must_use]
    pub fn archive_path(&self, archive: &str) -> PathBuf {
        let p = Path::new(archive);
        if p.is_absolute() || p.components().count() > 1 {
            self.resolve(archive)
        } else {
            self.staging_dir().join(p)
        }
    }

    /// Release id a `current` target refers to, if it points into `releases/`.
    #[must_use]
    pub fn release_id_of(&self, target: &Path) -> Option<String> {
        let target = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.root.join(target)
        };
        if target.parent()? != self.releases_dir() {
            return None;
        }
        target.file_name()?.to_str().map(str::to_owned)
    }
}
