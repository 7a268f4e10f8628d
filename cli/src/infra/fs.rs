//! Filesystem infrastructure — implements `LocalFs` and `FileHasher`.

use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};

use crate::domain::StoreError;
use crate::domain::release::hex_encode;

/// Production filesystem implementation of the `LocalFs` and `FileHasher` ports.
pub struct LocalFs;

/// Removes the deploy lock file when dropped.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "could not release deploy lock");
        }
    }
}

impl crate::application::ports::FileHasher for LocalFs {
    fn sha1_file(&self, path: &Path) -> Result<String> {
        sha1_file(path)
    }
}

impl crate::application::ports::LocalFs for LocalFs {
    type Lock = LockGuard;

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("creating directory {}", path.display()))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        match std::fs::remove_dir_all(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                Err(e).with_context(|| format!("removing directory {}", path.display()))
            }
            _ => Ok(()),
        }
    }

    fn is_empty_dir(&self, path: &Path) -> Result<bool> {
        let mut entries = std::fs::read_dir(path)
            .with_context(|| format!("reading directory {}", path.display()))?;
        Ok(entries.next().is_none())
    }

    fn read_link(&self, path: &Path) -> Result<Option<PathBuf>> {
        match std::fs::symlink_metadata(path) {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("inspecting {}", path.display())),
            Ok(meta) if meta.file_type().is_symlink() => std::fs::read_link(path)
                .map(Some)
                .with_context(|| format!("reading link {}", path.display())),
            Ok(_) => Ok(None),
        }
    }

    fn replace_symlink(&self, target: &Path, link: &Path, temp: &Path) -> Result<()> {
        crate::application::ports::LocalFs::remove_file(self, temp)?;
        make_symlink(target, temp)
            .with_context(|| format!("creating link {} -> {}", temp.display(), target.display()))?;
        if let Err(e) = std::fs::rename(temp, link) {
            let _ = std::fs::remove_file(temp);
            return Err(e).with_context(|| format!("renaming {} over {}", temp.display(), link.display()));
        }
        tracing::debug!(link = %link.display(), target = %target.display(), "link replaced");
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                Err(e).with_context(|| format!("removing file {}", path.display()))
            }
            _ => Ok(()),
        }
    }

    fn read_optional(&self, path: &Path) -> Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading file {}", path.display())),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        std::fs::write(path, contents).with_context(|| format!("writing file {}", path.display()))
    }

    fn acquire_lock(&self, path: &Path, owner: &str) -> Result<LockGuard> {
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::Locked(path.display().to_string()).into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("creating lock {}", path.display()));
            }
        };
        let guard = LockGuard {
            path: path.to_path_buf(),
        };
        writeln!(file, "{owner}").with_context(|| format!("writing lock {}", path.display()))?;
        Ok(guard)
    }
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn make_symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        ErrorKind::Unsupported,
        "release activation needs Unix symlinks",
    ))
}

/// Compute the SHA-1 hex digest of a file.
///
/// Reads the file in 64 KB chunks to avoid loading large files into memory.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn sha1_file(path: &Path) -> Result<String> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; 65536];
    loop {
        let n = file.read(&mut buf).context("reading file")?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}
