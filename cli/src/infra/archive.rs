//! Release archive infrastructure — gzip tarballs via `tar` and `flate2`.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::application::ports::Archiver;
use crate::domain::{IgnoreSet, StoreError};

/// Production `Archiver`: blocking tar work runs on the blocking pool.
pub struct TarGzArchiver;

impl Archiver for TarGzArchiver {
    async fn build(&self, source: &Path, ignore: &IgnoreSet, dest: &Path) -> Result<u64> {
        let source = source.to_path_buf();
        let ignore = ignore.clone();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || build_archive(&source, &ignore, &dest))
            .await
            .context("spawn_blocking for archive build")?
    }

    async fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || extract_archive(&archive, &dest))
            .await
            .context("spawn_blocking for archive extraction")?
    }
}

/// Write `source` (minus ignored entries) to a gzip tarball at `dest`.
///
/// Entry names are relative to `source`; symlinks are stored as symlinks.
/// Returns the number of entries written.
///
/// # Errors
///
/// Returns an error if the tree cannot be read or the archive cannot be written.
pub fn build_archive(source: &Path, ignore: &IgnoreSet, dest: &Path) -> Result<u64> {
    let file = File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);

    let mut count = 0;
    append_tree(&mut builder, source, Path::new(""), ignore, &mut count)?;

    builder
        .into_inner()
        .context("finishing tar stream")?
        .finish()
        .context("finishing gzip stream")?;
    Ok(count)
}

fn append_tree<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    root: &Path,
    rel: &Path,
    ignore: &IgnoreSet,
    count: &mut u64,
) -> Result<()> {
    let dir = root.join(rel);
    let mut entries = std::fs::read_dir(&dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("reading directory {}", dir.display()))?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let rel_path = rel.join(entry.file_name());
        let file_type = entry
            .file_type()
            .with_context(|| format!("inspecting {}", entry.path().display()))?;
        let is_dir = file_type.is_dir();
        if ignore.is_ignored(&rel_path, is_dir) {
            tracing::trace!(path = %rel_path.display(), "ignored");
            continue;
        }

        if is_dir {
            builder
                .append_dir(&rel_path, entry.path())
                .with_context(|| format!("adding {}", rel_path.display()))?;
            *count += 1;
            append_tree(builder, root, &rel_path, ignore, count)?;
        } else {
            builder
                .append_path_with_name(entry.path(), &rel_path)
                .with_context(|| format!("adding {}", rel_path.display()))?;
            *count += 1;
        }
    }
    Ok(())
}

/// Unpack a gzip tarball into `dest`.
///
/// # Errors
///
/// Returns [`StoreError::UnsafeEntry`] for absolute or `..` entries, or an
/// error if the archive is unreadable.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).with_context(|| format!("opening {}", archive.display()))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(true);

    for entry in tar.entries().context("reading archive")? {
        let mut entry = entry.context("reading archive entry")?;
        let path: PathBuf = entry.path().context("reading entry path")?.into_owned();
        if !is_contained(&path) {
            return Err(StoreError::UnsafeEntry(path.display().to_string()).into());
        }
        let unpacked = entry
            .unpack_in(dest)
            .with_context(|| format!("unpacking {}", path.display()))?;
        if !unpacked {
            return Err(StoreError::UnsafeEntry(path.display().to_string()).into());
        }
    }
    Ok(())
}

/// `true` if `path` stays below the directory it is joined to.
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
