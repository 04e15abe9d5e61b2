//! # Blob I/O
//!
//! Offset-addressed file access behind the [`BlobStore`] trait. The storage
//! components never open files themselves; they go through this seam, which
//! keeps them testable against alternative backends and concentrates every
//! `std::fs` touch (and its error context) in one place.
//!
//! ## Contract
//!
//! - `read` zero-fills the destination buffer, then requires a full
//!   `buf.len()`-byte read at the offset; a short read is an error.
//! - `write` is a positional overwrite: it extends the file as needed and
//!   preserves all content outside the written range.
//! - `append` adds bytes at the current end of file.
//! - `create` creates the file (or truncates an existing one to empty).
//!
//! Every operation opens its own handle and releases it before returning,
//! on success and on error alike. Parent directories are created on demand
//! for write paths, so a table directory springs into existence on first
//! use.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::{Result, WrapErr};
use tracing::debug;

use crate::error::StorageError;

/// Offset-addressed blob storage consumed by the paged-storage core.
pub trait BlobStore {
    /// Fills `buf` from `path` starting at `offset`. The buffer is zeroed
    /// first; a read shorter than `buf.len()` fails.
    fn read(&self, path: &Path, buf: &mut [u8], offset: u64) -> Result<()>;

    /// Writes `buf` to `path` at `offset`, extending the file if needed and
    /// leaving bytes outside the written range intact.
    fn write(&self, path: &Path, buf: &[u8], offset: u64) -> Result<()>;

    /// Appends `buf` at the end of `path`.
    fn append(&self, path: &Path, buf: &[u8]) -> Result<()>;

    /// Returns true if `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// Creates `path` as an empty file, truncating any existing content.
    fn create(&self, path: &Path) -> Result<()>;

    /// Returns the current size of `path` in bytes.
    fn size(&self, path: &Path) -> Result<u64>;
}

/// Production [`BlobStore`] over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBlobStore;

impl FileBlobStore {
    pub fn new() -> Self {
        Self
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(StorageError::Io)
                .wrap_err_with(|| format!("failed to create directory '{}'", parent.display()))?;
        }
    }
    Ok(())
}

impl BlobStore for FileBlobStore {
    fn read(&self, path: &Path, buf: &mut [u8], offset: u64) -> Result<()> {
        debug!(path = %path.display(), offset, len = buf.len(), "blob read");
        buf.fill(0);

        let mut file = File::open(path)
            .map_err(StorageError::Io)
            .wrap_err_with(|| format!("failed to open '{}' for reading", path.display()))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(StorageError::Io)
            .wrap_err_with(|| format!("failed to seek to {} in '{}'", offset, path.display()))?;
        file.read_exact(buf)
            .map_err(StorageError::Io)
            .wrap_err_with(|| {
                format!(
                    "short read: wanted {} bytes at offset {} of '{}'",
                    buf.len(),
                    offset,
                    path.display()
                )
            })
    }

    fn write(&self, path: &Path, buf: &[u8], offset: u64) -> Result<()> {
        debug!(path = %path.display(), offset, len = buf.len(), "blob write");
        ensure_parent_dir(path)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(path)
            .map_err(StorageError::Io)
            .wrap_err_with(|| format!("failed to open '{}' for writing", path.display()))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(StorageError::Io)
            .wrap_err_with(|| format!("failed to seek to {} in '{}'", offset, path.display()))?;
        file.write_all(buf)
            .map_err(StorageError::Io)
            .wrap_err_with(|| {
                format!(
                    "failed to write {} bytes at offset {} of '{}'",
                    buf.len(),
                    offset,
                    path.display()
                )
            })
    }

    fn append(&self, path: &Path, buf: &[u8]) -> Result<()> {
        debug!(path = %path.display(), len = buf.len(), "blob append");
        ensure_parent_dir(path)?;

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(StorageError::Io)
            .wrap_err_with(|| format!("failed to open '{}' for appending", path.display()))?;
        file.write_all(buf)
            .map_err(StorageError::Io)
            .wrap_err_with(|| {
                format!(
                    "failed to append {} bytes to '{}'",
                    buf.len(),
                    path.display()
                )
            })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "blob create");
        ensure_parent_dir(path)?;

        File::create(path)
            .map_err(StorageError::Io)
            .wrap_err_with(|| format!("failed to create '{}'", path.display()))?;
        Ok(())
    }

    fn size(&self, path: &Path) -> Result<u64> {
        let meta = fs::metadata(path)
            .map_err(StorageError::Io)
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?;
        Ok(meta.len())
    }
}
