//! Directory scanning.
//!
//! Recursively enumerates a directory, identifies supported files by
//! extension, and yields batches of 50 newly discovered assets. Walks
//! with `walkdir`, skipping hidden directories, behind a
//! `DirectoryHandle` trait so the host environment's filesystem
//! permission model stays outside this crate.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{EngineError, Result};
use crate::executor::CancellationToken;
use crate::model::{Asset, AssetFormat};

use super::permissions::{PermissionMode, PermissionStatus};

pub const SCAN_BATCH_SIZE: usize = 50;

/// The only point of coupling to the host environment. A real host
/// backs this with native filesystem APIs gated by its own
/// permission prompts. `write`/`query_permission`/`request_permission`
/// default to the permissive, always-available behavior a headless
/// (non-browser) host exhibits; a sandboxed host overrides them.
pub trait DirectoryHandle {
    /// Lists every regular file path under the handle's root,
    /// recursively, skipping hidden directories (entries whose name
    /// starts with `.`).
    fn list(&self) -> Result<Vec<PathBuf>>;

    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Atomic write of `bytes` to `path`.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    fn query_permission(&self, _mode: PermissionMode) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn request_permission(&self, mode: PermissionMode) -> PermissionStatus {
        self.query_permission(mode)
    }
}

/// A `DirectoryHandle` backed by `std::fs`/`walkdir`.
pub struct LocalDirectoryHandle {
    root: PathBuf,
}

impl LocalDirectoryHandle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalDirectoryHandle { root: root.into() }
    }
}

impl DirectoryHandle for LocalDirectoryHandle {
    fn list(&self) -> Result<Vec<PathBuf>> {
        let entries = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                !e.file_name()
                    .to_str()
                    .map(|s| s.starts_with('.'))
                    .unwrap_or(false)
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        Ok(entries)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => EngineError::PermissionDenied {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::NotFound => {
                EngineError::NotFound(path.display().to_string())
            }
            _ => EngineError::Internal(e.to_string()),
        })
    }

    /// Atomic write-to-temp-then-rename, the same shape as
    /// `cache::persistent::PersistentCache::put`.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension(format!(
            "tmp-{}",
            path.extension().and_then(|e| e.to_str()).unwrap_or("")
        ));
        std::fs::write(&tmp, bytes).map_err(|e| EngineError::Internal(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok(())
    }
}

/// An in-memory `DirectoryHandle` test double: lets the scanner be
/// unit-tested without touching a real filesystem or triggering host
/// permission prompts.
#[derive(Debug, Default)]
pub struct MemoryDirectoryHandle {
    files: std::collections::HashMap<PathBuf, Vec<u8>>,
}

impl MemoryDirectoryHandle {
    pub fn new() -> Self {
        MemoryDirectoryHandle::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }
}

impl DirectoryHandle for MemoryDirectoryHandle {
    fn list(&self) -> Result<Vec<PathBuf>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(path.display().to_string()))
    }

    fn write(&self, _path: &Path, _bytes: &[u8]) -> Result<()> {
        Err(EngineError::Internal(
            "MemoryDirectoryHandle is read-only; insert fixtures via `insert`".into(),
        ))
    }
}

fn is_supported(path: &Path) -> Option<AssetFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(AssetFormat::from_extension)
}

/// Scans `handle`, yielding batches of up to `SCAN_BATCH_SIZE` newly
/// discovered assets via `on_batch`. Checks `cancellation` between
/// batches.
pub fn scan(
    handle: &dyn DirectoryHandle,
    cancellation: &CancellationToken,
    mut on_batch: impl FnMut(Vec<Asset>),
) -> Result<usize> {
    let paths = handle.list()?;
    let mut total = 0;
    let mut batch = Vec::with_capacity(SCAN_BATCH_SIZE);

    for path in paths {
        cancellation.check()?;
        let Some(format) = is_supported(&path) else {
            continue;
        };
        let id = path.to_string_lossy().into_owned();
        batch.push(Asset::new(id, path, format));

        if batch.len() == SCAN_BATCH_SIZE {
            total += batch.len();
            on_batch(std::mem::take(&mut batch));
            cancellation.check()?;
        }
    }

    if !batch.is_empty() {
        total += batch.len();
        on_batch(batch);
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_supported_extension() {
        let mut handle = MemoryDirectoryHandle::new();
        handle.insert("/a/photo.jpg", b"".to_vec());
        handle.insert("/a/raw.arw", b"".to_vec());
        handle.insert("/a/notes.txt", b"".to_vec());

        let mut seen = Vec::new();
        let total = scan(&handle, &CancellationToken::new(), |batch| {
            seen.extend(batch);
        })
        .unwrap();

        assert_eq!(total, 2);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn batches_at_fifty() {
        let mut handle = MemoryDirectoryHandle::new();
        for i in 0..120 {
            handle.insert(format!("/a/img{i}.jpg"), b"".to_vec());
        }
        let mut batch_sizes = Vec::new();
        scan(&handle, &CancellationToken::new(), |batch| {
            batch_sizes.push(batch.len());
        })
        .unwrap();
        assert_eq!(batch_sizes, vec![50, 50, 20]);
    }

    #[test]
    fn cancellation_stops_the_scan() {
        let mut handle = MemoryDirectoryHandle::new();
        for i in 0..10 {
            handle.insert(format!("/a/img{i}.jpg"), b"".to_vec());
        }
        let token = CancellationToken::new();
        token.cancel();
        let result = scan(&handle, &token, |_| {});
        assert!(result.is_err());
    }
}
