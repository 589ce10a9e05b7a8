//! Persistent (on-disk) tier of the thumbnail/preview cache.
//!
//! Files are keyed by `asset-id + size + format-version` in a dedicated
//! directory, written atomically (write-to-temp, rename) so a crash
//! mid-write can never leave a corrupt cache entry to be read back.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

use super::CacheKey;

/// Bumped whenever the on-disk encoding changes incompatibly; stale
/// entries from an older version are simply cache misses.
pub const FORMAT_VERSION: u32 = 1;

pub struct PersistentCache {
    dir: PathBuf,
}

impl PersistentCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| EngineError::Internal(format!(
            "failed to create persistent cache directory {}: {e}",
            dir.display()
        )))?;
        Ok(PersistentCache { dir })
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir
            .join(format!("{}_{}_{}.bin", key.asset_id, key.size, FORMAT_VERSION))
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        fs::read(self.path_for(key)).ok()
    }

    /// Writes `bytes` for `key` atomically: to a temp file in the same
    /// directory, then renamed into place. A rename within one
    /// filesystem is atomic on every platform this crate targets.
    pub fn put(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        let final_path = self.path_for(key);
        let tmp_path = self.dir.join(format!(
            "{}_{}_{}.tmp-{}",
            key.asset_id,
            key.size,
            FORMAT_VERSION,
            std::process::id()
        ));
        fs::write(&tmp_path, bytes).map_err(|e| {
            EngineError::Internal(format!("failed to write {}: {e}", tmp_path.display()))
        })?;
        fs::rename(&tmp_path, &final_path).map_err(|e| {
            EngineError::Internal(format!(
                "failed to commit cache entry {}: {e}",
                final_path.display()
            ))
        })?;
        Ok(())
    }

    pub fn remove(&self, key: &CacheKey) {
        let _ = fs::remove_file(self.path_for(key));
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
