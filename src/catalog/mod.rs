//! Catalog/Scan.
//!
//! Folder iteration (`scan`), the embedded metadata store (`store`:
//! assets, flags, edit state), and the `DirectoryHandle` host-coupling
//! seam plus its permission model (`permissions`).

pub mod permissions;
pub mod scan;
pub mod store;

pub use permissions::{PermissionMode, PermissionStatus};
pub use scan::{DirectoryHandle, LocalDirectoryHandle, MemoryDirectoryHandle, SCAN_BATCH_SIZE};
pub use store::Store;

use crate::error::Result;
use crate::executor::CancellationToken;
use crate::model::{Asset, Flag};

/// Owns the metadata store and drives a scan against a `DirectoryHandle`,
/// persisting newly discovered assets in batches.
pub struct Catalog {
    store: Store,
}

impl Catalog {
    pub fn open(store_path: impl Into<std::path::PathBuf>) -> Result<Self> {
        Ok(Catalog {
            store: Store::open(store_path)?,
        })
    }

    /// Scans `handle`, persisting each batch of newly discovered assets
    /// as it arrives. Returns the total number of assets discovered.
    pub fn scan(
        &mut self,
        handle: &dyn DirectoryHandle,
        cancellation: &CancellationToken,
    ) -> Result<usize> {
        let store = &mut self.store;
        let total = scan::scan(handle, cancellation, |batch| {
            store.put_assets(batch);
            // Batched persistence: flush once per discovery batch rather
            // than once per asset.
            let _ = store.flush();
        })?;
        self.store.flush()?;
        Ok(total)
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.store.assets()
    }

    pub fn get_asset(&self, id: &str) -> Option<&Asset> {
        self.store.get_asset(id)
    }

    pub fn set_flag(&mut self, id: &str, flag: Flag) -> Result<()> {
        self.store.set_flag(id, flag);
        self.store.flush()
    }

    pub fn edit_state(&self, asset_id: &str) -> crate::model::EditState {
        self.store.get_edit_state(asset_id)
    }

    pub fn set_edit_state(
        &mut self,
        asset_id: impl Into<String>,
        state: crate::model::EditState,
    ) -> Result<()> {
        state.validate()?;
        self.store.put_edit_state(asset_id, state);
        self.store.flush()
    }

    pub fn forget(&mut self, asset_id: &str) -> Result<()> {
        self.store.forget(asset_id);
        self.store.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssetFormat;
    use tempfile::tempdir;

    #[test]
    fn scan_persists_discovered_assets() {
        let dir = tempdir().unwrap();
        let mut catalog = Catalog::open(dir.path().join("store.json")).unwrap();
        let mut handle = MemoryDirectoryHandle::new();
        handle.insert("/a/one.jpg", b"".to_vec());
        handle.insert("/a/two.arw", b"".to_vec());

        let total = catalog
            .scan(&handle, &CancellationToken::new())
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(catalog.assets().count(), 2);
    }

    #[test]
    fn flag_and_edit_state_round_trip() {
        let dir = tempdir().unwrap();
        let mut catalog = Catalog::open(dir.path().join("store.json")).unwrap();
        let asset = Asset::new("a1", "/photos/a.jpg", AssetFormat::Jpeg);
        let id = asset.id.clone();
        catalog.store.put_asset(asset);
        catalog.store.flush().unwrap();

        catalog.set_flag(&id, Flag::Reject).unwrap();
        assert_eq!(catalog.get_asset(&id).unwrap().flag, Flag::Reject);

        let mut state = crate::model::EditState::default();
        state.adjustments.contrast = 10.0;
        catalog.set_edit_state(&id, state.clone()).unwrap();
        assert_eq!(catalog.edit_state(&id).adjustments.contrast, 10.0);
    }
}
