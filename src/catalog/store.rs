//! Embedded metadata store.
//!
//! Assets, flags, and edit state live in a single local JSON document,
//! keyed by asset id, avoiding a database dependency for what is a small
//! amount of structured state. Writes are batched: callers mutate the
//! in-memory `Store` freely and call [`Store::flush`] once per logical
//! operation (e.g. once per scan batch, once per edit commit) rather
//! than on every field write. Persistence is atomic, the same
//! write-to-temp-then-rename shape as
//! `cache::persistent::PersistentCache`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::{Asset, EditState};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    assets: HashMap<String, Asset>,
    edit_states: HashMap<String, EditState>,
}

/// Restores from disk on open; holds the full document in memory and
/// writes it back out on `flush`.
pub struct Store {
    path: PathBuf,
    doc: Document,
    dirty: bool,
}

impl Store {
    /// Opens (or creates) the store file at `path`. On reopen, restores
    /// every asset/edit-state previously persisted.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| EngineError::Internal(format!("corrupt catalog store: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(e) => return Err(EngineError::Internal(e.to_string())),
        };
        Ok(Store {
            path,
            doc,
            dirty: false,
        })
    }

    pub fn get_asset(&self, id: &str) -> Option<&Asset> {
        self.doc.assets.get(id)
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.doc.assets.values()
    }

    /// Inserts or replaces an asset record. Does not implicitly persist
    /// (writes are batched); call [`Store::flush`] once a batch is
    /// complete.
    pub fn put_asset(&mut self, asset: Asset) {
        self.doc.assets.insert(asset.id.clone(), asset);
        self.dirty = true;
    }

    pub fn put_assets(&mut self, assets: impl IntoIterator<Item = Asset>) {
        for asset in assets {
            self.doc.assets.insert(asset.id.clone(), asset);
        }
        self.dirty = true;
    }

    /// Mutates an asset's flag in place. No-op if the asset is unknown.
    pub fn set_flag(&mut self, id: &str, flag: crate::model::Flag) {
        if let Some(asset) = self.doc.assets.get_mut(id) {
            asset.flag = flag;
            self.dirty = true;
        }
    }

    pub fn get_edit_state(&self, asset_id: &str) -> EditState {
        self.doc
            .edit_states
            .get(asset_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn put_edit_state(&mut self, asset_id: impl Into<String>, state: EditState) {
        self.doc.edit_states.insert(asset_id.into(), state);
        self.dirty = true;
    }

    pub fn forget(&mut self, asset_id: &str) {
        self.doc.assets.remove(asset_id);
        self.doc.edit_states.remove(asset_id);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persists the in-memory document if dirty. Atomic: serialized to a
    /// temp file beside `path`, then renamed into place.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(&self.doc)
            .map_err(|e| EngineError::Internal(format!("failed to serialize catalog store: {e}")))?;
        let tmp = self.path.with_extension(format!(
            "tmp-{}",
            std::process::id()
        ));
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::Internal(e.to_string()))?;
        }
        fs::write(&tmp, &bytes).map_err(|e| EngineError::Internal(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| EngineError::Internal(e.to_string()))?;
        self.dirty = false;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
