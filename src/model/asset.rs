//! The `Asset` record.

use serde::{Deserialize, Serialize};

/// Immutable per-file record. Created on scan; `flag` and the cache-status
/// fields are mutated by services; destroyed only when the catalog
/// forgets the folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub path: String,
    pub filename: String,
    pub byte_size: u64,
    /// Capture timestamp, seconds since the Unix epoch. From EXIF when
    /// available, else file mtime.
    pub captured_at: Option<i64>,
    pub format: AssetFormat,
    pub flag: Flag,
    pub thumbnail_status: CacheStatus,
    pub preview_status: CacheStatus,
    /// Advisory, EXIF-derived. Absent for JPEGs without EXIF or RAWs whose
    /// embedded preview lacked a readable tag.
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
}

impl Asset {
    pub fn new(id: impl Into<String>, path: impl Into<String>, format: AssetFormat) -> Self {
        let path = path.into();
        let filename = std::path::Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        Asset {
            id: id.into(),
            path,
            filename,
            byte_size: 0,
            captured_at: None,
            format,
            flag: Flag::None,
            thumbnail_status: CacheStatus::Pending,
            preview_status: CacheStatus::Pending,
            camera_make: None,
            camera_model: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    Jpeg,
    Raw,
}

impl AssetFormat {
    /// Classifies a file by extension. Returns `None` for unsupported
    /// extensions.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(AssetFormat::Jpeg),
            "arw" => Some(AssetFormat::Raw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Pending,
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    None,
    Pick,
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_classification() {
        assert_eq!(AssetFormat::from_extension("JPG"), Some(AssetFormat::Jpeg));
        assert_eq!(AssetFormat::from_extension("jpeg"), Some(AssetFormat::Jpeg));
        assert_eq!(AssetFormat::from_extension("ARW"), Some(AssetFormat::Raw));
        assert_eq!(AssetFormat::from_extension("png"), None);
        assert_eq!(AssetFormat::from_extension("cr2"), None);
    }

    #[test]
    fn new_asset_has_defaults() {
        let asset = Asset::new("a1", "/tmp/photos/IMG_0001.ARW", AssetFormat::Raw);
        assert_eq!(asset.filename, "IMG_0001.ARW");
        assert_eq!(asset.flag, Flag::None);
        assert_eq!(asset.thumbnail_status, CacheStatus::Pending);
        assert_eq!(asset.preview_status, CacheStatus::Pending);
    }
}
