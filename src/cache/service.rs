//! Thumbnail/Preview service orchestration.
//!
//! Single-threaded consumer: pulls the highest-priority pending request,
//! checks the persistent cache, and otherwise decodes + resizes and
//! writes the persistent cache. Requests for the same `(asset, size)`
//! are coalesced by attaching the caller's subscriber to the in-flight
//! entry rather than starting a second generation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::decode::{self, DecodedImage, FilterType};
use crate::error::Result;
use crate::model::AssetFormat;

use super::memory::Lru;
use super::persistent::PersistentCache;
use super::queue::{Priority, PriorityQueue};

/// Identifies one cached render target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub asset_id: String,
    /// The requested long-edge size in pixels.
    pub size: u32,
}

/// Notified once a generation completes or fails. Boxed so the service
/// can hold heterogeneous subscribers without generics leaking into
/// `worker`.
pub type Subscriber = Box<dyn FnOnce(Result<Arc<DecodedImage>>) + Send>;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub thumbnail_capacity: usize,
    pub preview_capacity: usize,
    pub thumbnail_long_edge: u32,
    pub preview_long_edge: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            thumbnail_capacity: 150,
            preview_capacity: 20,
            thumbnail_long_edge: 512,
            preview_long_edge: 2560,
        }
    }
}

pub struct CacheService {
    config: CacheConfig,
    queue: PriorityQueue,
    thumbnails: Lru<CacheKey, Arc<DecodedImage>>,
    previews: Lru<CacheKey, Arc<DecodedImage>>,
    persistent: PersistentCache,
    in_flight: HashMap<CacheKey, Vec<Subscriber>>,
}

impl CacheService {
    pub fn new(persistent_dir: impl Into<std::path::PathBuf>, config: CacheConfig) -> Result<Self> {
        Ok(CacheService {
            thumbnails: Lru::new(config.thumbnail_capacity),
            previews: Lru::new(config.preview_capacity),
            persistent: PersistentCache::new(persistent_dir)?,
            config,
            queue: PriorityQueue::new(),
            in_flight: HashMap::new(),
        })
    }

    fn tier_mut(&mut self, key: &CacheKey) -> &mut Lru<CacheKey, Arc<DecodedImage>> {
        if key.size <= self.config.thumbnail_long_edge {
            &mut self.thumbnails
        } else {
            &mut self.previews
        }
    }

    /// Registers a request. Returns `true` if it was coalesced onto an
    /// already in-flight generation for the same key, `false` if it was
    /// queued as a new generation.
    pub fn request(&mut self, key: CacheKey, priority: Priority, subscriber: Subscriber) -> bool {
        if let Some(tier) = Some(self.tier_mut(&key)) {
            if let Some(cached) = tier.get(&key) {
                subscriber(Ok(cached.clone()));
                return true;
            }
        }

        if let Some(subs) = self.in_flight.get_mut(&key) {
            subs.push(subscriber);
            return true;
        }

        self.in_flight.insert(key.clone(), vec![subscriber]);
        self.queue.push(key, priority);
        false
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Pops the next request and runs it synchronously: persistent-cache
    /// lookup, else decode + resize + persistent-cache write. Notifies
    /// every coalesced subscriber.
    pub fn process_next(
        &mut self,
        asset_format: impl Fn(&str) -> AssetFormat,
        read_source: impl Fn(&str) -> Result<Vec<u8>>,
    ) -> Option<CacheKey> {
        let key = self.queue.pop()?;
        let result = self.generate(&key, asset_format(&key.asset_id), read_source);

        if let Ok(image) = &result {
            self.tier_mut(&key).put(key.clone(), image.clone(), |_, _| {
                debug!("evicted cache entry on insert over capacity");
            });
        }

        if let Some(subs) = self.in_flight.remove(&key) {
            for sub in subs {
                let cloned = match &result {
                    Ok(img) => Ok(img.clone()),
                    Err(e) => Err(clone_err(e)),
                };
                sub(cloned);
            }
        }
        Some(key)
    }

    fn generate(
        &self,
        key: &CacheKey,
        format: AssetFormat,
        read_source: impl Fn(&str) -> Result<Vec<u8>>,
    ) -> Result<Arc<DecodedImage>> {
        if let Some(bytes) = self.persistent.get(key) {
            if let Some(decoded) = jpeg_bytes_to_decoded(&bytes) {
                return Ok(Arc::new(decoded));
            }
        }

        let bytes = read_source(&key.asset_id)?;
        let decoded = match format {
            AssetFormat::Jpeg => decode::decode_jpeg(&bytes)?,
            AssetFormat::Raw => decode::decode_raw_thumbnail(&bytes)
                .or_else(|_| decode::decode_raw_full(&bytes))?,
        };
        let resized = decode::resize_to_fit(&decoded, key.size, FilterType::Bilinear)?;

        if let Some(encoded) = encode_jpeg(&resized) {
            let _ = self.persistent.put(key, &encoded);
        }

        Ok(Arc::new(resized))
    }
}

fn clone_err(err: &crate::error::EngineError) -> crate::error::EngineError {
    crate::error::EngineError::Internal(err.to_string())
}

fn jpeg_bytes_to_decoded(bytes: &[u8]) -> Option<DecodedImage> {
    decode::decode_jpeg_no_orientation(bytes).ok()
}

fn encode_jpeg(image: &DecodedImage) -> Option<Vec<u8>> {
    let rgb = image.to_image()?;
    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90);
    encoder
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
        .ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn jpeg_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([10, 20, 30]));
        let mut out = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90);
        encoder
            .encode(img.as_raw(), w, h, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn coalesces_duplicate_requests_for_same_key() {
        let dir = tempdir().unwrap();
        let mut service = CacheService::new(dir.path(), CacheConfig::default()).unwrap();
        let key = CacheKey {
            asset_id: "a1".into(),
            size: 512,
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let c1 = calls.clone();
        let c2 = calls.clone();
        let first = service.request(key.clone(), Priority::Visible, Box::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let second = service.request(key.clone(), Priority::Visible, Box::new(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(!first);
        assert!(second);
        assert_eq!(service.pending_count(), 1);

        let bytes = jpeg_bytes(40, 30);
        let results = Mutex::new(Vec::new());
        service.process_next(
            |_| AssetFormat::Jpeg,
            |_| Ok(bytes.clone()),
        );
        let _ = &results;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn second_request_after_completion_hits_memory_cache() {
        let dir = tempdir().unwrap();
        let mut service = CacheService::new(dir.path(), CacheConfig::default()).unwrap();
        let key = CacheKey {
            asset_id: "a2".into(),
            size: 512,
        };
        let bytes = jpeg_bytes(40, 30);
        service.request(key.clone(), Priority::Visible, Box::new(|_| {}));
        service.process_next(|_| AssetFormat::Jpeg, |_| Ok(bytes.clone()));

        let hit = Arc::new(AtomicUsize::new(0));
        let hit2 = hit.clone();
        let coalesced = service.request(
            key.clone(),
            Priority::Visible,
            Box::new(move |r| {
                if r.is_ok() {
                    hit2.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );
        assert!(coalesced);
        assert_eq!(hit.load(Ordering::SeqCst), 1);
        assert_eq!(service.pending_count(), 0);
    }
}
