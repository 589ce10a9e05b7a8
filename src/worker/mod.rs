//! The message-passing integration seam.
//!
//! One dedicated worker thread owns the decoder, resize, pipeline
//! executor, and thumbnail/preview service. A UI (or, here, the
//! `literoom` CLI) communicates with it over `crossbeam_channel`,
//! correlating requests and responses by an opaque [`RequestId`],
//! generalized from a fixed job type to the engine's render/scan/
//! thumbnail commands.
//!
//! A render blocks on `Executor::render` (which itself awaits GPU queue
//! completion/staging map on the `gpu` feature), and thumbnail
//! generation blocks on the cache service's synchronous decode. Because
//! this crate's GPU path is driven with `pollster` rather than an async
//! runtime, "suspension" here means the worker thread blocks — there is
//! exactly one such thread, so no other request makes progress until it
//! returns.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use image::RgbaImage;
use tracing::{info, warn};

use crate::cache::{CacheConfig, CacheKey, CacheService, Priority};
use crate::catalog::{Catalog, DirectoryHandle};
use crate::config::Config;
use crate::decode;
use crate::error::{ErrorPayload, Result};
use crate::executor::{Backend, CancellationToken, Executor, Quality};
use crate::model::EditState;
use crate::pipeline::{ClippingMap, EnabledStages, Histogram};

/// Correlates a request with its eventual response. Requests from the
/// same caller are processed in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

#[derive(Debug, Default)]
pub struct RequestIdGen(AtomicU64);

impl RequestIdGen {
    pub fn next(&self) -> RequestId {
        RequestId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// The inputs needed to render one asset.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub asset_id: String,
    pub edit_state: EditState,
    pub quality: Quality,
    pub max_long_edge: u32,
    pub enabled_stages: EnabledStages,
    pub cancellation: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct RenderResponse {
    pub pixels: RgbaImage,
    pub width: u32,
    pub height: u32,
    pub histogram: Option<Histogram>,
    pub clipping_map: Option<ClippingMap>,
    pub backend: Backend,
    pub timing: Duration,
}

/// A generation request for the thumbnail/preview service.
#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    pub asset_id: String,
    pub size: u32,
    pub priority: Priority,
}

enum Command {
    Render(RenderRequest),
    Thumbnail(ThumbnailRequest),
    Scan {
        handle: Arc<dyn DirectoryHandle + Send + Sync>,
    },
    ResetGpuBreaker,
    Shutdown,
}

enum CommandResponse {
    Render(std::result::Result<RenderResponse, ErrorPayload>),
    Thumbnail(std::result::Result<Arc<decode::DecodedImage>, ErrorPayload>),
    Scan(std::result::Result<usize, ErrorPayload>),
    Ack,
}

struct Envelope<T> {
    id: RequestId,
    payload: T,
}

/// The worker thread handle. Dropping it (after sending `Shutdown`)
/// joins the thread.
pub struct Worker {
    ids: RequestIdGen,
    to_worker: Sender<Envelope<Command>>,
    from_worker: Receiver<Envelope<CommandResponse>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns the dedicated worker thread. `catalog_store_path` and
    /// `cache_dir` back the catalog's embedded store and the thumbnail
    /// service's persistent tier respectively.
    pub fn spawn(
        catalog_store_path: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        config: Config,
    ) -> Result<Self> {
        let (to_worker_tx, to_worker_rx) = crossbeam_channel::unbounded::<Envelope<Command>>();
        let (from_worker_tx, from_worker_rx) = crossbeam_channel::unbounded::<Envelope<CommandResponse>>();

        let catalog_store_path = catalog_store_path.into();
        let cache_dir = cache_dir.into();
        let cache_config = config.cache.clone();

        let catalog = Catalog::open(&catalog_store_path)?;
        let cache = CacheService::new(&cache_dir, cache_config)?;

        let handle = std::thread::Builder::new()
            .name("literoom-engine-worker".into())
            .spawn(move || run(to_worker_rx, from_worker_tx, catalog, cache))
            .map_err(|e| crate::error::EngineError::Internal(e.to_string()))?;

        Ok(Worker {
            ids: RequestIdGen::default(),
            to_worker: to_worker_tx,
            from_worker: from_worker_rx,
            handle: Some(handle),
        })
    }

    /// Submits a render and blocks until its response arrives. Ordering
    /// guarantee: requests from this caller are processed in
    /// the order submitted, since the worker drains one command at a
    /// time from a FIFO channel.
    pub fn render(&self, request: RenderRequest) -> Result<RenderResponse> {
        match self.roundtrip(Command::Render(request))? {
            CommandResponse::Render(r) => r.map_err(payload_to_error),
            _ => unreachable!("render command always yields a render response"),
        }
    }

    pub fn request_thumbnail(&self, request: ThumbnailRequest) -> Result<Arc<decode::DecodedImage>> {
        match self.roundtrip(Command::Thumbnail(request))? {
            CommandResponse::Thumbnail(r) => r.map_err(payload_to_error),
            _ => unreachable!("thumbnail command always yields a thumbnail response"),
        }
    }

    pub fn scan(&self, handle: Arc<dyn DirectoryHandle + Send + Sync>) -> Result<usize> {
        match self.roundtrip(Command::Scan { handle })? {
            CommandResponse::Scan(r) => r.map_err(payload_to_error),
            _ => unreachable!("scan command always yields a scan response"),
        }
    }

    pub fn reset_gpu_breaker(&self) -> Result<()> {
        self.roundtrip(Command::ResetGpuBreaker)?;
        Ok(())
    }

    fn roundtrip(&self, command: Command) -> Result<CommandResponse> {
        let id = self.ids.next();
        self.to_worker
            .send(Envelope { id, payload: command })
            .map_err(|_| crate::error::EngineError::Internal("worker thread is gone".into()))?;
        loop {
            let envelope = self
                .from_worker
                .recv()
                .map_err(|_| crate::error::EngineError::Internal("worker thread is gone".into()))?;
            if envelope.id == id {
                return Ok(envelope.payload);
            }
            // A response for a different in-flight request (shouldn't
            // happen with this synchronous single-caller API, but kept
            // for forward compatibility with concurrent callers).
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.to_worker.send(Envelope {
            id: self.ids.next(),
            payload: Command::Shutdown,
        });
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn payload_to_error(payload: ErrorPayload) -> crate::error::EngineError {
    crate::error::EngineError::Internal(format!("{:?}: {}", payload.kind, payload.message))
}

fn run(
    to_worker: Receiver<Envelope<Command>>,
    from_worker: Sender<Envelope<CommandResponse>>,
    mut catalog: Catalog,
    mut cache: CacheService,
) {
    let executor = Executor::new();

    for envelope in to_worker.iter() {
        let Envelope { id, payload } = envelope;
        let response = match payload {
            Command::Render(request) => {
                CommandResponse::Render(handle_render(&executor, &catalog, request))
            }
            Command::Thumbnail(request) => CommandResponse::Thumbnail(handle_thumbnail(
                &mut cache,
                &catalog,
                request,
            )),
            Command::Scan { handle } => {
                let cancellation = CancellationToken::new();
                CommandResponse::Scan(
                    catalog
                        .scan(handle.as_ref(), &cancellation)
                        .map_err(|e| ErrorPayload::from(&e)),
                )
            }
            Command::ResetGpuBreaker => {
                executor.reset_breaker();
                CommandResponse::Ack
            }
            Command::Shutdown => {
                info!("worker thread shutting down");
                break;
            }
        };
        if from_worker.send(Envelope { id, payload: response }).is_err() {
            warn!("worker response channel closed; stopping");
            break;
        }
    }
}

fn handle_render(
    executor: &Executor,
    catalog: &Catalog,
    request: RenderRequest,
) -> std::result::Result<RenderResponse, ErrorPayload> {
    let started = Instant::now();
    let asset = catalog
        .get_asset(&request.asset_id)
        .ok_or_else(|| ErrorPayload {
            kind: crate::error::ErrorKind::NotFound,
            message: format!("unknown asset: {}", request.asset_id),
        })?;

    let run = || -> Result<RenderResponse> {
        request.edit_state.validate()?;
        request.cancellation.check()?;

        let bytes = std::fs::read(&asset.path)
            .map_err(|_| crate::error::EngineError::NotFound(asset.path.clone()))?;
        let decoded = match asset.format {
            crate::model::AssetFormat::Jpeg => decode::decode_jpeg(&bytes)?,
            crate::model::AssetFormat::Raw => decode::decode_raw_thumbnail(&bytes)
                .or_else(|_| decode::decode_raw_full(&bytes))?,
        };
        request.cancellation.check()?;

        let scaled_long_edge =
            (request.max_long_edge as f32 * request.quality.max_resolution_scale()) as u32;
        let source = decode::resize_to_fit(&decoded, scaled_long_edge, decode::FilterType::Bilinear)?;

        let (output, backend) =
            executor.render(&source, &request.edit_state, request.quality, &request.cancellation)?;

        Ok(RenderResponse {
            width: output.image.width(),
            height: output.image.height(),
            pixels: output.image,
            histogram: output.histogram,
            clipping_map: output.clipping,
            backend,
            timing: started.elapsed(),
        })
    };

    run().map_err(|e| ErrorPayload::from(&e))
}

fn handle_thumbnail(
    cache: &mut CacheService,
    catalog: &Catalog,
    request: ThumbnailRequest,
) -> std::result::Result<Arc<decode::DecodedImage>, ErrorPayload> {
    let asset_id = request.asset_id.clone();
    let key = CacheKey {
        asset_id: asset_id.clone(),
        size: request.size,
    };

    let (tx, rx) = crossbeam_channel::bounded(1);
    cache.request(
        key.clone(),
        request.priority,
        Box::new(move |result| {
            let _ = tx.send(result);
        }),
    );

    let asset_path = catalog
        .get_asset(&asset_id)
        .map(|a| a.path.clone())
        .ok_or_else(|| ErrorPayload {
            kind: crate::error::ErrorKind::NotFound,
            message: format!("unknown asset: {asset_id}"),
        })?;
    let format = catalog
        .get_asset(&asset_id)
        .map(|a| a.format)
        .unwrap_or(crate::model::AssetFormat::Jpeg);

    cache.process_next(
        |_| format,
        |_| {
            std::fs::read(&asset_path).map_err(|_| crate::error::EngineError::NotFound(asset_path.clone()))
        },
    );

    rx.recv()
        .map_err(|_| ErrorPayload {
            kind: crate::error::ErrorKind::Internal,
            message: "thumbnail subscriber channel closed unexpectedly".into(),
        })?
        .map_err(|e| ErrorPayload::from(&e))
}

pub use crate::cache::CacheConfig as ThumbnailCacheConfig;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn jpeg_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([50, 60, 70]));
        let mut out = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90);
        encoder
            .encode(img.as_raw(), w, h, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn scan_then_render_round_trip() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("catalog.json");
        let cache_dir = dir.path().join("cache");
        let photos_dir = dir.path().join("photos");
        std::fs::create_dir_all(&photos_dir).unwrap();
        std::fs::write(photos_dir.join("photo.jpg"), jpeg_bytes(8, 8)).unwrap();

        let worker = Worker::spawn(&store_path, &cache_dir, Config::default()).unwrap();

        let local = crate::catalog::LocalDirectoryHandle::new(&photos_dir);
        let discovered = worker.scan(Arc::new(local)).unwrap();
        assert_eq!(discovered, 1);

        let asset_id = photos_dir.join("photo.jpg").to_string_lossy().into_owned();
        let response = worker
            .render(RenderRequest {
                asset_id,
                edit_state: EditState::default(),
                quality: Quality::Full,
                max_long_edge: 2048,
                enabled_stages: EnabledStages::ALL,
                cancellation: CancellationToken::new(),
            })
            .unwrap();
        assert_eq!((response.width, response.height), (8, 8));
        assert!(response.histogram.is_some());
    }
}
