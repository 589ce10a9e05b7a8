//! Backend Executor.
//!
//! Two backends — GPU (behind the `gpu` Cargo feature) and CPU — with
//! identical observable output. The CPU backend is always compiled in
//! and is the fallback target of the three-strikes breaker below; it
//! also doubles as the reference implementation the GPU path is checked
//! against.

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::decode::DecodedImage;
use crate::error::{EngineError, Result};
use crate::model::EditState;
use crate::pipeline::{EnabledStages, RenderOutput};

/// Which backend actually produced a render, reported back to the
/// caller in a render response per spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Gpu,
    Cpu,
}

/// Render quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Target resolution scale <= 0.5; histogram, clipping, and tone
    /// curve LUT rebuild (when unchanged) are skipped.
    Draft,
    Full,
}

impl Quality {
    pub fn enabled_stages(self) -> EnabledStages {
        match self {
            Quality::Draft => EnabledStages::DRAFT,
            Quality::Full => EnabledStages::ALL,
        }
    }

    /// Upper bound on the resolution scale a draft render may request;
    /// `full` has no cap.
    pub fn max_resolution_scale(self) -> f32 {
        match self {
            Quality::Draft => 0.5,
            Quality::Full => 1.0,
        }
    }
}

/// A plain `Arc<AtomicBool>` cancellation flag, checked before each
/// suspension point and each pipeline stage.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

const GPU_FAILURE_THRESHOLD: u32 = 3;

/// Tracks consecutive GPU failures for backend selection:
/// prefer GPU while under the threshold; after the threshold trips,
/// remain on CPU until the process restarts or [`GpuBreaker::reset`] is
/// called explicitly.
#[derive(Debug, Default)]
pub struct GpuBreaker {
    consecutive_failures: AtomicU32,
}

impl GpuBreaker {
    pub fn new() -> Self {
        GpuBreaker::default()
    }

    pub fn is_tripped(&self) -> bool {
        self.consecutive_failures.load(Ordering::SeqCst) >= GPU_FAILURE_THRESHOLD
    }

    pub fn record_failure(&self) {
        let n = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(consecutive_failures = n, "GPU backend failure recorded");
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }
}

/// A generic free-list pool keyed by an arbitrary resource key (width,
/// height, format for `TexturePool`; byte length for `BufferPool`/
/// `StagingBufferPool`). Resources are handed back to the pool on
/// `Drop` of the guard returned by `acquire`.
#[derive(Debug, Default)]
pub struct ResourcePool<K, T> {
    free: std::sync::Mutex<Vec<(K, T)>>,
}

impl<K: PartialEq, T> ResourcePool<K, T> {
    pub fn new() -> Self {
        ResourcePool {
            free: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Takes a matching free resource, if one exists.
    pub fn take(&self, key: &K) -> Option<T> {
        let mut free = self.free.lock().expect("resource pool mutex poisoned");
        let pos = free.iter().position(|(k, _)| k == key)?;
        Some(free.remove(pos).1)
    }

    /// Returns a resource to the pool under `key`.
    pub fn give_back(&self, key: K, resource: T) {
        let mut free = self.free.lock().expect("resource pool mutex poisoned");
        free.push((key, resource));
    }

    pub fn len(&self) -> usize {
        self.free.lock().expect("resource pool mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Minimum staging buffers kept available for asynchronous GPU readback.
pub const STAGING_POOL_MIN: usize = 3;

/// Owns backend-selection state and resource pools across renders. One
/// `Executor` lives for the process lifetime inside `worker::Worker`.
pub struct Executor {
    breaker: GpuBreaker,
    #[cfg(feature = "gpu")]
    gpu: Option<gpu::GpuContext>,
}

impl Executor {
    /// Attempts to initialize a GPU context (feature `gpu` only); falls
    /// back to CPU-only if no adapter is available. Never fails: the CPU
    /// path is always available.
    pub fn new() -> Self {
        #[cfg(feature = "gpu")]
        let gpu = match gpu::GpuContext::new() {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                warn!(error = %e, "no GPU adapter available; running CPU-only");
                None
            }
        };

        Executor {
            breaker: GpuBreaker::new(),
            #[cfg(feature = "gpu")]
            gpu,
        }
    }

    pub fn reset_breaker(&self) {
        self.breaker.reset();
    }

    /// Renders `source` under `edit_state` at `quality`, preferring GPU
    /// and falling back to CPU on any GPU failure. The
    /// fallback happens within this single render call; the next render
    /// re-attempts GPU unless the breaker has tripped.
    pub fn render(
        &self,
        source: &DecodedImage,
        edit_state: &EditState,
        quality: Quality,
        cancellation: &CancellationToken,
    ) -> Result<(RenderOutput, Backend)> {
        cancellation.check()?;

        #[cfg(feature = "gpu")]
        if let Some(gpu) = &self.gpu {
            if !self.breaker.is_tripped() {
                match gpu::render(gpu, source, edit_state, quality, cancellation) {
                    Ok(output) => {
                        self.breaker.record_success();
                        return Ok((output, Backend::Gpu));
                    }
                    Err(err) => {
                        if err.counts_as_gpu_failure() {
                            self.breaker.record_failure();
                            warn!(error = %err, "GPU render failed, falling back to CPU for this render");
                        } else {
                            return Err(err);
                        }
                    }
                }
            } else {
                debug!("GPU breaker tripped; using CPU backend");
            }
        }

        cpu::render(source, edit_state, quality, cancellation).map(|o| (o, Backend::Cpu))
    }
}

impl Default for Executor {
    fn default() -> Self {
        Executor::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_trips_after_three_failures() {
        let breaker = GpuBreaker::new();
        assert!(!breaker.is_tripped());
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_tripped());
        breaker.record_failure();
        assert!(breaker.is_tripped());
        breaker.reset();
        assert!(!breaker.is_tripped());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = GpuBreaker::new();
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_tripped());
    }

    #[test]
    fn cancellation_token_short_circuits() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(matches!(token.check(), Err(EngineError::Cancelled)));
    }

    #[test]
    fn executor_renders_via_whichever_backend_is_available() {
        let executor = Executor::new();
        let source = DecodedImage::new(4, 4, vec![10u8; 4 * 4 * 3]);
        let (out, _backend) = executor
            .render(&source, &EditState::default(), Quality::Full, &CancellationToken::new())
            .unwrap();
        assert_eq!(out.image.width(), 4);
    }
}
