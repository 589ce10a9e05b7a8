//! Engine tuning knobs.
//!
//! Collects the operational numbers that would otherwise be bare
//! constants scattered across modules: LRU capacities, the interactive
//! debounce window, the staging-buffer pool floor, the GPU three-strikes
//! threshold. `Default` gives the documented defaults and a host can
//! override them from the CLI (`main.rs`, via `clap`) without touching
//! engine code.

use std::time::Duration;

use crate::cache::CacheConfig;
use crate::executor::STAGING_POOL_MIN;

#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    /// How long interactive dragging must be quiet before a full-quality
    /// render is issued (~300 ms).
    pub debounce: Duration,
    /// Minimum staging buffers kept mappable for GPU readback.
    pub staging_pool_min: usize,
    /// Default JPEG export quality, 1-100.
    pub export_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache: CacheConfig::default(),
            debounce: Duration::from_millis(300),
            staging_pool_min: STAGING_POOL_MIN,
            export_quality: 90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.cache.thumbnail_capacity, 150);
        assert_eq!(config.cache.preview_capacity, 20);
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.staging_pool_min, 3);
        assert_eq!(config.export_quality, 90);
    }
}
