//! Thumbnail/Preview Service.
//!
//! Two tiers — a bounded in-memory LRU and a persistent on-disk store —
//! fed by a priority min-heap of pending requests. See `service` for the
//! orchestration.

pub mod memory;
pub mod persistent;
pub mod queue;
pub mod service;

pub use queue::Priority;
pub use service::{CacheConfig, CacheKey, CacheService, Subscriber};
