//! `literoom_core` — the Literoom edit engine.
//!
//! A non-destructive photo culling and editing core for Sony ARW RAW and
//! JPEG files: RAW/JPEG decoding with an embedded-preview fast path
//! (`decode`), deterministic resize (`decode::resize`), the per-pixel and
//! geometry pipeline (`pipeline`), a dual GPU/CPU backend executor
//! (`executor`), a priority-queued two-tier thumbnail/preview cache
//! (`cache`), folder scanning and durable catalog state (`catalog`),
//! export (`export`), and the worker-thread message-passing seam that
//! ties them together for a host UI (`worker`).

pub mod cache;
pub mod catalog;
pub mod config;
pub mod decode;
pub mod error;
pub mod executor;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod worker;

pub use config::Config;
pub use error::{EngineError, ErrorKind, ErrorPayload, Result};
