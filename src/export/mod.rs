//! Export: filename templating, resize presets, collision policy, and
//! JPEG encoding.
//!
//! Export reuses the same pipeline as an interactive render at full
//! resolution and encodes JPEG, then resizes to a long-edge preset and
//! writes through the `DirectoryHandle` seam with collision-safe naming.

pub mod template;

pub use template::{render as render_filename, TemplateContext, DEFAULT_TEMPLATE};

use image::{imageops::FilterType as ImageFilterType, RgbImage, RgbaImage};

use crate::catalog::DirectoryHandle;
use crate::error::{EngineError, Result};

/// Export long-edge resize presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePreset {
    Original,
    Edge2048,
    Edge3840,
    Edge5120,
}

impl ResizePreset {
    /// The target long-edge size in pixels, or `None` for `Original`
    /// (no resize).
    pub fn long_edge(self) -> Option<u32> {
        match self {
            ResizePreset::Original => None,
            ResizePreset::Edge2048 => Some(2048),
            ResizePreset::Edge3840 => Some(3840),
            ResizePreset::Edge5120 => Some(5120),
        }
    }
}

/// JPEG export quality, clamped to the documented 1-100 range,
/// defaulting to 90.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportQuality(u8);

impl ExportQuality {
    pub fn new(quality: u8) -> Self {
        ExportQuality(quality.clamp(1, 100))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for ExportQuality {
    fn default() -> Self {
        ExportQuality(90)
    }
}

/// Converts the pipeline's RGBA render output into an opaque RGB buffer
/// ready for JPEG encoding. Padding pixels (alpha 0, introduced by
/// rotation) map to transparent black in the render and composite onto
/// black here, since JPEG has no alpha channel.
pub fn flatten_to_rgb(image: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        *dst = image::Rgb([src[0], src[1], src[2]]);
    }
    out
}

/// Resizes `image` to fit `preset`'s long edge, aspect-preserving, never
/// upscaling (the same no-upscale rule as `decode::resize_to_fit`).
/// `Original` is a no-op.
pub fn apply_preset(image: &RgbImage, preset: ResizePreset) -> RgbImage {
    let Some(max_edge) = preset.long_edge() else {
        return image.clone();
    };
    let (w, h) = (image.width(), image.height());
    if w.max(h) <= max_edge {
        return image.clone();
    }
    let scale = max_edge as f32 / w.max(h) as f32;
    let (new_w, new_h) = (
        ((w as f32 * scale).round() as u32).max(1),
        ((h as f32 * scale).round() as u32).max(1),
    );
    image::imageops::resize(image, new_w, new_h, ImageFilterType::Lanczos3)
}

pub fn encode_jpeg(image: &RgbImage, quality: ExportQuality) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality.get());
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| EngineError::Internal(format!("JPEG encode failed: {e}")))?;
    Ok(bytes)
}

/// Appends `_1`, `_2`, ... before the extension until `exists` reports no
/// collision.
pub fn resolve_collision(stem: &str, ext: &str, exists: impl Fn(&str) -> bool) -> String {
    let candidate = format!("{stem}.{ext}");
    if !exists(&candidate) {
        return candidate;
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{stem}_{n}.{ext}");
        if !exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Full export of one already-rendered image: flatten, resize to
/// `preset`, encode at `quality`, pick a collision-free name under
/// `filename_stem`, and write through `handle`.
pub fn export(
    handle: &dyn DirectoryHandle,
    dest_dir: &std::path::Path,
    filename_stem: &str,
    image: &RgbaImage,
    preset: ResizePreset,
    quality: ExportQuality,
    exists: impl Fn(&str) -> bool,
) -> Result<std::path::PathBuf> {
    let rgb = flatten_to_rgb(image);
    let resized = apply_preset(&rgb, preset);
    let bytes = encode_jpeg(&resized, quality)?;
    let filename = resolve_collision(filename_stem, "jpg", exists);
    let path = dest_dir.join(&filename);
    handle.write(&path, &bytes)?;
    Ok(path)
}
