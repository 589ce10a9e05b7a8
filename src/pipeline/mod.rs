//! Pipeline ops.
//!
//! A render applies, in fixed order: rotation, crop, (per-pixel
//! adjustments fused with the tone curve), masked local adjustments,
//! then histogram/clipping analysis. Each stage is skipped when its
//! corresponding flag is absent from `enabled_stages`, and the
//! rotation+crop stage as a whole is skipped when the `CropTransform` is
//! the identity (the crop-free invariant).
//!
//! The whole function is pure in `(source, edit_state, enabled_stages)` —
//! no field here reads or writes anything outside its arguments.

mod adjustments;
mod crop;
mod histogram;
mod mask;
mod rotation;
mod tone_curve;

pub use histogram::{ClipFlags, ClippingMap, Histogram};
pub use tone_curve::ToneCurveLut;

use image::{Rgba, RgbaImage};

use crate::decode::DecodedImage;
use crate::model::EditState;

/// Which optional stages a render should run, matching a render
/// request's shape. Rotation/crop is controlled separately by
/// `rotation`/`crop` so a caller can, for instance, render a cropped
/// but unadjusted preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledStages {
    pub rotation: bool,
    pub adjustments: bool,
    pub tone_curve: bool,
    pub masks: bool,
    pub histogram: bool,
    pub clipping: bool,
}

impl EnabledStages {
    pub const ALL: EnabledStages = EnabledStages {
        rotation: true,
        adjustments: true,
        tone_curve: true,
        masks: true,
        histogram: true,
        clipping: true,
    };

    /// Draft-quality renders skip histogram and clipping.
    pub const DRAFT: EnabledStages = EnabledStages {
        rotation: true,
        adjustments: true,
        tone_curve: true,
        masks: true,
        histogram: false,
        clipping: false,
    };
}

/// The output of one pipeline render: the final RGBA canvas plus
/// whichever analysis stages were enabled.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub image: RgbaImage,
    pub histogram: Option<Histogram>,
    pub clipping: Option<ClippingMap>,
}

/// Runs the CPU reference pipeline over an already-decoded, already
/// resized source image. The GPU executor (`executor::gpu`) implements
/// the same stage order against the same `EditState`; this function is
/// also the ground truth the GPU path is checked against.
pub fn render(source: &DecodedImage, edit_state: &EditState, enabled: EnabledStages) -> RenderOutput {
    let base = to_rgba(source);

    let transform = &edit_state.crop_transform;
    let mut canvas = if enabled.rotation && !transform.rotation.is_identity() {
        rotation::rotate(&base, transform.rotation.combined_degrees())
    } else {
        base
    };

    if let Some(rect) = transform.crop {
        if !rect.is_full_frame() {
            canvas = crop::crop(&canvas, &rect);
        }
    }

    let lut = if enabled.tone_curve && !edit_state.tone_curve.is_identity() {
        Some(tone_curve::ToneCurveLut::build(&edit_state.tone_curve))
    } else {
        None
    };

    let run_adjustments = enabled.adjustments && !edit_state.adjustments.is_identity();
    let run_masks = enabled.masks && edit_state.masks.iter().any(|m| m.enabled);

    if run_adjustments || lut.is_some() || run_masks {
        let (width, height) = (canvas.width(), canvas.height());
        for (x, y, px) in canvas.enumerate_pixels_mut() {
            if px[3] == 0 {
                // Padding pixel introduced by rotation; adjustments and
                // masks never touch it.
                continue;
            }

            let mut rgb = [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ];

            if run_adjustments {
                rgb = adjustments::apply(rgb, &edit_state.adjustments);
            }

            let mut out = [
                (rgb[0] * 255.0).round().clamp(0.0, 255.0) as u8,
                (rgb[1] * 255.0).round().clamp(0.0, 255.0) as u8,
                (rgb[2] * 255.0).round().clamp(0.0, 255.0) as u8,
            ];

            if let Some(lut) = &lut {
                out = [
                    lut.apply_channel(out[0]),
                    lut.apply_channel(out[1]),
                    lut.apply_channel(out[2]),
                ];
            }

            if run_masks {
                let mut masked = [
                    out[0] as f32 / 255.0,
                    out[1] as f32 / 255.0,
                    out[2] as f32 / 255.0,
                ];
                let nx = x as f32 / width.max(1) as f32;
                let ny = y as f32 / height.max(1) as f32;
                for m in edit_state.masks.iter().filter(|m| m.enabled) {
                    masked = mask::apply_mask(masked, m, nx, ny);
                }
                out = [
                    (masked[0] * 255.0).round().clamp(0.0, 255.0) as u8,
                    (masked[1] * 255.0).round().clamp(0.0, 255.0) as u8,
                    (masked[2] * 255.0).round().clamp(0.0, 255.0) as u8,
                ];
            }

            *px = Rgba([out[0], out[1], out[2], px[3]]);
        }
    }

    let histogram = if enabled.histogram {
        Some(Histogram::compute(&canvas))
    } else {
        None
    };
    let clipping = if enabled.clipping {
        Some(ClippingMap::compute(&canvas))
    } else {
        None
    };

    RenderOutput {
        image: canvas,
        histogram,
        clipping,
    }
}

fn to_rgba(source: &DecodedImage) -> RgbaImage {
    let mut out = RgbaImage::new(source.width, source.height);
    for (i, px) in out.pixels_mut().enumerate() {
        let base = i * 3;
        *px = Rgba([
            source.pixels[base],
            source.pixels[base + 1],
            source.pixels[base + 2],
            255,
        ]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Adjustments, CropTransform, Rect, Rotation};

    fn flat_source(width: u32, height: u32, value: u8) -> DecodedImage {
        DecodedImage::new(width, height, vec![value; (width * height * 3) as usize])
    }

    #[test]
    fn default_edit_state_is_identity_within_tolerance() {
        let source = flat_source(8, 8, 128);
        let out = render(&source, &EditState::default(), EnabledStages::ALL);
        for px in out.image.pixels() {
            assert!((px[0] as i32 - 128).abs() <= 1);
        }
    }

    #[test]
    fn crop_free_invariant_skips_rotation_and_crop() {
        let source = flat_source(4, 4, 50);
        let mut state = EditState::default();
        state.adjustments.exposure = 1.0;
        let out = render(&source, &state, EnabledStages::ALL);
        assert_eq!(out.image.width(), 4);
        assert_eq!(out.image.height(), 4);
    }

    #[test]
    fn rotation_then_crop_dimensions_match_crop_rect() {
        let source = flat_source(10, 10, 200);
        let mut state = EditState::default();
        state.crop_transform = CropTransform {
            crop: Some(Rect {
                left: 0.0,
                top: 0.0,
                width: 0.5,
                height: 1.0,
            }),
            rotation: Rotation::default(),
        };
        let out = render(&source, &state, EnabledStages::ALL);
        assert_eq!(out.image.width(), 5);
    }

    #[test]
    fn disabling_adjustments_stage_leaves_pixels_untouched() {
        let source = flat_source(4, 4, 10);
        let mut state = EditState::default();
        state.adjustments.exposure = 5.0;
        let mut enabled = EnabledStages::ALL;
        enabled.adjustments = false;
        let out = render(&source, &state, enabled);
        assert_eq!(out.image.get_pixel(0, 0)[0], 10);
    }

    #[test]
    fn draft_quality_skips_histogram_and_clipping() {
        let source = flat_source(4, 4, 10);
        let out = render(&source, &EditState::default(), EnabledStages::DRAFT);
        assert!(out.histogram.is_none());
        assert!(out.clipping.is_none());
    }

    #[test]
    fn two_successive_renders_are_byte_identical() {
        let source = flat_source(6, 5, 77);
        let mut state = EditState::default();
        state.adjustments = Adjustments {
            temperature: 10.0,
            tint: -5.0,
            exposure: 0.5,
            contrast: 20.0,
            highlights: -10.0,
            shadows: 15.0,
            whites: 5.0,
            blacks: -5.0,
            vibrance: 20.0,
            saturation: 10.0,
        };
        let a = render(&source, &state, EnabledStages::ALL);
        let b = render(&source, &state, EnabledStages::ALL);
        assert_eq!(a.image, b.image);
        assert_eq!(a.histogram, b.histogram);
    }
}
