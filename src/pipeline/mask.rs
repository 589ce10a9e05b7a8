//! Masked local adjustments.
//!
//! Each enabled mask contributes a per-pixel weight `w in [0,1]`. The
//! final pixel is folded through every enabled mask in order:
//! `out = G; for each enabled mask i: out = lerp(out, M_i, w_i(p))`,
//! where `M_i` re-runs the adjustment step (not the tone curve) with the
//! mask's own local adjustment values on the running `out`.

use crate::model::{Mask, MaskGeometry};

use super::adjustments;

/// Per-pixel weight for one mask at normalized image coordinates
/// `(x, y)` in `[0,1]^2`.
pub fn weight(mask: &Mask, x: f32, y: f32) -> f32 {
    let raw = match mask.geometry {
        MaskGeometry::Linear { x0, y0, x1, y1 } => {
            apply_linear_feather(linear_weight(x0, y0, x1, y1, x, y), mask.feather)
        }
        MaskGeometry::Radial {
            cx,
            cy,
            rx,
            ry,
            rotation,
        } => radial_weight(cx, cy, rx, ry, rotation, x, y, mask.feather),
    };

    if mask.invert {
        1.0 - raw
    } else {
        raw
    }
}

/// A band perpendicular to the line from `(x0,y0)` to `(x1,y1)`: value 0
/// on the `(x0,y0)` side, 1 on the `(x1,y1)` side, linear between.
fn linear_weight(x0: f32, y0: f32, x1: f32, y1: f32, x: f32, y: f32) -> f32 {
    let dx = x1 - x0;
    let dy = y1 - y0;
    let len_sq = dx * dx + dy * dy;
    if len_sq < f32::EPSILON {
        return 0.0;
    }
    let t = ((x - x0) * dx + (y - y0) * dy) / len_sq;
    t.clamp(0.0, 1.0)
}

/// Re-shapes the linear ramp's transition via a smoothstep, with
/// `feather` widening the eased region at each end of the `[0,1]` band.
fn apply_linear_feather(t: f32, feather: f32) -> f32 {
    let feather = feather.clamp(0.0, 1.0);
    if feather <= 0.0 {
        return t;
    }
    // feather=1 eases across the whole band; feather=0 keeps a linear
    // ramp (handled above).
    let lo = 0.0;
    let hi = 1.0;
    let eased = adjustments::smoothstep(lo, hi, t);
    t + (eased - t) * feather
}

/// `1` inside a core ellipse, `0` outside an outer ellipse, smoothstep
/// transition through the feather annulus.
fn radial_weight(cx: f32, cy: f32, rx: f32, ry: f32, rotation: f32, x: f32, y: f32, feather: f32) -> f32 {
    if rx <= 0.0 || ry <= 0.0 {
        return 0.0;
    }
    let (sin, cos) = rotation.sin_cos();
    let dx = x - cx;
    let dy = y - cy;
    let rdx = dx * cos + dy * sin;
    let rdy = -dx * sin + dy * cos;

    // Normalized elliptical radius: 0 at center, 1 at the outer ellipse
    // boundary.
    let outer = ((rdx / rx).powi(2) + (rdy / ry).powi(2)).sqrt();
    let feather = feather.clamp(0.0, 1.0);
    let core = (1.0 - feather).max(0.0);

    if outer <= core {
        1.0
    } else if outer >= 1.0 {
        0.0
    } else {
        // 1 at the core boundary, 0 at the outer boundary.
        1.0 - adjustments::smoothstep(core, 1.0, outer)
    }
}

/// Folds one mask's contribution into the running pixel value, per
/// pixel. `rgb` is the running `out` value; `xy` is the pixel's
/// normalized image coordinate.
pub fn apply_mask(rgb: [f32; 3], mask: &Mask, x: f32, y: f32) -> [f32; 3] {
    let w = weight(mask, x, y);
    if w <= 0.0 {
        return rgb;
    }
    let adjusted = adjustments::apply(rgb, &mask.adjustments);
    lerp3(rgb, adjusted, w)
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Adjustments, MaskKind};

    fn linear_mask(exposure: f32) -> Mask {
        let mut adj = Adjustments::default();
        adj.exposure = exposure;
        Mask {
            id: "m1".into(),
            kind: MaskKind::Linear,
            enabled: true,
            geometry: MaskGeometry::Linear {
                x0: 0.0,
                y0: 0.0,
                x1: 1.0,
                y1: 0.0,
            },
            feather: 0.0,
            invert: false,
            adjustments: adj,
        }
    }

    #[test]
    fn linear_weight_ramps_left_to_right() {
        let mask = linear_mask(1.0);
        assert_eq!(weight(&mask, 0.0, 0.5), 0.0);
        assert_eq!(weight(&mask, 1.0, 0.5), 1.0);
        assert!((weight(&mask, 0.5, 0.5) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn linear_mask_blends_at_left_and_right_edges() {
        let mask = linear_mask(1.0);
        let base = [0.5, 0.5, 0.5];
        let left = apply_mask(base, &mask, 0.0, 0.5);
        let right = apply_mask(base, &mask, 1.0, 0.5);
        assert_eq!(left, base);
        assert!(right[0] > base[0]);
    }

    #[test]
    fn zero_weight_is_passthrough() {
        let mask = linear_mask(2.5);
        let base = [0.1, 0.2, 0.3];
        assert_eq!(apply_mask(base, &mask, 0.0, 0.0), base);
    }

    #[test]
    fn radial_mask_is_full_weight_at_center() {
        let mask = Mask {
            id: "r1".into(),
            kind: MaskKind::Radial,
            enabled: true,
            geometry: MaskGeometry::Radial {
                cx: 0.5,
                cy: 0.5,
                rx: 0.3,
                ry: 0.3,
                rotation: 0.0,
            },
            feather: 0.2,
            invert: false,
            adjustments: Adjustments::default(),
        };
        assert_eq!(weight(&mask, 0.5, 0.5), 1.0);
        assert_eq!(weight(&mask, 0.5, 0.9), 0.0);
    }

    #[test]
    fn radial_invert_flips_weight() {
        let mut mask = Mask {
            id: "r2".into(),
            kind: MaskKind::Radial,
            enabled: true,
            geometry: MaskGeometry::Radial {
                cx: 0.5,
                cy: 0.5,
                rx: 0.3,
                ry: 0.3,
                rotation: 0.0,
            },
            feather: 0.0,
            invert: false,
            adjustments: Adjustments::default(),
        };
        let center_weight = weight(&mask, 0.5, 0.5);
        mask.invert = true;
        assert_eq!(weight(&mask, 0.5, 0.5), 1.0 - center_weight);
    }
}
