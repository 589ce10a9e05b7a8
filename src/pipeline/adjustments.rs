//! Global/masked adjustments stage.
//!
//! The ten sliders are applied in a single fixed-order per-pixel pass —
//! no intermediate readback. Every slider at its default (zero / neutral)
//! value is an exact per-step no-op, so an all-default `Adjustments`
//! leaves pixels bit-identical to the input.
//!
//! Gating functions (`smoothstep`-masked highlights/shadows/whites/
//! blacks) follow the usual luminance/extreme-threshold masking shape.

use crate::model::Adjustments;

/// Applies all ten adjustments, in a single fixed order, to one
/// normalized `[0,1]` RGB triple. Alpha is untouched by this stage.
pub fn apply(rgb: [f32; 3], adj: &Adjustments) -> [f32; 3] {
    let mut c = rgb;

    if adj.temperature != 0.0 || adj.tint != 0.0 {
        c = temperature_tint(c, adj.temperature, adj.tint);
    }
    if adj.exposure != 0.0 {
        c = exposure(c, adj.exposure);
    }
    if adj.contrast != 0.0 {
        c = contrast(c, adj.contrast);
    }
    if adj.highlights != 0.0 || adj.shadows != 0.0 {
        c = highlights_shadows(c, adj.highlights, adj.shadows);
    }
    if adj.whites != 0.0 || adj.blacks != 0.0 {
        c = whites_blacks(c, adj.whites, adj.blacks);
    }
    if adj.saturation != 0.0 {
        c = saturation(c, adj.saturation);
    }
    if adj.vibrance != 0.0 {
        c = vibrance(c, adj.vibrance);
    }

    [
        c[0].clamp(0.0, 1.0),
        c[1].clamp(0.0, 1.0),
        c[2].clamp(0.0, 1.0),
    ]
}

/// Matched cubic approximation to a Kelvin-style white-balance shift: a
/// cubic-odd easing (`t * |t|`) keeps the response smooth near zero while
/// still saturating toward the extremes, rather than a bare linear gain.
pub(crate) fn temperature_tint_gains(temperature: f32, tint: f32) -> [f32; 3] {
    let t = (temperature / 100.0).clamp(-1.0, 1.0);
    let shaped = t * t.abs();
    let ti = (tint / 100.0).clamp(-1.0, 1.0);

    // Temperature: negative cools (R down, B up); positive warms (R up, B down).
    // Tint: positive shifts toward magenta (R/B up, G down); negative toward green.
    let r_gain = 1.0 + 0.3 * shaped + 0.1 * ti;
    let g_gain = 1.0 - 0.2 * ti;
    let b_gain = 1.0 - 0.3 * shaped + 0.1 * ti;
    [r_gain, g_gain, b_gain]
}

fn temperature_tint(c: [f32; 3], temperature: f32, tint: f32) -> [f32; 3] {
    let gains = temperature_tint_gains(temperature, tint);
    [c[0] * gains[0], c[1] * gains[1], c[2] * gains[2]]
}

/// `2^stops` multiply applied directly in the sRGB-encoded domain (the
/// "well-known linear-in-sRGB approximation" spec §4.3 calls for on the
/// 8-bit fast path), not a linear-light round-trip: the GPU f32 path
/// applies the identical direct multiply, so the two backends agree to
/// well within a 1/255 tolerance.
fn exposure(c: [f32; 3], stops: f32) -> [f32; 3] {
    let factor = 2.0_f32.powf(stops);
    [c[0] * factor, c[1] * factor, c[2] * factor]
}

/// Pivot-around-0.5 affine; `factor` is monotonic in `contrast_value`.
fn contrast(c: [f32; 3], contrast_value: f32) -> [f32; 3] {
    let factor = 1.0 + contrast_value / 200.0;
    [
        (c[0] - 0.5) * factor + 0.5,
        (c[1] - 0.5) * factor + 0.5,
        (c[2] - 0.5) * factor + 0.5,
    ]
}

pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if (edge1 - edge0).abs() < f32::EPSILON {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn luminance(c: [f32; 3]) -> f32 {
    0.299 * c[0] + 0.587 * c[1] + 0.114 * c[2]
}

/// Luminance-gated nonlinear adjustment: a smooth mask of luminance > 0.5
/// (highlights) or < 0.5 (shadows), magnitude proportional to
/// `slider / 100`.
fn highlights_shadows(c: [f32; 3], highlights: f32, shadows: f32) -> [f32; 3] {
    let l = luminance(c);
    let highlight_mask = smoothstep(0.5, 1.0, l);
    let shadow_mask = 1.0 - smoothstep(0.0, 0.5, l);
    let delta = (highlights / 100.0) * 0.5 * highlight_mask + (shadows / 100.0) * 0.5 * shadow_mask;
    [c[0] + delta, c[1] + delta, c[2] + delta]
}

/// Extreme-gated adjustment: `max(R,G,B) > 0.9` for whites, `min(R,G,B) <
/// 0.1` for blacks.
fn whites_blacks(c: [f32; 3], whites: f32, blacks: f32) -> [f32; 3] {
    let max_c = c[0].max(c[1]).max(c[2]);
    let min_c = c[0].min(c[1]).min(c[2]);
    let whites_mask = smoothstep(0.9, 1.0, max_c);
    let blacks_mask = 1.0 - smoothstep(0.0, 0.1, min_c);
    let delta = (whites / 100.0) * 0.5 * whites_mask + (blacks / 100.0) * 0.5 * blacks_mask;
    [c[0] + delta, c[1] + delta, c[2] + delta]
}

fn rgb_to_hsv(c: [f32; 3]) -> (f32, f32, f32) {
    let (r, g, b) = (c[0], c[1], c[2]);
    let max_c = r.max(g).max(b);
    let min_c = r.min(g).min(b);
    let delta = max_c - min_c;

    let h = if delta.abs() < f32::EPSILON {
        0.0
    } else if max_c == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max_c == g {
        60.0 * (((b - r) / delta) + 2.0)
    } else {
        60.0 * (((r - g) / delta) + 4.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    let s = if max_c.abs() < f32::EPSILON { 0.0 } else { delta / max_c };
    (h, s, max_c)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let c = v * s;
    let h_prime = h / 60.0;
    let x = c * (1.0 - (h_prime % 2.0 - 1.0).abs());
    let (r1, g1, b1) = if h_prime < 1.0 {
        (c, x, 0.0)
    } else if h_prime < 2.0 {
        (x, c, 0.0)
    } else if h_prime < 3.0 {
        (0.0, c, x)
    } else if h_prime < 4.0 {
        (0.0, x, c)
    } else if h_prime < 5.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };
    let m = v - c;
    [r1 + m, g1 + m, b1 + m]
}

fn saturation(c: [f32; 3], saturation_value: f32) -> [f32; 3] {
    let (h, s, v) = rgb_to_hsv(c);
    let factor = (1.0 + saturation_value / 100.0).max(0.0);
    hsv_to_rgb(h, (s * factor).clamp(0.0, 1.0), v)
}

/// Saturation-protected boost: less effect where saturation is already
/// high, and dampened in the skin-tone hue band (~15°-45°).
fn vibrance(c: [f32; 3], vibrance_value: f32) -> [f32; 3] {
    let (h, s, v) = rgb_to_hsv(c);
    let skin_dampen = if (15.0..=45.0).contains(&h) { 0.5 } else { 1.0 };
    let boost = (vibrance_value / 100.0) * (1.0 - s) * skin_dampen * 0.5;
    hsv_to_rgb(h, (s + boost).clamp(0.0, 1.0), v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_adjustments_are_identity() {
        let adj = Adjustments::default();
        for c in [[0.0, 0.0, 0.0], [0.5, 0.5, 0.5], [1.0, 1.0, 1.0], [0.2, 0.8, 0.4]] {
            assert_eq!(apply(c, &adj), c);
        }
    }

    #[test]
    fn exposure_plus_one_stop_clips_midgray_to_white() {
        // S2: 128/255 gray at +1 stop doubles to 256/255, clamped to 255.
        let mut adj = Adjustments::default();
        adj.exposure = 1.0;
        let out = apply([128.0 / 255.0, 128.0 / 255.0, 128.0 / 255.0], &adj);
        assert_eq!(out, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn exposure_pushes_midgray_toward_white() {
        let mut adj = Adjustments::default();
        adj.exposure = 4.0;
        let out = apply([0.5, 0.5, 0.5], &adj);
        assert!(out[0] > 0.95);
    }

    #[test]
    fn contrast_zero_is_identity() {
        let adj = Adjustments::default();
        let out = apply([0.0, 1.0, 0.3], &adj);
        assert_eq!(out, [0.0, 1.0, 0.3]);
    }

    #[test]
    fn contrast_at_extremes_leaves_pivot_values_unchanged() {
        let mut adj = Adjustments::default();
        adj.contrast = 100.0;
        assert_eq!(apply([0.0, 0.0, 0.0], &adj), [0.0, 0.0, 0.0]);
        assert_eq!(apply([1.0, 1.0, 1.0], &adj), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn saturation_zero_out_grays_channel() {
        let mut adj = Adjustments::default();
        adj.saturation = -100.0;
        let out = apply([1.0, 0.0, 0.0], &adj);
        assert!((out[0] - out[1]).abs() < 1e-4);
        assert!((out[1] - out[2]).abs() < 1e-4);
    }

    #[test]
    fn smoothstep_endpoints() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
    }
}
