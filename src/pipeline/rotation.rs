//! Rotation stage.
//!
//! The output canvas is the smallest axis-aligned rectangle containing
//! the rotated source; pixels outside the source map to transparent
//! black. Resampling is bilinear, with an alpha channel carried through
//! so out-of-bounds samples land as transparent rather than an opaque
//! fill color.

use image::{Rgba, RgbaImage};

/// Rotates `image` by `degrees` (the combined `angle + straighten` value
/// from `Rotation`), expanding the canvas to the bounding box
/// of the rotated source. A `degrees` of exactly `0.0` returns the
/// source unchanged (the crop-free invariant is handled one level up, in
/// `pipeline::mod`, which skips this stage entirely rather than calling
/// it with a zero angle).
pub fn rotate(image: &RgbaImage, degrees: f32) -> RgbaImage {
    if degrees == 0.0 {
        return image.clone();
    }

    let (w, h) = (image.width() as f32, image.height() as f32);
    let radians = degrees.to_radians();
    let (sin, cos) = radians.sin_cos();

    let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)];
    let center = (w / 2.0, h / 2.0);
    let mut min_x = f32::MAX;
    let mut max_x = f32::MIN;
    let mut min_y = f32::MAX;
    let mut max_y = f32::MIN;
    for (x, y) in corners {
        let (rx, ry) = rotate_point(x - center.0, y - center.1, sin, cos);
        min_x = min_x.min(rx);
        max_x = max_x.max(rx);
        min_y = min_y.min(ry);
        max_y = max_y.max(ry);
    }

    let new_w = (max_x - min_x).ceil().max(1.0) as u32;
    let new_h = (max_y - min_y).ceil().max(1.0) as u32;
    let new_center = (new_w as f32 / 2.0, new_h as f32 / 2.0);

    let mut out = RgbaImage::new(new_w, new_h);
    for oy in 0..new_h {
        for ox in 0..new_w {
            let rel_x = ox as f32 + 0.5 - new_center.0;
            let rel_y = oy as f32 + 0.5 - new_center.1;
            // Inverse rotation: map the output-canvas point back into
            // source-image space.
            let (src_rel_x, src_rel_y) = rotate_point(rel_x, rel_y, -sin, cos);
            let sx = src_rel_x + center.0;
            let sy = src_rel_y + center.1;
            out.put_pixel(ox, oy, sample_bilinear(image, sx, sy));
        }
    }
    out
}

fn rotate_point(x: f32, y: f32, sin: f32, cos: f32) -> (f32, f32) {
    (x * cos - y * sin, x * sin + y * cos)
}

/// Bilinear sample at continuous source coordinates `(x, y)` (pixel
/// centers at `i + 0.5`). Returns transparent black when the sample
/// point falls entirely outside the source.
fn sample_bilinear(image: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let (w, h) = (image.width() as f32, image.height() as f32);
    if x < -0.5 || y < -0.5 || x > w - 0.5 || y > h - 0.5 {
        return Rgba([0, 0, 0, 0]);
    }

    let px = x - 0.5;
    let py = y - 0.5;
    let x0 = px.floor();
    let y0 = py.floor();
    let fx = px - x0;
    let fy = py - y0;

    let get = |ix: i64, iy: i64| -> Rgba<u8> {
        if ix < 0 || iy < 0 || ix as f32 >= w || iy as f32 >= h {
            Rgba([0, 0, 0, 0])
        } else {
            *image.get_pixel(ix as u32, iy as u32)
        }
    };

    let x0i = x0 as i64;
    let y0i = y0 as i64;
    let p00 = get(x0i, y0i);
    let p10 = get(x0i + 1, y0i);
    let p01 = get(x0i, y0i + 1);
    let p11 = get(x0i + 1, y0i + 1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_degrees_is_identity() {
        let mut img = RgbaImage::new(4, 3);
        for (i, px) in img.pixels_mut().enumerate() {
            *px = Rgba([i as u8, 0, 0, 255]);
        }
        let out = rotate(&img, 0.0);
        assert_eq!(out, img);
    }

    #[test]
    fn rotate_180_flips_dimensions_back() {
        let img = RgbaImage::from_pixel(10, 20, Rgba([100, 150, 200, 255]));
        let out = rotate(&img, 180.0);
        assert_eq!(out.width(), 10);
        assert_eq!(out.height(), 20);
        // A flat-color image rotated 180 degrees stays (almost) the same
        // flat color in its interior.
        let center = out.get_pixel(5, 10);
        assert!((center[0] as i32 - 100).abs() <= 2);
    }

    #[test]
    fn rotate_90_expands_to_swapped_dims() {
        let img = RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 255]));
        let out = rotate(&img, 90.0);
        assert_eq!(out.width(), 10);
        assert_eq!(out.height(), 20);
    }

    #[test]
    fn corners_outside_source_are_transparent() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        let out = rotate(&img, 45.0);
        // The bounding-box corner of a 45-degree rotated square is pure
        // padding.
        let corner = out.get_pixel(0, 0);
        assert_eq!(corner[3], 0);
    }
}
