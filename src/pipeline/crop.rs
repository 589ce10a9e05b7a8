//! Crop stage.
//!
//! Applied to the rotated canvas in normalized coordinates of that
//! canvas. A no-op when the rect is numerically within 0.001 of the full
//! frame ([`Rect::is_full_frame`]).

use image::RgbaImage;

use crate::model::Rect;

/// Crops `image` to `rect`, given in normalized `[0,1]` coordinates of
/// `image`'s own dimensions. Bounds are rounded to the nearest pixel and
/// clamped so the crop never reads outside the source canvas.
pub fn crop(image: &RgbaImage, rect: &Rect) -> RgbaImage {
    let (w, h) = (image.width(), image.height());
    let x0 = (rect.left * w as f32).round().clamp(0.0, w as f32) as u32;
    let y0 = (rect.top * h as f32).round().clamp(0.0, h as f32) as u32;
    let x1 = ((rect.left + rect.width) * w as f32)
        .round()
        .clamp(0.0, w as f32) as u32;
    let y1 = ((rect.top + rect.height) * h as f32)
        .round()
        .clamp(0.0, h as f32) as u32;

    let cw = x1.saturating_sub(x0).max(1).min(w - x0.min(w.saturating_sub(1)));
    let ch = y1.saturating_sub(y0).max(1).min(h - y0.min(h.saturating_sub(1)));

    image::imageops::crop_imm(image, x0, y0, cw, ch).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn crops_right_half() {
        // 200x100 image; pixel (x,y) equal to x in the red channel so we
        // can check the crop offset lands where expected.
        let mut img = RgbaImage::new(200, 100);
        for y in 0..100 {
            for x in 0..200 {
                img.put_pixel(x, y, Rgba([(x % 256) as u8, 0, 0, 255]));
            }
        }
        let rect = Rect {
            left: 0.5,
            top: 0.0,
            width: 0.5,
            height: 1.0,
        };
        let out = crop(&img, &rect);
        assert_eq!(out.width(), 100);
        assert_eq!(out.height(), 100);
        assert_eq!(out.get_pixel(0, 0)[0], 100);
        assert_eq!(out.get_pixel(50, 0)[0], 150);
    }

    #[test]
    fn full_frame_rect_is_noop_sized() {
        let img = RgbaImage::from_pixel(64, 48, Rgba([1, 2, 3, 255]));
        let out = crop(&img, &Rect::FULL);
        assert_eq!((out.width(), out.height()), (64, 48));
    }
}
