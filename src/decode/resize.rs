//! Deterministic resize.

use crate::error::{EngineError, Result};

use super::types::{DecodedImage, FilterType};

/// Resizes to exact dimensions, ignoring aspect ratio.
pub fn resize(image: &DecodedImage, width: u32, height: u32, filter: FilterType) -> Result<DecodedImage> {
    if width == 0 || height == 0 {
        return Err(EngineError::Internal(
            "resize target dimensions must be non-zero".into(),
        ));
    }
    let src = image
        .to_image()
        .ok_or_else(|| EngineError::Internal("source buffer size mismatch".into()))?;
    let resized = image::imageops::resize(&src, width, height, filter.to_image_filter());
    Ok(DecodedImage::from_image(resized))
}

/// Resizes so the longest edge is at most `max_edge`, preserving aspect
/// ratio. Never upscales: if both dimensions are already `<= max_edge`,
/// returns a clone of the source unchanged.
pub fn resize_to_fit(image: &DecodedImage, max_edge: u32, filter: FilterType) -> Result<DecodedImage> {
    if max_edge == 0 {
        return Err(EngineError::Internal("max_edge must be non-zero".into()));
    }
    let (w, h) = (image.width, image.height);
    if w <= max_edge && h <= max_edge {
        return Ok(image.clone());
    }
    let (target_w, target_h) = fit_dimensions(w, h, max_edge);
    resize(image, target_w, target_h, filter)
}

/// Generates a thumbnail for grid display: aspect-preserving fit within a
/// `size x size` box, bilinear filtering.
pub fn generate_thumbnail(image: &DecodedImage, size: u32) -> Result<DecodedImage> {
    resize_to_fit(image, size, FilterType::Bilinear)
}

fn fit_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width >= height {
        let h = ((height as u64 * max_edge as u64) / width as u64).max(1) as u32;
        (max_edge, h)
    } else {
        let w = ((width as u64 * max_edge as u64) / height as u64).max(1) as u32;
        (w, max_edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(w: u32, h: u32) -> DecodedImage {
        DecodedImage::new(w, h, vec![128u8; w as usize * h as usize * 3])
    }

    #[test]
    fn resize_to_exact_dims() {
        let img = sample(100, 50);
        let out = resize(&img, 50, 25, FilterType::Bilinear).unwrap();
        assert_eq!((out.width, out.height), (50, 25));
    }

    #[test]
    fn resize_zero_dims_errors() {
        let img = sample(100, 50);
        assert!(resize(&img, 0, 25, FilterType::Bilinear).is_err());
    }

    #[test]
    fn resize_to_fit_landscape() {
        let img = sample(200, 100);
        let out = resize_to_fit(&img, 100, FilterType::Bilinear).unwrap();
        assert_eq!((out.width, out.height), (100, 50));
    }

    #[test]
    fn resize_to_fit_portrait() {
        let img = sample(100, 200);
        let out = resize_to_fit(&img, 100, FilterType::Bilinear).unwrap();
        assert_eq!((out.width, out.height), (50, 100));
    }

    #[test]
    fn resize_to_fit_no_upscale() {
        let img = sample(50, 30);
        let out = resize_to_fit(&img, 100, FilterType::Bilinear).unwrap();
        assert_eq!((out.width, out.height), (50, 30));
    }

    #[test]
    fn generate_thumbnail_caps_long_edge() {
        let img = sample(400, 300);
        let out = generate_thumbnail(&img, 100).unwrap();
        assert_eq!((out.width, out.height), (100, 75));
    }
}
