//! Histogram and clipping analysis.
//!
//! Computed once per render, after the mask stage, over the final RGBA
//! canvas. Padding pixels introduced by rotation (alpha `0`) are excluded
//! from both the histogram and the clipping map so they cannot skew
//! either. Per-channel 256-bin counts, kept exact (no sampling) since
//! render canvases are already bounded by the draft/full resolution caps
//! upstream.

use image::RgbaImage;

/// Per-channel 256-bin counts, plus a luminance-derived `L` channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    pub red: [u32; 256],
    pub green: [u32; 256],
    pub blue: [u32; 256],
    pub luminance: [u32; 256],
}

impl Default for Histogram {
    fn default() -> Self {
        Histogram {
            red: [0; 256],
            green: [0; 256],
            blue: [0; 256],
            luminance: [0; 256],
        }
    }
}

impl Histogram {
    pub fn compute(image: &RgbaImage) -> Self {
        let mut hist = Histogram::default();
        for px in image.pixels() {
            if px[3] == 0 {
                continue;
            }
            let (r, g, b) = (px[0], px[1], px[2]);
            hist.red[r as usize] += 1;
            hist.green[g as usize] += 1;
            hist.blue[b as usize] += 1;
            let l = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as usize;
            hist.luminance[l.min(255)] += 1;
        }
        hist
    }
}

bitflags::bitflags! {
    /// Per-pixel clipping flags: which channel(s) are pinned
    /// at the top or bottom of range.
    #[derive(Default)]
    pub struct ClipFlags: u8 {
        const RED_SHADOW   = 0b0000_0001;
        const RED_HIGHLIGHT  = 0b0000_0010;
        const GREEN_SHADOW   = 0b0000_0100;
        const GREEN_HIGHLIGHT = 0b0000_1000;
        const BLUE_SHADOW   = 0b0001_0000;
        const BLUE_HIGHLIGHT = 0b0010_0000;
    }
}

/// A dense per-pixel clipping map, same dimensions as the source canvas.
/// Padding pixels (alpha `0`) carry an empty flag set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClippingMap {
    pub width: u32,
    pub height: u32,
    flags: Vec<ClipFlags>,
}

const SHADOW_THRESHOLD: u8 = 0;
const HIGHLIGHT_THRESHOLD: u8 = 255;

impl ClippingMap {
    pub fn compute(image: &RgbaImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let mut flags = vec![ClipFlags::empty(); (width * height) as usize];
        for (i, px) in image.pixels().enumerate() {
            if px[3] == 0 {
                continue;
            }
            let mut f = ClipFlags::empty();
            if px[0] <= SHADOW_THRESHOLD {
                f |= ClipFlags::RED_SHADOW;
            }
            if px[0] >= HIGHLIGHT_THRESHOLD {
                f |= ClipFlags::RED_HIGHLIGHT;
            }
            if px[1] <= SHADOW_THRESHOLD {
                f |= ClipFlags::GREEN_SHADOW;
            }
            if px[1] >= HIGHLIGHT_THRESHOLD {
                f |= ClipFlags::GREEN_HIGHLIGHT;
            }
            if px[2] <= SHADOW_THRESHOLD {
                f |= ClipFlags::BLUE_SHADOW;
            }
            if px[2] >= HIGHLIGHT_THRESHOLD {
                f |= ClipFlags::BLUE_HIGHLIGHT;
            }
            flags[i] = f;
        }
        ClippingMap { width, height, flags }
    }

    pub fn at(&self, x: u32, y: u32) -> ClipFlags {
        self.flags[(y * self.width + x) as usize]
    }

    pub fn any_clipped_count(&self) -> usize {
        self.flags.iter().filter(|f| !f.is_empty()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn histogram_counts_opaque_pixels_only() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        img.put_pixel(1, 0, Rgba([99, 99, 99, 0]));
        let hist = Histogram::compute(&img);
        assert_eq!(hist.red[10], 1);
        assert_eq!(hist.red.iter().sum::<u32>(), 1);
        assert_eq!(hist.red[99], 0);
    }

    #[test]
    fn clipping_flags_pure_white_and_black() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let map = ClippingMap::compute(&img);
        assert!(map.at(0, 0).contains(ClipFlags::RED_HIGHLIGHT | ClipFlags::GREEN_HIGHLIGHT | ClipFlags::BLUE_HIGHLIGHT));
        assert!(map.at(1, 0).contains(ClipFlags::RED_SHADOW | ClipFlags::GREEN_SHADOW | ClipFlags::BLUE_SHADOW));
        assert_eq!(map.any_clipped_count(), 2);
    }

    #[test]
    fn padding_pixels_are_never_clipped() {
        let mut img = RgbaImage::new(1, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        let map = ClippingMap::compute(&img);
        assert!(map.at(0, 0).is_empty());
        assert_eq!(map.any_clipped_count(), 0);
    }

    #[test]
    fn midgray_pixel_has_no_clip_flags() {
        let mut img = RgbaImage::new(1, 1);
        img.put_pixel(0, 0, Rgba([128, 128, 128, 255]));
        let map = ClippingMap::compute(&img);
        assert!(map.at(0, 0).is_empty());
    }
}
