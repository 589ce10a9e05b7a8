//! Shared decode types.

/// A decoded image: RGB8 pixels, EXIF orientation already baked in.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major, 3 bytes per pixel (R, G, B).
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 3);
        DecodedImage {
            width,
            height,
            pixels,
        }
    }

    pub fn to_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    pub fn from_image(img: image::RgbImage) -> Self {
        let width = img.width();
        let height = img.height();
        DecodedImage {
            width,
            height,
            pixels: img.into_raw(),
        }
    }
}

/// Resize algorithm selector. The numeric discriminants follow the
/// `filter_from_u8` convention: 0=Nearest, 1=Bilinear, 2=Lanczos3,
/// anything else falls back to Bilinear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Nearest,
    Bilinear,
    Lanczos3,
}

impl FilterType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => FilterType::Nearest,
            2 => FilterType::Lanczos3,
            _ => FilterType::Bilinear,
        }
    }

    pub(crate) fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// The eight EXIF orientation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Identity,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90Cw,
    Transverse,
    Rotate270Cw,
}

impl Orientation {
    pub fn from_exif_value(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90Cw,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270Cw,
            _ => Orientation::Identity,
        }
    }

    pub fn apply(self, img: image::DynamicImage) -> image::DynamicImage {
        match self {
            Orientation::Identity => img,
            Orientation::FlipHorizontal => img.fliph(),
            Orientation::Rotate180 => img.rotate180(),
            Orientation::FlipVertical => img.flipv(),
            Orientation::Transpose => img.rotate90().fliph(),
            Orientation::Rotate90Cw => img.rotate90(),
            Orientation::Transverse => img.rotate270().fliph(),
            Orientation::Rotate270Cw => img.rotate270(),
        }
    }
}

/// EXIF-derived metadata surfaced opportunistically by the decoder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMetadata {
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub captured_at: Option<i64>,
    pub orientation: Orientation,
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::Identity
    }
}
