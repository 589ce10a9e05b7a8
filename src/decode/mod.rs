//! Image decoding and resizing.
//!
//! One module per source format plus the shared resize/type helpers:
//! `jpeg`, `raw_thumbnail`, `raw_full`, `resize`, `types`.

mod jpeg;
mod raw_full;
mod raw_thumbnail;
mod resize;
mod types;

pub use jpeg::{decode_jpeg, decode_jpeg_no_orientation, get_orientation, read_exif_metadata};
pub use raw_full::decode_raw_full;
pub use raw_thumbnail::{decode_raw_thumbnail, extract_raw_thumbnail, get_raw_camera_info, is_raw_file};
pub use resize::{generate_thumbnail, resize, resize_to_fit};
pub use types::{DecodedImage, FilterType, ImageMetadata, Orientation};
