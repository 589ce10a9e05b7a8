//! JPEG decoding with EXIF orientation correction.

use std::io::Cursor;

use crate::error::{EngineError, Result};

use super::types::{DecodedImage, ImageMetadata, Orientation};

/// Decodes JPEG bytes and applies EXIF orientation correction so the
/// returned buffer is display-ready in all eight orientation cases.
///
/// Fails with `InvalidFormat` on non-JPEG input, `Corrupted` on
/// truncated/garbled data.
pub fn decode_jpeg(bytes: &[u8]) -> Result<DecodedImage> {
    let orientation = get_orientation(bytes);
    let img = decode_jpeg_no_orientation(bytes)?;
    let img = image::DynamicImage::ImageRgb8(
        img.to_image()
            .ok_or_else(|| EngineError::Internal("decoded buffer size mismatch".into()))?,
    );
    let oriented = orientation.apply(img).to_rgb8();
    Ok(DecodedImage::from_image(oriented))
}

/// Decodes JPEG bytes without applying any orientation transform. Useful
/// when the caller wants to handle orientation separately (e.g. to read
/// it once and apply it to multiple derived buffers).
pub fn decode_jpeg_no_orientation(bytes: &[u8]) -> Result<DecodedImage> {
    if bytes.is_empty() {
        return Err(EngineError::InvalidFormat);
    }
    if !looks_like_jpeg(bytes) {
        return Err(EngineError::InvalidFormat);
    }

    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
        .map_err(|e| EngineError::Corrupted(e.to_string()))?;

    Ok(DecodedImage::from_image(img.into_rgb8()))
}

/// Reads the EXIF `Orientation` tag, defaulting to `Identity` when no
/// EXIF segment is present or the tag is missing/unparseable. This
/// decoder never retries or fails the caller for missing EXIF data.
pub fn get_orientation(bytes: &[u8]) -> Orientation {
    read_exif_metadata(bytes)
        .map(|m| m.orientation)
        .unwrap_or(Orientation::Identity)
}

/// Best-effort EXIF metadata extraction (camera make/model, capture
/// timestamp, orientation). Returns `None` when no EXIF segment parses;
/// this is advisory data, never required for a successful decode.
pub fn read_exif_metadata(bytes: &[u8]) -> Option<ImageMetadata> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new()
        .read_from_container(&mut cursor)
        .ok()?;

    let orientation = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .map(Orientation::from_exif_value)
        .unwrap_or(Orientation::Identity);

    let camera_make = exif
        .get_field(exif::Tag::Make, exif::In::PRIMARY)
        .map(|f| f.display_value().to_string());
    let camera_model = exif
        .get_field(exif::Tag::Model, exif::In::PRIMARY)
        .map(|f| f.display_value().to_string());

    let captured_at = exif
        .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
        .and_then(|f| parse_exif_datetime(&f.display_value().to_string()));

    Some(ImageMetadata {
        camera_make,
        camera_model,
        captured_at,
        orientation,
    })
}

/// Parses the EXIF `YYYY:MM:DD HH:MM:SS` datetime format into Unix
/// seconds, treating the timestamp as UTC (no timezone is carried by the
/// tag itself). Returns `None` on any parse failure rather than erroring
/// the caller — capture time is advisory metadata.
fn parse_exif_datetime(s: &str) -> Option<i64> {
    let s = s.trim();
    let (date, time) = s.split_once(' ')?;
    let mut date_parts = date.splitn(3, ':');
    let year: i64 = date_parts.next()?.parse().ok()?;
    let month: i64 = date_parts.next()?.parse().ok()?;
    let day: i64 = date_parts.next()?.parse().ok()?;
    let mut time_parts = time.splitn(3, ':');
    let hour: i64 = time_parts.next()?.parse().ok()?;
    let min: i64 = time_parts.next()?.parse().ok()?;
    let sec: i64 = time_parts.next()?.parse().ok()?;

    Some(days_from_civil(year, month, day) * 86_400 + hour * 3_600 + min * 60 + sec)
}

/// Howard Hinnant's days-from-civil algorithm, converting a Gregorian
/// calendar date to a signed day count since 1970-01-01.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn looks_like_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xD8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_test_jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb(color));
        let mut buf = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 100);
        encoder
            .encode(&img, width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    #[test]
    fn rejects_non_jpeg() {
        let err = decode_jpeg(b"not a jpeg").unwrap_err();
        assert!(matches!(err, EngineError::InvalidFormat));
    }

    #[test]
    fn rejects_empty() {
        let err = decode_jpeg(&[]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFormat));
    }

    #[test]
    fn rejects_truncated_jpeg() {
        let bytes = encode_test_jpeg(32, 32, [128, 128, 128]);
        let truncated = &bytes[..bytes.len() / 2];
        let err = decode_jpeg(truncated).unwrap_err();
        assert!(matches!(err, EngineError::Corrupted(_)));
    }

    #[test]
    fn decodes_solid_gray_square() {
        let bytes = encode_test_jpeg(100, 100, [128, 128, 128]);
        let decoded = decode_jpeg(&bytes).unwrap();
        assert_eq!(decoded.width, 100);
        assert_eq!(decoded.height, 100);
        // Lossy JPEG on a flat field should still round-trip very close
        // to the source value.
        for px in decoded.pixels.chunks_exact(3) {
            assert!((px[0] as i32 - 128).abs() <= 2);
        }
    }

    #[test]
    fn no_exif_defaults_to_identity_orientation() {
        let bytes = encode_test_jpeg(10, 10, [0, 0, 0]);
        assert_eq!(get_orientation(&bytes), Orientation::Identity);
    }

    #[test]
    fn exif_datetime_parses() {
        assert_eq!(
            parse_exif_datetime("2024:01:15 10:30:00"),
            Some(1_705_314_600)
        );
        assert_eq!(parse_exif_datetime("garbage"), None);
    }
}
