//! Full RAW decode: bilinear demosaic of the Bayer plane. This is the
//! optional quality path; demosaicing beyond bilinear is out of scope.
//!
//! Every output pixel is interpolated from its Bayer neighborhood rather
//! than discarded, assuming RGGB tiling and normalizing 16-bit samples
//! down to 8-bit (`>> 8` / `* 255` scaling), since `rawloader`'s
//! `RawImageData` exposes no per-pixel CFA color lookup in the version
//! this crate targets.

use rawloader::RawImageData;

use crate::error::{EngineError, Result};

use super::types::DecodedImage;

/// Decodes a RAW file's Bayer sensor plane into a full-resolution RGB
/// image via bilinear demosaicing. This is the quality path; for
/// interactive display prefer [`super::raw_thumbnail::decode_raw_thumbnail`].
pub fn decode_raw_full(bytes: &[u8]) -> Result<DecodedImage> {
    let mut reader = std::io::BufReader::new(std::io::Cursor::new(bytes));
    let raw = rawloader::decode(&mut reader).map_err(|e| EngineError::Corrupted(e.to_string()))?;

    let width = raw.width;
    let height = raw.height;
    if width < 2 || height < 2 {
        return Err(EngineError::Corrupted(
            "RAW plane too small to demosaic".into(),
        ));
    }

    let pixels = match &raw.data {
        RawImageData::Integer(data) => demosaic_bilinear(data, width, height, |v| (v >> 8) as u8),
        RawImageData::Float(data) => {
            demosaic_bilinear(data, width, height, |v| (v.clamp(0.0, 1.0) * 255.0) as u8)
        }
    };

    Ok(DecodedImage::new(width as u32, height as u32, pixels))
}

/// RGGB phase of sample `(r, c)`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    R,
    GOnRRow,
    GOnBRow,
    B,
}

fn phase_at(r: usize, c: usize) -> Phase {
    match (r % 2, c % 2) {
        (0, 0) => Phase::R,
        (0, 1) => Phase::GOnRRow,
        (1, 0) => Phase::GOnBRow,
        (1, 1) => Phase::B,
        _ => unreachable!(),
    }
}

fn demosaic_bilinear<T, F>(data: &[T], width: usize, height: usize, to_u8: F) -> Vec<u8>
where
    T: Copy,
    F: Fn(T) -> u8,
{
    let at = |r: i64, c: i64| -> T {
        let r = r.clamp(0, height as i64 - 1) as usize;
        let c = c.clamp(0, width as i64 - 1) as usize;
        data[r * width + c]
    };
    let mut out = vec![0u8; width * height * 3];
    for r in 0..height {
        for c in 0..width {
            let (rv, gv, bv) = sample_rgb(&at, r as i64, c as i64, &to_u8);
            let idx = (r * width + c) * 3;
            out[idx] = rv;
            out[idx + 1] = gv;
            out[idx + 2] = bv;
        }
    }
    out
}

fn sample_rgb<T, A, F>(at: &A, r: i64, c: i64, to_u8: &F) -> (u8, u8, u8)
where
    T: Copy,
    A: Fn(i64, i64) -> T,
    F: Fn(T) -> u8,
{
    let u = |v: T| -> f32 { to_u8(v) as f32 };
    let avg = |a: T, b: T| -> u8 { (((u(a) + u(b)) / 2.0).round()) as u8 };
    let avg4 = |a: T, b: T, c: T, d: T| -> u8 { (((u(a) + u(b) + u(c) + u(d)) / 4.0).round()) as u8 };

    let here = to_u8(at(r, c));
    match phase_at(r as usize, c as usize) {
        Phase::R => {
            let r_ch = here;
            let g_ch = avg4(at(r - 1, c), at(r + 1, c), at(r, c - 1), at(r, c + 1));
            let b_ch = avg4(
                at(r - 1, c - 1),
                at(r - 1, c + 1),
                at(r + 1, c - 1),
                at(r + 1, c + 1),
            );
            (r_ch, g_ch, b_ch)
        }
        Phase::B => {
            let b_ch = here;
            let g_ch = avg4(at(r - 1, c), at(r + 1, c), at(r, c - 1), at(r, c + 1));
            let r_ch = avg4(
                at(r - 1, c - 1),
                at(r - 1, c + 1),
                at(r + 1, c - 1),
                at(r + 1, c + 1),
            );
            (r_ch, g_ch, b_ch)
        }
        Phase::GOnRRow => {
            let g_ch = here;
            let r_ch = avg(at(r, c - 1), at(r, c + 1));
            let b_ch = avg(at(r - 1, c), at(r + 1, c));
            (r_ch, g_ch, b_ch)
        }
        Phase::GOnBRow => {
            let g_ch = here;
            let r_ch = avg(at(r - 1, c), at(r + 1, c));
            let b_ch = avg(at(r, c - 1), at(r, c + 1));
            (r_ch, g_ch, b_ch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_pattern_matches_rggb_tiling() {
        assert!(matches!(phase_at(0, 0), Phase::R));
        assert!(matches!(phase_at(0, 1), Phase::GOnRRow));
        assert!(matches!(phase_at(1, 0), Phase::GOnBRow));
        assert!(matches!(phase_at(1, 1), Phase::B));
    }

    #[test]
    fn demosaic_constant_plane_is_flat_gray() {
        // A perfectly flat sensor (every sample the same 16-bit value)
        // must demosaic to a flat, neutral-gray RGB image.
        let width = 8;
        let height = 8;
        let data = vec![32768u16; width * height];
        let pixels = demosaic_bilinear(&data, width, height, |v| (v >> 8) as u8);
        for px in pixels.chunks_exact(3) {
            assert_eq!(px[0], 128);
            assert_eq!(px[1], 128);
            assert_eq!(px[2], 128);
        }
    }
}
