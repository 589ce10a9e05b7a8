//! CPU fallback backend.
//!
//! Scalar reference implementation: the same stage order as the GPU
//! path, expressed as ordinary loops over `pipeline::render`. Always
//! compiled in — there is no feature gate on this module — since spec
//! §4.4 requires the CPU path to remain available regardless of GPU
//! state.

use crate::decode::DecodedImage;
use crate::error::Result;
use crate::model::EditState;
use crate::pipeline::{self, RenderOutput};

use super::{CancellationToken, Quality};

pub fn render(
    source: &DecodedImage,
    edit_state: &EditState,
    quality: Quality,
    cancellation: &CancellationToken,
) -> Result<RenderOutput> {
    cancellation.check()?;
    let output = pipeline::render(source, edit_state, quality.enabled_stages());
    cancellation.check()?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_render_honors_cancellation_before_starting() {
        let source = DecodedImage::new(2, 2, vec![0u8; 12]);
        let token = CancellationToken::new();
        token.cancel();
        let result = render(&source, &EditState::default(), Quality::Full, &token);
        assert!(result.is_err());
    }

    #[test]
    fn cpu_render_produces_expected_dimensions() {
        let source = DecodedImage::new(3, 2, vec![100u8; 18]);
        let out = render(
            &source,
            &EditState::default(),
            Quality::Draft,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!((out.image.width(), out.image.height()), (3, 2));
        assert!(out.histogram.is_none());
    }
}
