//! `EditState` and its constituents.
//!
//! A render is a pure function of `(source pixels, EditState,
//! targetResolutionScale, enabledStages)`. Nothing here holds hidden
//! state; every field is plain owned data.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// The current edit-state schema version. Bumped only by a migration.
pub const CURRENT_VERSION: u32 = 1;

/// Per-asset, versioned edit parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditState {
    pub version: u32,
    pub adjustments: Adjustments,
    pub tone_curve: ToneCurve,
    pub crop_transform: CropTransform,
    pub masks: Vec<Mask>,
}

impl Default for EditState {
    fn default() -> Self {
        EditState {
            version: CURRENT_VERSION,
            adjustments: Adjustments::default(),
            tone_curve: ToneCurve::default(),
            crop_transform: CropTransform::default(),
            masks: Vec::new(),
        }
    }
}

impl EditState {
    /// Validates that the tone curve is monotone, the crop rect (if any)
    /// lies within bounds, and mask ids are unique. Called before a
    /// render is accepted; a render is never attempted against an
    /// invalid `EditState`.
    pub fn validate(&self) -> Result<()> {
        self.tone_curve.validate()?;
        if let Some(crop) = &self.crop_transform.crop {
            crop.validate()?;
        }
        let mut seen = std::collections::HashSet::new();
        for mask in &self.masks {
            if !seen.insert(&mask.id) {
                return Err(EngineError::Internal(format!(
                    "duplicate mask id: {}",
                    mask.id
                )));
            }
        }
        Ok(())
    }

    /// Migrates an arbitrary persisted JSON document to [`CURRENT_VERSION`].
    /// Each step is a pure function of the previous version's document;
    /// migrations never skip a step, and the version only ever advances
    /// by running one.
    pub fn migrate(mut doc: serde_json::Value) -> Result<EditState> {
        let mut version = doc
            .get("version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;

        // v0 -> v1: the only migration currently defined. v0 documents
        // predate the `masks` field; default it to empty.
        if version == 0 {
            if let Some(obj) = doc.as_object_mut() {
                obj.entry("masks").or_insert_with(|| serde_json::json!([]));
                obj.insert("version".to_string(), serde_json::json!(1));
            }
            version = 1;
        }

        if version != CURRENT_VERSION {
            return Err(EngineError::Internal(format!(
                "no migration path from edit-state version {version}"
            )));
        }

        serde_json::from_value(doc)
            .map_err(|e| EngineError::Internal(format!("edit-state migration failed: {e}")))
    }
}

/// Ten signed scalars. All at their default (zero / neutral) values MUST
/// leave pixels bit-identical to the input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustments {
    /// [-100, 100]
    pub temperature: f32,
    /// [-100, 100]
    pub tint: f32,
    /// Stops, [-5, 5]
    pub exposure: f32,
    /// [-100, 100]
    pub contrast: f32,
    /// [-100, 100]
    pub highlights: f32,
    /// [-100, 100]
    pub shadows: f32,
    /// [-100, 100]
    pub whites: f32,
    /// [-100, 100]
    pub blacks: f32,
    /// [-100, 100]
    pub vibrance: f32,
    /// [-100, 100]
    pub saturation: f32,
}

impl Default for Adjustments {
    fn default() -> Self {
        Adjustments {
            temperature: 0.0,
            tint: 0.0,
            exposure: 0.0,
            contrast: 0.0,
            highlights: 0.0,
            shadows: 0.0,
            whites: 0.0,
            blacks: 0.0,
            vibrance: 0.0,
            saturation: 0.0,
        }
    }
}

impl Adjustments {
    pub fn is_identity(&self) -> bool {
        *self == Adjustments::default()
    }
}

/// Ordered control points defining a monotone cubic LUT. First point
/// x=0, last point x=1, strictly increasing x, length >= 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneCurve {
    pub points: Vec<ToneCurvePoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneCurvePoint {
    pub x: f32,
    pub y: f32,
}

impl Default for ToneCurve {
    fn default() -> Self {
        ToneCurve {
            points: vec![
                ToneCurvePoint { x: 0.0, y: 0.0 },
                ToneCurvePoint { x: 1.0, y: 1.0 },
            ],
        }
    }
}

impl ToneCurve {
    pub fn validate(&self) -> Result<()> {
        if self.points.len() < 2 {
            return Err(EngineError::Internal(
                "tone curve must have at least 2 control points".into(),
            ));
        }
        let first = &self.points[0];
        let last = &self.points[self.points.len() - 1];
        if first.x != 0.0 || last.x != 1.0 {
            return Err(EngineError::Internal(
                "tone curve must start at x=0 and end at x=1".into(),
            ));
        }
        for w in self.points.windows(2) {
            if !(w[1].x > w[0].x) {
                return Err(EngineError::Internal(
                    "tone curve control points must be strictly increasing in x".into(),
                ));
            }
        }
        for p in &self.points {
            if !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y) {
                return Err(EngineError::Internal(
                    "tone curve control points must lie in [0,1]^2".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn is_identity(&self) -> bool {
        *self == ToneCurve::default()
    }
}

/// Normalized `{left, top, width, height}` in [0,1], `left+width<=1`,
/// `top+height<=1`, `width>0`, `height>0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const FULL: Rect = Rect {
        left: 0.0,
        top: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn validate(&self) -> Result<()> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(EngineError::Internal(
                "crop rect must have positive width and height".into(),
            ));
        }
        if self.left < 0.0 || self.top < 0.0 {
            return Err(EngineError::Internal(
                "crop rect must lie within [0,1]^2".into(),
            ));
        }
        if self.left + self.width > 1.0 + f32::EPSILON || self.top + self.height > 1.0 + f32::EPSILON {
            return Err(EngineError::Internal(
                "crop rect must lie fully within [0,1]^2".into(),
            ));
        }
        Ok(())
    }

    /// Numerically within 0.001 of the full-frame rect — the crop stage's
    /// no-op threshold.
    pub fn is_full_frame(&self) -> bool {
        const EPS: f32 = 0.001;
        (self.left - Rect::FULL.left).abs() < EPS
            && (self.top - Rect::FULL.top).abs() < EPS
            && (self.width - Rect::FULL.width).abs() < EPS
            && (self.height - Rect::FULL.height).abs() < EPS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    /// (-180, 180] degrees.
    pub angle: f32,
    /// [-45, 45] degrees.
    pub straighten: f32,
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation {
            angle: 0.0,
            straighten: 0.0,
        }
    }
}

impl Rotation {
    /// The fixed combination rule: combined angle = angle + straighten.
    pub fn combined_degrees(&self) -> f32 {
        self.angle + self.straighten
    }

    pub fn is_identity(&self) -> bool {
        self.combined_degrees() == 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropTransform {
    pub crop: Option<Rect>,
    pub rotation: Rotation,
}

impl Default for CropTransform {
    fn default() -> Self {
        CropTransform {
            crop: None,
            rotation: Rotation::default(),
        }
    }
}

impl CropTransform {
    /// The crop-free invariant: default crop and zero rotation
    /// means the rotation/crop stage is skipped entirely.
    pub fn is_identity(&self) -> bool {
        self.rotation.is_identity() && self.crop.map(|c| c.is_full_frame()).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskKind {
    Linear,
    Radial,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MaskGeometry {
    Linear {
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
    },
    Radial {
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
        /// Radians.
        rotation: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mask {
    pub id: String,
    pub kind: MaskKind,
    pub enabled: bool,
    pub geometry: MaskGeometry,
    /// [0, 1]
    pub feather: f32,
    /// Radial only; ignored for linear masks.
    pub invert: bool,
    pub adjustments: Adjustments,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_edit_state_round_trips() {
        let state = EditState::default();
        state.validate().unwrap();
        assert!(state.crop_transform.is_identity());
        assert!(state.adjustments.is_identity());
        assert!(state.tone_curve.is_identity());
    }

    #[test]
    fn tone_curve_rejects_non_monotone() {
        let curve = ToneCurve {
            points: vec![
                ToneCurvePoint { x: 0.0, y: 0.0 },
                ToneCurvePoint { x: 0.5, y: 0.8 },
                ToneCurvePoint { x: 0.4, y: 0.9 },
                ToneCurvePoint { x: 1.0, y: 1.0 },
            ],
        };
        assert!(curve.validate().is_err());
    }

    #[test]
    fn tone_curve_rejects_bad_endpoints() {
        let curve = ToneCurve {
            points: vec![
                ToneCurvePoint { x: 0.1, y: 0.0 },
                ToneCurvePoint { x: 1.0, y: 1.0 },
            ],
        };
        assert!(curve.validate().is_err());
    }

    #[test]
    fn rect_validates_bounds() {
        assert!(Rect {
            left: 0.5,
            top: 0.0,
            width: 0.6,
            height: 1.0
        }
        .validate()
        .is_err());
        assert!(Rect {
            left: 0.5,
            top: 0.0,
            width: 0.5,
            height: 1.0
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn duplicate_mask_ids_rejected() {
        let mut state = EditState::default();
        let mask = Mask {
            id: "m1".into(),
            kind: MaskKind::Linear,
            enabled: true,
            geometry: MaskGeometry::Linear {
                x0: 0.0,
                y0: 0.0,
                x1: 1.0,
                y1: 0.0,
            },
            feather: 0.0,
            invert: false,
            adjustments: Adjustments::default(),
        };
        state.masks.push(mask.clone());
        state.masks.push(mask);
        assert!(state.validate().is_err());
    }

    #[test]
    fn migrate_v0_defaults_masks() {
        let doc = serde_json::json!({
            "adjustments": Adjustments::default(),
            "toneCurve": {"points": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 1.0}]},
            "cropTransform": {"crop": null, "rotation": {"angle": 0.0, "straighten": 0.0}},
        });
        // v0 documents use camelCase field names from the host; our
        // model uses snake_case internally, so round-trip through the
        // serde rename rules used elsewhere is exercised in `worker`.
        // Here we only exercise the version-bump/masks-default behavior
        // on a document already shaped like our internal schema.
        let doc = serde_json::json!({
            "version": 0,
            "adjustments": doc["adjustments"],
            "tone_curve": doc["toneCurve"],
            "crop_transform": doc["cropTransform"],
        });
        let migrated = EditState::migrate(doc).unwrap();
        assert_eq!(migrated.version, CURRENT_VERSION);
        assert!(migrated.masks.is_empty());
    }

    #[test]
    fn crop_free_invariant() {
        let mut transform = CropTransform::default();
        assert!(transform.is_identity());
        transform.crop = Some(Rect {
            left: 0.0001,
            top: 0.0,
            width: 0.9999,
            height: 1.0,
        });
        assert!(transform.is_identity());
        transform.rotation.straighten = 1.0;
        assert!(!transform.is_identity());
    }
}
