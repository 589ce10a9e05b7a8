//! The edit engine's data model.
//!
//! Plain owned, serializable records — no reactive wrappers. The
//! "reactive" property belongs to the host UI layer and is not a core
//! concern.

pub mod asset;
pub mod edit_state;

pub use asset::{Asset, AssetFormat, CacheStatus, Flag};
pub use edit_state::{
    Adjustments, CropTransform, EditState, Mask, MaskGeometry, MaskKind, Rect, Rotation,
    ToneCurve, ToneCurvePoint,
};
