//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::config::{BoxFractions, SessionConfig};
pub use crate::error::{OutputError, VolumeError};
pub use crate::segment::{BoundingBox, BoxOutliner, RegionGrower, ThresholdEstimator};
pub use crate::{
    Idx2d, Idx3d, Orientation, SegmentMode, SegmentRequest, SegmentationSession, Volume,
};
