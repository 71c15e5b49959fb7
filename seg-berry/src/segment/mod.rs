//! 分割核心算法: 包围盒规划, 阈值估计, 区域生长与包围盒轮廓.
//!
//! 除了包围盒规划外, 算法都对维度泛型, 同一份实现同时服务 2D 切片和 3D 子体积.

mod bbox;
mod filter;
mod grow;
mod outline;
mod threshold;

pub use bbox::{plan_box_2d, plan_box_3d, BoundingBox};
pub use grow::{connected_threshold, RegionGrower};
pub use outline::BoxOutliner;
pub use threshold::{Histogram, PeakPolicy, ThresholdEstimate, ThresholdEstimator};
