#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供基于种子点的 3D 体数据区域生长分割, 以及分割结果的可视化叠加与持久化.
//!
//! 一次点击的处理流程:
//!
//! 1. 按照当前视图方向 (`Orientation`) 把显示平面上的 `(row, col)` 还原成体素索引;
//! 2. 在种子附近规划包围盒 (`BoundingBox`), 并裁剪到体数据范围内;
//! 3. 统计包围盒内原始强度直方图, 由直方图峰值估计生长阈值 (`ThresholdEstimator`);
//! 4. 连通阈值区域生长, 然后做投票式孔洞填充和二值开运算 (`RegionGrower`);
//! 5. 生成包围盒轮廓 (`BoxOutliner`), 用于可视化反馈;
//! 6. 由 `SegmentationSession` 合并进 3D 掩码 / 轮廓 / 可视化体积, 并记录分割信息.
//!
//! # 注意
//!
//! 1. 所有算法都只读取原始体数据, 从不读取被高亮值 "烧入" 过的可视化副本.
//! 2. 体数据以 nifti 文件的轴顺序 `(d0, d1, d2)` 保存, 读写时不做转置.
//! 3. 交互路径上不会 panic. 仅在加载秩或形状不合法的体数据时返回错误.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod config;
pub mod consts;
pub mod error;

/// 体数据结构, 视图方向与文件输出.
mod data;

pub use data::{ImgWriteVis, Orientation, OutputPaths, PlaneOverlay, Volume};

pub mod segment;

mod session;

pub use session::{
    SegInfo, SegmentMode, SegmentRegion, SegmentReport, SegmentRequest, SegmentationSession,
    SessionState,
};

pub mod prelude;
