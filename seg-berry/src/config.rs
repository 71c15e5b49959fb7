//! 分割会话的可调参数.
//!
//! 所有参数都带有与交互工具一致的默认值. 打开 `serde` feature 后可以整体序列化,
//! 便于随分割结果一起归档.

use crate::consts::{DEFAULT_THRESHOLD_FRACTION, FALLBACK_BIN_EDGE, HIGHLIGHT, HISTOGRAM_BINS};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 包围盒相对于体数据范围的比例.
///
/// 平面内两条轴使用 `in_plane`, 3D 分割时穿过平面的轴使用 `through_plane`.
/// 两者都应位于 `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoxFractions {
    /// 平面内比例.
    pub in_plane: f64,

    /// 穿过平面方向的比例.
    pub through_plane: f64,
}

impl BoxFractions {
    /// 创建包围盒比例. 不在 `(0, 1]` 内的值 (包括 NaN) 会被替换成 `1.0`.
    pub fn new(in_plane: f64, through_plane: f64) -> Self {
        Self {
            in_plane: sanitize_fraction(in_plane),
            through_plane: sanitize_fraction(through_plane),
        }
    }
}

impl Default for BoxFractions {
    /// 在 256 宽的平面上大约是 50 个像素.
    fn default() -> Self {
        Self {
            in_plane: 0.2,
            through_plane: 0.2,
        }
    }
}

/// 把比例限制在 `(0, 1]` 内, 非法值一律视为 `1.0`.
#[inline]
pub(crate) fn sanitize_fraction(value: f64) -> f64 {
    if value > 0.0 && value <= 1.0 {
        value
    } else {
        log::warn!("box fraction {value} is outside (0, 1], using 1.0");
        1.0
    }
}

/// 直方图阈值估计参数.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramParams {
    /// 分箱个数.
    pub bins: usize,

    /// 峰值不足两个时使用的分箱边界索引.
    pub fallback_edge: usize,

    /// 峰值个数超过该值时, 先丢弃计数最低的一部分峰值.
    pub prune_above: usize,

    /// 丢弃比例, 应位于 `[0, 1)`. 丢弃 `floor(prune_ratio * k)` 个峰值, 但至少保留两个.
    pub prune_ratio: f64,
}

impl Default for HistogramParams {
    fn default() -> Self {
        Self {
            bins: HISTOGRAM_BINS,
            fallback_edge: FALLBACK_BIN_EDGE,
            prune_above: 6,
            prune_ratio: 0.25,
        }
    }
}

/// 区域生长与后处理参数.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GrowthParams {
    /// 接受区间的下界. 上界由阈值估计给出.
    pub lower: f64,

    /// 孔洞填充邻域半径 (每条轴).
    pub hole_radius: usize,

    /// 孔洞填充的多数阈值.
    pub majority: usize,

    /// 开运算结构元 (菱形) 半径. 为 0 时跳过开运算.
    pub opening_radius: usize,
}

impl Default for GrowthParams {
    fn default() -> Self {
        Self {
            lower: 0.0,
            hole_radius: 2,
            majority: 1,
            opening_radius: 1,
        }
    }
}

/// 包围盒轮廓的 Canny 风格边缘检测参数.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CannyParams {
    /// 高斯平滑的方差.
    pub variance: f64,

    /// 滞后阈值下界. 梯度幅值严格大于它才算弱边缘.
    pub lower: f64,

    /// 滞后阈值上界. 梯度幅值严格大于它才算强边缘.
    pub upper: f64,
}

impl Default for CannyParams {
    fn default() -> Self {
        Self {
            variance: 1.0,
            lower: 0.0,
            upper: 0.2,
        }
    }
}

/// 分割会话的全部参数.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SessionConfig {
    /// 加载新体数据时使用的包围盒比例.
    pub fractions: BoxFractions,

    /// 阈值比例缺省或非法 (NaN) 时的取值.
    pub default_threshold_fraction: f64,

    /// 直方图参数.
    pub histogram: HistogramParams,

    /// 生长参数.
    pub growth: GrowthParams,

    /// 轮廓参数.
    pub outline: CannyParams,

    /// 可视化体积中的高亮值.
    pub highlight: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fractions: BoxFractions::default(),
            default_threshold_fraction: DEFAULT_THRESHOLD_FRACTION,
            histogram: HistogramParams::default(),
            growth: GrowthParams::default(),
            outline: CannyParams::default(),
            highlight: HIGHLIGHT,
        }
    }
}
