//! 视图方向.
//!
//! 每个方向把体数据的三条轴分配给 {宽, 高, 切片} 三个角色. 所有与方向相关的几何量
//! 都从这张表查出, 下游代码只处理轴索引, 不再按方向分支.

use crate::Idx3d;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 三种视图方向. 判别值即交互界面使用的方向码.
///
/// | 方向 | 码 | 宽轴 | 高轴 | 切片轴 |
/// |------|----|------|------|--------|
/// | `Xy` | 1  | 0    | 1    | 2      |
/// | `Xz` | 2  | 0    | 2    | 1      |
/// | `Yz` | 3  | 1    | 2    | 0      |
///
/// 切片平面按 `[宽, 高]` 索引. 显示时第 0 行对应高轴的最大索引.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Orientation {
    /// 切片沿第 2 轴.
    #[default]
    Xy = 1,

    /// 切片沿第 1 轴.
    Xz = 2,

    /// 切片沿第 0 轴.
    Yz = 3,
}

impl Orientation {
    /// 从方向码转换. 1, 2 分别为 `Xy`, `Xz`, 其他任何值都回退为 `Yz` 并记录警告.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Orientation::Xy,
            2 => Orientation::Xz,
            3 => Orientation::Yz,
            other => {
                log::warn!("unknown orientation code {other}, falling back to YZ");
                Orientation::Yz
            }
        }
    }

    /// 方向码.
    #[inline]
    pub const fn code(&self) -> i32 {
        *self as i32
    }

    /// 切片 (穿过平面) 轴.
    #[inline]
    pub const fn slice_axis(&self) -> usize {
        match self {
            Orientation::Xy => 2,
            Orientation::Xz => 1,
            Orientation::Yz => 0,
        }
    }

    /// 平面内的 `(宽轴, 高轴)`.
    #[inline]
    pub const fn in_plane_axes(&self) -> (usize, usize) {
        match self {
            Orientation::Xy => (0, 1),
            Orientation::Xz => (0, 2),
            Orientation::Yz => (1, 2),
        }
    }

    /// 切片宽度.
    #[inline]
    pub const fn width(&self, dims: Idx3d) -> usize {
        extent(dims, self.in_plane_axes().0)
    }

    /// 切片高度.
    #[inline]
    pub const fn height(&self, dims: Idx3d) -> usize {
        extent(dims, self.in_plane_axes().1)
    }

    /// 切片个数.
    #[inline]
    pub const fn slice_count(&self, dims: Idx3d) -> usize {
        extent(dims, self.slice_axis())
    }

    /// 切片索引合法范围 `[0, slice_count)`. 体数据为空时返回 `None`.
    #[inline]
    pub fn slice_bounds(&self, dims: Idx3d) -> Option<(usize, usize)> {
        match self.slice_count(dims) {
            0 => None,
            n => Some((0, n - 1)),
        }
    }

    /// 把显示平面上的点击 `(row, col)` 还原为平面内坐标 `(宽, 高)`.
    ///
    /// 行号向下增长, 而高轴向上增长, 因此 `高 = height - 1 - row`. 越界时返回 `None`.
    pub fn resolve_plane(&self, row: usize, col: usize, dims: Idx3d) -> Option<(usize, usize)> {
        let (width, height) = (self.width(dims), self.height(dims));
        (row < height && col < width).then(|| (col, height - 1 - row))
    }

    /// 把点击和当前切片索引还原为完整的体素索引.
    pub fn resolve_click(&self, row: usize, col: usize, slice: usize, dims: Idx3d) -> Option<Idx3d> {
        if slice >= self.slice_count(dims) {
            return None;
        }
        let (w, h) = self.resolve_plane(row, col, dims)?;
        let (w_axis, h_axis) = self.in_plane_axes();
        let mut seed = [0usize; 3];
        seed[w_axis] = w;
        seed[h_axis] = h;
        seed[self.slice_axis()] = slice;
        Some((seed[0], seed[1], seed[2]))
    }
}

#[inline]
const fn extent((d0, d1, d2): Idx3d, axis: usize) -> usize {
    match axis {
        0 => d0,
        1 => d1,
        _ => d2,
    }
}
