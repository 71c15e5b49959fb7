//! 包围盒规划.

use ndarray::{ArrayBase, ArrayView, ArrayViewMut, Data, DataMut, Dimension, Slice};

use crate::config::BoxFractions;
use crate::{Idx2d, Idx3d, Orientation};

/// 轴对齐的 N 维包围盒. 上下界都是闭区间, 且 `lo <= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox<const N: usize> {
    lo: [usize; N],
    hi: [usize; N],
}

impl<const N: usize> BoundingBox<N> {
    /// 由每条轴的闭区间创建. 若某条轴 `lo > hi` 则返回 `None`.
    pub fn new(lo: [usize; N], hi: [usize; N]) -> Option<Self> {
        lo.iter().zip(hi.iter()).all(|(l, h)| l <= h).then_some(Self { lo, hi })
    }

    /// 下界.
    #[inline]
    pub fn lo(&self) -> [usize; N] {
        self.lo
    }

    /// 上界 (含).
    #[inline]
    pub fn hi(&self) -> [usize; N] {
        self.hi
    }

    /// 每条轴的长度.
    #[inline]
    pub fn extent(&self) -> [usize; N] {
        std::array::from_fn(|i| self.hi[i] - self.lo[i] + 1)
    }

    /// 体素个数.
    #[inline]
    pub fn volume(&self) -> usize {
        self.extent().iter().product()
    }

    /// 点是否在盒内.
    #[inline]
    pub fn contains(&self, p: &[usize; N]) -> bool {
        (0..N).all(|i| self.lo[i] <= p[i] && p[i] <= self.hi[i])
    }

    /// 把全局坐标转换成盒内坐标. 不在盒内时返回 `None`.
    #[inline]
    pub fn to_local(&self, p: &[usize; N]) -> Option<[usize; N]> {
        self.contains(p).then(|| std::array::from_fn(|i| p[i] - self.lo[i]))
    }

    /// 第 `axis` 条轴上的切片范围.
    #[inline]
    pub(crate) fn slice_of(&self, axis: usize) -> Slice {
        Slice::from(self.lo[axis]..self.hi[axis] + 1)
    }

    /// 裁剪 `array` 的盒内部分.
    ///
    /// # 注意
    ///
    /// `array` 的维数必须为 `N`, 且盒子不能越界, 否则程序 panic.
    pub fn crop<'a, S, D>(&self, array: &'a ArrayBase<S, D>) -> ArrayView<'a, S::Elem, D>
    where
        S: Data,
        D: Dimension,
    {
        assert_eq!(array.ndim(), N);
        array.slice_each_axis(|ax| self.slice_of(ax.axis.index()))
    }

    /// 可变地裁剪 `array` 的盒内部分. 要求同 [`BoundingBox::crop`].
    pub fn crop_mut<'a, S, D>(&self, array: &'a mut ArrayBase<S, D>) -> ArrayViewMut<'a, S::Elem, D>
    where
        S: DataMut,
        D: Dimension,
    {
        assert_eq!(array.ndim(), N);
        array.slice_each_axis_mut(|ax| self.slice_of(ax.axis.index()))
    }
}

/// 单条轴上以 `seed` 为中心, 边长为 `round(fraction * extent)` 的闭区间, 裁剪到 `[0, extent - 1]`.
///
/// 取整采用 "四舍六入五成双". 裁剪在两端独立进行, 靠近边缘的盒子只会在一侧变小.
/// 最终区间总是包含 `seed`.
fn plan_axis(seed: usize, extent: usize, fraction: f64) -> (usize, usize) {
    if extent == 0 {
        return (0, 0);
    }
    let seed = seed.min(extent - 1);
    let size = (fraction * extent as f64).round_ties_even().max(1.0);

    let s = seed as f64;
    let lo = (s - size / 2.0).round_ties_even();
    let hi = (s + size / 2.0 - 1.0).round_ties_even();

    // 负数转 usize 饱和为 0.
    let lo = (lo.max(0.0) as usize).min(seed);
    let hi = (hi.max(0.0) as usize).min(extent - 1).max(seed);
    (lo, hi)
}

/// 在 `extents = (宽, 高)` 的切片上, 以平面内坐标 `seed` 为中心规划 2D 包围盒.
pub fn plan_box_2d(seed: Idx2d, extents: Idx2d, in_plane: f64) -> BoundingBox<2> {
    let (l0, h0) = plan_axis(seed.0, extents.0, in_plane);
    let (l1, h1) = plan_axis(seed.1, extents.1, in_plane);
    BoundingBox {
        lo: [l0, l1],
        hi: [h0, h1],
    }
}

/// 以体素索引 `seed` 为中心规划 3D 包围盒.
///
/// `orientation` 的切片轴使用穿过平面比例, 其余两条轴使用平面内比例.
pub fn plan_box_3d(
    seed: Idx3d,
    extents: Idx3d,
    fractions: BoxFractions,
    orientation: Orientation,
) -> BoundingBox<3> {
    let seed = [seed.0, seed.1, seed.2];
    let extents = [extents.0, extents.1, extents.2];
    let mut lo = [0; 3];
    let mut hi = [0; 3];
    for axis in 0..3 {
        let fraction = if axis == orientation.slice_axis() {
            fractions.through_plane
        } else {
            fractions.in_plane
        };
        (lo[axis], hi[axis]) = plan_axis(seed[axis], extents[axis], fraction);
    }
    BoundingBox { lo, hi }
}
