//! 连通阈值区域生长与形态学后处理.

use std::collections::VecDeque;

use ndarray::{Array, Array2, Array3, ArrayView, ArrayView2, ArrayView3, Dimension, IntoDimension};

use super::filter::{hole_fill, neighbour, open_diamond};
use crate::config::GrowthParams;
use crate::{Idx2d, Idx3d};

/// 从 `seeds` 出发, 以面相邻 (2D 为 4-邻接, 3D 为 6-邻接) 方式生长,
/// 接受强度位于 `[lower, upper]` 的有限值体素.
///
/// 越界或强度不在区间内的种子会被忽略. 所有种子都被忽略时结果为空掩码, 这不是错误.
pub fn connected_threshold<D: Dimension>(
    image: ArrayView<f32, D>,
    seeds: &[D],
    lower: f64,
    upper: f64,
) -> Array<u8, D> {
    let accept = |v: f32| v.is_finite() && (v as f64) >= lower && (v as f64) <= upper;
    let shape = image.shape().to_vec();
    let mut out = Array::<u8, D>::zeros(image.raw_dim());
    let mut queue = VecDeque::new();

    for seed in seeds {
        match image.get(seed.clone()) {
            Some(&v) if accept(v) => {
                if out[seed.clone()] == 0 {
                    out[seed.clone()] = 1;
                    queue.push_back(seed.clone());
                }
            }
            Some(&v) => log::debug!("seed {seed:?} value {v} is outside [{lower}, {upper}]"),
            None => log::warn!("seed {seed:?} is outside the region {shape:?}"),
        }
    }

    while let Some(p) = queue.pop_front() {
        for axis in 0..shape.len() {
            for delta in [-1, 1] {
                let Some(q) = neighbour(&p, axis, delta, &shape) else {
                    continue;
                };
                if out[q.clone()] == 0 && accept(image[q.clone()]) {
                    out[q.clone()] = 1;
                    queue.push_back(q);
                }
            }
        }
    }
    out
}

/// 区域生长器: 连通阈值生长, 投票式孔洞填充, 菱形开运算.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionGrower {
    params: GrowthParams,
}

impl RegionGrower {
    /// 以给定参数创建.
    pub fn new(params: GrowthParams) -> Self {
        Self { params }
    }

    /// 在裁剪区域 `crop` 上从盒内坐标 `seed` 生长, 返回与 `crop` 同形状的 0/1 掩码.
    ///
    /// 接受区间为 `[lower, upper]`, `lower` 来自参数 (默认 0).
    pub fn grow<D: Dimension>(&self, crop: ArrayView<f32, D>, seed: D, upper: f64) -> Array<u8, D> {
        let grown = connected_threshold(crop, std::slice::from_ref(&seed), self.params.lower, upper);
        if grown.iter().all(|&v| v == 0) {
            log::debug!("region growing from {seed:?} produced an empty mask");
            return grown;
        }
        let filled = hole_fill(grown.view(), self.params.hole_radius, self.params.majority);
        open_diamond(filled.view(), self.params.opening_radius)
    }

    /// 2D 切片上的生长.
    #[inline]
    pub fn grow_2d(&self, crop: ArrayView2<f32>, seed: Idx2d, upper: f64) -> Array2<u8> {
        self.grow(crop, seed.into_dimension(), upper)
    }

    /// 3D 子体积上的生长.
    #[inline]
    pub fn grow_3d(&self, crop: ArrayView3<f32>, seed: Idx3d, upper: f64) -> Array3<u8> {
        self.grow(crop, seed.into_dimension(), upper)
    }
}
