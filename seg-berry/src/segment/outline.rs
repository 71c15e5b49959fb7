//! 包围盒轮廓.
//!
//! 在填充后的包围盒指示数组上做 Canny 风格的边缘检测: 高斯平滑, 中心差分梯度,
//! 沿主梯度轴的非极大值抑制, 然后滞后阈值连接. 轮廓只用于可视化, 不约束分割.

use std::collections::VecDeque;

use itertools::Itertools;
use ndarray::{Array, Array2, Array3, Axis, Dimension, IntoDimension, Ix2, Ix3, Slice, Zip};
use ordered_float::OrderedFloat;

use super::bbox::BoundingBox;
use super::filter::{gaussian, gradient, neighbour};
use crate::config::CannyParams;
use crate::{Idx2d, Idx3d, Orientation};

/// 非极大值抑制时允许的相等误差. 盒子边界两侧的梯度幅值理论上相等.
const TIE_EPS: f64 = 1e-9;

/// 包围盒轮廓生成器.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxOutliner {
    params: CannyParams,
}

impl BoxOutliner {
    /// 以给定参数创建.
    pub fn new(params: CannyParams) -> Self {
        Self { params }
    }

    /// 在盒子四周补零的宽度, 保证平滑核不会碰到局部数组边界.
    fn padding(&self) -> usize {
        let sigma = self.params.variance.max(0.0).sqrt();
        (3.0 * sigma).ceil() as usize + 2
    }

    /// 对任意维的灰度数组做 Canny 风格边缘检测, 返回 0/1 边缘图.
    pub fn edges<D: Dimension>(&self, image: &Array<f64, D>) -> Array<u8, D> {
        let ndim = image.ndim();
        let shape = image.shape().to_vec();
        let smooth = gaussian(image.view(), self.params.variance);
        let grads: Vec<Array<f64, D>> = (0..ndim)
            .map(|axis| gradient(smooth.view(), Axis(axis)))
            .collect();

        let mut magnitude = Array::<f64, D>::zeros(image.raw_dim());
        for g in &grads {
            Zip::from(&mut magnitude).and(g).for_each(|m, &v| *m += v * v);
        }
        magnitude.mapv_inplace(f64::sqrt);

        // 沿梯度绝对值最大的轴做非极大值抑制, 数组外视为 0.
        let mut thin = Array::<f64, D>::zeros(image.raw_dim());
        for (pattern, &m) in magnitude.indexed_iter() {
            if m <= 0.0 {
                continue;
            }
            let idx = pattern.into_dimension();
            let axis = (0..ndim)
                .max_by_key(|&a| OrderedFloat(grads[a][idx.clone()].abs()))
                .unwrap_or(0);
            let before = neighbour(&idx, axis, -1, &shape).map_or(0.0, |p| magnitude[p]);
            let after = neighbour(&idx, axis, 1, &shape).map_or(0.0, |p| magnitude[p]);
            if m + TIE_EPS >= before && m + TIE_EPS >= after {
                thin[idx] = m;
            }
        }

        self.hysteresis(&thin)
    }

    /// 滞后阈值: 从强边缘出发, 沿 `3^d - 1` 邻域连接弱边缘.
    fn hysteresis<D: Dimension>(&self, thin: &Array<f64, D>) -> Array<u8, D> {
        let (lower, upper) = (self.params.lower, self.params.upper);
        let shape = thin.shape().to_vec();
        let offsets: Vec<Vec<isize>> = (0..thin.ndim())
            .map(|_| -1isize..=1)
            .multi_cartesian_product()
            .filter(|o| o.iter().any(|&d| d != 0))
            .collect();

        let mut out = Array::<u8, D>::zeros(thin.raw_dim());
        let mut queue = VecDeque::new();
        for (pattern, &m) in thin.indexed_iter() {
            if m > upper {
                let idx = pattern.into_dimension();
                out[idx.clone()] = 1;
                queue.push_back(idx);
            }
        }

        while let Some(p) = queue.pop_front() {
            'next: for offset in &offsets {
                let mut q = p.clone();
                for (axis, &d) in offset.iter().enumerate() {
                    match neighbour(&q, axis, d, &shape) {
                        Some(moved) => q = moved,
                        None => continue 'next,
                    }
                }
                if out[q.clone()] == 0 && thin[q.clone()] > lower {
                    out[q.clone()] = 1;
                    queue.push_back(q);
                }
            }
        }
        out
    }

    /// 与盒子同形状的局部轮廓.
    fn local_outline<D: Dimension>(&self, extent: D) -> Array<u8, D> {
        let pad = self.padding();
        let mut padded = extent.clone();
        for axis in 0..extent.ndim() {
            padded[axis] += 2 * pad;
        }

        let inner = |axis: usize| Slice::from(pad..pad + extent[axis]);
        let mut filled = Array::<f64, D>::zeros(padded);
        filled
            .slice_each_axis_mut(|ax| inner(ax.axis.index()))
            .fill(1.0);

        // 只保留盒内的边缘.
        self.edges(&filled)
            .slice_each_axis(|ax| inner(ax.axis.index()))
            .to_owned()
    }

    /// 2D 包围盒轮廓, 形状为 `extents = (宽, 高)`.
    pub fn outline_2d(&self, extents: Idx2d, bbox: &BoundingBox<2>) -> Array2<u8> {
        let [e0, e1] = bbox.extent();
        let local = self.local_outline(Ix2(e0, e1));
        let mut out = Array2::<u8>::zeros(extents);
        out.slice_each_axis_mut(|ax| bbox.slice_of(ax.axis.index()))
            .assign(&local);
        out
    }

    /// 3D 包围盒轮廓.
    ///
    /// 沿 `orientation` 的切片轴, 盒子的两个端面被相邻的内部切片覆盖,
    /// 这样沿该轴观察时轮廓不会挡住盒子内部.
    pub fn outline_3d(&self, extents: Idx3d, bbox: &BoundingBox<3>, orientation: Orientation) -> Array3<u8> {
        let [e0, e1, e2] = bbox.extent();
        let mut local = self.local_outline(Ix3(e0, e1, e2));
        open_faces(&mut local, Axis(orientation.slice_axis()));

        let mut out = Array3::<u8>::zeros(extents);
        out.slice_each_axis_mut(|ax| bbox.slice_of(ax.axis.index()))
            .assign(&local);
        out
    }
}

/// 把 `axis` 两端的切片替换成相邻的内部切片. 该轴长度不足 3 时不做处理.
fn open_faces(block: &mut Array3<u8>, axis: Axis) {
    let n = block.len_of(axis);
    if n < 3 {
        return;
    }
    for (face, interior) in [(0, 1), (n - 1, n - 2)] {
        let copy = block.index_axis(axis, interior).to_owned();
        block.index_axis_mut(axis, face).assign(&copy);
    }
}
