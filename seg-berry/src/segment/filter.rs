//! 维度泛型的逐 lane 滤波与二值形态学.
//!
//! 所有可分离操作都拆成沿每条轴的一维 lane 变换. 打开 `rayon` feature 时 lane 之间并行,
//! 结果与串行完全一致.

use ndarray::{Array, ArrayView, ArrayView1, ArrayViewMut1, Axis, Dimension, Zip};

/// 沿 `axis` 对每条 lane 做一维变换, 结果写入同形状的新数组.
pub(crate) fn map_lanes<A, B, D, F>(src: ArrayView<A, D>, axis: Axis, op: F) -> Array<B, D>
where
    A: Sync,
    B: Clone + Default + Send,
    D: Dimension,
    F: Fn(ArrayView1<A>, ArrayViewMut1<B>) + Sync + Send,
{
    let mut dst = Array::<B, D>::default(src.raw_dim());
    let zip = Zip::from(src.lanes(axis)).and(dst.lanes_mut(axis));
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            zip.par_for_each(|s, d| op(s, d));
        } else {
            zip.for_each(|s, d| op(s, d));
        }
    }
    dst
}

/// `idx` 沿 `axis` 移动 `delta` 后的索引. 越界时返回 `None`.
#[inline]
pub(crate) fn neighbour<D: Dimension>(idx: &D, axis: usize, delta: isize, shape: &[usize]) -> Option<D> {
    let moved = idx[axis].checked_add_signed(delta)?;
    if moved >= shape[axis] {
        return None;
    }
    let mut next = idx.clone();
    next[axis] = moved;
    Some(next)
}

/// 把 `i` 限制在 `[0, n)` 内, 即边界复制.
#[inline]
fn clamp_index(i: isize, n: usize) -> usize {
    i.clamp(0, n as isize - 1) as usize
}

/// 每个体素 `(2r+1)^d` 邻域内的前景个数. 边界按复制处理.
pub(crate) fn box_count<D: Dimension>(mask: ArrayView<u8, D>, radius: usize) -> Array<u32, D> {
    let r = radius as isize;
    let mut acc = mask.mapv(|v| (v > 0) as u32);
    for axis in 0..mask.ndim() {
        acc = map_lanes(acc.view(), Axis(axis), |s, mut d| {
            let n = s.len();
            for i in 0..n {
                let c = i as isize;
                d[i] = (c - r..=c + r).map(|k| s[clamp_index(k, n)]).sum();
            }
        });
    }
    acc
}

/// 投票式孔洞填充, 单次迭代.
///
/// 背景体素的 `(2r+1)^d` 邻域中前景个数不少于 `(邻域大小 - 1) / 2 + majority` 时变为前景.
/// 前景体素保持不变.
pub(crate) fn hole_fill<D: Dimension>(mask: ArrayView<u8, D>, radius: usize, majority: usize) -> Array<u8, D> {
    let window = (2 * radius + 1).pow(mask.ndim() as u32);
    let birth = (window - 1) / 2 + majority;
    let counts = box_count(mask.view(), radius);

    let mut out = Array::<u8, D>::zeros(mask.raw_dim());
    Zip::from(&mut out)
        .and(&mask)
        .and(&counts)
        .for_each(|o, &m, &c| *o = (m > 0 || c as usize >= birth) as u8);
    out
}

/// 以半径 1 的菱形 (只含面相邻体素) 做一次腐蚀或膨胀.
///
/// 腐蚀时数组外视为前景, 膨胀时数组外视为背景.
fn cross_step<D: Dimension>(mask: ArrayView<u8, D>, erode: bool) -> Array<u8, D> {
    let outside = erode as u8;
    let mut out = mask.mapv(|v| (v > 0) as u8);
    for axis in 0..mask.ndim() {
        let along = map_lanes(mask.view(), Axis(axis), |s, mut d| {
            let n = s.len();
            for i in 0..n {
                let prev = if i == 0 { outside } else { (s[i - 1] > 0) as u8 };
                let next = if i + 1 == n { outside } else { (s[i + 1] > 0) as u8 };
                let cur = (s[i] > 0) as u8;
                d[i] = if erode { prev & cur & next } else { prev | cur | next };
            }
        });
        Zip::from(&mut out)
            .and(&along)
            .for_each(|o, &a| *o = if erode { *o & a } else { *o | a });
    }
    out
}

/// 以半径 `radius` 的菱形结构元做二值开运算 (先腐蚀后膨胀).
pub(crate) fn open_diamond<D: Dimension>(mask: ArrayView<u8, D>, radius: usize) -> Array<u8, D> {
    let mut out = mask.mapv(|v| (v > 0) as u8);
    for _ in 0..radius {
        out = cross_step(out.view(), true);
    }
    for _ in 0..radius {
        out = cross_step(out.view(), false);
    }
    out
}

/// 可分离高斯平滑. 核半径为 `ceil(3 sigma)`, 边界复制.
pub(crate) fn gaussian<D: Dimension>(src: ArrayView<f64, D>, variance: f64) -> Array<f64, D> {
    if variance <= 0.0 || !variance.is_finite() {
        return src.to_owned();
    }
    let sigma = variance.sqrt();
    let radius = (3.0 * sigma).ceil() as isize;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|k| (-((k * k) as f64) / (2.0 * variance)).exp())
        .collect();
    let total: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= total);

    let mut acc = src.to_owned();
    for axis in 0..src.ndim() {
        acc = map_lanes(acc.view(), Axis(axis), |s, mut d| {
            let n = s.len();
            for i in 0..n {
                let c = i as isize;
                d[i] = kernel
                    .iter()
                    .zip(-radius..=radius)
                    .map(|(w, k)| w * s[clamp_index(c + k, n)])
                    .sum();
            }
        });
    }
    acc
}

/// 沿 `axis` 的中心差分, 边界复制.
pub(crate) fn gradient<D: Dimension>(src: ArrayView<f64, D>, axis: Axis) -> Array<f64, D> {
    map_lanes(src, axis, |s, mut d| {
        let n = s.len();
        for i in 0..n {
            let c = i as isize;
            d[i] = (s[clamp_index(c + 1, n)] - s[clamp_index(c - 1, n)]) / 2.0;
        }
    })
}
