//! 基于直方图峰值的阈值估计.
//!
//! 假设包围盒内的强度分布大致为双峰 (背景与结构). 阈值是 "主峰到第一个峰" 的强度差
//! 乘以用户给定的比例, 作为从 0 开始生长时的上界.

use ordered_float::OrderedFloat;

use crate::config::HistogramParams;

/// 等宽直方图. `edges.len() == counts.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    counts: Vec<u64>,
    edges: Vec<f64>,
}

impl Histogram {
    /// 在 `[0, max]` 上统计 `bins` 个等宽分箱, `max` 为有限值的最大值.
    ///
    /// 区间外的值忽略, 最后一个分箱为闭区间. 若 `max <= 0` 则区间退化为 `[-0.5, 0.5]`.
    /// 非有限值 (NaN, inf) 不参与统计.
    ///
    /// # 注意
    ///
    /// `bins` 为 0 时程序 panic.
    pub fn from_values<I>(values: I, bins: usize) -> Self
    where
        I: IntoIterator<Item = f32> + Clone,
    {
        assert!(bins > 0, "histogram needs at least one bin");
        let max = values
            .clone()
            .into_iter()
            .filter(|v| v.is_finite())
            .map(OrderedFloat)
            .max()
            .map_or(0.0, |m| m.0 as f64);

        let (first, last) = if max <= 0.0 { (-0.5, 0.5) } else { (0.0, max) };
        let width = (last - first) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| first + i as f64 * width).collect();

        let mut counts = vec![0u64; bins];
        let norm = bins as f64 / (last - first);
        for v in values.into_iter().filter(|v| v.is_finite()) {
            let v = v as f64;
            if v < first || v > last {
                continue;
            }
            let idx = (((v - first) * norm) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Self { counts, edges }
    }

    /// 分箱计数.
    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// 分箱边界.
    #[inline]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// 局部峰值, 按位置升序.
    ///
    /// 直方图两端之外视为计数 0. 一个峰值是严格高于两侧的 (可能等高的) 一段连续分箱,
    /// 报告为这一段的中点 (偶数长度时取偏左者).
    pub fn peaks(&self) -> Vec<usize> {
        let c = &self.counts;
        let n = c.len();
        let at = |i: isize| -> u64 {
            if i < 0 || i as usize >= n {
                0
            } else {
                c[i as usize]
            }
        };

        let mut peaks = vec![];
        let mut i = 0usize;
        while i < n {
            // 等高平台 [i, j].
            let mut j = i;
            while j + 1 < n && c[j + 1] == c[i] {
                j += 1;
            }
            if c[i] > at(i as isize - 1) && c[i] > at(j as isize + 1) {
                peaks.push((i + j) / 2);
            }
            i = j + 1;
        }
        peaks
    }
}

/// 阈值由哪条规则得出.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakPolicy {
    /// 峰值过多, 先丢弃了 `dropped` 个计数最低的峰值, 再取主峰.
    Pruned {
        /// 丢弃的峰值个数.
        dropped: usize,
    },

    /// 多于两个峰值, 取第一个峰之后计数最大的峰.
    Dominant,

    /// 恰好两个峰值.
    Pair,

    /// 峰值不足两个, 使用固定分箱边界. 这只是一个粗略的猜测.
    Fallback,
}

/// 一次阈值估计的结果.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdEstimate {
    /// 阈值 (强度上界).
    pub value: f64,

    /// 使用的规则.
    pub policy: PeakPolicy,

    /// 实际参与计算的峰值位置 (丢弃之后).
    pub peaks: Vec<usize>,
}

impl ThresholdEstimate {
    /// 是否走了回退规则.
    #[inline]
    pub fn is_rough_guess(&self) -> bool {
        self.policy == PeakPolicy::Fallback
    }
}

/// 阈值估计器.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdEstimator {
    params: HistogramParams,
}

impl ThresholdEstimator {
    /// 以给定参数创建.
    ///
    /// `prune_ratio` 不在 `[0, 1)` 内 (包括 NaN) 时替换成默认值.
    pub fn new(mut params: HistogramParams) -> Self {
        if !(0.0..1.0).contains(&params.prune_ratio) {
            let ratio = HistogramParams::default().prune_ratio;
            log::warn!(
                "prune ratio {} is outside [0, 1), using {ratio}",
                params.prune_ratio
            );
            params.prune_ratio = ratio;
        }
        Self { params }
    }

    /// 由裁剪区域的原始强度 `values` 估计阈值.
    pub fn estimate<I>(&self, values: I, fraction: f64) -> ThresholdEstimate
    where
        I: IntoIterator<Item = f32> + Clone,
    {
        let hist = Histogram::from_values(values, self.params.bins.max(1));
        self.estimate_from_histogram(&hist, fraction)
    }

    /// 由已有直方图估计阈值.
    pub fn estimate_from_histogram(&self, hist: &Histogram, fraction: f64) -> ThresholdEstimate {
        let edges = hist.edges();
        let counts = hist.counts();
        let mut peaks = hist.peaks();
        let k = peaks.len();

        let mut policy = match k {
            0 | 1 => PeakPolicy::Fallback,
            2 => PeakPolicy::Pair,
            _ => PeakPolicy::Dominant,
        };

        if k > self.params.prune_above && k > 2 {
            // 至少保留两个峰值.
            let dropped = ((self.params.prune_ratio * k as f64).floor() as usize).min(k - 2);
            // 按计数升序 (同计数时位置靠前者先丢) 选出要丢弃的峰值, 剩余峰值保持位置顺序.
            let mut by_count = peaks.clone();
            by_count.sort_by_key(|&p| counts[p]);
            let dropped_set = &by_count[..dropped];
            peaks.retain(|p| !dropped_set.contains(p));
            policy = PeakPolicy::Pruned { dropped };
        }

        let value = match policy {
            PeakPolicy::Fallback => {
                let edge = edges[self.params.fallback_edge.min(edges.len() - 1)];
                log::warn!(
                    "found {k} histogram peak(s), threshold is a rough guess from bin edge {}",
                    self.params.fallback_edge
                );
                fraction * edge
            }
            PeakPolicy::Pair => fraction * (edges[peaks[1]] - edges[peaks[0]]),
            PeakPolicy::Dominant | PeakPolicy::Pruned { .. } => {
                let first = peaks[0];
                let dominant = dominant_after_first(&peaks, counts).unwrap_or(first);
                fraction * (edges[dominant] - edges[first])
            }
        };

        log::debug!("threshold {value} from peaks {peaks:?} ({policy:?})");
        ThresholdEstimate {
            value,
            policy,
            peaks,
        }
    }
}

/// `peaks[1..]` 中计数最大的峰值. 计数相同时取位置靠前者.
fn dominant_after_first(peaks: &[usize], counts: &[u64]) -> Option<usize> {
    peaks
        .iter()
        .skip(1)
        .copied()
        .fold(None, |best: Option<usize>, p| match best {
            Some(b) if counts[b] >= counts[p] => Some(b),
            _ => Some(p),
        })
}
