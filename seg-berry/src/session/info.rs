//! 分割信息记录.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::consts::info_row::*;
use crate::Idx3d;

/// 每次分割事件的来源信息, 按切片索引逐列存放.
///
/// 形状为 `(5, max(d0, d1, d2))`, 因此任一方向下的切片索引都能放下. 各行依次为:
/// 宽轴种子坐标, 高轴种子坐标, 平面内包围盒比例, 穿过平面包围盒比例, 阈值比例.
#[derive(Debug, Clone, PartialEq)]
pub struct SegInfo {
    data: Array2<f64>,
}

/// 一列记录.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct InfoColumn {
    pub seed_width: usize,
    pub seed_height: usize,
    pub in_plane: f64,
    pub through_plane: f64,
    pub threshold: f64,
}

impl SegInfo {
    /// 为形状为 `dims` 的体数据创建全零记录.
    pub fn new((d0, d1, d2): Idx3d) -> Self {
        Self {
            data: Array2::zeros((ROWS, d0.max(d1).max(d2))),
        }
    }

    /// 全部置零.
    pub fn reset(&mut self) {
        self.data.fill(0.0);
    }

    /// 覆盖第 `slice` 列. 越界时忽略.
    pub(crate) fn record(&mut self, slice: usize, column: InfoColumn) {
        if slice >= self.data.ncols() {
            log::warn!("slice {slice} has no provenance column");
            return;
        }
        let mut col = self.data.column_mut(slice);
        col[SEED_WIDTH] = column.seed_width as f64;
        col[SEED_HEIGHT] = column.seed_height as f64;
        col[IN_PLANE] = column.in_plane;
        col[THROUGH_PLANE] = column.through_plane;
        col[THRESHOLD] = column.threshold;
    }

    /// 第 `slice` 列.
    pub fn column(&self, slice: usize) -> Option<ArrayView1<f64>> {
        (slice < self.data.ncols()).then(|| self.data.index_axis(Axis(1), slice))
    }

    /// 有记录 (非全零) 的列索引.
    pub fn recorded_slices(&self) -> Vec<usize> {
        self.data
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(_, c)| c.iter().any(|&v| v != 0.0))
            .map(|(i, _)| i)
            .collect()
    }

    /// 原始数组视图.
    #[inline]
    pub fn data(&self) -> ArrayView2<f64> {
        self.data.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seg_info_record() {
        let mut info = SegInfo::new((5, 7, 9));
        assert_eq!(info.data().dim(), (5, 9));
        assert!(info.recorded_slices().is_empty());

        info.record(
            3,
            InfoColumn {
                seed_width: 2,
                seed_height: 6,
                in_plane: 0.2,
                through_plane: 0.4,
                threshold: 0.5,
            },
        );
        assert_eq!(info.column(3).unwrap().to_vec(), vec![2.0, 6.0, 0.2, 0.4, 0.5]);
        assert_eq!(info.recorded_slices(), vec![3]);

        // 越界列被忽略.
        info.record(
            9,
            InfoColumn {
                seed_width: 1,
                seed_height: 1,
                in_plane: 1.0,
                through_plane: 1.0,
                threshold: 1.0,
            },
        );
        assert!(info.column(9).is_none());
        assert_eq!(info.recorded_slices(), vec![3]);

        info.reset();
        assert!(info.recorded_slices().is_empty());
    }
}
