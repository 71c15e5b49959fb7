//! 通用常量.

/// 可视化体积中, 分割结果与包围盒轮廓体素被覆盖成的高亮值.
pub const HIGHLIGHT: f32 = 32766.0;

/// 阈值估计时直方图的分箱个数.
pub const HISTOGRAM_BINS: usize = 50;

/// 直方图峰值不足两个时, 回退阈值参考的分箱边界索引 (大约位于直方图中部).
pub const FALLBACK_BIN_EDGE: usize = 26;

/// 默认阈值比例.
pub const DEFAULT_THRESHOLD_FRACTION: f64 = 0.5;

/// 分割信息记录 (`SegInfo`) 中各行的含义.
pub mod info_row {
    /// 种子点在宽度轴上的坐标.
    pub const SEED_WIDTH: usize = 0;

    /// 种子点在高度轴上的坐标.
    pub const SEED_HEIGHT: usize = 1;

    /// 平面内包围盒比例.
    pub const IN_PLANE: usize = 2;

    /// 穿过平面方向的包围盒比例.
    pub const THROUGH_PLANE: usize = 3;

    /// 阈值比例.
    pub const THRESHOLD: usize = 4;

    /// 总行数.
    pub const ROWS: usize = 5;
}

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道灰色.
    pub const GRAY: u8 = 0b_1000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;
}
