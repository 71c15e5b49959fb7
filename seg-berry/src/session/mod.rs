//! 交互式分割会话.
//!
//! 会话独占原始体数据, 可视化副本, 3D 掩码, 3D 轮廓和分割信息. 外部的显示组件只通过
//! 方法调用传入事件 (点击坐标, 参数), 并读取更新后的可视化体积.

use std::path::Path;

use ndarray::{Array3, ArrayBase, ArrayView, ArrayView2, ArrayView3, ArrayViewMut, Axis, Data, Dimension, Zip};

use crate::config::{sanitize_fraction, BoxFractions, SessionConfig};
use crate::data::{write_info_npy, write_mask_nifti};
use crate::error::{OutputError, VolumeError};
use crate::segment::{
    plan_box_2d, plan_box_3d, BoundingBox, BoxOutliner, RegionGrower, ThresholdEstimate,
    ThresholdEstimator,
};
use crate::{Idx3d, ImgWriteVis, Orientation, OutputPaths, PlaneOverlay, Volume};

mod info;

use info::InfoColumn;
pub use info::SegInfo;

/// 分割模式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SegmentMode {
    /// 只在当前切片上生长.
    #[default]
    Plane,

    /// 在种子周围的 3D 子体积上生长.
    Volume,
}

/// 会话状态.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionState {
    /// 尚未加载体数据.
    Empty,

    /// 已加载体数据, 尚未分割.
    Loaded,

    /// 至少完成过一次分割.
    Segmented,
}

/// 一次分割请求.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SegmentRequest {
    /// 显示平面上的行号. 第 0 行对应高轴的最大索引.
    pub row: usize,

    /// 显示平面上的列号.
    pub col: usize,

    /// 阈值比例, 限制在 `[0, 1]`. NaN 时使用配置中的默认值.
    pub threshold_fraction: f64,

    /// 分割模式.
    pub mode: SegmentMode,

    /// 是否叠加到已有结果上. 否则替换 (2D 替换当前切片, 3D 替换整个体积).
    pub accumulate: bool,
}

impl SegmentRequest {
    /// 以默认阈值比例, 2D 模式, 替换方式创建请求.
    pub fn new(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            threshold_fraction: crate::consts::DEFAULT_THRESHOLD_FRACTION,
            mode: SegmentMode::Plane,
            accumulate: false,
        }
    }

    /// 设置阈值比例.
    pub fn with_threshold_fraction(mut self, fraction: f64) -> Self {
        self.threshold_fraction = fraction;
        self
    }

    /// 设置分割模式.
    pub fn with_mode(mut self, mode: SegmentMode) -> Self {
        self.mode = mode;
        self
    }

    /// 设置是否叠加.
    pub fn with_accumulate(mut self, accumulate: bool) -> Self {
        self.accumulate = accumulate;
        self
    }
}

/// 实际使用的包围盒. 2D 时坐标为 `(宽, 高)`, 3D 时为体素索引.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SegmentRegion {
    /// 切片上的包围盒.
    Plane(BoundingBox<2>),

    /// 体数据中的包围盒.
    Volume(BoundingBox<3>),
}

/// 一次分割的结果摘要.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentReport {
    /// 种子体素.
    pub seed: Idx3d,

    /// 包围盒.
    pub region: SegmentRegion,

    /// 阈值估计.
    pub threshold: ThresholdEstimate,

    /// 本次生长得到的前景体素数.
    pub voxels: usize,
}

/// 会话使用的算法组件.
#[derive(Debug, Clone, Copy)]
struct Engine {
    estimator: ThresholdEstimator,
    grower: RegionGrower,
    outliner: BoxOutliner,
    highlight: f32,
}

impl Engine {
    fn new(config: &SessionConfig) -> Self {
        Self {
            estimator: ThresholdEstimator::new(config.histogram),
            grower: RegionGrower::new(config.growth),
            outliner: BoxOutliner::new(config.outline),
            highlight: config.highlight,
        }
    }
}

/// 一次分割所需的会话参数快照.
#[derive(Debug, Clone, Copy)]
struct Placement {
    orientation: Orientation,
    slice: usize,
    fractions: BoxFractions,
    threshold_fraction: f64,
    accumulate: bool,
}

impl Placement {
    fn info_column(&self, seed: Idx3d) -> InfoColumn {
        let seed = [seed.0, seed.1, seed.2];
        let (w_axis, h_axis) = self.orientation.in_plane_axes();
        InfoColumn {
            seed_width: seed[w_axis],
            seed_height: seed[h_axis],
            in_plane: self.fractions.in_plane,
            through_plane: self.fractions.through_plane,
            threshold: self.threshold_fraction,
        }
    }
}

/// 已加载体数据时会话持有的数组.
#[derive(Debug, Clone)]
struct Workspace {
    original: Volume,
    display: Array3<f32>,
    mask: Array3<u8>,
    outline: Array3<u8>,
    info: SegInfo,
    segmented: bool,
}

impl Workspace {
    fn new(original: Volume) -> Self {
        let dims = original.shape();
        Self {
            display: original.data().to_owned(),
            mask: Array3::zeros(dims),
            outline: Array3::zeros(dims),
            info: SegInfo::new(dims),
            segmented: false,
            original,
        }
    }

    /// 在当前切片上分割. 只改动该切片的掩码, 轮廓和可视化数据.
    fn segment_plane(&mut self, engine: &Engine, at: &Placement, seed: Idx3d) -> Option<SegmentReport> {
        let dims = self.original.shape();
        let axis = Axis(at.orientation.slice_axis());
        let (w_axis, h_axis) = at.orientation.in_plane_axes();
        let seed3 = [seed.0, seed.1, seed.2];
        let plane_seed = (seed3[w_axis], seed3[h_axis]);
        let extents = (at.orientation.width(dims), at.orientation.height(dims));

        let bbox = plan_box_2d(plane_seed, extents, at.fractions.in_plane);
        let [l0, l1] = bbox.to_local(&[plane_seed.0, plane_seed.1])?;
        let plane = self.original.plane(axis.index(), at.slice);
        let crop = bbox.crop(&plane);
        let threshold = engine.estimator.estimate(crop.iter().copied(), at.threshold_fraction);
        let grown = engine.grower.grow_2d(crop, (l0, l1), threshold.value);
        let outline = engine.outliner.outline_2d(extents, &bbox);

        let mut mask_plane = self.mask.index_axis_mut(axis, at.slice);
        if !at.accumulate {
            mask_plane.fill(0);
        }
        merge(bbox.crop_mut(&mut mask_plane), grown.view());

        let mut outline_plane = self.outline.index_axis_mut(axis, at.slice);
        if at.accumulate {
            merge(outline_plane.view_mut(), outline.view());
        } else {
            outline_plane.assign(&outline);
        }

        burn_in(
            self.display.index_axis_mut(axis, at.slice),
            plane,
            mask_plane.view(),
            outline_plane.view(),
            engine.highlight,
        );
        self.info.record(at.slice, at.info_column(seed));

        Some(SegmentReport {
            seed,
            region: SegmentRegion::Plane(bbox),
            threshold,
            voxels: count(&grown),
        })
    }

    /// 在种子周围的子体积上分割. 不叠加时整个掩码, 轮廓和分割信息都被替换.
    fn segment_volume(&mut self, engine: &Engine, at: &Placement, seed: Idx3d) -> Option<SegmentReport> {
        let dims = self.original.shape();
        let bbox = plan_box_3d(seed, dims, at.fractions, at.orientation);
        let [l0, l1, l2] = bbox.to_local(&[seed.0, seed.1, seed.2])?;
        let data = self.original.data();
        let crop = bbox.crop(&data);
        let threshold = engine.estimator.estimate(crop.iter().copied(), at.threshold_fraction);
        let grown = engine.grower.grow_3d(crop, (l0, l1, l2), threshold.value);
        let outline = engine.outliner.outline_3d(dims, &bbox, at.orientation);

        if !at.accumulate {
            self.mask.fill(0);
            self.info.reset();
        }
        merge(bbox.crop_mut(&mut self.mask), grown.view());
        if at.accumulate {
            merge(self.outline.view_mut(), outline.view());
        } else {
            self.outline = outline;
        }

        burn_in(
            self.display.view_mut(),
            data,
            self.mask.view(),
            self.outline.view(),
            engine.highlight,
        );
        self.info.record(at.slice, at.info_column(seed));

        Some(SegmentReport {
            seed,
            region: SegmentRegion::Volume(bbox),
            threshold,
            voxels: count(&grown),
        })
    }
}

/// `dst |= src`.
fn merge<D: Dimension>(mut dst: ArrayViewMut<u8, D>, src: ArrayView<u8, D>) {
    Zip::from(&mut dst).and(&src).for_each(|d, &s| *d |= s);
}

fn count<S: Data<Elem = u8>, D: Dimension>(mask: &ArrayBase<S, D>) -> usize {
    mask.iter().filter(|&&v| v > 0).count()
}

/// 重新生成可视化数据: 掩码或轮廓处为高亮值, 其余为原始强度.
fn burn_in<D: Dimension>(
    display: ArrayViewMut<f32, D>,
    original: ArrayView<f32, D>,
    mask: ArrayView<u8, D>,
    outline: ArrayView<u8, D>,
    highlight: f32,
) {
    let zip = Zip::from(display).and(original).and(mask).and(outline);
    let paint = |d: &mut f32, &o: &f32, &m: &u8, &e: &u8| {
        *d = if m > 0 || e > 0 { highlight } else { o };
    };
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            zip.par_for_each(paint);
        } else {
            zip.for_each(paint);
        }
    }
}

/// 交互式分割会话. 状态依次为 `Empty`, `Loaded`, `Segmented`.
///
/// 所有查询在没有加载体数据时都返回 0 或 `None`, 不会 panic.
#[derive(Debug, Clone)]
pub struct SegmentationSession {
    config: SessionConfig,
    engine: Engine,
    fractions: BoxFractions,
    orientation: Orientation,
    current_slice: usize,
    workspace: Option<Workspace>,
}

impl Default for SegmentationSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SegmentationSession {
    /// 以给定参数创建空会话.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            engine: Engine::new(&config),
            fractions: BoxFractions::new(config.fractions.in_plane, config.fractions.through_plane),
            orientation: Orientation::default(),
            current_slice: 0,
            workspace: None,
            config,
        }
    }

    /// 会话参数.
    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 当前状态.
    pub fn state(&self) -> SessionState {
        match &self.workspace {
            None => SessionState::Empty,
            Some(ws) if ws.segmented => SessionState::Segmented,
            Some(_) => SessionState::Loaded,
        }
    }

    /// 加载体数据. 掩码, 轮廓和分割信息清零, 方向恢复为默认值, 当前切片置于中部.
    pub fn load_volume(&mut self, volume: Volume) {
        log::info!("session loaded volume {:?}", volume.shape());
        self.workspace = Some(Workspace::new(volume));
        self.orientation = Orientation::default();
        self.current_slice = self.slice_count() / 2;
    }

    /// 由内存数组加载体数据.
    pub fn load_array<A, S, D>(&mut self, array: &ArrayBase<S, D>, spacing: [f64; 3]) -> Result<(), VolumeError>
    where
        A: num::ToPrimitive,
        S: Data<Elem = A>,
        D: Dimension,
    {
        self.load_volume(Volume::from_array(array, spacing)?);
        Ok(())
    }

    /// 由 nifti 文件加载体数据.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), VolumeError> {
        self.load_volume(Volume::open(path)?);
        Ok(())
    }

    /// 体数据形状. 未加载时为 `(0, 0, 0)`.
    #[inline]
    pub fn dims(&self) -> Idx3d {
        self.workspace
            .as_ref()
            .map_or((0, 0, 0), |ws| ws.original.shape())
    }

    /// 当前方向.
    #[inline]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// 切换方向, 当前切片移到新切片轴的中部.
    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
        self.current_slice = self.slice_count() / 2;
    }

    /// 以方向码切换方向. 未知方向码回退为 `Yz`.
    pub fn set_orientation_code(&mut self, code: i32) {
        self.set_orientation(Orientation::from_code(code));
    }

    /// 当前方向下的切片宽度.
    #[inline]
    pub fn width(&self) -> usize {
        self.orientation.width(self.dims())
    }

    /// 当前方向下的切片高度.
    #[inline]
    pub fn height(&self) -> usize {
        self.orientation.height(self.dims())
    }

    /// 当前方向下的切片个数.
    #[inline]
    pub fn slice_count(&self) -> usize {
        self.orientation.slice_count(self.dims())
    }

    /// 当前方向下切片索引的合法范围.
    #[inline]
    pub fn slice_bounds(&self) -> Option<(usize, usize)> {
        self.orientation.slice_bounds(self.dims())
    }

    /// 当前切片索引.
    #[inline]
    pub fn current_slice(&self) -> usize {
        self.current_slice
    }

    /// 切换到第 `index` 个切片. 越界时保持不变并返回 `false`.
    pub fn set_slice(&mut self, index: usize) -> bool {
        if index < self.slice_count() {
            self.current_slice = index;
            true
        } else {
            log::warn!("slice {index} is outside [0, {})", self.slice_count());
            false
        }
    }

    /// 当前包围盒比例.
    #[inline]
    pub fn box_fractions(&self) -> BoxFractions {
        self.fractions
    }

    /// 设置包围盒比例. 不在 `(0, 1]` 内的值替换为 `1.0`.
    pub fn set_box_fractions(&mut self, in_plane: f64, through_plane: f64) {
        self.fractions = BoxFractions {
            in_plane: sanitize_fraction(in_plane),
            through_plane: sanitize_fraction(through_plane),
        };
    }

    /// 在显示平面 `(row, col)` 处点击分割. 见 [`SegmentationSession::segment`].
    pub fn segment_at(
        &mut self,
        row: usize,
        col: usize,
        threshold_fraction: f64,
        mode: SegmentMode,
    ) -> Option<SegmentReport> {
        self.segment(
            SegmentRequest::new(row, col)
                .with_threshold_fraction(threshold_fraction)
                .with_mode(mode),
        )
    }

    /// 执行一次分割.
    ///
    /// # 返回值
    ///
    /// 未加载体数据或点击越界时不做任何改动, 返回 `None` 并记录警告.
    /// 生长结果为空时仍然返回摘要, 且分割信息照常记录.
    pub fn segment(&mut self, request: SegmentRequest) -> Option<SegmentReport> {
        let Some(ws) = self.workspace.as_mut() else {
            log::warn!("no volume loaded, ignoring click at ({}, {})", request.row, request.col);
            return None;
        };
        let dims = ws.original.shape();
        let Some(seed) =
            self.orientation
                .resolve_click(request.row, request.col, self.current_slice, dims)
        else {
            log::warn!(
                "click ({}, {}) on slice {} is outside the {:?} view of {dims:?}",
                request.row,
                request.col,
                self.current_slice,
                self.orientation
            );
            return None;
        };

        let threshold_fraction = if request.threshold_fraction.is_nan() {
            self.config.default_threshold_fraction
        } else {
            request.threshold_fraction.clamp(0.0, 1.0)
        };
        let at = Placement {
            orientation: self.orientation,
            slice: self.current_slice,
            fractions: self.fractions,
            threshold_fraction,
            accumulate: request.accumulate,
        };

        let report = match request.mode {
            SegmentMode::Plane => ws.segment_plane(&self.engine, &at, seed),
            SegmentMode::Volume => ws.segment_volume(&self.engine, &at, seed),
        }?;
        ws.segmented = true;
        log::info!(
            "{:?} segmentation from {:?}: threshold {:.3} ({:?}), {} voxels",
            request.mode,
            seed,
            report.threshold.value,
            report.threshold.policy,
            report.voxels
        );
        Some(report)
    }

    /// 原始体数据.
    #[inline]
    pub fn volume(&self) -> Option<&Volume> {
        self.workspace.as_ref().map(|ws| &ws.original)
    }

    /// 可视化体积: 原始强度, 掩码与轮廓处为高亮值.
    #[inline]
    pub fn display(&self) -> Option<ArrayView3<f32>> {
        self.workspace.as_ref().map(|ws| ws.display.view())
    }

    /// 当前方向与切片下的可视化平面, 按 `[宽, 高]` 索引.
    pub fn display_slice(&self) -> Option<ArrayView2<f32>> {
        let axis = Axis(self.orientation.slice_axis());
        self.workspace
            .as_ref()
            .map(|ws| ws.display.index_axis(axis, self.current_slice))
    }

    /// 3D 分割掩码.
    #[inline]
    pub fn mask(&self) -> Option<ArrayView3<u8>> {
        self.workspace.as_ref().map(|ws| ws.mask.view())
    }

    /// 3D 包围盒轮廓.
    #[inline]
    pub fn outline(&self) -> Option<ArrayView3<u8>> {
        self.workspace.as_ref().map(|ws| ws.outline.view())
    }

    /// 分割信息.
    #[inline]
    pub fn info(&self) -> Option<&SegInfo> {
        self.workspace.as_ref().map(|ws| &ws.info)
    }

    /// 写出 `{prefix}_seg.nii`, `{prefix}_segBox.nii`, `{prefix}_segInfo.npy`.
    ///
    /// # 返回值
    ///
    /// 尚未分割时什么也不写, 返回 `Ok(None)` 并记录警告.
    pub fn write_outputs<P: AsRef<Path>>(&self, prefix: P) -> Result<Option<OutputPaths>, OutputError> {
        let Some(ws) = self.workspace.as_ref().filter(|ws| ws.segmented) else {
            log::warn!("nothing has been segmented, no output written");
            return Ok(None);
        };

        let paths = OutputPaths::from_prefix(prefix);
        if let Some(parent) = paths.mask.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let (header, spacing) = (ws.original.header(), ws.original.spacing());
        write_mask_nifti(&paths.mask, &ws.mask, header, spacing)?;
        write_mask_nifti(&paths.outline, &ws.outline, header, spacing)?;
        write_info_npy(&paths.info, ws.info.data())?;

        log::info!("wrote {}, {}, {}", paths.mask.display(), paths.outline.display(), paths.info.display());
        Ok(Some(paths))
    }

    /// 把当前切片的掩码与轮廓保存为灰度 PNG 预览. 未加载体数据时返回 `Ok(false)`.
    pub fn save_slice_preview<P: AsRef<Path>>(&self, path: P) -> Result<bool, OutputError> {
        let Some(ws) = self.workspace.as_ref() else {
            return Ok(false);
        };
        let axis = Axis(self.orientation.slice_axis());
        PlaneOverlay::new(
            ws.mask.index_axis(axis, self.current_slice),
            ws.outline.index_axis(axis, self.current_slice),
        )
        .save(path)?;
        Ok(true)
    }
}
