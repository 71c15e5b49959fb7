use std::path::Path;

use ndarray::{Array3, ArrayBase, ArrayView2, ArrayView3, Axis, Data, Dimension, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use num::ToPrimitive;

use crate::error::VolumeError;
use crate::Idx3d;

mod orientation;
mod save;

pub use orientation::Orientation;
pub(crate) use save::{write_info_npy, write_mask_nifti};
pub use save::{ImgWriteVis, OutputPaths, PlaneOverlay};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 原始 3D 体数据. 强度以 `f32` 保存, 轴顺序与 nifti 文件一致, 为 `(d0, d1, d2)`.
///
/// 加载后只读. 分割算法的所有输入都来自这里.
#[derive(Debug, Clone)]
pub struct Volume {
    header: Option<BoxedHeader>,
    data: Array3<f32>,
    spacing: [f64; 3],
}

impl Volume {
    /// 读取 nifti 文件.
    ///
    /// 第三维之后长度为 1 的维度 (例如单帧 4D 文件) 会被压缩掉.
    ///
    /// # 返回值
    ///
    /// 文件无法解析时返回 `VolumeError::Nifti`; 压缩后仍不是三维, 或某一维为空时返回
    /// `VolumeError::InvalidVolume`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VolumeError> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        let mut data = obj.into_volume().into_ndarray::<f32>()?;
        while data.ndim() > 3 && data.len_of(Axis(data.ndim() - 1)) == 1 {
            let last = Axis(data.ndim() - 1);
            data = data.index_axis_move(last, 0);
        }
        let data = data
            .into_dimensionality::<Ix3>()
            .map_err(|e| VolumeError::InvalidVolume(format!("expected a 3D volume: {e}")))?;
        check_extents(data.dim())?;

        // nifti 以 Fortran 顺序存放体素, 转成标准布局以便按切片连续访问.
        let data = data.as_standard_layout().into_owned();

        let [_, s0, s1, s2, ..] = header.pixdim;
        let spacing = [s0 as f64, s1 as f64, s2 as f64];
        log::info!(
            "loaded volume {:?} with spacing {:?} from {}",
            data.dim(),
            spacing,
            path.as_ref().display()
        );

        Ok(Self {
            header: Some(header),
            data,
            spacing,
        })
    }

    /// 由内存中的数组创建体数据. 元素可以是任意整数或浮点类型.
    ///
    /// 数组不是三维, 某一维为空, 或者有元素无法转换为 `f32` 时返回
    /// `VolumeError::InvalidVolume`.
    pub fn from_array<A, S, D>(array: &ArrayBase<S, D>, spacing: [f64; 3]) -> Result<Self, VolumeError>
    where
        A: ToPrimitive,
        S: Data<Elem = A>,
        D: Dimension,
    {
        let view = array
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| {
                VolumeError::InvalidVolume(format!("expected 3 axes, got {}", array.ndim()))
            })?;
        check_extents(view.dim())?;

        let mut data = Array3::<f32>::zeros(view.raw_dim());
        for (dst, src) in data.iter_mut().zip(view.iter()) {
            *dst = src
                .to_f32()
                .ok_or_else(|| VolumeError::InvalidVolume("non-numeric voxel value".to_string()))?;
        }

        Ok(Self {
            header: None,
            data,
            spacing,
        })
    }

    /// 原始强度.
    #[inline]
    pub fn data(&self) -> ArrayView3<f32> {
        self.data.view()
    }

    /// 数据形状 `(d0, d1, d2)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 体素间距, 与轴顺序一致.
    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// 从文件加载时的 header. 由数组创建的体数据没有 header.
    #[inline]
    pub fn header(&self) -> Option<&NiftiHeader> {
        self.header.as_deref()
    }

    /// 沿 `axis` 取第 `index` 个切片. 剩余两条轴保持原有的先后顺序.
    ///
    /// # 注意
    ///
    /// 如果越界则程序 panic.
    #[inline]
    pub fn plane(&self, axis: usize, index: usize) -> ArrayView2<f32> {
        self.data.index_axis(Axis(axis), index)
    }
}

fn check_extents((d0, d1, d2): Idx3d) -> Result<(), VolumeError> {
    if d0 == 0 || d1 == 0 || d2 == 0 {
        return Err(VolumeError::InvalidVolume(format!(
            "empty extent in shape ({d0}, {d1}, {d2})"
        )));
    }
    Ok(())
}
