//! 分割结果的持久化存储.

use std::path::{Path, PathBuf};

use image::ImageResult;
use ndarray::{Array3, ArrayView2};
use ndarray_npy::write_npy;
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;

use crate::consts::gray::*;
use crate::error::OutputError;

/// 一次 `write_outputs` 写出的三个文件.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// 分割掩码, `{prefix}_seg.nii`.
    pub mask: PathBuf,

    /// 包围盒轮廓, `{prefix}_segBox.nii`.
    pub outline: PathBuf,

    /// 分割信息, `{prefix}_segInfo.npy`.
    pub info: PathBuf,
}

impl OutputPaths {
    /// 在前缀后追加固定后缀得到三个文件名. 前缀本身可以带目录.
    pub fn from_prefix<P: AsRef<Path>>(prefix: P) -> Self {
        let with_suffix = |suffix: &str| {
            let mut name = prefix.as_ref().as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        };
        Self {
            mask: with_suffix("_seg.nii"),
            outline: with_suffix("_segBox.nii"),
            info: with_suffix("_segInfo.npy"),
        }
    }
}

/// 以 `reference` 为模板写出 `u8` 掩码. 没有模板时按 `spacing` 构造一个.
///
/// 掩码是 0/1 值, 因此强制去掉模板里的强度缩放.
pub(crate) fn write_mask_nifti(
    path: &Path,
    data: &Array3<u8>,
    reference: Option<&NiftiHeader>,
    spacing: [f64; 3],
) -> Result<(), OutputError> {
    let mut header = match reference {
        Some(h) => h.clone(),
        None => {
            let mut h = NiftiHeader::default();
            h.pixdim = [
                1.0,
                spacing[0] as f32,
                spacing[1] as f32,
                spacing[2] as f32,
                1.0,
                1.0,
                1.0,
                1.0,
            ];
            h
        }
    };
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;

    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(data)?;
    Ok(())
}

/// 写出分割信息.
pub(crate) fn write_info_npy(path: &Path, info: ArrayView2<f64>) -> Result<(), OutputError> {
    write_npy(path, &info)?;
    Ok(())
}

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 单个切片上的掩码与轮廓叠加. 两者都按 `[宽, 高]` 索引.
#[derive(Debug, Clone, Copy)]
pub struct PlaneOverlay<'a> {
    mask: ArrayView2<'a, u8>,
    outline: ArrayView2<'a, u8>,
}

impl<'a> PlaneOverlay<'a> {
    /// 创建叠加视图.
    ///
    /// # 注意
    ///
    /// 两者形状必须一致, 否则程序 panic.
    pub fn new(mask: ArrayView2<'a, u8>, outline: ArrayView2<'a, u8>) -> Self {
        assert_eq!(mask.dim(), outline.dim());
        Self { mask, outline }
    }
}

/// 使像素更有利于单通道可视化. 轮廓优先于掩码.
#[inline]
fn pretty(mask: u8, outline: u8) -> u8 {
    match (mask, outline) {
        (_, o) if o > 0 => GRAY,
        (m, _) if m > 0 => WHITE,
        _ => BLACK,
    }
}

/// 背景/掩码/轮廓分别映射为黑色/白色/灰色. 图像第 0 行对应高轴的最大索引.
impl ImgWriteVis for PlaneOverlay<'_> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (width, height) = self.mask.dim();
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for ((w, h), &m) in self.mask.indexed_iter() {
            let row = height - 1 - h;
            buf.put_pixel(w as u32, row as u32, image::Luma([pretty(m, self.outline[[w, h]])]));
        }
        buf.save(path)
    }
}
