//! 错误类型.
//!
//! 交互过程中的异常情况 (越界点击, 直方图峰值不足, 生长结果为空等) 都在本地以默认值恢复,
//! 只记录警告日志. 只有下面两类情况会以 `Err` 形式返回给调用者.

use ndarray_npy::WriteNpyError;
use nifti::NiftiError;

/// 加载体数据时的错误.
#[derive(thiserror::Error, Debug)]
pub enum VolumeError {
    /// 体数据不是三维的, 某一维为空, 或者包含无法转换为数值的元素.
    #[error("invalid volume: {0}")]
    InvalidVolume(String),

    /// nifti 文件读取失败.
    #[error(transparent)]
    Nifti(#[from] NiftiError),
}

/// 写出分割结果时的错误.
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    /// nifti 文件写入失败.
    #[error(transparent)]
    Nifti(#[from] NiftiError),

    /// npy 文件写入失败.
    #[error(transparent)]
    Npy(#[from] WriteNpyError),

    /// 预览图写入失败.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// 其他 IO 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
