//! 运行时错误.

use std::fmt;

use crate::roi::Roi;
use crate::Idx3d;

/// carving 状态操作的运行时错误.
#[derive(Debug)]
pub enum CarvingError {
    /// 尚未加载超体素图.
    GraphNotLoaded,

    /// 没有该名称的已保存目标.
    ObjectNotFound(String),

    /// 感兴趣区域超出体数据范围. 第二个参数为体数据形状.
    RoiOutOfBound(Roi, Idx3d),

    /// 写入数据形状与感兴趣区域不一致. `(期望, 实际)`.
    ShapeMismatch(Idx3d, Idx3d),

    /// 图资源内容不合法, 例如查找表长度与节点个数不符.
    InvalidGraph(String),

    /// 底层 I/O 错误.
    Io(std::io::Error),

    /// 序列化/反序列化错误.
    Encode(bincode::Error),

    /// 读取 npy/npz 文件错误.
    Npz(String),
}

impl fmt::Display for CarvingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GraphNotLoaded => write!(f, "supervoxel graph is not loaded"),
            Self::ObjectNotFound(name) => write!(f, "object {name:?} not found"),
            Self::RoiOutOfBound(roi, shape) => {
                write!(f, "roi {roi:?} is out of volume bound {shape:?}")
            }
            Self::ShapeMismatch(expected, actual) => {
                write!(f, "expected data of shape {expected:?}, got {actual:?}")
            }
            Self::InvalidGraph(why) => write!(f, "invalid graph resource: {why}"),
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::Encode(e) => write!(f, "encoding error: {e}"),
            Self::Npz(e) => write!(f, "npz error: {e}"),
        }
    }
}

impl std::error::Error for CarvingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CarvingError {
    #[inline]
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<bincode::Error> for CarvingError {
    #[inline]
    fn from(e: bincode::Error) -> Self {
        Self::Encode(e)
    }
}

/// carving 运行时结果.
pub type CarvingResult<T> = Result<T, CarvingError>;
