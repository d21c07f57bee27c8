//! 三维感兴趣区域.

use ndarray::{s, ArrayView3, ArrayViewMut3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Idx3d;

/// 左闭右开的三维长方体区域 `[start, stop)`, 按 `(z, h, w)` 组织.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Roi {
    start: Idx3d,
    stop: Idx3d,
}

impl Roi {
    /// 构建区域.
    ///
    /// 任一维度上 `start > stop` 时返回 `None`. 允许空区域.
    pub fn new(start: Idx3d, stop: Idx3d) -> Option<Self> {
        let (a, b, c) = start;
        let (x, y, z) = stop;
        (a <= x && b <= y && c <= z).then_some(Self { start, stop })
    }

    /// 覆盖形状为 `shape` 的整个体数据的区域.
    #[inline]
    pub const fn full(shape: Idx3d) -> Self {
        Self {
            start: (0, 0, 0),
            stop: shape,
        }
    }

    /// 仅包含 `pos` 一个体素的区域.
    #[inline]
    pub const fn voxel((z, h, w): Idx3d) -> Self {
        Self {
            start: (z, h, w),
            stop: (z + 1, h + 1, w + 1),
        }
    }

    /// 起点 (包含).
    #[inline]
    pub fn start(&self) -> Idx3d {
        self.start
    }

    /// 终点 (不包含).
    #[inline]
    pub fn stop(&self) -> Idx3d {
        self.stop
    }

    /// 区域形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let (a, b, c) = self.start;
        let (x, y, z) = self.stop;
        (x - a, y - b, z - c)
    }

    /// 区域体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 区域是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// 区域是否完全落在形状为 `shape` 的体数据内?
    #[inline]
    pub fn fits(&self, (z, h, w): Idx3d) -> bool {
        let (x0, y0, z0) = self.stop;
        x0 <= z && y0 <= h && z0 <= w
    }

    /// 区域是否包含体素 `pos`?
    #[inline]
    pub fn contains(&self, (z, h, w): Idx3d) -> bool {
        let (a, b, c) = self.start;
        let (x, y, t) = self.stop;
        (a..x).contains(&z) && (b..y).contains(&h) && (c..t).contains(&w)
    }

    /// 将区域内的局部坐标转换为全局坐标.
    #[inline]
    pub fn to_global(&self, (z, h, w): Idx3d) -> Idx3d {
        let (a, b, c) = self.start;
        (a + z, b + h, c + w)
    }

    /// 截取 `a` 中本区域对应的视图.
    ///
    /// 当区域越界时 panic.
    #[inline]
    pub fn view_of<'a, T>(&self, a: ArrayView3<'a, T>) -> ArrayView3<'a, T> {
        let (a0, b0, c0) = self.start;
        let (a1, b1, c1) = self.stop;
        a.slice_move(s![a0..a1, b0..b1, c0..c1])
    }

    /// 截取 `a` 中本区域对应的可变视图.
    ///
    /// 当区域越界时 panic.
    #[inline]
    pub fn view_mut_of<'a, T>(&self, a: ArrayViewMut3<'a, T>) -> ArrayViewMut3<'a, T> {
        let (a0, b0, c0) = self.start;
        let (a1, b1, c1) = self.stop;
        a.slice_move(s![a0..a1, b0..b1, c0..c1])
    }
}

#[cfg(test)]
mod tests {
    use super::Roi;
    use ndarray::Array3;

    #[test]
    fn test_roi_init() {
        assert!(Roi::new((0, 0, 0), (1, 1, 1)).is_some());
        assert!(Roi::new((1, 1, 1), (1, 1, 1)).unwrap().is_empty());
        assert!(Roi::new((2, 0, 0), (1, 1, 1)).is_none());
    }

    #[test]
    fn test_roi_geometry() {
        let r = Roi::new((1, 2, 3), (3, 5, 4)).unwrap();
        assert_eq!(r.shape(), (2, 3, 1));
        assert_eq!(r.size(), 6);
        assert!(r.fits((3, 5, 4)));
        assert!(!r.fits((3, 4, 4)));
        assert!(r.contains((1, 2, 3)));
        assert!(r.contains((2, 4, 3)));
        assert!(!r.contains((3, 4, 3)));
        assert_eq!(r.to_global((1, 1, 0)), (2, 3, 3));
        assert_eq!(Roi::voxel((4, 5, 6)).shape(), (1, 1, 1));
    }

    #[test]
    fn test_roi_view() {
        let a = Array3::from_shape_fn((3, 3, 3), |(z, h, w)| z * 9 + h * 3 + w);
        let r = Roi::new((1, 1, 1), (3, 2, 3)).unwrap();
        let v = r.view_of(a.view());
        assert_eq!(v.shape(), &[2, 1, 2]);
        assert_eq!(v[(0, 0, 0)], 13);
        assert_eq!(v[(1, 0, 1)], 23);
    }
}
