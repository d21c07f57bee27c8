use std::collections::BTreeMap;

use ndarray::{ArrayView3, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::SupervoxelId;

/// 超体素区域邻接图.
///
/// 每条无向边 `(a, b)` 满足 `a < b`, 按字典序存储. 边权默认为两个超体素之间
/// 共享的体素面个数.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Adjacency {
    edges: Vec<(SupervoxelId, SupervoxelId)>,
    weights: Vec<f32>,
}

impl Adjacency {
    /// 从六邻域接触关系构建邻接图.
    pub fn from_region_volume(region: ArrayView3<'_, SupervoxelId>) -> Self {
        let mut faces = BTreeMap::<(SupervoxelId, SupervoxelId), u32>::new();
        for axis in 0..3 {
            let n = region.len_of(Axis(axis));
            if n < 2 {
                continue;
            }
            for i in 0..n - 1 {
                let lo = region.index_axis(Axis(axis), i);
                let hi = region.index_axis(Axis(axis), i + 1);
                for (&a, &b) in lo.iter().zip(hi.iter()) {
                    if a != b {
                        *faces.entry((a.min(b), a.max(b))).or_default() += 1;
                    }
                }
            }
        }
        let (edges, weights) = faces.into_iter().map(|(e, w)| (e, w as f32)).unzip();
        Self { edges, weights }
    }

    /// 直接由边和边权构建. 两者长度不一致, 或存在自环时返回 `None`.
    pub fn from_parts(
        edges: Vec<(SupervoxelId, SupervoxelId)>,
        weights: Vec<f32>,
    ) -> Option<Self> {
        if edges.len() != weights.len() || edges.iter().any(|(a, b)| a == b) {
            return None;
        }
        let mut pairs: Vec<_> = edges
            .into_iter()
            .map(|(a, b)| (a.min(b), a.max(b)))
            .zip(weights)
            .collect();
        pairs.sort_by(|x, y| x.0.cmp(&y.0));
        pairs.dedup_by(|x, y| x.0 == y.0);
        let (edges, weights) = pairs.into_iter().unzip();
        Some(Self { edges, weights })
    }

    /// 所有边.
    #[inline]
    pub fn edges(&self) -> &[(SupervoxelId, SupervoxelId)] {
        &self.edges
    }

    /// 所有边权, 与 [`Adjacency::edges`] 一一对应.
    #[inline]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// 边数.
    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// 是否没有边.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// 节点 `node` 的所有邻居及对应边权.
    pub fn neighbours(&self, node: SupervoxelId) -> impl Iterator<Item = (SupervoxelId, f32)> + '_ {
        self.edges
            .iter()
            .zip(self.weights.iter())
            .filter_map(move |(&(a, b), &w)| {
                if node == a {
                    Some((b, w))
                } else if node == b {
                    Some((a, w))
                } else {
                    None
                }
            })
    }

    /// 节点编号的最大值. 没有边时返回 `None`.
    pub fn max_node(&self) -> Option<SupervoxelId> {
        self.edges.iter().map(|&(_, b)| b).max()
    }
}

#[cfg(test)]
mod tests {
    use super::Adjacency;
    use ndarray::Array3;

    #[test]
    fn test_adjacency_from_volume() {
        // 一层 2x3: [[0, 0, 1], [2, 2, 1]]
        let v = Array3::from_shape_vec((1, 2, 3), vec![0, 0, 1, 2, 2, 1]).unwrap();
        let adj = Adjacency::from_region_volume(v.view());
        assert_eq!(adj.edges(), &[(0, 1), (0, 2), (1, 2)]);
        assert_eq!(adj.weights(), &[1.0, 2.0, 1.0]);
        let mut n: Vec<_> = adj.neighbours(2).map(|(n, _)| n).collect();
        n.sort();
        assert_eq!(n, vec![0, 1]);
        assert_eq!(adj.max_node(), Some(2));
    }

    #[test]
    fn test_adjacency_single_region() {
        let v = Array3::<u32>::from_elem((2, 2, 2), 7);
        assert!(Adjacency::from_region_volume(v.view()).is_empty());
    }

    #[test]
    fn test_adjacency_from_parts() {
        assert!(Adjacency::from_parts(vec![(1, 1)], vec![1.0]).is_none());
        assert!(Adjacency::from_parts(vec![(0, 1)], vec![]).is_none());
        let adj = Adjacency::from_parts(vec![(3, 1), (1, 3), (0, 2)], vec![0.5, 0.7, 1.0]).unwrap();
        assert_eq!(adj.edges(), &[(0, 2), (1, 3)]);
        assert_eq!(adj.weights(), &[1.0, 0.5]);
    }
}
