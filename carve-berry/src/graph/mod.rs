//! 超体素图资源.
//!
//! 外部分割引擎的契约由 [`SegmentationEngine`] 描述: 一个区域体 (每个体素的超体素
//! 编号), 节点个数, 三张按超体素编号索引的查找表 (`segmentation`, `objects`,
//! `seeds`), 以及一次求解调用. [`SupervoxelGraph`] 是该契约的默认实现,
//! 其求解步骤委托给可替换的 [`Solver`].

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Zip};

use crate::consts::label;
use crate::error::{CarvingError, CarvingResult};
use crate::roi::Roi;
use crate::solver::{SeedOnly, SolveInput, SolveParams, Solver};
use crate::{Idx3d, ObjectNumber, SupervoxelId};

mod adjacency;
mod io;

pub use adjacency::Adjacency;
pub use io::home_graph_dir_with;

#[cfg(feature = "serde")]
pub use io::GraphResource;

/// 外部分割引擎的契约.
pub trait SegmentationEngine: Send + Sync {
    /// 区域体, 即每个体素所属的超体素编号, 按 `(z, h, w)` 组织.
    fn region_volume(&self) -> ArrayView3<'_, SupervoxelId>;

    /// 超体素节点个数. 所有查找表的长度都等于该值.
    fn num_nodes(&self) -> usize;

    /// 当前 (未提交的) 分割查找表, 值为 1 (背景) 或 2 (前景).
    fn segmentation(&self) -> &[u8];

    /// 当前分割查找表, 可修改.
    fn segmentation_mut(&mut self) -> &mut [u8];

    /// 已提交目标的查找表, 值为目标编号, 0 代表未分配.
    fn objects(&self) -> &[ObjectNumber];

    /// 已提交目标的查找表, 可修改.
    fn objects_mut(&mut self) -> &mut [ObjectNumber];

    /// 超体素级种子查找表.
    fn seeds(&self) -> &[u8];

    /// 将体素级种子 `values` 写入区域 `roi` 覆盖的超体素.
    ///
    /// 值 0 不做修改, 值 [`label::SEED_CLEAR`] 清除种子, 其余值原样写入.
    /// `roi` 必须在体数据范围内, 且与 `values` 形状一致.
    fn write_seeds(&mut self, roi: &Roi, values: ArrayView3<'_, u8>);

    /// 清除全部种子.
    fn clear_seeds(&mut self);

    /// 用当前种子求解, 并将结果写入分割查找表.
    fn run(&mut self, unaries: ArrayView2<'_, f32>, params: &SolveParams);

    /// 体数据形状.
    #[inline]
    fn shape(&self) -> Idx3d {
        self.region_volume().dim()
    }

    /// 体素 `pos` 所属的超体素. 越界时返回 `None`.
    #[inline]
    fn supervoxel_at(&self, pos: Idx3d) -> Option<SupervoxelId> {
        self.region_volume().get(pos).copied()
    }

    /// 将 `voxels` 中每个体素的种子写为 `value`.
    fn write_seed_voxels(&mut self, voxels: &[Idx3d], value: u8) {
        let one = Array3::from_elem((1, 1, 1), value);
        for &pos in voxels {
            self.write_seeds(&Roi::voxel(pos), one.view());
        }
    }
}

/// 内存中的超体素图, 生命周期内查找表长度不变.
pub struct SupervoxelGraph {
    region_vol: Array3<SupervoxelId>,
    adjacency: Adjacency,
    segmentation: Vec<u8>,
    objects: Vec<ObjectNumber>,
    seeds: Vec<u8>,
    solver: Box<dyn Solver>,
}

impl SupervoxelGraph {
    /// 从区域体构建, 邻接关系由六邻域接触计算.
    ///
    /// 区域体为空时返回 `Err`.
    pub fn from_region_volume(region_vol: Array3<SupervoxelId>) -> CarvingResult<Self> {
        let adjacency = Adjacency::from_region_volume(region_vol.view());
        Self::from_parts(region_vol, adjacency)
    }

    /// 从区域体和给定的邻接图构建.
    ///
    /// 节点个数取区域体最大编号加一. 区域体为空, 或邻接图引用了不存在的节点时返回 `Err`.
    pub fn from_parts(region_vol: Array3<SupervoxelId>, adjacency: Adjacency) -> CarvingResult<Self> {
        let num_nodes = region_vol
            .iter()
            .max()
            .map(|&m| m as usize + 1)
            .ok_or_else(|| CarvingError::InvalidGraph("empty region volume".to_string()))?;
        if let Some(m) = adjacency.max_node().filter(|&m| m as usize >= num_nodes) {
            return Err(CarvingError::InvalidGraph(format!(
                "edge references node {m}, but there are only {num_nodes} nodes"
            )));
        }
        log::debug!(
            "supervoxel graph: shape {:?}, {num_nodes} nodes, {} edges",
            region_vol.dim(),
            adjacency.len()
        );
        Ok(Self {
            region_vol,
            adjacency,
            segmentation: vec![label::BACKGROUND; num_nodes],
            objects: vec![0; num_nodes],
            seeds: vec![label::UNSET; num_nodes],
            solver: Box::new(SeedOnly),
        })
    }

    /// 替换求解器.
    pub fn with_solver<S: Solver + 'static>(mut self, solver: S) -> Self {
        self.solver = Box::new(solver);
        self
    }

    /// 超体素邻接图.
    #[inline]
    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }
}

impl SegmentationEngine for SupervoxelGraph {
    #[inline]
    fn region_volume(&self) -> ArrayView3<'_, SupervoxelId> {
        self.region_vol.view()
    }

    #[inline]
    fn num_nodes(&self) -> usize {
        self.segmentation.len()
    }

    #[inline]
    fn segmentation(&self) -> &[u8] {
        &self.segmentation
    }

    #[inline]
    fn segmentation_mut(&mut self) -> &mut [u8] {
        &mut self.segmentation
    }

    #[inline]
    fn objects(&self) -> &[ObjectNumber] {
        &self.objects
    }

    #[inline]
    fn objects_mut(&mut self) -> &mut [ObjectNumber] {
        &mut self.objects
    }

    #[inline]
    fn seeds(&self) -> &[u8] {
        &self.seeds
    }

    fn write_seeds(&mut self, roi: &Roi, values: ArrayView3<'_, u8>) {
        debug_assert_eq!(roi.shape(), values.dim());
        let region = roi.view_of(self.region_vol.view());
        for (&sv, &v) in region.iter().zip(values.iter()) {
            match v {
                label::UNSET => {}
                label::SEED_CLEAR => self.seeds[sv as usize] = label::UNSET,
                v => self.seeds[sv as usize] = v,
            }
        }
    }

    #[inline]
    fn clear_seeds(&mut self) {
        self.seeds.fill(label::UNSET);
    }

    fn run(&mut self, unaries: ArrayView2<'_, f32>, params: &SolveParams) {
        let mut out = vec![label::BACKGROUND; self.seeds.len()];
        let input = SolveInput {
            adjacency: &self.adjacency,
            seeds: &self.seeds,
            unaries: unaries.view(),
            params,
        };
        self.solver.solve(&input, &mut out);

        // 分割查找表只允许出现 1 或 2.
        for (s, o) in self.segmentation.iter_mut().zip(out) {
            *s = if label::is_foreground(o) {
                label::FOREGROUND
            } else {
                label::BACKGROUND
            };
        }
    }
}

/// 求解用的零一元势, 形状为 `(num_nodes, LABEL_COUNT + 1)`.
#[inline]
pub fn zero_unaries(num_nodes: usize) -> Array2<f32> {
    Array2::zeros((num_nodes, crate::consts::LABEL_COUNT + 1))
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 借助 `rayon`, 并行地将区域体的每个超体素编号经 `f` 映射为输出体素值.
        pub fn map_region<T, F>(region: ArrayView3<'_, SupervoxelId>, f: F) -> Array3<T>
        where
            T: Clone + Default + Send,
            F: Fn(SupervoxelId) -> T + Sync + Send,
        {
            let mut out = Array3::<T>::default(region.dim());
            Zip::from(&mut out)
                .and(&region)
                .par_for_each(|o, &sv| *o = f(sv));
            out
        }
    } else {
        /// 将区域体的每个超体素编号经 `f` 映射为输出体素值.
        pub fn map_region<T, F>(region: ArrayView3<'_, SupervoxelId>, f: F) -> Array3<T>
        where
            T: Clone + Default + Send,
            F: Fn(SupervoxelId) -> T + Sync + Send,
        {
            let mut out = Array3::<T>::default(region.dim());
            Zip::from(&mut out).and(&region).for_each(|o, &sv| *o = f(sv));
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::CarvingParams;

    /// 一层 2x3: [[0, 0, 1], [2, 2, 1]].
    fn tiny() -> SupervoxelGraph {
        let v = Array3::from_shape_vec((1, 2, 3), vec![0, 0, 1, 2, 2, 1]).unwrap();
        SupervoxelGraph::from_region_volume(v).unwrap()
    }

    #[test]
    fn test_graph_init() {
        let g = tiny();
        assert_eq!(g.num_nodes(), 3);
        assert_eq!(g.shape(), (1, 2, 3));
        assert_eq!(g.segmentation(), &[1, 1, 1]);
        assert_eq!(g.objects(), &[0, 0, 0]);
        assert_eq!(g.seeds(), &[0, 0, 0]);
        assert_eq!(g.supervoxel_at((0, 1, 0)), Some(2));
        assert_eq!(g.supervoxel_at((1, 0, 0)), None);
    }

    #[test]
    fn test_graph_invalid() {
        let v = Array3::<u32>::zeros((0, 2, 2));
        assert!(SupervoxelGraph::from_region_volume(v).is_err());

        let v = Array3::<u32>::zeros((1, 1, 2));
        let adj = Adjacency::from_parts(vec![(0, 5)], vec![1.0]).unwrap();
        assert!(matches!(
            SupervoxelGraph::from_parts(v, adj),
            Err(CarvingError::InvalidGraph(_))
        ));
    }

    #[test]
    fn test_graph_write_seeds() {
        let mut g = tiny();
        let roi = Roi::new((0, 0, 1), (1, 2, 3)).unwrap();
        // (0,0,1)->0, (0,0,2)->1, (0,1,1)->2, (0,1,2)->1
        let values = Array3::from_shape_vec((1, 2, 2), vec![2, 0, 1, 0]).unwrap();
        g.write_seeds(&roi, values.view());
        assert_eq!(g.seeds(), &[2, 0, 1]);

        g.write_seed_voxels(&[(0, 0, 0)], label::SEED_CLEAR);
        assert_eq!(g.seeds(), &[0, 0, 1]);

        g.clear_seeds();
        assert_eq!(g.seeds(), &[0, 0, 0]);
    }

    #[test]
    fn test_graph_run_with_custom_solver() {
        let mut g = tiny().with_solver(|input: &SolveInput<'_>, out: &mut [u8]| {
            // 全部置为前景, 但写出一个非法值以检查截断.
            out.fill(label::FOREGROUND);
            out[0] = 7;
            assert_eq!(input.params.prios[1], 0.95);
        });
        let params = CarvingParams::default().solve_params();
        g.run(zero_unaries(3).view(), &params);
        assert_eq!(g.segmentation(), &[1, 2, 2]);
    }

    #[test]
    fn test_map_region() {
        let g = tiny();
        let out = map_region(g.region_volume(), |sv| sv * 10);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![0, 0, 10, 20, 20, 10]);
    }
}
