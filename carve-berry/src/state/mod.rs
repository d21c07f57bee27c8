//! 交互式 carving 的会话状态.
//!
//! [`CarvingState`] 持有超体素图 (分割引擎), 体素级种子, 已保存目标的记录,
//! 以及两个可调参数. 所有体素区域读取都以读者身份进入 [`ReaderDrain`];
//! 所有簿记修改都先排空读者, 并在整个临界区内持有排空凭据.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use itertools::Itertools;
use ndarray::{Array3, ArrayView3, Zip};

use crate::consts::{label, NO_OBJECT};
use crate::error::{CarvingError, CarvingResult};
use crate::graph::{map_region, zero_unaries, SegmentationEngine, SupervoxelGraph};
use crate::roi::Roi;
use crate::solver::CarvingParams;
use crate::sync::ReaderDrain;
use crate::{Idx3d, SupervoxelId};

mod objects;

pub use objects::{ObjectRecord, ObjectTable};

/// 可读取的输出体.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Output {
    /// 当前分割, 体素值为 1 (背景) 或 2 (前景).
    Segmentation,

    /// 超体素编号.
    Supervoxels,

    /// "已完成" 覆盖层: 覆盖该体素所在超体素的已保存目标个数.
    /// 大于 1 代表该处被多个目标重复占用.
    DoneObjects,

    /// 体素级种子, 0 (未设置), 1 (背景) 或 2 (前景).
    Seeds,
}

type DirtyListener = Arc<dyn Fn(Output) + Send + Sync>;

/// 受锁保护的全部会话数据.
pub(crate) struct Inner<E> {
    pub(crate) engine: Option<E>,
    pub(crate) seed_voxels: Array3<u8>,
    pub(crate) objects: ObjectTable,
    pub(crate) current: Option<String>,
    pub(crate) params: CarvingParams,
    pub(crate) stale: bool,
}

impl<E: SegmentationEngine> Inner<E> {
    fn new(engine: Option<E>, params: CarvingParams) -> Self {
        let shape = engine.as_ref().map_or((0, 0, 0), |e| e.shape());
        Self {
            engine,
            seed_voxels: Array3::zeros(shape),
            objects: ObjectTable::default(),
            current: None,
            params,
            stale: true,
        }
    }
}

/// 检查索引是否在形状为 `(z, h, w)` 的体数据内.
#[inline]
fn check(&(z0, h0, w0): &Idx3d, (z, h, w): Idx3d) -> bool {
    z0 < z && h0 < h && w0 < w
}

/// 收集体素级种子中值为 `value` 的所有下标, 行优先序.
#[inline]
fn painted(seed_voxels: &Array3<u8>, value: u8) -> Vec<Idx3d> {
    seed_voxels
        .indexed_iter()
        .filter_map(|(pos, &p)| (p == value).then_some(pos))
        .collect()
}

/// 查找表中值满足 `pred` 的所有超体素.
#[inline]
fn supervoxels_where<T: Copy>(lut: &[T], pred: impl Fn(T) -> bool) -> Vec<SupervoxelId> {
    lut.iter()
        .positions(|&v| pred(v))
        .map(|i| i as SupervoxelId)
        .collect()
}

/// 一次交互式 carving 会话的状态.
///
/// 该结构可在线程间共享 (例如放进 `Arc`): 界面线程调用簿记操作,
/// 工作线程调用区域读取和重算.
///
/// # 注意
///
/// 在脏通知回调中可以调用任何方法, 回调运行时不持有内部锁.
pub struct CarvingState<E = SupervoxelGraph> {
    drain: ReaderDrain,
    inner: RwLock<Inner<E>>,
    listeners: Mutex<Vec<DirtyListener>>,
}

impl<E: SegmentationEngine> CarvingState<E> {
    /// 以已加载的分割引擎初始化.
    pub fn with_engine(engine: E) -> Self {
        Self::from_inner(Inner::new(Some(engine), CarvingParams::default()))
    }

    /// 初始化一个尚未加载超体素图的会话. 读取全部返回零, 簿记操作不生效.
    pub fn unloaded() -> Self {
        Self::from_inner(Inner::new(None, CarvingParams::default()))
    }

    fn from_inner(inner: Inner<E>) -> Self {
        Self {
            drain: ReaderDrain::new(),
            inner: RwLock::new(inner),
            listeners: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub(crate) fn drain(&self) -> &ReaderDrain {
        &self.drain
    }

    #[inline]
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Inner<E>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Inner<E>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 调用回调时不持有任何锁, 回调中可以注册新回调或再次修改状态.
    pub(crate) fn notify(&self, outputs: &[Output]) {
        let listeners: Vec<DirtyListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for &o in outputs {
            for l in listeners.iter() {
                l(o);
            }
        }
    }

    /// 注册脏通知回调. 某个输出体内容失效时, 回调以该输出体为参数被调用.
    pub fn on_dirty<F>(&self, f: F)
    where
        F: Fn(Output) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(f));
    }

    /// 替换分割引擎. 所有目标, 种子和当前目标名都会被丢弃, 参数保留.
    pub fn replace_engine(&self, engine: E) {
        {
            let _d = self.drain.drain();
            let mut inner = self.write();
            let params = inner.params;
            log::info!("replacing segmentation engine, {} nodes", engine.num_nodes());
            *inner = Inner::new(Some(engine), params);
        }
        self.notify(&[
            Output::Segmentation,
            Output::Supervoxels,
            Output::DoneObjects,
            Output::Seeds,
        ]);
    }

    /// 是否已加载超体素图.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.read().engine.is_some()
    }

    /// 当前活跃读者个数.
    #[inline]
    pub fn active_readers(&self) -> usize {
        self.drain.active_readers()
    }

    /// 当前参数.
    #[inline]
    pub fn params(&self) -> CarvingParams {
        self.read().params
    }

    /// 自上次重算以来, 种子或参数是否被修改过.
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.read().stale
    }

    /// 当前正在编辑的目标名称.
    #[inline]
    pub fn current_object_name(&self) -> Option<String> {
        self.read().current.clone()
    }

    /// 所有已保存目标的名称, 按目标编号升序.
    #[inline]
    pub fn object_names(&self) -> Vec<String> {
        self.read().objects.names_by_number()
    }

    /// 名称为 `name` 的目标记录副本.
    #[inline]
    pub fn object(&self, name: &str) -> Option<ObjectRecord> {
        self.read().objects.get(name).cloned()
    }

    /// 在读者身份下只读地访问分割引擎. 未加载时返回 `None`.
    pub fn inspect_engine<R, F: FnOnce(&E) -> R>(&self, f: F) -> Option<R> {
        let _t = self.drain.enter();
        let inner = self.read();
        inner.engine.as_ref().map(f)
    }

    /// 为名称 `name` 记录种子体素. 纯簿记操作, 不影响查找表.
    ///
    /// 坐标会被排序去重, 以便之后加载时按行优先序返回.
    pub fn attach_seeds(&self, name: &str, fg_voxels: Vec<Idx3d>, bg_voxels: Vec<Idx3d>) {
        let _d = self.drain.drain();
        let mut inner = self.write();
        let record = inner.objects.entry(name);
        record.fg_voxels = fg_voxels.into_iter().sorted().dedup().collect();
        record.bg_voxels = bg_voxels.into_iter().sorted().dedup().collect();
        log::debug!(
            "attached {} fg / {} bg seed voxels to {name:?}",
            record.fg_voxels.len(),
            record.bg_voxels.len()
        );
    }

    /// 将当前分割中的前景超体素保存为目标 `name`.
    ///
    /// 已有名称沿用原编号, 新名称使用最大编号加一. 原编号的超体素分配先被清除.
    /// 种子体素由当前体素级种子得出, 随后所有种子被清除. 分割查找表保持不变,
    /// 但被标记为过期并发出分割失效通知, 由使用方决定何时重算.
    ///
    /// 未加载超体素图时什么也不做, 返回 `false`.
    pub fn save_object_as(&self, name: &str) -> bool {
        let saved = {
            let _d = self.drain.drain();
            let mut inner = self.write();
            save_locked(&mut inner, name)
        };
        if saved {
            self.notify(&[Output::Segmentation, Output::DoneObjects, Output::Seeds]);
        }
        saved
    }

    /// 以当前目标名重新保存. 没有当前目标时返回 `false`.
    pub fn save_current_object(&self) -> bool {
        let saved = {
            let _d = self.drain.drain();
            let mut inner = self.write();
            match inner.current.clone() {
                Some(name) => save_locked(&mut inner, &name),
                None => {
                    log::debug!("no current object to save");
                    false
                }
            }
        };
        if saved {
            self.notify(&[Output::Segmentation, Output::DoneObjects, Output::Seeds]);
        }
        saved
    }

    /// 加载目标 `name` 以便重新编辑.
    ///
    /// 种子被重置为该目标保存时的种子; 目标从 "已完成" 视图中撤出;
    /// 分割被重建为仅该目标的超体素为前景. 返回 `(前景种子, 背景种子)` 体素.
    pub fn load_object(&self, name: &str) -> CarvingResult<(Vec<Idx3d>, Vec<Idx3d>)> {
        let ans = {
            let _d = self.drain.drain();
            let mut inner = self.write();
            load_locked(&mut inner, name)?
        };
        self.notify(&[Output::Segmentation, Output::Seeds, Output::DoneObjects]);
        Ok(ans)
    }

    /// 删除目标 `name`, 清除其超体素分配.
    pub fn delete_object(&self, name: &str) -> CarvingResult<()> {
        {
            let _d = self.drain.drain();
            let mut inner = self.write();
            let Inner {
                engine,
                objects,
                current,
                ..
            } = &mut *inner;
            let record = objects
                .remove(name)
                .ok_or_else(|| CarvingError::ObjectNotFound(name.to_string()))?;
            if let (Some(number), Some(engine)) = (record.number, engine.as_mut()) {
                engine
                    .objects_mut()
                    .iter_mut()
                    .filter(|o| **o == number)
                    .for_each(|o| *o = NO_OBJECT);
            }
            if current.as_deref() == Some(name) {
                *current = None;
            }
            log::info!("deleted object {name:?}");
        }
        self.notify(&[Output::DoneObjects]);
        Ok(())
    }

    /// 位于体素 `pos` 的所有已完成目标名称, 按编号升序.
    ///
    /// 未加载或越界时返回空.
    pub fn done_object_names_for_position(&self, pos: Idx3d) -> Vec<String> {
        let _d = self.drain.drain();
        let inner = self.read();
        let Some(engine) = inner.engine.as_ref() else {
            return Vec::new();
        };
        let Some(sv) = engine.supervoxel_at(pos) else {
            log::warn!("position {pos:?} is out of volume bound {:?}", engine.shape());
            return Vec::new();
        };
        let names = inner.objects.names_containing(sv);
        log::debug!("click on {pos:?}, supervoxel={sv}: {names:?}");
        names
    }

    /// 以当前种子和参数重算分割. 未加载时返回 `false`.
    pub fn recompute(&self) -> bool {
        let ran = {
            let _d = self.drain.drain();
            let mut inner = self.write();
            recompute_locked(&mut inner)
        };
        if ran {
            self.notify(&[Output::Segmentation]);
        }
        ran
    }

    fn update_params<F: FnOnce(&mut CarvingParams)>(&self, f: F) -> bool {
        let ran = {
            let _d = self.drain.drain();
            let mut inner = self.write();
            f(&mut inner.params);
            inner.stale = true;
            recompute_locked(&mut inner)
        };
        if ran {
            self.notify(&[Output::Segmentation]);
        }
        ran
    }

    /// 设置全部参数并重算.
    #[inline]
    pub fn set_params(&self, params: CarvingParams) -> bool {
        self.update_params(|p| *p = params)
    }

    /// 设置背景优先级并重算.
    #[inline]
    pub fn set_background_priority(&self, priority: f32) -> bool {
        self.update_params(|p| p.background_priority = priority)
    }

    /// 设置无偏置阈值并重算.
    #[inline]
    pub fn set_no_bias_below(&self, threshold: u8) -> bool {
        self.update_params(|p| p.no_bias_below = threshold)
    }

    /// 读取输出体 `output` 在区域 `roi` 内的体素值.
    ///
    /// 未加载时返回形状为 `roi.shape()` 的全零数组.
    pub fn read_region(&self, output: Output, roi: &Roi) -> CarvingResult<Array3<u32>> {
        let _t = self.drain.enter();
        let inner = self.read();
        let Some(engine) = inner.engine.as_ref() else {
            return Ok(Array3::zeros(roi.shape()));
        };
        let shape = engine.shape();
        if !roi.fits(shape) {
            return Err(CarvingError::RoiOutOfBound(*roi, shape));
        }
        let region = roi.view_of(engine.region_volume());
        let ans = match output {
            Output::Segmentation => {
                let lut = engine.segmentation();
                map_region(region, |sv| u32::from(lut[sv as usize]))
            }
            Output::Supervoxels => region.to_owned(),
            Output::DoneObjects => {
                let counts = inner.objects.done_counts(engine.num_nodes());
                map_region(region, |sv| counts[sv as usize])
            }
            Output::Seeds => roi.view_of(inner.seed_voxels.view()).mapv(u32::from),
        };
        Ok(ans)
    }

    /// 将标注画笔写出的种子 `values` 写入区域 `roi`.
    ///
    /// 值 0 不做修改, 橡皮擦值 100 先被替换为清除哨兵 255 再交给分割引擎,
    /// 其余值原样写入.
    pub fn write_seeds(&self, roi: &Roi, values: ArrayView3<'_, u8>) -> CarvingResult<()> {
        if values.dim() != roi.shape() {
            return Err(CarvingError::ShapeMismatch(roi.shape(), values.dim()));
        }
        {
            let _d = self.drain.drain();
            let mut inner = self.write();
            let Inner {
                engine,
                seed_voxels,
                stale,
                ..
            } = &mut *inner;
            let engine = engine.as_mut().ok_or(CarvingError::GraphNotLoaded)?;
            let shape = engine.shape();
            if !roi.fits(shape) {
                return Err(CarvingError::RoiOutOfBound(*roi, shape));
            }

            let remapped = values.mapv(label::remap_eraser);
            engine.write_seeds(roi, remapped.view());
            Zip::from(roi.view_mut_of(seed_voxels.view_mut()))
                .and(&remapped)
                .for_each(|s, &v| match v {
                    label::UNSET => {}
                    label::SEED_CLEAR => *s = label::UNSET,
                    v => *s = v,
                });
            *stale = true;
        }
        self.notify(&[Output::Seeds]);
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl CarvingState<SupervoxelGraph> {
    /// 打开图资源文件作为新会话.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> CarvingResult<Self> {
        Ok(Self::with_engine(SupervoxelGraph::open(path)?))
    }

    /// 从图资源文件重新加载超体素图, 丢弃所有目标和种子.
    ///
    /// 加载失败时原会话保持不变.
    pub fn load_graph<P: AsRef<std::path::Path>>(&self, path: P) -> CarvingResult<()> {
        let graph = SupervoxelGraph::open(path)?;
        self.replace_engine(graph);
        Ok(())
    }
}

fn save_locked<E: SegmentationEngine>(inner: &mut Inner<E>, name: &str) -> bool {
    let Inner {
        engine,
        seed_voxels,
        objects,
        current,
        stale,
        ..
    } = inner;
    let Some(engine) = engine.as_mut() else {
        log::warn!("cannot save object {name:?}: no graph loaded");
        return false;
    };
    let number = objects
        .number_of(name)
        .unwrap_or_else(|| objects.next_free_number());
    log::info!("saving object {name:?} as number {number}");

    let supervoxels = supervoxels_where(engine.segmentation(), label::is_foreground);
    let lut = engine.objects_mut();
    lut.iter_mut()
        .filter(|o| **o == number)
        .for_each(|o| *o = NO_OBJECT);
    for &sv in supervoxels.iter() {
        lut[sv as usize] = number;
    }

    let record = objects.entry(name);
    record.number = Some(number);
    record.fg_supervoxels = supervoxels_where(engine.seeds(), label::is_foreground);
    record.bg_supervoxels = supervoxels_where(engine.seeds(), label::is_background);
    record.fg_voxels = painted(seed_voxels, label::FOREGROUND);
    record.bg_voxels = painted(seed_voxels, label::BACKGROUND);
    log::debug!(
        "object {name:?}: {} supervoxels, {} fg / {} bg seed voxels",
        supervoxels.len(),
        record.fg_voxels.len(),
        record.bg_voxels.len()
    );
    record.supervoxels = Some(supervoxels);

    engine.clear_seeds();
    seed_voxels.fill(label::UNSET);
    *current = Some(name.to_string());
    *stale = true;
    true
}

fn load_locked<E: SegmentationEngine>(
    inner: &mut Inner<E>,
    name: &str,
) -> CarvingResult<(Vec<Idx3d>, Vec<Idx3d>)> {
    let Inner {
        engine,
        seed_voxels,
        objects,
        current,
        stale,
        ..
    } = inner;
    let engine = engine.as_mut().ok_or(CarvingError::GraphNotLoaded)?;
    let record = objects
        .get_mut(name)
        .filter(|r| r.is_saved())
        .ok_or_else(|| CarvingError::ObjectNotFound(name.to_string()))?;
    log::info!("loading object {name:?} from number {:?}", record.number);

    engine.clear_seeds();
    seed_voxels.fill(label::UNSET);
    let shape = engine.shape();
    for (voxels, value) in [
        (&record.fg_voxels, label::FOREGROUND),
        (&record.bg_voxels, label::BACKGROUND),
    ] {
        let inside: Vec<Idx3d> = voxels.iter().copied().filter(|p| check(p, shape)).collect();
        if inside.len() < voxels.len() {
            log::warn!(
                "{} seed voxels of {name:?} are out of volume bound {shape:?}",
                voxels.len() - inside.len()
            );
        }
        engine.write_seed_voxels(&inside, value);
        for p in inside {
            seed_voxels[p] = value;
        }
    }

    let seg = engine.segmentation_mut();
    seg.fill(label::BACKGROUND);
    for sv in record.supervoxels.take().unwrap_or_default() {
        if let Some(s) = seg.get_mut(sv as usize) {
            *s = label::FOREGROUND;
        }
    }

    *current = Some(name.to_string());
    *stale = false;
    Ok((record.fg_voxels.clone(), record.bg_voxels.clone()))
}

fn recompute_locked<E: SegmentationEngine>(inner: &mut Inner<E>) -> bool {
    let Inner {
        engine,
        params,
        stale,
        ..
    } = inner;
    let Some(engine) = engine.as_mut() else {
        log::warn!("cannot recompute: no graph loaded");
        return false;
    };
    log::info!(
        "compute new carving results with bg priority = {}, no bias below {}",
        params.background_priority,
        params.no_bias_below
    );
    let unaries = zero_unaries(engine.num_nodes());
    engine.run(unaries.view(), &params.solve_params());
    *stale = false;
    true
}
