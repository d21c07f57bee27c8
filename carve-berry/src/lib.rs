#![warn(missing_docs)]

//! 交互式目标 carving 的核心状态库.
//!
//! 用户在三维体数据上用画笔标注前景/背景种子, 分割引擎基于超体素图求解出前景区域,
//! 用户将结果保存为命名目标, 之后可以重新加载编辑. 本 crate 负责这一过程中的全部簿记:
//! 每个目标的种子与超体素集合, 超体素到分割/目标的查找表, 以及让区域读取与簿记修改
//! 互不干扰的 "先排空读者, 再修改" 协议.
//!
//! 超体素图分割算法本身 (MST, 分水岭等) 不在本 crate 内实现,
//! 通过 [`solver::Solver`] 接入.
//!
//! # 注意
//!
//! 1. 所有体素下标均为 `(z, h, w)` 顺序.
//! 2. 超体素编号来自外部的区域分割, 假定从 0 开始连续编号.
//!
//! # 开发计划
//!
//! ### 目标簿记: 保存, 加载, 删除 ✅
//!
//! 实现位于 `carve-berry/src/state`.
//!
//! ### 读者排空同步原语 ✅
//!
//! 一把互斥锁加一个条件变量守护活跃读者计数. 修改方在排空后才开始修改,
//! 且在整个临界区内持有该锁.
//!
//! 实现位于 `carve-berry/src/sync.rs`.
//!
//! ### 超体素图资源的读写 ✅
//!
//! 支持 `.npy`/`.npz` 区域体, 以及 zlib 压缩的 bincode 图资源文件.
//!
//! 实现位于 `carve-berry/src/graph/io.rs`.
//!
//! ### 会话持久化 ✅
//!
//! 实现位于 `carve-berry/src/session.rs`.
//!
//! ### 修改方优先 ✅
//!
//! 修改方一旦开始排空, 新读者即在进入处等待, 持续不断的读者不会让簿记操作无限等待.

/// 三维索引, `(z, h, w)`.
pub type Idx3d = (usize, usize, usize);

/// 超体素编号.
pub type SupervoxelId = u32;

/// 目标编号. 0 代表未分配.
pub type ObjectNumber = u32;

pub mod consts;

mod error;

pub use error::{CarvingError, CarvingResult};

pub mod graph;
pub mod roi;
pub mod session;
pub mod solver;
pub mod state;
pub mod sync;

pub use graph::{SegmentationEngine, SupervoxelGraph};
pub use roi::Roi;
pub use session::SessionSnapshot;
pub use solver::CarvingParams;
pub use state::{CarvingState, Output};
pub use sync::ReaderDrain;

pub mod prelude;
