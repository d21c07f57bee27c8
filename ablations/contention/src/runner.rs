//! 程序运行函数.

use crate::profile::Profile;
use crate::result::AblationResult;
use carve_berry::prelude::*;
use ndarray::Array3;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use utils::loader;

/// 实验配置.
#[derive(Copy, Clone, Debug)]
pub struct Config {
    /// 合成体数据形状.
    pub shape: Idx3d,

    /// 合成超体素边长.
    pub block: usize,

    /// 读者线程数. 0 代表使用 `cpus() - 1`.
    pub readers: usize,

    /// 簿记线程的 "涂种子, 重算, 保存, 加载" 循环次数.
    pub rounds: usize,

    /// 簿记线程循环使用的目标个数.
    pub objects: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shape: (64, 128, 128),
            block: 8,
            readers: 0,
            rounds: 200,
            objects: 8,
        }
    }
}

/// 一轮簿记: 在一个超体素块上涂前景种子, 重算, 保存, 再重新加载.
fn bookkeeping_round(state: &CarvingState, shape: Idx3d, cfg: &Config, round: usize) -> bool {
    let (z, h, w) = shape;
    let step = cfg.block.max(1);
    let pos = (
        (round * step) % z,
        (round * 3 * step) % h,
        (round * 5 * step) % w,
    );
    let seed = Array3::from_elem((1, 1, 1), label::FOREGROUND);
    let name = format!("object-{}", round % cfg.objects.max(1));
    let ok = state.write_seeds(&Roi::voxel(pos), seed.view()).is_ok()
        && state.recompute()
        && state.save_object_as(&name);
    // 保存后该位置至少被刚保存的目标覆盖.
    let covered = state.done_object_names_for_position(pos).contains(&name);
    ok && covered && state.load_object(&name).is_ok()
}

/// 实际运行.
pub fn run(cfg: Config) -> AblationResult {
    let graph = loader::graph_from_env_or_synthetic(cfg.shape, cfg.block);
    let shape = graph.shape();
    let state = CarvingState::with_engine(graph);
    let full = Roi::full(shape);
    let readers = match cfg.readers {
        0 => utils::cpus().saturating_sub(1).max(1),
        n => n,
    };
    let stop = AtomicBool::new(false);

    println!(
        "Running contention ablation: {readers} readers, {} rounds, volume {shape:?}...",
        cfg.rounds
    );
    let (reads, writes) = thread::scope(|s| {
        let handles: Vec<_> = (0..readers)
            .map(|i| {
                let (state, stop, full) = (&state, &stop, &full);
                s.spawn(move || {
                    let mut profile = Profile::new();
                    let output = if i % 2 == 0 {
                        Output::Segmentation
                    } else {
                        Output::DoneObjects
                    };
                    while !stop.load(Ordering::Relaxed) {
                        profile.measure(|| state.read_region(output, full).is_ok());
                    }
                    profile.finish()
                })
            })
            .collect();

        let mut writes = Profile::new();
        for round in 0..cfg.rounds {
            writes.measure(|| bookkeeping_round(&state, shape, &cfg, round));
        }
        stop.store(true, Ordering::Relaxed);

        let reads = handles
            .into_iter()
            .map(|th| th.join().expect("Thread joining error"))
            .fold(Profile::new(), Profile::merge);
        (reads, writes.finish())
    });

    assert_eq!(state.active_readers(), 0);
    AblationResult::new([("readers", reads), ("bookkeeping", writes)], state.object_names())
}
