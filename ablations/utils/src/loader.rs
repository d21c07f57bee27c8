//! 对 `carve-berry::graph` 的更一层封装. 提供更直接的超体素图加载器.

use carve_berry::graph::home_graph_dir_with;
use carve_berry::prelude::*;
use ndarray::Array3;
use std::env;
use std::path::PathBuf;

/// 获取超体素图资源文件路径.
///
/// 1. 若环境变量 `$CARVING_GRAPH_FILE` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/carving/graph.bin`.
pub fn graph_file_from_env_or_home() -> Option<PathBuf> {
    match env::var("CARVING_GRAPH_FILE") {
        Ok(f) if !f.is_empty() => Some(PathBuf::from(f)),
        _ => home_graph_dir_with(["graph.bin"]),
    }
}

/// 构造一个合成超体素图: 体数据形状为 `shape`, 每个边长为 `block` 的立方块是一个超体素.
///
/// # 注意
///
/// `block` 为 0 时 panic.
pub fn synthetic_graph(shape: Idx3d, block: usize) -> SupervoxelGraph {
    assert_ne!(block, 0, "block size must be positive");
    let (_, bh, bw) = (
        shape.0.div_ceil(block),
        shape.1.div_ceil(block),
        shape.2.div_ceil(block),
    );
    let region = Array3::from_shape_fn(shape, |(z, h, w)| {
        ((z / block) * bh * bw + (h / block) * bw + w / block) as SupervoxelId
    });
    SupervoxelGraph::from_region_volume(region).expect("synthetic region volume is valid")
}

/// 优先从资源文件加载超体素图; 文件不存在或无法读取时退回到合成图.
pub fn graph_from_env_or_synthetic(shape: Idx3d, block: usize) -> SupervoxelGraph {
    let loaded = graph_file_from_env_or_home()
        .filter(|p| p.is_file())
        .map(|p| (SupervoxelGraph::open(&p), p));
    match loaded {
        Some((Ok(g), p)) => {
            println!("Loaded graph from {}", p.display());
            g
        }
        Some((Err(e), p)) => {
            println!("Failed to load {}: {e}, falling back to synthetic graph", p.display());
            synthetic_graph(shape, block)
        }
        None => synthetic_graph(shape, block),
    }
}
