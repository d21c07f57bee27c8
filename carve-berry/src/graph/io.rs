//! 图资源文件的读写.

use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::{Array3, Ix3, OwnedRepr};
use ndarray_npy::{read_npy, NpzReader};

use super::SupervoxelGraph;
use crate::error::{CarvingError, CarvingResult};

/// 获取 `{用户主目录}/dataset/carving` 目录下给定继续项组成的全路径.
pub fn home_graph_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.push("carving");
    ans.extend(it);
    Some(ans)
}

#[inline]
fn npz_error<E: std::fmt::Display>(e: E) -> CarvingError {
    CarvingError::Npz(e.to_string())
}

impl SupervoxelGraph {
    /// 从 npy 文件读取 `u32` 区域体并构建图.
    pub fn from_npy<P: AsRef<Path>>(path: P) -> CarvingResult<Self> {
        let region: Array3<u32> = read_npy(path.as_ref()).map_err(npz_error)?;
        Self::from_region_volume(region)
    }

    /// 从 npz 归档中名为 `name` 的 `u32` 数组读取区域体并构建图.
    pub fn from_npz<P: AsRef<Path>>(path: P, name: &str) -> CarvingResult<Self> {
        let file = File::open(path.as_ref())?;
        let mut npz = NpzReader::new(file).map_err(npz_error)?;
        let region = npz
            .by_name::<OwnedRepr<u32>, Ix3>(name)
            .map_err(npz_error)?;
        Self::from_region_volume(region)
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "serde")] {
        use std::io::{BufReader, BufWriter, Write};

        use flate2::read::ZlibDecoder;
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use serde::{Deserialize, Serialize};

        use super::Adjacency;
        use crate::SupervoxelId;

        /// 预计算的超体素图资源, 以 zlib 压缩的 bincode 格式存储.
        #[derive(Clone, Debug, Serialize, Deserialize)]
        pub struct GraphResource {
            /// 区域体.
            pub region_vol: Array3<SupervoxelId>,

            /// 邻接图.
            pub adjacency: Adjacency,
        }

        /// 序列化时避免复制区域体.
        #[derive(Serialize)]
        struct GraphResourceRef<'a> {
            region_vol: &'a Array3<SupervoxelId>,
            adjacency: &'a Adjacency,
        }

        impl SupervoxelGraph {
            /// 打开图资源文件.
            pub fn open<P: AsRef<Path>>(path: P) -> CarvingResult<Self> {
                let file = File::open(path.as_ref())?;
                let r: GraphResource = bincode::deserialize_from(ZlibDecoder::new(BufReader::new(file)))?;
                log::info!("loaded graph resource {}", path.as_ref().display());
                Self::from_parts(r.region_vol, r.adjacency)
            }

            /// 将区域体和邻接图写入图资源文件. 查找表和求解器不会被保存.
            pub fn save<P: AsRef<Path>>(&self, path: P) -> CarvingResult<()> {
                let file = File::create(path.as_ref())?;
                let mut e = ZlibEncoder::new(BufWriter::new(file), Compression::default());
                let r = GraphResourceRef {
                    region_vol: &self.region_vol,
                    adjacency: &self.adjacency,
                };
                bincode::serialize_into(&mut e, &r)?;
                e.finish()?.flush()?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SegmentationEngine;
    use ndarray_npy::write_npy;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("carve-berry-{}-{name}", std::process::id()));
        p
    }

    #[test]
    fn test_from_npy() {
        let p = temp_path("region.npy");
        let v = Array3::from_shape_fn((2, 3, 4), |(z, _, w)| (z * 2 + w / 2) as u32);
        write_npy(&p, &v).unwrap();
        let g = SupervoxelGraph::from_npy(&p).unwrap();
        assert_eq!(g.num_nodes(), 4);
        assert_eq!(g.region_volume(), v.view());
        std::fs::remove_file(&p).unwrap();
    }

    #[test]
    fn test_missing_npy() {
        let p = temp_path("does-not-exist.npy");
        assert!(matches!(SupervoxelGraph::from_npy(&p), Err(CarvingError::Npz(_))));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_graph_resource_file() {
        let p = temp_path("graph.bin");
        let v = Array3::from_shape_fn((3, 3, 3), |(z, h, _)| (z + h) as u32);
        let g = SupervoxelGraph::from_region_volume(v).unwrap();
        g.save(&p).unwrap();

        let r = SupervoxelGraph::open(&p).unwrap();
        assert_eq!(r.region_volume(), g.region_volume());
        assert_eq!(r.adjacency(), g.adjacency());
        assert_eq!(r.num_nodes(), 5);
        std::fs::remove_file(&p).unwrap();
    }
}
