//! 已保存目标的持久化.
//!
//! 快照包含目标记录, 目标查找表, 当前目标名与参数. 超体素图本身由图资源文件
//! 单独保存, 快照只能恢复到节点个数一致的图上.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CarvingError, CarvingResult};
use crate::graph::SegmentationEngine;
use crate::solver::CarvingParams;
use crate::state::{CarvingState, ObjectTable, Output};
use crate::ObjectNumber;

/// 会话快照.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SessionSnapshot {
    /// 所有目标记录.
    pub objects: ObjectTable,

    /// 目标查找表.
    pub objects_lut: Vec<ObjectNumber>,

    /// 当前目标名.
    pub current: Option<String>,

    /// 参数.
    pub params: CarvingParams,
}

impl<E: SegmentationEngine> CarvingState<E> {
    /// 导出当前会话. 未加载超体素图时返回 `None`.
    pub fn export_session(&self) -> Option<SessionSnapshot> {
        let _t = self.drain().enter();
        let inner = self.read();
        let engine = inner.engine.as_ref()?;
        Some(SessionSnapshot {
            objects: inner.objects.clone(),
            objects_lut: engine.objects().to_vec(),
            current: inner.current.clone(),
            params: inner.params,
        })
    }

    /// 用快照覆盖当前会话的目标记录和目标查找表. 种子被清除.
    ///
    /// 快照查找表长度与节点个数不符时返回 `Err`, 会话保持不变.
    pub fn import_session(&self, snapshot: SessionSnapshot) -> CarvingResult<()> {
        {
            let _d = self.drain().drain();
            let mut inner = self.write();
            let inner = &mut *inner;
            let engine = inner.engine.as_mut().ok_or(CarvingError::GraphNotLoaded)?;
            if snapshot.objects_lut.len() != engine.num_nodes() {
                return Err(CarvingError::InvalidGraph(format!(
                    "session has {} nodes, graph has {}",
                    snapshot.objects_lut.len(),
                    engine.num_nodes()
                )));
            }
            engine.objects_mut().copy_from_slice(&snapshot.objects_lut);
            engine.clear_seeds();
            inner.seed_voxels.fill(crate::consts::label::UNSET);
            inner.objects = snapshot.objects;
            inner.current = snapshot.current;
            inner.params = snapshot.params;
            inner.stale = true;
            log::info!("imported session with {} objects", inner.objects.saved_len());
        }
        self.notify(&[Output::DoneObjects, Output::Seeds]);
        Ok(())
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "serde")] {
        use std::fs::File;
        use std::io::{BufReader, BufWriter, Write};
        use std::path::Path;

        use flate2::read::ZlibDecoder;
        use flate2::write::ZlibEncoder;
        use flate2::Compression;

        impl SessionSnapshot {
            /// 以 zlib 压缩的 bincode 格式写入文件.
            pub fn save<P: AsRef<Path>>(&self, path: P) -> CarvingResult<()> {
                let file = File::create(path.as_ref())?;
                let mut e = ZlibEncoder::new(BufWriter::new(file), Compression::best());
                bincode::serialize_into(&mut e, self)?;
                e.finish()?.flush()?;
                Ok(())
            }

            /// 从文件读取.
            pub fn open<P: AsRef<Path>>(path: P) -> CarvingResult<Self> {
                let file = File::open(path.as_ref())?;
                Ok(bincode::deserialize_from(ZlibDecoder::new(BufReader::new(file)))?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::label;
    use crate::graph::SupervoxelGraph;
    use crate::roi::Roi;
    use ndarray::Array3;

    fn state() -> CarvingState {
        let v = Array3::from_shape_fn((1, 2, 4), |(_, h, w)| (h * 4 + w) as u32);
        CarvingState::with_engine(SupervoxelGraph::from_region_volume(v).unwrap())
    }

    fn paint(s: &CarvingState, pos: (usize, usize, usize), value: u8) {
        let one = Array3::from_elem((1, 1, 1), value);
        s.write_seeds(&Roi::voxel(pos), one.view()).unwrap();
    }

    #[test]
    fn test_export_import() {
        let a = state();
        paint(&a, (0, 0, 1), label::FOREGROUND);
        paint(&a, (0, 1, 3), label::BACKGROUND);
        a.recompute();
        assert!(a.save_object_as("cell"));

        let snap = a.export_session().unwrap();
        assert_eq!(snap.objects_lut[1], 1);
        assert_eq!(snap.current.as_deref(), Some("cell"));

        let b = state();
        b.import_session(snap.clone()).unwrap();
        assert_eq!(b.object_names(), vec!["cell"]);
        assert_eq!(b.done_object_names_for_position((0, 0, 1)), vec!["cell"]);
        assert_eq!(b.export_session().unwrap(), snap);
        assert_eq!(b.load_object("cell").unwrap(), (vec![(0, 0, 1)], vec![(0, 1, 3)]));
    }

    #[test]
    fn test_import_mismatch() {
        let a = state();
        let mut snap = a.export_session().unwrap();
        snap.objects_lut.push(0);
        assert!(matches!(
            a.import_session(snap),
            Err(CarvingError::InvalidGraph(_))
        ));
        assert!(CarvingState::<SupervoxelGraph>::unloaded().export_session().is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_snapshot_file() {
        let a = state();
        paint(&a, (0, 1, 0), label::FOREGROUND);
        a.recompute();
        a.save_object_as("x");
        let snap = a.export_session().unwrap();

        let mut p = std::env::temp_dir();
        p.push(format!("carve-berry-{}-session.bin", std::process::id()));
        snap.save(&p).unwrap();
        assert_eq!(SessionSnapshot::open(&p).unwrap(), snap);
        std::fs::remove_file(&p).unwrap();
    }
}
