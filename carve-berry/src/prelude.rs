//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx3d, ObjectNumber, SupervoxelId};

pub use crate::consts::label;
pub use crate::error::{CarvingError, CarvingResult};

pub use crate::graph::{home_graph_dir_with, Adjacency, SegmentationEngine, SupervoxelGraph};
pub use crate::roi::Roi;
pub use crate::session::SessionSnapshot;
pub use crate::solver::{CarvingParams, SeedOnly, Solver, Uncertainty};
pub use crate::state::{CarvingState, ObjectRecord, Output};
pub use crate::sync::ReaderDrain;
