pub use units::todo::{Dosef64, Fractionf64, Lengthf64, Volumef64};
pub use geometry::{Point, Vector, Orientation, ContinuousIndex};

pub use crate::index::{BoxDim, Index1, Index3, VoxelGridId};
