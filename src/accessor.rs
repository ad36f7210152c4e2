//! Capability interfaces of the accessor graph.
//!
//! Every node in a dose pipeline is an accessor: something which can report
//! the geometry of its grid and produce a value for any voxel of that grid on
//! demand. Composed accessors (resampling, arithmetic, gamma index) hold
//! shared references to their operands and compute their values only when
//! asked.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::geometric_info::GeometricInfo;
use crate::types::{Dosef64, Fractionf64, Index3, VoxelGridId};

pub mod grid;
pub mod mask;

pub use grid::GridDoseAccessor;
pub use mask::{MaskVoxelSource, Roi, StructureMaskAccessor, VoxelMaskAccessor};

/// Shared handle to a node of a dose pipeline
pub type DoseAccessorRef = Arc<dyn DoseAccessor>;

/// Shared handle to a mask
pub type MaskAccessorRef = Arc<dyn MaskAccessor>;

/// Read access to a dense scalar grid.
pub trait DoseAccessor: Send + Sync {

    fn geometric_info(&self) -> &GeometricInfo;

    /// Value of the voxel with linear id `id`.
    ///
    /// Invalid ids are reported as `InvalidParameter` unless the
    /// implementation documents a padding policy.
    fn value_at(&self, id: VoxelGridId) -> Result<Dosef64>;

    fn uid(&self) -> &str;

    fn value_at_index(&self, index: Index3) -> Result<Dosef64> {
        let id = self.geometric_info().index_to_id(index)
            .ok_or_else(|| Error::param(format!("voxel index {index:?} outside grid")))?;
        self.value_at(id)
    }

    fn grid_size  (&self) -> usize                   { self.geometric_info().number_of_voxels() }
    fn valid_id   (&self, id: VoxelGridId   ) -> bool { self.geometric_info().valid_id(id)        }
    fn valid_index(&self, index: Index3     ) -> bool { self.geometric_info().valid_index(index)  }
}

/// A dose grid whose voxels can be overwritten.
pub trait MutableDoseAccessor: DoseAccessor {
    fn set_value_at(&mut self, id: VoxelGridId, value: Dosef64) -> Result<()>;

    fn set_value_at_index(&mut self, index: Index3, value: Dosef64) -> Result<()> {
        let id = self.geometric_info().index_to_id(index)
            .ok_or_else(|| Error::param(format!("voxel index {index:?} outside grid")))?;
        self.set_value_at(id, value)
    }
}

/// Partial membership of a single voxel in a structure
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaskVoxel {
    pub id: VoxelGridId,
    pub relevant_fraction: Fractionf64,
}

impl MaskVoxel {
    pub fn new(id: VoxelGridId, relevant_fraction: Fractionf64) -> Self { Self { id, relevant_fraction } }
}

/// Sparse per-voxel relevance of a grid to a structure.
///
/// Only voxels with non-zero relevance are listed, each at most once, in the
/// order in which they were first produced.
pub trait MaskAccessor: Send + Sync {

    fn geometric_info(&self) -> &GeometricInfo;

    /// All relevant voxels. Computed on first call, then cached.
    fn relevant_voxels(&self) -> Result<&[MaskVoxel]>;

    /// `None` if `id` is not part of the mask. Never fails on an id outside
    /// the grid: such voxels are simply not part of the mask.
    fn mask_at(&self, id: VoxelGridId) -> Result<Option<MaskVoxel>>;

    fn uid(&self) -> &str;

    /// Relevant fraction of `id`; 0 for voxels not in the mask
    fn relevance_at(&self, id: VoxelGridId) -> Result<Fractionf64> {
        Ok(self.mask_at(id)?.map_or(0.0, |v| v.relevant_fraction))
    }

    fn mask_at_index(&self, index: Index3) -> Result<Option<MaskVoxel>> {
        match self.geometric_info().index_to_id(index) {
            Some(id) => self.mask_at(id),
            None     => Ok(None),
        }
    }

    fn grid_size(&self) -> usize { self.geometric_info().number_of_voxels() }
}

/// A mask whose membership can be edited.
pub trait MutableMaskAccessor: MaskAccessor {
    /// Replace the whole voxel list
    fn set_relevant_voxels(&mut self, voxels: Vec<MaskVoxel>) -> Result<()>;

    /// Insert, update or (with fraction 0) remove a single voxel
    fn set_mask_at(&mut self, voxel: MaskVoxel) -> Result<()>;
}

pub(crate) fn new_uid() -> String { Uuid::new_v4().to_string() }

/// Composition nodes require operands on identical grids.
pub(crate) fn require_same_geometry(a: &GeometricInfo, b: &GeometricInfo, context: &str) -> Result<()> {
    if a == b { Ok(()) }
    else      { Err(Error::param(format!("{context}: operand geometries differ"))) }
}

pub(crate) fn require<T>(operand: Option<T>, what: &str) -> Result<T> {
    operand.ok_or_else(|| Error::null(what))
}
