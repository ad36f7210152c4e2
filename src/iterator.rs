//! Sequential traversal of dose values, optionally restricted to a mask

use log::debug;

use crate::accessor::{new_uid, require, require_same_geometry, DoseAccessorRef, MaskAccessorRef};
use crate::error::Result;
use crate::types::{Dosef64, Fractionf64, Volumef64, VoxelGridId};

/// One step of a dose traversal
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DoseSample {
    pub id: VoxelGridId,
    pub value: Dosef64,
    /// Fraction of the voxel's volume that counts towards the traversal
    pub relevant_fraction: Fractionf64,
}

/// A restartable stream of dose samples sharing a single voxel volume.
///
/// Pulling a sample may fail if any accessor in the underlying pipeline
/// fails; consumers are expected to stop at the first error.
pub trait DoseIterator: Iterator<Item = Result<DoseSample>> + Send {
    fn voxel_volume(&self) -> Volumef64;

    /// Rewind to the first sample
    fn reset(&mut self);

    fn uid(&self) -> &str;
}

// --------------------------------------------------------------------------------
/// Every voxel of an accessor, in id order, with full relevance
pub struct GridDoseIterator {
    accessor: DoseAccessorRef,
    next: VoxelGridId,
    uid: String,
}

impl GridDoseIterator {
    pub fn new(accessor: impl Into<Option<DoseAccessorRef>>) -> Result<Self> {
        let accessor = require(accessor.into(), "dose iterator needs a dose accessor")?;
        Ok(Self { accessor, next: 0, uid: new_uid() })
    }
}

impl Iterator for GridDoseIterator {
    type Item = Result<DoseSample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.accessor.grid_size() { return None }
        let id = self.next;
        self.next += 1;
        Some(self.accessor.value_at(id).map(|value| DoseSample { id, value, relevant_fraction: 1.0 }))
    }
}

impl DoseIterator for GridDoseIterator {
    fn voxel_volume(&self) -> Volumef64 { self.accessor.geometric_info().voxel_volume() }
    fn reset(&mut self) { self.next = 0 }
    fn uid(&self) -> &str { &self.uid }
}

// --------------------------------------------------------------------------------
/// The voxels of a mask, in mask order, weighted by their relevant fraction
pub struct MaskedDoseIterator {
    dose: DoseAccessorRef,
    mask: MaskAccessorRef,
    position: usize,
    /// Set once the mask failed to yield its voxels; cleared by `reset`
    failed: bool,
    uid: String,
}

impl MaskedDoseIterator {
    pub fn new(
        dose: impl Into<Option<DoseAccessorRef>>,
        mask: impl Into<Option<MaskAccessorRef>>,
    ) -> Result<Self> {
        let dose = require(dose.into(), "masked dose iterator needs a dose accessor")?;
        let mask = require(mask.into(), "masked dose iterator needs a mask accessor")?;
        require_same_geometry(dose.geometric_info(), mask.geometric_info(), "masked dose iterator")?;
        debug!("iterating dose {} through mask {}", dose.uid(), mask.uid());
        Ok(Self { dose, mask, position: 0, failed: false, uid: new_uid() })
    }
}

impl Iterator for MaskedDoseIterator {
    type Item = Result<DoseSample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed { return None }
        let voxel = match self.mask.relevant_voxels() {
            Ok(voxels) => *voxels.get(self.position)?,
            Err(e) => {
                self.failed = true;
                return Some(Err(e))
            }
        };
        self.position += 1;
        Some(self.dose.value_at(voxel.id).map(|value| DoseSample {
            id: voxel.id,
            value,
            relevant_fraction: voxel.relevant_fraction,
        }))
    }
}

impl DoseIterator for MaskedDoseIterator {
    fn voxel_volume(&self) -> Volumef64 { self.dose.geometric_info().voxel_volume() }
    fn reset(&mut self) {
        self.position = 0;
        self.failed = false;
    }
    fn uid(&self) -> &str { &self.uid }
}
