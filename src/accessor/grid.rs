use crate::accessor::{new_uid, DoseAccessor, MutableDoseAccessor};
use crate::error::{Error, Result};
use crate::geometric_info::GeometricInfo;
use crate::index::index3_to_1;
use crate::types::{Dosef64, Index1, Index3, VoxelGridId};

pub type GridData = Vec<Dosef64>;

/// Dense, in-memory dose grid: what a dose loader hands to the rest of the
/// pipeline.
#[derive(Clone, Debug)]
pub struct GridDoseAccessor {
    info: GeometricInfo,
    data: GridData,
    uid: String,
}

impl GridDoseAccessor {

    pub fn new(info: GeometricInfo, data: GridData) -> Result<Self> {
        if data.len() != info.number_of_voxels() {
            return Err(Error::param(format!(
                "grid with {} voxels cannot hold {} values", info.number_of_voxels(), data.len())));
        }
        Ok(Self { info, data, uid: new_uid() })
    }

    pub fn filled(info: GeometricInfo, value: Dosef64) -> Self {
        let data = vec![value; info.number_of_voxels()];
        Self { info, data, uid: new_uid() }
    }

    pub fn zeros(info: GeometricInfo) -> Self { Self::filled(info, 0.0) }

    /// Evaluate `f` at the centre of every voxel
    pub fn from_fn(info: GeometricInfo, f: impl Fn(Index3) -> Dosef64) -> Self {
        let data = (0..info.number_of_voxels())
            .filter_map(|id| info.id_to_index(id))
            .map(f)
            .collect();
        Self { info, data, uid: new_uid() }
    }

    /// Pull every voxel out of `accessor` once. This is how a caller caches an
    /// expensive pipeline which is going to be read repeatedly.
    pub fn materialize(accessor: &dyn DoseAccessor) -> Result<Self> {
        let data = (0..accessor.grid_size())
            .map(|id| accessor.value_at(id))
            .collect::<Result<_>>()?;
        Self::new(*accessor.geometric_info(), data)
    }

    pub fn data(&self) -> &[Dosef64] { &self.data }
}

impl DoseAccessor for GridDoseAccessor {
    fn geometric_info(&self) -> &GeometricInfo { &self.info }

    fn value_at(&self, id: VoxelGridId) -> Result<Dosef64> {
        self.data.get(id).copied()
            .ok_or_else(|| Error::param(format!("voxel id {id} outside grid of {} voxels", self.data.len())))
    }

    fn uid(&self) -> &str { &self.uid }
}

impl MutableDoseAccessor for GridDoseAccessor {
    fn set_value_at(&mut self, id: VoxelGridId, value: Dosef64) -> Result<()> {
        let n = self.data.len();
        let slot = self.data.get_mut(id)
            .ok_or_else(|| Error::param(format!("voxel id {id} outside grid of {n} voxels")))?;
        *slot = value;
        Ok(())
    }
}

impl core::ops::IndexMut<Index1> for GridDoseAccessor {
    #[inline]
    fn index_mut(&mut self, i: Index1) -> &mut Self::Output { &mut self.data[i] }
}

impl core::ops::Index<Index1> for GridDoseAccessor {
    type Output = Dosef64;
    #[inline]
    fn index(&self, i: Index1) -> &Self::Output { &self.data[i] }
}

impl core::ops::IndexMut<Index3> for GridDoseAccessor {
    fn index_mut(&mut self, i3: Index3) -> &mut Self::Output {
        let i1 = index3_to_1(i3, self.info.n());
        &mut self.data[i1]
    }
}

impl core::ops::Index<Index3> for GridDoseAccessor {
    type Output = Dosef64;
    fn index(&self, i3: Index3) -> &Self::Output {
        let i1 = index3_to_1(i3, self.info.n());
        &self.data[i1]
    }
}
