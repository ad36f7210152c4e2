//! The size, granularity and placement in patient space of a regular 3D grid

use crate::error::{Error, Result};
use crate::index::{index1_to_3, index3_in_box, index3_to_1, n_voxels};
use crate::types::{BoxDim, ContinuousIndex, Index3, Orientation, Point, Vector, VoxelGridId, Volumef64};

/// Geometry of a dose (or mask) grid.
///
/// `origin` is the world position of the *centre* of voxel `[0,0,0]`. Column
/// `i` of `orientation` is the world-space direction of grid axis `i`.
/// Equality is structural and exact: two grids are only interchangeable if
/// every component matches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometricInfo {
    n: BoxDim,
    spacing: Vector,
    origin: Point,
    orientation: Orientation,
    inverse_orientation: Orientation,
}

impl GeometricInfo {

    pub fn new(n: BoxDim, spacing: Vector, origin: Point, orientation: Orientation) -> Result<Self> {
        if spacing.iter().any(|&s| !(s > 0.0)) {
            return Err(Error::param(format!("grid spacing must be positive, got {spacing:?}")));
        }
        let inverse_orientation = orientation.try_inverse()
            .ok_or_else(|| Error::param("grid orientation matrix is singular"))?;
        Ok(Self { n, spacing, origin, orientation, inverse_orientation })
    }

    /// Grid whose axes coincide with the world axes
    pub fn axis_aligned(n: BoxDim, spacing: Vector, origin: Point) -> Result<Self> {
        Self::new(n, spacing, origin, Orientation::identity())
    }

    pub fn n          (&self) -> BoxDim      { self.n }
    pub fn spacing    (&self) -> Vector      { self.spacing }
    pub fn origin     (&self) -> Point       { self.origin }
    pub fn orientation(&self) -> Orientation { self.orientation }

    pub fn number_of_voxels(&self) -> usize { n_voxels(self.n) }

    /// Volume of a single voxel in mm³
    pub fn voxel_volume(&self) -> Volumef64 { self.spacing.x * self.spacing.y * self.spacing.z }

    pub fn valid_id   (&self, id: VoxelGridId) -> bool { id < self.number_of_voxels() }
    pub fn valid_index(&self, index: Index3  ) -> bool { index3_in_box(index, self.n) }

    pub fn id_to_index(&self, id: VoxelGridId) -> Option<Index3> {
        self.valid_id(id).then(|| index1_to_3(id, self.n))
    }

    pub fn index_to_id(&self, index: Index3) -> Option<VoxelGridId> {
        self.valid_index(index).then(|| index3_to_1(index, self.n))
    }

    /// World position of the centre of the voxel with the given index
    pub fn index_to_world(&self, index: Index3) -> Option<Point> {
        self.valid_index(index).then(|| {
            let [x, y, z] = index;
            self.continuous_index_to_world(&ContinuousIndex::new(x as f64, y as f64, z as f64))
        })
    }

    pub fn id_to_world(&self, id: VoxelGridId) -> Option<Point> {
        self.id_to_index(id).and_then(|index| self.index_to_world(index))
    }

    /// Total: fractional positions outside the grid are perfectly meaningful
    pub fn continuous_index_to_world(&self, c: &ContinuousIndex) -> Point {
        self.origin + self.orientation * c.component_mul(&self.spacing)
    }

    /// Total: integer values of the result coincide with voxel centres
    pub fn world_to_continuous_index(&self, p: &Point) -> ContinuousIndex {
        (self.inverse_orientation * (p - self.origin)).component_div(&self.spacing)
    }

    /// Index of the voxel containing `p`
    pub fn world_to_index(&self, p: &Point) -> Option<Index3> {
        let c = self.world_to_continuous_index(p);
        let nearest = |x: f64, n: usize| {
            let i = (x + 0.5).floor();
            (i >= 0.0 && i < n as f64).then_some(i as usize)
        };
        let [nx, ny, nz] = self.n;
        Some([nearest(c.x, nx)?, nearest(c.y, ny)?, nearest(c.z, nz)?])
    }

    pub fn world_to_id(&self, p: &Point) -> Option<VoxelGridId> {
        self.world_to_index(p).and_then(|index| self.index_to_id(index))
    }

    pub fn is_inside(&self, p: &Point) -> bool { self.world_to_index(p).is_some() }
}

#[cfg(test)]
pub(crate) fn cube(n: usize, spacing: f64) -> GeometricInfo {
    GeometricInfo::axis_aligned([n, n, n], Vector::new(spacing, spacing, spacing), Point::origin()).unwrap()
}
