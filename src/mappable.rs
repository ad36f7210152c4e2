//! Resampling a dose grid into the geometry of another grid.
//!
//! A mappable accessor presents a *moving* dose on a *target* geometry: each
//! target voxel centre is carried into moving space by the inverse of a
//! [`Transformation`], and the moving dose is interpolated there.

use std::sync::Arc;

use itertools::iproduct;
use log::{debug, trace};
use serde::Deserialize;

use geometry::Transformation;

use crate::accessor::{new_uid, require, DoseAccessor, DoseAccessorRef};
use crate::error::{Error, Result};
use crate::geometric_info::GeometricInfo;
use crate::interpolation::{Interpolation, InterpolationKind};
use crate::types::{ContinuousIndex, Dosef64, Index3, Point, VoxelGridId};

pub type TransformationRef = Arc<dyn Transformation>;

/// What to do with target voxels which map outside the moving grid
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Padding {
    /// Report `default_outside_value` instead of failing
    #[serde(default = "default_accept_padding")]
    pub accept_padding: bool,

    #[serde(default)]
    pub default_outside_value: Dosef64,
}

fn default_accept_padding() -> bool { true }

impl Default for Padding {
    fn default() -> Self { Self { accept_padding: true, default_outside_value: 0.0 } }
}

impl Padding {
    pub fn reject() -> Self { Self { accept_padding: false, default_outside_value: 0.0 } }
    pub fn with_value(default_outside_value: Dosef64) -> Self { Self { accept_padding: true, default_outside_value } }

    fn apply(&self, what: impl FnOnce() -> String) -> Result<Dosef64> {
        if self.accept_padding {
            trace!("padding: {}", what());
            Ok(self.default_outside_value)
        } else {
            Err(Error::outside(what()))
        }
    }
}

/// Parts shared by all resampling accessors
struct Mapping {
    target: GeometricInfo,
    moving: DoseAccessorRef,
    transformation: TransformationRef,
    padding: Padding,
    uid: String,
}

impl Mapping {
    fn new(
        target: GeometricInfo,
        moving: Option<DoseAccessorRef>,
        transformation: Option<TransformationRef>,
        padding: Padding,
    ) -> Result<Self> {
        let moving = require(moving, "resampling needs a moving dose")?;
        let transformation = require(transformation, "resampling needs a transformation")?;
        debug!("resampling {} ({:?} voxels) onto {:?} grid", moving.uid(), moving.geometric_info().n(), target.n());
        Ok(Self { target, moving, transformation, padding, uid: new_uid() })
    }

    fn to_moving(&self, target_point: &Point) -> Option<Point> {
        self.transformation.transform_inverse(target_point)
    }

    fn id_of(&self, index: Index3) -> Result<VoxelGridId> {
        self.target.index_to_id(index)
            .ok_or_else(|| Error::outside(format!("target index {index:?} outside target grid")))
    }
}

// --------------------------------------------------------------------------------
/// Each target voxel takes the moving dose interpolated at the image of its
/// centre.
pub struct SimpleMappableAccessor {
    mapping: Mapping,
    interpolation: Box<dyn Interpolation>,
}

impl SimpleMappableAccessor {

    /// `interpolation` is (re)bound to `moving`.
    pub fn new(
        target: GeometricInfo,
        moving: impl Into<Option<DoseAccessorRef>>,
        transformation: impl Into<Option<TransformationRef>>,
        mut interpolation: Box<dyn Interpolation>,
        padding: Padding,
    ) -> Result<Self> {
        let mapping = Mapping::new(target, moving.into(), transformation.into(), padding)?;
        interpolation.set_accessor(mapping.moving.clone());
        Ok(Self { mapping, interpolation })
    }

    pub fn with_kind(
        target: GeometricInfo,
        moving: impl Into<Option<DoseAccessorRef>>,
        transformation: impl Into<Option<TransformationRef>>,
        kind: InterpolationKind,
        padding: Padding,
    ) -> Result<Self> {
        Self::new(target, moving, transformation, kind.unbound(), padding)
    }
}

impl DoseAccessor for SimpleMappableAccessor {
    fn geometric_info(&self) -> &GeometricInfo { &self.mapping.target }

    fn value_at(&self, id: VoxelGridId) -> Result<Dosef64> {
        let Mapping { target, padding, .. } = &self.mapping;
        let Some(target_point) = target.id_to_world(id) else {
            return padding.apply(|| format!("target voxel {id} outside target grid"));
        };
        let Some(moving_point) = self.mapping.to_moving(&target_point) else {
            return padding.apply(|| format!("transformation undefined at target voxel {id}"));
        };
        match self.interpolation.value(&moving_point) {
            Err(Error::MappingOutsideImage(why)) => padding.apply(|| why),
            other => other,
        }
    }

    fn value_at_index(&self, index: Index3) -> Result<Dosef64> {
        match self.mapping.id_of(index) {
            Ok(id) => self.value_at(id),
            Err(_) => self.mapping.padding.apply(|| format!("target index {index:?} outside target grid")),
        }
    }

    fn uid(&self) -> &str { &self.mapping.uid }
}

// --------------------------------------------------------------------------------
/// Volume-preserving resampling: each target voxel averages the trilinearly
/// interpolated moving dose at the centres of its 8 octants. Octants which
/// map outside the moving grid are ignored; a voxel with fewer than 3
/// surviving octants counts as outside.
pub struct RosuMappableAccessor {
    mapping: Mapping,
    interpolation: Box<dyn Interpolation>,
}

/// Minimum number of octants which must map inside the moving grid
const MIN_OCTANTS: usize = 3;

impl RosuMappableAccessor {
    pub fn new(
        target: GeometricInfo,
        moving: impl Into<Option<DoseAccessorRef>>,
        transformation: impl Into<Option<TransformationRef>>,
        padding: Padding,
    ) -> Result<Self> {
        let mapping = Mapping::new(target, moving.into(), transformation.into(), padding)?;
        let interpolation = InterpolationKind::Trilinear.bound_to(mapping.moving.clone());
        Ok(Self { mapping, interpolation })
    }
}

impl DoseAccessor for RosuMappableAccessor {
    fn geometric_info(&self) -> &GeometricInfo { &self.mapping.target }

    fn value_at(&self, id: VoxelGridId) -> Result<Dosef64> {
        let Mapping { target, moving, padding, .. } = &self.mapping;
        let Some([x, y, z]) = target.id_to_index(id) else {
            return padding.apply(|| format!("target voxel {id} outside target grid"));
        };
        let centre = ContinuousIndex::new(x as f64, y as f64, z as f64);
        let moving_info = moving.geometric_info();

        let mut sum = 0.0;
        let mut count = 0;
        for (dx, dy, dz) in iproduct!([-0.25, 0.25], [-0.25, 0.25], [-0.25, 0.25]) {
            let octant = target.continuous_index_to_world(&(centre + ContinuousIndex::new(dx, dy, dz)));
            let Some(moving_point) = self.mapping.to_moving(&octant) else { continue };
            if !moving_info.is_inside(&moving_point) { continue }
            match self.interpolation.value(&moving_point) {
                Ok(value) => { sum += value; count += 1; }
                Err(Error::MappingOutsideImage(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        if count < MIN_OCTANTS {
            return padding.apply(|| format!("only {count} octants of target voxel {id} inside moving grid"));
        }
        Ok(sum / count as f64)
    }

    fn value_at_index(&self, index: Index3) -> Result<Dosef64> {
        match self.mapping.id_of(index) {
            Ok(id) => self.value_at(id),
            Err(_) => self.mapping.padding.apply(|| format!("target index {index:?} outside target grid")),
        }
    }

    fn uid(&self) -> &str { &self.mapping.uid }
}
