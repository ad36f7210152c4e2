//! Masks: sparse per-voxel relevance of a grid to an anatomical structure.

use std::collections::HashMap;
use std::sync::OnceLock;

use itertools::iproduct;
use log::debug;

use crate::accessor::{new_uid, MaskAccessor, MaskVoxel, MutableMaskAccessor};
use crate::error::{Error, Result};
use crate::geometric_info::GeometricInfo;
use crate::types::{ContinuousIndex, Fractionf64, Lengthf64, Point, VoxelGridId};

/// Check a freshly produced voxel list: ids inside the grid, fractions in
/// [0,1], no id twice. Zero-fraction voxels are dropped.
fn validated(info: &GeometricInfo, voxels: Vec<MaskVoxel>) -> Result<(Vec<MaskVoxel>, HashMap<VoxelGridId, usize>)> {
    let mut kept = Vec::with_capacity(voxels.len());
    let mut position = HashMap::with_capacity(voxels.len());
    for voxel @ MaskVoxel { id, relevant_fraction } in voxels {
        if !info.valid_id(id) {
            return Err(Error::param(format!("mask voxel {id} outside grid")));
        }
        if !(0.0..=1.0).contains(&relevant_fraction) {
            return Err(Error::param(format!("mask voxel {id} has relevant fraction {relevant_fraction}")));
        }
        if relevant_fraction == 0.0 { continue }
        if position.insert(id, kept.len()).is_some() {
            return Err(Error::param(format!("mask voxel {id} listed twice")));
        }
        kept.push(voxel);
    }
    Ok((kept, position))
}

// --------------------------------------------------------------------------------
/// Mask held entirely in memory, editable voxel by voxel
#[derive(Clone, Debug)]
pub struct VoxelMaskAccessor {
    info: GeometricInfo,
    voxels: Vec<MaskVoxel>,
    position: HashMap<VoxelGridId, usize>,
    uid: String,
}

impl VoxelMaskAccessor {

    pub fn new(info: GeometricInfo, voxels: Vec<MaskVoxel>) -> Result<Self> {
        let (voxels, position) = validated(&info, voxels)?;
        Ok(Self { info, voxels, position, uid: new_uid() })
    }

    pub fn empty(info: GeometricInfo) -> Self {
        Self { info, voxels: vec![], position: HashMap::new(), uid: new_uid() }
    }

    /// Every voxel of the grid, fully relevant
    pub fn full(info: GeometricInfo) -> Self {
        let voxels: Vec<_> = (0..info.number_of_voxels()).map(|id| MaskVoxel::new(id, 1.0)).collect();
        let position = voxels.iter().enumerate().map(|(p, v)| (v.id, p)).collect();
        Self { info, voxels, position, uid: new_uid() }
    }

    fn reindex(&mut self) {
        self.position = self.voxels.iter().enumerate().map(|(p, v)| (v.id, p)).collect();
    }
}

impl MaskAccessor for VoxelMaskAccessor {
    fn geometric_info(&self) -> &GeometricInfo { &self.info }

    fn relevant_voxels(&self) -> Result<&[MaskVoxel]> { Ok(&self.voxels) }

    fn mask_at(&self, id: VoxelGridId) -> Result<Option<MaskVoxel>> {
        Ok(self.position.get(&id).map(|&p| self.voxels[p]))
    }

    fn uid(&self) -> &str { &self.uid }
}

impl MutableMaskAccessor for VoxelMaskAccessor {
    fn set_relevant_voxels(&mut self, voxels: Vec<MaskVoxel>) -> Result<()> {
        let (voxels, position) = validated(&self.info, voxels)?;
        self.voxels = voxels;
        self.position = position;
        Ok(())
    }

    fn set_mask_at(&mut self, voxel: MaskVoxel) -> Result<()> {
        let MaskVoxel { id, relevant_fraction } = voxel;
        if !self.info.valid_id(id) {
            return Err(Error::param(format!("mask voxel {id} outside grid")));
        }
        if !(0.0..=1.0).contains(&relevant_fraction) {
            return Err(Error::param(format!("mask voxel {id} has relevant fraction {relevant_fraction}")));
        }
        match (self.position.get(&id).copied(), relevant_fraction == 0.0) {
            (Some(p), false) => self.voxels[p].relevant_fraction = relevant_fraction,
            (Some(p), true ) => { self.voxels.remove(p); self.reindex(); }
            (None   , false) => { self.position.insert(id, self.voxels.len()); self.voxels.push(voxel); }
            (None   , true ) => {}
        }
        Ok(())
    }
}

// --------------------------------------------------------------------------------
/// Producer of mask voxels for a given grid: typically the rasterization of a
/// delineated structure.
pub trait MaskVoxelSource: Send + Sync {
    fn mask_voxels(&self, info: &GeometricInfo) -> Result<Vec<MaskVoxel>>;
}

impl<F> MaskVoxelSource for F
where
    F: Fn(&GeometricInfo) -> Result<Vec<MaskVoxel>> + Send + Sync,
{
    fn mask_voxels(&self, info: &GeometricInfo) -> Result<Vec<MaskVoxel>> { self(info) }
}

/// Mask computed lazily from a [`MaskVoxelSource`].
///
/// The voxel list is produced on first access and kept for the lifetime of
/// the accessor; to pick up a changed source, build a new accessor.
pub struct StructureMaskAccessor<S> {
    info: GeometricInfo,
    source: S,
    cache: OnceLock<(Vec<MaskVoxel>, HashMap<VoxelGridId, usize>)>,
    uid: String,
}

impl<S: MaskVoxelSource> StructureMaskAccessor<S> {
    pub fn new(info: GeometricInfo, source: S) -> Self {
        Self { info, source, cache: OnceLock::new(), uid: new_uid() }
    }

    fn cached(&self) -> Result<&(Vec<MaskVoxel>, HashMap<VoxelGridId, usize>)> {
        if let Some(cached) = self.cache.get() { return Ok(cached) }
        let voxels = self.source.mask_voxels(&self.info)?;
        let computed = validated(&self.info, voxels)?;
        debug!("mask {}: {} relevant voxels", self.uid, computed.0.len());
        Ok(self.cache.get_or_init(|| computed))
    }
}

impl<S: MaskVoxelSource> MaskAccessor for StructureMaskAccessor<S> {
    fn geometric_info(&self) -> &GeometricInfo { &self.info }

    fn relevant_voxels(&self) -> Result<&[MaskVoxel]> { Ok(&self.cached()?.0) }

    fn mask_at(&self, id: VoxelGridId) -> Result<Option<MaskVoxel>> {
        let (voxels, position) = self.cached()?;
        Ok(position.get(&id).map(|&p| voxels[p]))
    }

    fn uid(&self) -> &str { &self.uid }
}

// --------------------------------------------------------------------------------
/// Simple analytic regions of interest. Each voxel's relevant fraction is the
/// share of a regular `subdivisions`³ lattice of sample points inside the
/// voxel which fall inside the region.
#[derive(Clone, Copy, Debug)]
pub enum Roi {
    Sphere { centre: Point, radius: Lengthf64 },
    /// Axis-aligned box between two opposite corners
    Cuboid { min: Point, max: Point },
}

impl Roi {
    pub fn contains(&self, p: &Point) -> bool {
        match *self {
            Roi::Sphere { centre, radius } => (p - centre).norm_squared() <= radius * radius,
            Roi::Cuboid { min, max } =>
                (0..3).all(|i| min[i] <= p[i] && p[i] <= max[i]),
        }
    }

    pub fn rasterize(self, subdivisions: usize) -> impl MaskVoxelSource {
        move |info: &GeometricInfo| -> Result<Vec<MaskVoxel>> {
            if subdivisions == 0 {
                return Err(Error::param("ROI rasterization needs at least one subdivision"));
            }
            let k = subdivisions;
            let step = 1.0 / k as f64;
            let offset = |s: usize| (s as f64 + 0.5) * step - 0.5;
            let samples = (k * k * k) as Fractionf64;
            let mut voxels = vec![];
            for id in 0..info.number_of_voxels() {
                let Some([x, y, z]) = info.id_to_index(id) else { continue };
                let inside = iproduct!(0..k, 0..k, 0..k)
                    .filter(|&(a, b, c)| {
                        let sub = ContinuousIndex::new(x as f64 + offset(a),
                                                       y as f64 + offset(b),
                                                       z as f64 + offset(c));
                        self.contains(&info.continuous_index_to_world(&sub))
                    })
                    .count();
                if inside > 0 {
                    voxels.push(MaskVoxel::new(id, inside as Fractionf64 / samples));
                }
            }
            Ok(voxels)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometric_info::cube;
    use crate::types::Vector;
    use float_eq::assert_float_eq;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn hundred_voxels() -> GeometricInfo {
        GeometricInfo::axis_aligned([10, 10, 1], Vector::repeat(1.0), Point::origin()).unwrap()
    }

    #[test]
    fn lookup_reports_found_and_not_found() -> Result<()> {
        let voxels = (10..=30).map(|id| MaskVoxel::new(id, 1.0)).collect();
        let mask = VoxelMaskAccessor::new(hundred_voxels(), voxels)?;
        assert_eq!(mask.mask_at(5)?, None);
        assert_eq!(mask.relevance_at(5)?, 0.0);
        assert_eq!(mask.mask_at(20)?, Some(MaskVoxel::new(20, 1.0)));
        assert_eq!(mask.relevance_at(20)?, 1.0);
        assert_eq!(mask.mask_at(1000)?, None);
        assert_eq!(mask.relevant_voxels()?.len(), 21);
        Ok(())
    }

    #[test]
    fn invalid_voxel_lists_are_rejected() {
        let bad = |voxels: Vec<MaskVoxel>| {
            matches!(VoxelMaskAccessor::new(hundred_voxels(), voxels), Err(Error::InvalidParameter(_)))
        };
        assert!(bad(vec![MaskVoxel::new(100, 1.0)]));
        assert!(bad(vec![MaskVoxel::new(1, 1.5)]));
        assert!(bad(vec![MaskVoxel::new(1, -0.1)]));
        assert!(bad(vec![MaskVoxel::new(1, 0.5), MaskVoxel::new(1, 0.5)]));
    }

    #[test]
    fn zero_fractions_are_not_listed() -> Result<()> {
        let mask = VoxelMaskAccessor::new(hundred_voxels(), vec![MaskVoxel::new(3, 0.0), MaskVoxel::new(4, 0.2)])?;
        assert_eq!(mask.relevant_voxels()?, &[MaskVoxel::new(4, 0.2)]);
        Ok(())
    }

    #[test]
    fn editing_preserves_insertion_order() -> Result<()> {
        let mut mask = VoxelMaskAccessor::empty(hundred_voxels());
        mask.set_mask_at(MaskVoxel::new(7, 0.5))?;
        mask.set_mask_at(MaskVoxel::new(2, 1.0))?;
        mask.set_mask_at(MaskVoxel::new(9, 0.1))?;
        mask.set_mask_at(MaskVoxel::new(7, 0.75))?;
        mask.set_mask_at(MaskVoxel::new(2, 0.0))?;
        assert_eq!(mask.relevant_voxels()?, &[MaskVoxel::new(7, 0.75), MaskVoxel::new(9, 0.1)]);
        assert_eq!(mask.mask_at(9)?, Some(MaskVoxel::new(9, 0.1)));
        assert_eq!(mask.mask_at(2)?, None);
        mask.set_relevant_voxels(vec![MaskVoxel::new(1, 1.0)])?;
        assert_eq!(mask.mask_at(7)?, None);
        Ok(())
    }

    #[test]
    fn full_mask_covers_every_voxel() -> Result<()> {
        let mask = VoxelMaskAccessor::full(cube(3, 1.0));
        assert_eq!(mask.relevant_voxels()?.len(), 27);
        assert_eq!(mask.relevance_at(26)?, 1.0);
        Ok(())
    }

    #[test]
    fn structure_mask_is_computed_once() -> Result<()> {
        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let source = move |_: &GeometricInfo| -> Result<Vec<MaskVoxel>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![MaskVoxel::new(3, 0.5), MaskVoxel::new(1, 1.0)])
        };
        let mask = StructureMaskAccessor::new(hundred_voxels(), source);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(mask.relevance_at(3)?, 0.5);
        assert_eq!(mask.relevant_voxels()?, &[MaskVoxel::new(3, 0.5), MaskVoxel::new(1, 1.0)]);
        assert_eq!(mask.mask_at(2)?, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn structure_mask_propagates_source_failure() {
        let source = |_: &GeometricInfo| -> Result<Vec<MaskVoxel>> { Err(Error::param("no contour")) };
        let mask = StructureMaskAccessor::new(hundred_voxels(), source);
        assert!(matches!(mask.relevant_voxels(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn box_roi_covering_whole_voxels() -> Result<()> {
        // Voxel centres at 0,1,2,3; box edges on voxel boundaries
        let roi = Roi::Cuboid { min: Point::new(0.5, 0.5, 0.5), max: Point::new(2.5, 2.5, 2.5) };
        let mask = StructureMaskAccessor::new(cube(4, 1.0), roi.rasterize(4));
        let voxels = mask.relevant_voxels()?;
        assert_eq!(voxels.len(), 8);
        assert!(voxels.iter().all(|v| v.relevant_fraction == 1.0));
        assert_eq!(mask.relevance_at(0)?, 0.0);
        Ok(())
    }

    #[test]
    fn box_roi_partial_voxels() -> Result<()> {
        // Box cuts every voxel of the first x-column in half
        let roi = Roi::Cuboid { min: Point::new(-1.0, -1.0, -1.0), max: Point::new(0.0, 9.0, 9.0) };
        let mask = StructureMaskAccessor::new(cube(2, 1.0), roi.rasterize(2));
        let voxels = mask.relevant_voxels()?;
        assert_eq!(voxels.len(), 4);
        for v in voxels { assert_float_eq!(v.relevant_fraction, 0.5, ulps <= 1); }
        Ok(())
    }

    #[test]
    fn sphere_roi_contains_its_centre() -> Result<()> {
        let roi = Roi::Sphere { centre: Point::new(5.0, 5.0, 5.0), radius: 1.2 };
        let mask = StructureMaskAccessor::new(cube(11, 1.0), roi.rasterize(3));
        let centre = mask.geometric_info().world_to_id(&Point::new(5.0, 5.0, 5.0)).unwrap();
        assert_eq!(mask.relevance_at(centre)?, 1.0);
        assert_eq!(mask.relevance_at(0)?, 0.0);
        Ok(())
    }

    #[test]
    fn zero_subdivisions_is_an_error() {
        let roi = Roi::Sphere { centre: Point::origin(), radius: 1.0 };
        let mask = StructureMaskAccessor::new(cube(2, 1.0), roi.rasterize(0));
        assert!(matches!(mask.relevant_voxels(), Err(Error::InvalidParameter(_))));
    }
}
