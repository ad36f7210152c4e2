//! Per-voxel binary operators, and the accessors which apply them lazily to
//! pairs of grids.
//!
//! Operands must share their geometry exactly: the accessors look both up at
//! the same voxel id and never resample.

use std::collections::HashMap;
use std::sync::OnceLock;

use log::debug;

use crate::accessor::{new_uid, require, require_same_geometry};
use crate::accessor::{DoseAccessor, DoseAccessorRef, MaskAccessor, MaskAccessorRef, MaskVoxel};
use crate::error::Result;
use crate::geometric_info::GeometricInfo;
use crate::types::{Dosef64, Fractionf64, VoxelGridId};

// ------------------------------ operators ------------------------------

/// Combines two dose values
pub trait DoseFunctor: Send + Sync {
    fn calc(&self, a: Dosef64, b: Dosef64) -> Dosef64;
}

/// Combines a dose value with a mask relevance
pub trait DoseMaskFunctor: Send + Sync {
    fn calc(&self, dose: Dosef64, fraction: Fractionf64) -> Dosef64;
}

/// Combines two mask relevances; the result must lie in [0,1]
pub trait MaskFunctor: Send + Sync {
    fn calc(&self, a: Fractionf64, b: Fractionf64) -> Fractionf64;
}

impl<F> DoseFunctor for F
where
    F: Fn(Dosef64, Dosef64) -> Dosef64 + Send + Sync,
{
    fn calc(&self, a: Dosef64, b: Dosef64) -> Dosef64 { self(a, b) }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Add;

/// `w1·a + w2·b`
#[derive(Clone, Copy, Debug)]
pub struct AddWeighted { pub w1: f64, pub w2: f64 }

#[derive(Clone, Copy, Debug, Default)]
pub struct Multiply;

/// Dose scaled by the relevance of its voxel
#[derive(Clone, Copy, Debug, Default)]
pub struct DoseMaskMultiply;

/// `min(1, a + b)`
#[derive(Clone, Copy, Debug, Default)]
pub struct MaskAdd;

/// `max(0, a - b)`
#[derive(Clone, Copy, Debug, Default)]
pub struct MaskSubtract;

impl DoseFunctor for Add         { fn calc(&self, a: Dosef64, b: Dosef64) -> Dosef64 { a + b } }
impl DoseFunctor for AddWeighted { fn calc(&self, a: Dosef64, b: Dosef64) -> Dosef64 { self.w1 * a + self.w2 * b } }
impl DoseFunctor for Multiply    { fn calc(&self, a: Dosef64, b: Dosef64) -> Dosef64 { a * b } }

impl DoseMaskFunctor for DoseMaskMultiply {
    fn calc(&self, dose: Dosef64, fraction: Fractionf64) -> Dosef64 { dose * fraction }
}

impl MaskFunctor for MaskAdd      { fn calc(&self, a: Fractionf64, b: Fractionf64) -> Fractionf64 { (a + b).min(1.0) } }
impl MaskFunctor for MaskSubtract { fn calc(&self, a: Fractionf64, b: Fractionf64) -> Fractionf64 { (a - b).max(0.0) } }

// ------------------------------ dose ⊗ dose ------------------------------

/// `functor(lhs[i], rhs[i])`, recomputed on every access
pub struct BinaryFunctorAccessor<F> {
    lhs: DoseAccessorRef,
    rhs: DoseAccessorRef,
    functor: F,
    uid: String,
}

impl<F: DoseFunctor> BinaryFunctorAccessor<F> {
    pub fn new(
        lhs: impl Into<Option<DoseAccessorRef>>,
        rhs: impl Into<Option<DoseAccessorRef>>,
        functor: F,
    ) -> Result<Self> {
        let lhs = require(lhs.into(), "binary functor needs a left operand")?;
        let rhs = require(rhs.into(), "binary functor needs a right operand")?;
        require_same_geometry(lhs.geometric_info(), rhs.geometric_info(), "binary functor")?;
        debug!("binary functor over {} and {}", lhs.uid(), rhs.uid());
        Ok(Self { lhs, rhs, functor, uid: new_uid() })
    }
}

impl<F: DoseFunctor> DoseAccessor for BinaryFunctorAccessor<F> {
    fn geometric_info(&self) -> &GeometricInfo { self.lhs.geometric_info() }

    fn value_at(&self, id: VoxelGridId) -> Result<Dosef64> {
        Ok(self.functor.calc(self.lhs.value_at(id)?, self.rhs.value_at(id)?))
    }

    fn uid(&self) -> &str { &self.uid }
}

// ------------------------------ dose ⊗ mask ------------------------------

/// `functor(dose[i], relevance(mask, i))`, recomputed on every access
pub struct DoseMaskFunctorAccessor<F> {
    dose: DoseAccessorRef,
    mask: MaskAccessorRef,
    functor: F,
    uid: String,
}

impl<F: DoseMaskFunctor> DoseMaskFunctorAccessor<F> {
    pub fn new(
        dose: impl Into<Option<DoseAccessorRef>>,
        mask: impl Into<Option<MaskAccessorRef>>,
        functor: F,
    ) -> Result<Self> {
        let dose = require(dose.into(), "dose-mask functor needs a dose")?;
        let mask = require(mask.into(), "dose-mask functor needs a mask")?;
        require_same_geometry(dose.geometric_info(), mask.geometric_info(), "dose-mask functor")?;
        debug!("dose-mask functor over {} and {}", dose.uid(), mask.uid());
        Ok(Self { dose, mask, functor, uid: new_uid() })
    }
}

impl<F: DoseMaskFunctor> DoseAccessor for DoseMaskFunctorAccessor<F> {
    fn geometric_info(&self) -> &GeometricInfo { self.dose.geometric_info() }

    fn value_at(&self, id: VoxelGridId) -> Result<Dosef64> {
        Ok(self.functor.calc(self.dose.value_at(id)?, self.mask.relevance_at(id)?))
    }

    fn uid(&self) -> &str { &self.uid }
}

// ------------------------------ mask ⊗ mask ------------------------------

/// Voxel-wise combination of two masks.
///
/// Like every mask, the resulting voxel list is computed on first access and
/// cached. It lists the voxels of `lhs` first, in their order, followed by
/// those only present in `rhs`; voxels whose combined relevance is 0 are
/// dropped.
pub struct BinaryFunctorMaskAccessor<F> {
    lhs: MaskAccessorRef,
    rhs: MaskAccessorRef,
    functor: F,
    cache: OnceLock<(Vec<MaskVoxel>, HashMap<VoxelGridId, usize>)>,
    uid: String,
}

impl<F: MaskFunctor> BinaryFunctorMaskAccessor<F> {
    pub fn new(
        lhs: impl Into<Option<MaskAccessorRef>>,
        rhs: impl Into<Option<MaskAccessorRef>>,
        functor: F,
    ) -> Result<Self> {
        let lhs = require(lhs.into(), "mask functor needs a left operand")?;
        let rhs = require(rhs.into(), "mask functor needs a right operand")?;
        require_same_geometry(lhs.geometric_info(), rhs.geometric_info(), "mask functor")?;
        debug!("mask functor over {} and {}", lhs.uid(), rhs.uid());
        Ok(Self { lhs, rhs, functor, cache: OnceLock::new(), uid: new_uid() })
    }

    fn cached(&self) -> Result<&(Vec<MaskVoxel>, HashMap<VoxelGridId, usize>)> {
        if let Some(cached) = self.cache.get() { return Ok(cached) }
        let lhs = self.lhs.relevant_voxels()?;
        let rhs = self.rhs.relevant_voxels()?;
        let mut ids = Vec::with_capacity(lhs.len() + rhs.len());
        let mut fractions: HashMap<VoxelGridId, (Fractionf64, Fractionf64)> = HashMap::new();
        for v in lhs {
            if fractions.insert(v.id, (v.relevant_fraction, 0.0)).is_none() { ids.push(v.id) }
        }
        for v in rhs {
            fractions.entry(v.id)
                .and_modify(|(_, b)| *b = v.relevant_fraction)
                .or_insert_with(|| { ids.push(v.id); (0.0, v.relevant_fraction) });
        }
        let voxels: Vec<_> = ids.into_iter()
            .map(|id| { let (a, b) = fractions[&id]; MaskVoxel::new(id, self.functor.calc(a, b)) })
            .filter(|v| v.relevant_fraction > 0.0)
            .collect();
        let position = voxels.iter().enumerate().map(|(p, v)| (v.id, p)).collect();
        Ok(self.cache.get_or_init(|| (voxels, position)))
    }
}

impl<F: MaskFunctor> MaskAccessor for BinaryFunctorMaskAccessor<F> {
    fn geometric_info(&self) -> &GeometricInfo { self.lhs.geometric_info() }

    fn relevant_voxels(&self) -> Result<&[MaskVoxel]> { Ok(&self.cached()?.0) }

    fn mask_at(&self, id: VoxelGridId) -> Result<Option<MaskVoxel>> {
        let (voxels, position) = self.cached()?;
        Ok(position.get(&id).map(|&p| voxels[p]))
    }

    fn uid(&self) -> &str { &self.uid }
}
