//! Sampling a dose grid at arbitrary world coordinates

use itertools::iproduct;
use serde::Deserialize;

use crate::accessor::DoseAccessorRef;
use crate::error::{Error, Result};
use crate::geometric_info::GeometricInfo;
use crate::index::signed_index3_in_box;
use crate::types::{ContinuousIndex, Dosef64, Index3, Point};

/// Strategy for reading a value between voxel centres.
///
/// A strategy is bound to one source accessor at a time; sampling before
/// binding fails with `NullReference`.
pub trait Interpolation: Send + Sync {
    fn set_accessor(&mut self, accessor: DoseAccessorRef);
    fn accessor(&self) -> Option<&DoseAccessorRef>;

    /// Value of the bound accessor at world position `p`. Fails with
    /// `MappingOutsideImage` if `p` lies outside the bound grid.
    fn value(&self, p: &Point) -> Result<Dosef64>;
}

/// Selects one of the built-in strategies, e.g. from a configuration file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterpolationKind {
    NearestNeighbor,
    #[default]
    Trilinear,
}

impl InterpolationKind {
    pub fn unbound(self) -> Box<dyn Interpolation> {
        match self {
            InterpolationKind::NearestNeighbor => Box::<NearestNeighbor>::default(),
            InterpolationKind::Trilinear       => Box::<Trilinear>     ::default(),
        }
    }

    pub fn bound_to(self, accessor: DoseAccessorRef) -> Box<dyn Interpolation> {
        let mut strategy = self.unbound();
        strategy.set_accessor(accessor);
        strategy
    }
}

fn bound(accessor: &Option<DoseAccessorRef>) -> Result<&DoseAccessorRef> {
    accessor.as_ref().ok_or_else(|| Error::null("interpolation has no source accessor"))
}

fn outside(p: &Point, info: &GeometricInfo) -> Error {
    Error::outside(format!("({:.3}, {:.3}, {:.3}) lies outside grid of size {:?}", p.x, p.y, p.z, info.n()))
}

// --------------------------------------------------------------------------------
/// Value of the voxel containing the point
#[derive(Default, Clone)]
pub struct NearestNeighbor {
    accessor: Option<DoseAccessorRef>,
}

impl Interpolation for NearestNeighbor {
    fn set_accessor(&mut self, accessor: DoseAccessorRef) { self.accessor = Some(accessor) }
    fn accessor(&self) -> Option<&DoseAccessorRef> { self.accessor.as_ref() }

    fn value(&self, p: &Point) -> Result<Dosef64> {
        let accessor = bound(&self.accessor)?;
        let info = accessor.geometric_info();
        let index = info.world_to_index(p).ok_or_else(|| outside(p, info))?;
        accessor.value_at_index(index)
    }
}

// --------------------------------------------------------------------------------
/// Weighted combination of the 8 voxels whose centres enclose the point
#[derive(Default, Clone)]
pub struct Trilinear {
    accessor: Option<DoseAccessorRef>,
}

impl Interpolation for Trilinear {
    fn set_accessor(&mut self, accessor: DoseAccessorRef) { self.accessor = Some(accessor) }
    fn accessor(&self) -> Option<&DoseAccessorRef> { self.accessor.as_ref() }

    fn value(&self, p: &Point) -> Result<Dosef64> {
        let accessor = bound(&self.accessor)?;
        let Neighbourhood { corners, fraction } = Neighbourhood::around(accessor, p)?;
        let mut v = [0.0; 8];
        for (slot, corner) in v.iter_mut().zip(corners) {
            *slot = corner.ok_or_else(|| outside(p, accessor.geometric_info()))?;
        }
        Ok(trilinear(&v, fraction))
    }
}

/// Standard trilinear weights. Corner `k` of `v` sits at offset
/// `(k & 1, (k >> 1) & 1, k >> 2)` from the lower corner; `f` is the position
/// of the point relative to the lower corner, in `[0,1]³`.
fn trilinear(v: &[Dosef64; 8], f: ContinuousIndex) -> Dosef64 {
    let (gx, gy, gz) = (1.0 - f.x, 1.0 - f.y, 1.0 - f.z);
    let c00 = v[0].mul_add(gx, v[1] * f.x);
    let c10 = v[2].mul_add(gx, v[3] * f.x);
    let c01 = v[4].mul_add(gx, v[5] * f.x);
    let c11 = v[6].mul_add(gx, v[7] * f.x);
    let c0 = c00.mul_add(gy, c10 * f.y);
    let c1 = c01.mul_add(gy, c11 * f.y);
    c0.mul_add(gz, c1 * f.z)
}

/// The 8-voxel cube enclosing a point.
///
/// Corners falling outside the grid are replaced by the nearest corner of the
/// same cube that lies inside it, found by flipping one, then two, then all
/// three axes. `None` marks a corner for which no replacement exists.
pub(crate) struct Neighbourhood {
    pub corners: [Option<Dosef64>; 8],
    pub fraction: ContinuousIndex,
}

/// Axes to flip when looking for a replacement corner, in order of preference
const RELAXATIONS: [[usize; 3]; 7] = [
    [1, 0, 0], [0, 1, 0], [0, 0, 1],
    [1, 1, 0], [1, 0, 1], [0, 1, 1],
    [1, 1, 1],
];

impl Neighbourhood {
    pub fn around(accessor: &DoseAccessorRef, p: &Point) -> Result<Self> {
        let info = accessor.geometric_info();
        if info.world_to_index(p).is_none() { return Err(outside(p, info)) }

        let c = info.world_to_continuous_index(p);
        let lower = c.map(f64::floor);
        let fraction = c - lower;
        let base = [lower.x as isize, lower.y as isize, lower.z as isize];
        let n = info.n();
        let at = |d: [usize; 3]| -> [isize; 3] {
            [base[0] + d[0] as isize, base[1] + d[1] as isize, base[2] + d[2] as isize]
        };
        let to_index = |i: [isize; 3]| -> Index3 { [i[0] as usize, i[1] as usize, i[2] as usize] };

        let mut corners = [None; 8];
        for (dz, dy, dx) in iproduct!(0..2_usize, 0..2_usize, 0..2_usize) {
            let d = [dx, dy, dz];
            let replacement = std::iter::once([0, 0, 0]).chain(RELAXATIONS)
                .map(|flip| at([d[0] ^ flip[0], d[1] ^ flip[1], d[2] ^ flip[2]]))
                .find(|&i| signed_index3_in_box(i, n));
            corners[dx + 2 * dy + 4 * dz] = match replacement {
                Some(i) => Some(accessor.value_at_index(to_index(i))?),
                None    => None,
            };
        }
        Ok(Self { corners, fraction })
    }
}
