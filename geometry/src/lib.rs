//! Points, vectors and coordinate transformations in patient space.
//!
//! All coordinates are in millimetres, stored as plain `f64`s: they are
//! evaluated once per voxel lookup, deep inside the accessor graph.

use nalgebra as na;
use units::todo::Lengthf64;

mod transformation;

pub use transformation::{Transformation, Identity, Affine};

/// A position in world (patient) space
pub type Point  = na::Point3<Lengthf64>;

/// A displacement in world (patient) space
pub type Vector = na::Vector3<Lengthf64>;

/// Direction cosines of a grid: column `i` is the world-space direction of
/// grid axis `i`.
pub type Orientation = na::Matrix3<f64>;

/// Position measured in (fractional) voxels along each grid axis
pub type ContinuousIndex = na::Vector3<f64>;

