//! Mappings between a *moving* coordinate space and a *target* coordinate
//! space.
//!
//! Transformations are normally produced by a registration algorithm which
//! lives outside this workspace. Anything implementing [`Transformation`] can
//! be plugged into the resampling accessors; [`Identity`] and [`Affine`] cover
//! the cases where the mapping is known up front.

use nalgebra as na;
use crate::{Point, Vector};

pub trait Transformation: Send + Sync {
    /// Map a point from moving space into target space.
    fn transform(&self, moving: &Point) -> Option<Point>;

    /// Map a point from target space back into moving space.
    fn transform_inverse(&self, target: &Point) -> Option<Point>;
}

/// Moving and target spaces coincide
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Identity;

impl Transformation for Identity {
    fn transform        (&self, moving: &Point) -> Option<Point> { Some(*moving) }
    fn transform_inverse(&self, target: &Point) -> Option<Point> { Some(*target) }
}

/// `target = linear * moving + translation`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    linear: na::Matrix3<f64>,
    translation: Vector,
    inverse: na::Matrix3<f64>,
}

impl Affine {

    /// Returns `None` if `linear` is singular.
    pub fn new(linear: na::Matrix3<f64>, translation: Vector) -> Option<Self> {
        let inverse = linear.try_inverse()?;
        Some(Self { linear, translation, inverse })
    }

    pub fn translation(translation: Vector) -> Self {
        let linear = na::Matrix3::identity();
        Self { linear, translation, inverse: linear }
    }

    /// Rotation by `angle` radians about the z-axis passing through `centre`.
    pub fn rotation_z(angle: f64, centre: Point) -> Self {
        let rotation = na::Rotation3::from_axis_angle(&na::Vector3::z_axis(), angle);
        let linear = rotation.into_inner();
        let translation = centre.coords - linear * centre.coords;
        Self { linear, translation, inverse: linear.transpose() }
    }

    pub fn inverse(&self) -> Self {
        Self {
            linear: self.inverse,
            translation: -(self.inverse * self.translation),
            inverse: self.linear,
        }
    }
}

impl Transformation for Affine {
    fn transform(&self, moving: &Point) -> Option<Point> {
        Some(Point::from(self.linear * moving.coords + self.translation))
    }

    fn transform_inverse(&self, target: &Point) -> Option<Point> {
        Some(Point::from(self.inverse * (target.coords - self.translation)))
    }
}
