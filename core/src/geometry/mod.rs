//! Geometry primitives shared by the hosts and the panelizer. All math is nalgebra `f64`.

use nalgebra as na;

pub type Point3 = na::Point3<f64>;
pub type Vector3 = na::Vector3<f64>;
pub type Matrix3 = na::Matrix3<f64>;
/// Rigid motion: rotation plus translation.
pub type Transform3 = na::Isometry3<f64>;
/// An edge as its start and end point.
pub type Segment3 = (Point3, Point3);

/// Coordinates and lengths closer than this are equal.
pub const EPSILON: f64 = 1e-6;

pub trait ApproxEq {
    fn approx_eq(&self, other: &Self) -> bool;
}

impl ApproxEq for f64 {
    fn approx_eq(&self, other: &Self) -> bool {
        (self - other).abs() < EPSILON
    }
}

impl ApproxEq for Point3 {
    fn approx_eq(&self, other: &Self) -> bool {
        na::distance_squared(self, other) < EPSILON * EPSILON
    }
}

impl ApproxEq for Vector3 {
    fn approx_eq(&self, other: &Self) -> bool {
        (self - other).norm_squared() < EPSILON * EPSILON
    }
}

pub mod utils_3d;
pub use utils_3d::*;

pub fn distance(p1: &Point3, p2: &Point3) -> f64 {
    na::distance(p1, p2)
}

/// Length of a segment.
pub fn segment_length(segment: &Segment3) -> f64 {
    distance(&segment.0, &segment.1)
}
