//! 3D geometry utilities for panel placement and edge analysis.
//!
//! Pure functions over nalgebra points and vectors; nothing in here talks to a host.

use nalgebra as na;
use super::{ApproxEq, Matrix3, Point3, Segment3, Transform3, Vector3, EPSILON};

// =============================================================================
// Triangle Operations
// =============================================================================

/// Compute the unit normal of a triangle with counter-clockwise winding.
/// Returns `None` for degenerate (zero-area) triangles.
pub fn triangle_normal(v0: &Point3, v1: &Point3, v2: &Point3) -> Option<Vector3> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let n = edge1.cross(&edge2);
    if n.norm() < EPSILON {
        return None;
    }
    Some(n.normalize())
}

// =============================================================================
// Point / Vector Operations
// =============================================================================

/// Compute the centroid of a set of 3D points.
pub fn points_centroid(points: &[Point3]) -> Point3 {
    if points.is_empty() {
        return Point3::origin();
    }

    let sum: Vector3 = points.iter().map(|p| p.coords).sum();
    Point3::from(sum / points.len() as f64)
}

/// Unsigned angle between two vectors in `[0, π]`.
/// A zero-length operand yields 0.
pub fn angle_between(a: &Vector3, b: &Vector3) -> f64 {
    let denom = a.norm() * b.norm();
    if denom < EPSILON * EPSILON {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

/// Find the endpoint two segments have in common, if any.
pub fn shared_endpoint(a: &Segment3, b: &Segment3) -> Option<Point3> {
    [a.0, a.1]
        .into_iter()
        .find(|p| p.approx_eq(&b.0) || p.approx_eq(&b.1))
}

// =============================================================================
// Frames
// =============================================================================

/// Build a right-handed orthonormal frame from an origin, an X direction and an
/// approximate Z direction. X is kept exactly; Z is re-orthogonalised against it.
/// Returns `None` when the directions are degenerate or parallel.
pub fn frame_from_axes(origin: &Point3, x_dir: &Vector3, z_dir: &Vector3) -> Option<Transform3> {
    let x = x_dir.try_normalize(EPSILON)?;
    let y = z_dir.cross(&x).try_normalize(EPSILON)?;
    let z = x.cross(&y);

    let rotation = na::Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[x, y, z]));
    Some(Transform3::from_parts(
        na::Translation3::from(origin.coords),
        na::UnitQuaternion::from_rotation_matrix(&rotation),
    ))
}

// =============================================================================
// Tests
// =============================================================================
