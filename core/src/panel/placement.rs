//! Placement of assembled panels into the full-mesh preview.

use super::side::Triangle;
use crate::geometry::{frame_from_axes, segment_length, shared_endpoint, ApproxEq, Segment3, Transform3, Vector3};
use crate::kernel::{KernelOpError, MeshHost};
use crate::topo::FaceId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlacementError {
    #[error("no edge of {face} has length {length:.3} mm")]
    NoMatchingEdge { face: FaceId, length: f64 },

    #[error("the matched edges of {0} share no vertex")]
    NoSharedVertex(FaceId),

    #[error("degenerate target frame on {0}")]
    DegenerateFrame(FaceId),

    #[error(transparent)]
    Host(#[from] KernelOpError),
}

/// Local frame of the template panel: the long side runs along +X from the origin, the
/// panel lies in the XY plane and the frame origin sits half a panel thickness above it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateBasis {
    pub frame: Transform3,
}

impl TemplateBasis {
    pub fn for_thickness(thickness: f64) -> Self {
        Self {
            frame: Transform3::translation(0.0, 0.0, thickness / 2.0),
        }
    }
}

fn matches_length(edge: &Segment3, length: f64) -> bool {
    segment_length(edge).approx_eq(&length)
}

fn find_edge(edges: &[Segment3], length: f64, skip: Option<usize>) -> Option<usize> {
    (0..edges.len()).find(|&i| Some(i) != skip && matches_length(&edges[i], length))
}

/// Rigid transform taking the template frame onto a target face.
///
/// `edges` are the target face's edges in millimetres. The edges are matched to the
/// canonical sides by length; with equal lengths the first match in `edges` order wins.
pub fn solve(
    template: &TemplateBasis,
    face: FaceId,
    edges: &[Segment3],
    normal: &Vector3,
    long_side: f64,
    second_side: f64,
) -> Result<Transform3, PlacementError> {
    let long = find_edge(edges, long_side, None)
        .ok_or(PlacementError::NoMatchingEdge { face, length: long_side })?;
    let second = find_edge(edges, second_side, Some(long))
        .ok_or(PlacementError::NoMatchingEdge { face, length: second_side })?;

    let candidates = edges
        .iter()
        .filter(|e| matches_length(e, long_side) || matches_length(e, second_side))
        .count();
    if candidates > 2 {
        debug!("Placement on {} is ambiguous; using first matching edges", face);
    }

    let origin = shared_endpoint(&edges[long], &edges[second]).ok_or(PlacementError::NoSharedVertex(face))?;
    let (a, b) = edges[long];
    let far = if (a - origin).norm() < (b - origin).norm() { b } else { a };

    let target = frame_from_axes(&origin, &(far - origin), normal).ok_or(PlacementError::DegenerateFrame(face))?;
    Ok(target * template.frame.inverse())
}

/// Solve placement for a mesh face using its canonical triangle.
pub fn solve_for_face<H: MeshHost + ?Sized>(
    host: &H,
    face: FaceId,
    template: &TemplateBasis,
    triangle: &Triangle,
) -> Result<Transform3, PlacementError> {
    let scale = host.native_unit().mm_per_unit();
    let edges = host
        .edges_of(face)?
        .into_iter()
        .map(|e| host.edge_endpoints(e).map(|(a, b)| (a * scale, b * scale)))
        .collect::<Result<Vec<_>, _>>()?;
    let normal = host.face_normal_at(face, &host.point_on_face(face)?)?;

    solve(template, face, &edges, &normal, triangle.side1().length, triangle.side2().length)
}
