//! Edge classification: index assignment, hinge role, convexity.

use super::error::{PanelError, PanelResult};
use super::side::{HingeRole, Side};
use crate::geometry::angle_between;
use crate::kernel::{KernelOpError, KernelResult, MeshHost};
use crate::topo::{EdgeId, EdgeVisit, FaceId, VisitedEdgeIndex};
use std::f64::consts::FRAC_PI_2;
use tracing::warn;

/// The three sides of a face in loop order.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceSides {
    pub sides: [Side; 3],
    /// Edges taken as not convex because the host could not evaluate a face normal.
    pub convexity_errors: Vec<(EdgeId, KernelOpError)>,
}

/// Hinge role for one visit to an edge.
///
/// The second visit always receives the complement of the first, so the two panels that
/// share an edge carry one tab and one socket.
pub fn role_for_visit(visit: EdgeVisit, open: bool) -> HingeRole {
    match visit {
        EdgeVisit::Repeat(i) => HingeRole::for_index(i).complement(),
        EdgeVisit::First(_) if open => HingeRole::OpenEdge,
        EdgeVisit::First(i) => HingeRole::for_index(i),
    }
}

/// Whether the dihedral angle across `edge` is convex.
///
/// `faces` are the edge's adjacent faces in host order. Fewer than two means the edge is
/// open, which is never convex. Coplanar faces are not convex either.
pub fn is_convex<H: MeshHost + ?Sized>(host: &H, edge: EdgeId, faces: &[FaceId]) -> KernelResult<bool> {
    let (f1, f2) = match faces {
        [f1, f2, ..] => (*f1, *f2),
        _ => return Ok(false),
    };

    let n1 = host.face_normal_at(f1, &host.point_on_face(f1)?)?;
    let n2 = host.face_normal_at(f2, &host.point_on_face(f2)?)?;

    // Direction opposite to the co-edge f1's loop walks along.
    let (start, end) = host.edge_endpoints(edge)?;
    let edge_dir = if host.coedge_opposed(edge, f1)? {
        end - start
    } else {
        start - end
    };

    Ok(angle_between(&edge_dir, &n1.cross(&n2)) > FRAC_PI_2)
}

/// Classify one edge of the face being processed.
///
/// A degenerate neighbour has no normal, so a failed convexity evaluation leaves the edge
/// not convex and is recorded in `convexity_errors` instead of failing the edge.
pub fn classify_edge<H: MeshHost + ?Sized>(
    host: &H,
    edge: EdgeId,
    visited: &mut VisitedEdgeIndex,
    convexity_errors: &mut Vec<(EdgeId, KernelOpError)>,
) -> KernelResult<Side> {
    let faces = host.adjacent_faces(edge)?;
    let open = faces.len() < 2;
    let length = host.edge_length_mm(edge)?;
    let convex = match is_convex(host, edge, &faces) {
        Ok(convex) => convex,
        Err(e) => {
            warn!("Convexity of {} unknown, treating as not convex: {}", edge, e);
            convexity_errors.push((edge, e));
            false
        }
    };
    let visit = visited.visit(edge);

    Ok(Side {
        index: visit.index(),
        length,
        hinge: role_for_visit(visit, open),
        convex,
    })
}

/// Classify the three edges of a face, in the face's loop order.
pub fn classify_face<H: MeshHost + ?Sized>(
    host: &H,
    face: FaceId,
    visited: &mut VisitedEdgeIndex,
) -> PanelResult<FaceSides> {
    let edges = host.edges_of(face)?;
    let &[e1, e2, e3] = edges.as_slice() else {
        return Err(PanelError::NonTriangularFace { face, edges: edges.len() });
    };

    let mut convexity_errors = Vec::new();
    let sides = [
        classify_edge(host, e1, visited, &mut convexity_errors)?,
        classify_edge(host, e2, visited, &mut convexity_errors)?,
        classify_edge(host, e3, visited, &mut convexity_errors)?,
    ];
    Ok(FaceSides { sides, convexity_errors })
}
