//! Host abstraction layer.
//!
//! The panelizer never touches a CAD document directly. Mesh queries go through
//! [`MeshHost`], template manipulation and export go through [`PanelKernel`], so the
//! traversal runs unchanged against an in-memory mesh or a real CAD session.

pub mod types;
mod manifest;
mod memory;

pub use manifest::{ManifestKernel, PanelManifest};
pub use memory::{MemoryMesh, MeshData};
pub use types::*;

use crate::geometry::{self, Point3, Transform3, Vector3};
use crate::topo::{EdgeId, FaceId};
use crate::units::LengthUnit;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during host operations.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelOpError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),
}

/// Result type for host operations.
pub type KernelResult<T> = Result<T, KernelOpError>;

/// Read-only view of the mesh being panelized.
///
/// Face and edge enumeration order must be stable for the lifetime of one traversal;
/// edge indices and hinge roles are derived from it.
pub trait MeshHost: Send + Sync {
    /// Name used as the prefix of every exported panel file.
    fn mesh_name(&self) -> &str;

    /// Unit the host reports coordinates in.
    fn native_unit(&self) -> LengthUnit;

    /// All faces in traversal order.
    fn list_faces(&self) -> Vec<FaceId>;

    /// Number of distinct edges in the mesh.
    fn unique_edge_count(&self) -> usize;

    /// Edges bounding a face, in loop order.
    fn edges_of(&self, face: FaceId) -> KernelResult<Vec<EdgeId>>;

    /// Faces bordering an edge, in host order. One face means an open edge.
    fn adjacent_faces(&self, edge: EdgeId) -> KernelResult<Vec<FaceId>>;

    /// Start and end point of an edge in native units.
    fn edge_endpoints(&self, edge: EdgeId) -> KernelResult<(Point3, Point3)>;

    /// Whether the co-edge of `edge` in `face`'s loop runs end → start.
    fn coedge_opposed(&self, edge: EdgeId, face: FaceId) -> KernelResult<bool>;

    /// A point strictly inside the face.
    fn point_on_face(&self, face: FaceId) -> KernelResult<Point3>;

    /// Outward unit normal of the face at `point`.
    fn face_normal_at(&self, face: FaceId, point: &Point3) -> KernelResult<Vector3>;

    /// Edge length in millimetres.
    fn edge_length_mm(&self, edge: EdgeId) -> KernelResult<f64> {
        let (start, end) = self.edge_endpoints(edge)?;
        Ok(self.native_unit().to_mm(geometry::distance(&start, &end)))
    }
}

/// Template-side operations: body lookup, parametric sizing, combine and export.
pub trait PanelKernel: Send {
    /// A body in the template document.
    type Body: Clone;

    /// A frame body with key and hinge bodies combined onto it, pending export.
    type Assembly;

    /// Find a body by name, either in the root component (`container = None`) or inside
    /// the named component.
    fn lookup_named_body(&self, container: Option<&str>, name: &str) -> Option<Self::Body>;

    /// Every body of a component, in host order. `None` if the component does not exist.
    fn component_bodies(&self, component: &str) -> Option<Vec<Self::Body>>;

    /// Current value of a user parameter.
    fn parameter_value(&self, name: &str) -> Option<f64>;

    /// Drive a length parameter of the template panel, in millimetres.
    fn set_parametric_length(&mut self, name: &str, mm: f64) -> KernelResult<()>;

    /// Combine `parts` onto `frame`.
    fn assemble(&mut self, frame: &Self::Body, parts: &[Self::Body]) -> KernelResult<Self::Assembly>;

    /// Write an assembled panel to `path`.
    fn export_panel(&mut self, assembly: &Self::Assembly, path: &Path) -> KernelResult<()>;

    /// Place a copy of an assembled panel into the preview assembly.
    fn place_in_preview(&mut self, assembly: &Self::Assembly, transform: &Transform3) -> KernelResult<()>;

    /// Undo the combine, returning the template to its pristine state.
    fn release(&mut self, assembly: Self::Assembly);

    /// Cosmetically mark a mesh face.
    fn set_appearance(&mut self, face: FaceId, appearance: Appearance) -> KernelResult<()>;

    /// File extension of exported panels.
    fn export_extension(&self) -> &str {
        "stl"
    }
}
