//! In-memory mesh host.
//!
//! Holds a polygon mesh with an explicit edge adjacency table. Edges are numbered in the
//! order they are first met while walking faces in order, each face's loop in order.

use super::{KernelOpError, KernelResult, MeshHost};
use crate::geometry::{points_centroid, triangle_normal, Point3, Vector3};
use crate::topo::{EdgeId, FaceId};
use crate::units::LengthUnit;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serializable mesh document accepted by [`MemoryMesh::from_data`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub name: String,
    #[serde(default)]
    pub unit: LengthUnit,
    pub vertices: Vec<[f64; 3]>,
    /// Vertex loops, counter-clockwise seen from outside.
    pub faces: Vec<Vec<u32>>,
}

#[derive(Debug, Clone)]
pub struct MemoryMesh {
    name: String,
    unit: LengthUnit,
    vertices: Vec<Point3>,
    faces: Vec<Vec<u32>>,
    /// Vertex pairs, lower index first. This is also the edge's start → end direction.
    edges: Vec<[u32; 2]>,
    face_edges: Vec<Vec<EdgeId>>,
    edge_faces: Vec<Vec<FaceId>>,
}

fn normalize_edge(a: u32, b: u32) -> [u32; 2] {
    if a < b { [a, b] } else { [b, a] }
}

impl MemoryMesh {
    pub fn from_data(data: MeshData) -> KernelResult<Self> {
        let vertex_count = data.vertices.len();
        let mut edges: Vec<[u32; 2]> = Vec::new();
        let mut lookup: HashMap<[u32; 2], EdgeId> = HashMap::new();
        let mut face_edges = Vec::with_capacity(data.faces.len());
        let mut edge_faces: Vec<Vec<FaceId>> = Vec::new();

        for (f, face) in data.faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(KernelOpError::InvalidGeometry(format!(
                    "face {} has only {} vertices", f, face.len()
                )));
            }
            if let Some(v) = face.iter().find(|&&v| v as usize >= vertex_count) {
                return Err(KernelOpError::InvalidGeometry(format!(
                    "face {} references vertex {} but the mesh has {} vertices", f, v, vertex_count
                )));
            }

            let mut loop_edges = Vec::with_capacity(face.len());
            for i in 0..face.len() {
                let (a, b) = (face[i], face[(i + 1) % face.len()]);
                if a == b {
                    return Err(KernelOpError::InvalidGeometry(format!(
                        "face {} repeats vertex {}", f, a
                    )));
                }
                let key = normalize_edge(a, b);
                let id = *lookup.entry(key).or_insert_with(|| {
                    edges.push(key);
                    edge_faces.push(Vec::new());
                    EdgeId(edges.len() - 1)
                });
                edge_faces[id.0].push(FaceId(f));
                loop_edges.push(id);
            }
            face_edges.push(loop_edges);
        }

        Ok(Self {
            name: data.name,
            unit: data.unit,
            vertices: data.vertices.iter().map(|v| Point3::new(v[0], v[1], v[2])).collect(),
            faces: data.faces,
            edges,
            face_edges,
            edge_faces,
        })
    }

    pub fn from_json(json: &str) -> KernelResult<Self> {
        let data: MeshData = serde_json::from_str(json)
            .map_err(|e| KernelOpError::InvalidGeometry(format!("mesh document: {}", e)))?;
        Self::from_data(data)
    }

    /// Parse Wavefront OBJ text. Only `v` and `f` records are used; texture and normal
    /// references in face records are ignored.
    pub fn from_obj(name: &str, source: &str, unit: LengthUnit) -> KernelResult<Self> {
        let mut vertices: Vec<[f64; 3]> = Vec::new();
        let mut faces: Vec<Vec<u32>> = Vec::new();

        for (n, line) in source.lines().enumerate() {
            let line_no = n + 1;
            let mut split = line.split_whitespace();
            match split.next() {
                Some("v") => {
                    let coords: Vec<f64> = split
                        .take(3)
                        .map(|s| s.parse::<f64>())
                        .collect::<Result<_, _>>()
                        .map_err(|e| KernelOpError::InvalidGeometry(format!("line {}: {}", line_no, e)))?;
                    if coords.len() != 3 {
                        return Err(KernelOpError::InvalidGeometry(format!(
                            "line {}: vertex needs 3 coordinates", line_no
                        )));
                    }
                    vertices.push([coords[0], coords[1], coords[2]]);
                }
                Some("f") => {
                    let mut face = Vec::new();
                    for token in split {
                        let raw = token.split('/').next().unwrap_or(token);
                        let idx: i64 = raw.parse().map_err(|_| {
                            KernelOpError::InvalidGeometry(format!("line {}: bad vertex reference '{}'", line_no, token))
                        })?;
                        // OBJ is 1-based; negative indices count back from the last vertex.
                        let resolved = if idx < 0 { vertices.len() as i64 + idx } else { idx - 1 };
                        if resolved < 0 || resolved as usize >= vertices.len() {
                            return Err(KernelOpError::InvalidGeometry(format!(
                                "line {}: vertex reference {} out of range", line_no, idx
                            )));
                        }
                        face.push(resolved as u32);
                    }
                    faces.push(face);
                }
                _ => {}
            }
        }

        Self::from_data(MeshData {
            name: name.to_string(),
            unit,
            vertices,
            faces,
        })
    }

    pub fn to_data(&self) -> MeshData {
        MeshData {
            name: self.name.clone(),
            unit: self.unit,
            vertices: self.vertices.iter().map(|p| [p.x, p.y, p.z]).collect(),
            faces: self.faces.clone(),
        }
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges bordering exactly one face.
    pub fn open_edge_count(&self) -> usize {
        self.edge_faces.iter().filter(|f| f.len() == 1).count()
    }

    fn face(&self, face: FaceId) -> KernelResult<&[u32]> {
        self.faces
            .get(face.0)
            .map(Vec::as_slice)
            .ok_or_else(|| KernelOpError::UnknownEntity(face.to_string()))
    }

    fn edge(&self, edge: EdgeId) -> KernelResult<[u32; 2]> {
        self.edges
            .get(edge.0)
            .copied()
            .ok_or_else(|| KernelOpError::UnknownEntity(edge.to_string()))
    }
}

impl MeshHost for MemoryMesh {
    fn mesh_name(&self) -> &str {
        &self.name
    }

    fn native_unit(&self) -> LengthUnit {
        self.unit
    }

    fn list_faces(&self) -> Vec<FaceId> {
        (0..self.faces.len()).map(FaceId).collect()
    }

    fn unique_edge_count(&self) -> usize {
        self.edges.len()
    }

    fn edges_of(&self, face: FaceId) -> KernelResult<Vec<EdgeId>> {
        self.face_edges
            .get(face.0)
            .cloned()
            .ok_or_else(|| KernelOpError::UnknownEntity(face.to_string()))
    }

    fn adjacent_faces(&self, edge: EdgeId) -> KernelResult<Vec<FaceId>> {
        self.edge_faces
            .get(edge.0)
            .cloned()
            .ok_or_else(|| KernelOpError::UnknownEntity(edge.to_string()))
    }

    fn edge_endpoints(&self, edge: EdgeId) -> KernelResult<(Point3, Point3)> {
        let [a, b] = self.edge(edge)?;
        Ok((self.vertices[a as usize], self.vertices[b as usize]))
    }

    fn coedge_opposed(&self, edge: EdgeId, face: FaceId) -> KernelResult<bool> {
        let key = self.edge(edge)?;
        let verts = self.face(face)?;
        (0..verts.len())
            .map(|i| (verts[i], verts[(i + 1) % verts.len()]))
            .find(|&(a, b)| normalize_edge(a, b) == key)
            .map(|(a, b)| a > b)
            .ok_or_else(|| KernelOpError::UnknownEntity(format!("{} is not bounded by {}", face, edge)))
    }

    fn point_on_face(&self, face: FaceId) -> KernelResult<Point3> {
        let points: Vec<Point3> = self.face(face)?.iter().map(|&v| self.vertices[v as usize]).collect();
        Ok(points_centroid(&points))
    }

    fn face_normal_at(&self, face: FaceId, _point: &Point3) -> KernelResult<Vector3> {
        let verts = self.face(face)?;
        let p = |i: usize| &self.vertices[verts[i] as usize];
        triangle_normal(p(0), p(1), p(2))
            .ok_or_else(|| KernelOpError::InvalidGeometry(format!("{} is degenerate", face)))
    }
}
