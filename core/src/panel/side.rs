use serde::{Deserialize, Serialize};
use std::fmt;

/// Which half of a hinge a panel edge carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HingeRole {
    /// Tab.
    Male,
    /// Socket.
    Female,
    /// Boundary edge of the mesh; no hinge.
    OpenEdge,
}

impl HingeRole {
    /// Role the neighbouring panel receives on the same edge.
    pub fn complement(self) -> Self {
        match self {
            HingeRole::Male => HingeRole::Female,
            HingeRole::Female => HingeRole::Male,
            HingeRole::OpenEdge => HingeRole::OpenEdge,
        }
    }

    /// Role of the first visit to a shared edge with the given index.
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 { HingeRole::Male } else { HingeRole::Female }
    }
}

impl fmt::Display for HingeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HingeRole::Male => write!(f, "male"),
            HingeRole::Female => write!(f, "female"),
            HingeRole::OpenEdge => write!(f, "openEdge"),
        }
    }
}

/// One classified edge as seen from one face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Side {
    /// Traversal-wide edge index; both faces sharing the edge see the same value.
    pub index: usize,
    /// Millimetres.
    pub length: f64,
    pub hinge: HingeRole,
    pub convex: bool,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {:.3}, {}", self.index, self.length, self.hinge)?;
        if self.convex {
            write!(f, " (convex)")?;
        }
        Ok(())
    }
}

/// Three sides of a face in canonical order: `side1` is never shorter than the others.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub sides: [Side; 3],
}

impl Triangle {
    pub fn side1(&self) -> &Side {
        &self.sides[0]
    }

    pub fn side2(&self) -> &Side {
        &self.sides[1]
    }

    pub fn side3(&self) -> &Side {
        &self.sides[2]
    }

    pub fn indices(&self) -> [usize; 3] {
        self.sides.map(|s| s.index)
    }

    pub fn lengths(&self) -> [f64; 3] {
        self.sides.map(|s| s.length)
    }
}

impl fmt::Display for Triangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s1: {}\ns2: {}\ns3: {}", self.sides[0], self.sides[1], self.sides[2])
    }
}
