use crate::kernel::KernelOpError;
use crate::topo::FaceId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that end a panelization run.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum PanelError {
    /// A template body, component or parameter is missing.
    #[error("Template asset not found: {0}")]
    MissingAsset(String),

    #[error("Template parameter '{name}' has unusable value {value}")]
    InvalidParameter { name: String, value: f64 },

    #[error("{face} has {edges} edges; only triangular meshes can be panelized")]
    NonTriangularFace { face: FaceId, edges: usize },

    #[error("Not enough binary digits: need at least {required} digits to represent {unique_edges} unique edges, template provides {available}")]
    InsufficientDigits {
        required: usize,
        available: usize,
        unique_edges: usize,
    },

    #[error("Edge index {index} needs {needed} binary digits but the key strip has {available}")]
    IndexTooWide {
        index: usize,
        needed: usize,
        available: usize,
    },

    #[error("Output directory unusable: {0}")]
    OutputDirectory(String),

    #[error(transparent)]
    Kernel(#[from] KernelOpError),
}

pub type PanelResult<T> = Result<T, PanelError>;
