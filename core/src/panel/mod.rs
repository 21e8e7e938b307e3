//! Mesh panelization.
//!
//! A traversal walks the host mesh face by face. Each edge receives a traversal-wide index
//! on first visit, a hinge role (the two faces sharing an edge always get complementary
//! roles) and a convexity flag. Each face's three sides are rotated longest-first, checked
//! for printability, encoded into key bodies and combined onto the template frame, which is
//! then exported and optionally placed back into a preview of the whole mesh.

pub mod canonical;
pub mod classify;
pub mod config;
pub mod driver;
pub mod encode;
pub mod error;
pub mod overrides;
pub mod placement;
pub mod side;
pub mod template;
pub mod validate;

#[cfg(test)]
mod tests_traversal;

pub use canonical::canonicalize;
pub use classify::{classify_edge, classify_face, FaceSides};
pub use config::PanelizeOptions;
pub use driver::{
    panel_file_name, panelize, AbortReason, Decision, Operator, PanelizeReport, TraversalState, TraversalStatus,
    TriangleError, TriangleOutcome, TriangleRecord, Unattended,
};
pub use encode::{encode, required_digits, KeyBitPattern, KeyPart};
pub use error::{PanelError, PanelResult};
pub use overrides::CoreOverrides;
pub use placement::{PlacementError, TemplateBasis};
pub use side::{HingeRole, Side, Triangle};
pub use template::{ResolvedTemplate, TemplateConfig};
pub use validate::{validate, Validation, ValidationFlag, ValidationThresholds};
