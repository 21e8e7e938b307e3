//! Host-agnostic value types exchanged with a [`super::PanelKernel`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a named body in a template document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyRef {
    /// Owning component; `None` for bodies of the root component.
    pub component: Option<String>,
    pub name: String,
}

impl BodyRef {
    pub fn root(name: &str) -> Self {
        Self { component: None, name: name.to_string() }
    }

    pub fn in_component(component: &str, name: &str) -> Self {
        Self {
            component: Some(component.to_string()),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for BodyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.component {
            Some(c) => write!(f, "{}/{}", c, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Cosmetic marking applied to mesh faces that fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Appearance {
    ShortSide,
    ShortAltitude,
}

