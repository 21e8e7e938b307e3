use crate::topo::FaceId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Faces whose panels are combined onto a named root body instead of the default frame.
///
/// Serialized as `{ "bodyName": [faceIndex, ...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoreOverrides {
    table: BTreeMap<String, BTreeSet<FaceId>>,
}

impl CoreOverrides {
    pub fn insert(&mut self, body: &str, faces: impl IntoIterator<Item = FaceId>) {
        self.table.entry(body.to_string()).or_default().extend(faces);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<FaceId>)> {
        self.table.iter().map(|(body, faces)| (body.as_str(), faces))
    }

    /// Override body for `face`, if any. The first body in name order wins.
    pub fn body_for(&self, face: FaceId) -> Option<&str> {
        self.iter().find(|(_, faces)| faces.contains(&face)).map(|(body, _)| body)
    }

    pub fn is_empty(&self) -> bool {
        self.table.values().all(BTreeSet::is_empty)
    }
}
