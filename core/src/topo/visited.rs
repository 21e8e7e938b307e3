use super::EdgeId;
use std::collections::HashMap;

/// Outcome of recording a visit to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeVisit {
    /// The edge had not been seen; it was assigned this index.
    First(usize),
    /// The edge was seen before (from the neighbouring face) under this index.
    Repeat(usize),
}

impl EdgeVisit {
    pub fn index(&self) -> usize {
        match self {
            EdgeVisit::First(i) | EdgeVisit::Repeat(i) => *i,
        }
    }
}

/// Insertion-ordered map from edge identity to the sequential index it received on first
/// visit. Indices are never reassigned. One instance belongs to exactly one traversal.
#[derive(Debug, Default, Clone)]
pub struct VisitedEdgeIndex {
    order: Vec<EdgeId>,
    index: HashMap<EdgeId, usize>,
}

impl VisitedEdgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, edge: EdgeId) -> Option<usize> {
        self.index.get(&edge).copied()
    }

    /// Records a visit, assigning the next index when the edge is new.
    pub fn visit(&mut self, edge: EdgeId) -> EdgeVisit {
        if let Some(i) = self.lookup(edge) {
            return EdgeVisit::Repeat(i);
        }
        let i = self.order.len();
        self.order.push(edge);
        self.index.insert(edge, i);
        EdgeVisit::First(i)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
