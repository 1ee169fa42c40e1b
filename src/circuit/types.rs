//! Core types for circuit nodes.

use std::fmt;

/// Role of a circuit node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// An ordinary named node.
    Default,
    /// A node created by an element for its own unknowns (e.g. a branch current).
    Internal,
    /// The reference node; never an unknown.
    Ground,
}

/// A node of the circuit network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CircuitNode {
    index: usize,
    kind: NodeKind,
}

impl CircuitNode {
    /// The ground node.
    pub const GROUND: CircuitNode = CircuitNode {
        index: 0,
        kind: NodeKind::Ground,
    };

    pub(crate) fn new(index: usize, kind: NodeKind) -> Self {
        Self { index, kind }
    }

    /// Index among the circuit unknowns, `None` for ground.
    pub fn number(&self) -> Option<usize> {
        (!self.is_ground()).then_some(self.index)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_ground(&self) -> bool {
        self.kind == NodeKind::Ground
    }

    /// Value of this node in a circuit solution; ground reads as zero.
    pub fn value(&self, solution: &[f64]) -> f64 {
        self.number().map_or(0.0, |i| solution[i])
    }
}

impl fmt::Display for CircuitNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NodeKind::Ground => write!(f, "GND"),
            NodeKind::Internal => write!(f, "I{}", self.index),
            NodeKind::Default => write!(f, "N{}", self.index),
        }
    }
}
