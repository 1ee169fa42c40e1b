//! Circuit node bookkeeping.

use std::collections::HashMap;

use super::types::{CircuitNode, NodeKind};

/// Names that always refer to ground.
pub const GROUND_NAMES: [&str; 3] = ["0", "GND", "gnd"];

/// Name → node map with dense numbering of the non-ground nodes.
#[derive(Debug, Clone)]
pub struct NodeKeeper {
    node_map: HashMap<String, CircuitNode>,
    node_names: Vec<String>,
}

impl Default for NodeKeeper {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKeeper {
    pub fn new() -> Self {
        let node_map = GROUND_NAMES
            .iter()
            .map(|n| (n.to_string(), CircuitNode::GROUND))
            .collect();
        Self {
            node_map,
            node_names: Vec::new(),
        }
    }

    /// Get or create the node called `name`.
    pub fn add_node(&mut self, name: &str) -> CircuitNode {
        self.add_node_of_kind(name, NodeKind::Default)
    }

    /// Get or create an element-owned node.
    pub fn add_internal_node(&mut self, name: &str) -> CircuitNode {
        self.add_node_of_kind(name, NodeKind::Internal)
    }

    fn add_node_of_kind(&mut self, name: &str, kind: NodeKind) -> CircuitNode {
        if let Some(n) = self.node_map.get(name) {
            return *n;
        }
        let node = CircuitNode::new(self.node_names.len(), kind);
        self.node_map.insert(name.to_string(), node);
        self.node_names.push(name.to_string());
        node
    }

    pub fn node(&self, name: &str) -> Option<CircuitNode> {
        self.node_map.get(name).copied()
    }

    /// Number of non-ground nodes, i.e. circuit unknowns.
    pub fn len(&self) -> usize {
        self.node_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_names.is_empty()
    }

    /// Name of unknown `number`.
    pub fn name(&self, number: usize) -> Option<&str> {
        self.node_names.get(number).map(String::as_str)
    }

    /// Non-ground node names in numbering order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.node_names.iter().map(String::as_str)
    }
}
