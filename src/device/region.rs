//! Mesh regions: topology, solution variables and registered models.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, TcadError};

use super::model::{EntityKind, ModelContext, NamedModel};

/// Default name of the node volume model.
pub const NODE_VOLUME: &str = "NodeVolume";
/// Default name of the edge coupling model.
pub const EDGE_COUPLE: &str = "EdgeCouple";
/// Default name of the element-edge coupling model.
pub const ELEMENT_EDGE_COUPLE: &str = "ElementEdgeCouple";

/// A node pair of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementEdge {
    /// Owning element index.
    pub element: usize,
    /// Region node indices of the two ends.
    pub nodes: [usize; 2],
}

/// A solution variable solved for by one or more equations.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    initial: Vec<f64>,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_values(&self) -> &[f64] {
        &self.initial
    }
}

/// A node solution that is not an unknown of the system.
///
/// When `parent` names another solution the parent's values are read
/// instead; if the parent has disappeared the stored values are used.
#[derive(Debug, Clone)]
pub struct NodeSolution {
    values: Vec<f64>,
    parent: Option<String>,
}

impl NodeSolution {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
}

/// A region of the mesh.
#[derive(Debug)]
pub struct Region {
    name: String,
    node_count: usize,
    edges: Vec<[usize; 2]>,
    elements: Vec<Vec<usize>>,
    element_edges: Vec<ElementEdge>,
    variables: Vec<Variable>,
    node_solutions: BTreeMap<String, NodeSolution>,
    models: HashMap<String, NamedModel>,
    node_volume_model: String,
    edge_couple_model: String,
    element_edge_couple_model: String,
}

impl Region {
    pub fn new(name: impl Into<String>, node_count: usize) -> Self {
        Self {
            name: name.into(),
            node_count,
            edges: Vec::new(),
            elements: Vec::new(),
            element_edges: Vec::new(),
            variables: Vec::new(),
            node_solutions: BTreeMap::new(),
            models: HashMap::new(),
            node_volume_model: NODE_VOLUME.to_string(),
            edge_couple_model: EDGE_COUPLE.to_string(),
            element_edge_couple_model: ELEMENT_EDGE_COUPLE.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    pub fn elements(&self) -> &[Vec<usize>] {
        &self.elements
    }

    pub fn element_edges(&self) -> &[ElementEdge] {
        &self.element_edges
    }

    /// Largest node count of any element.
    pub fn max_element_nodes(&self) -> usize {
        self.elements.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn entity_count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Node => self.node_count,
            EntityKind::Edge => self.edges.len(),
            EntityKind::ElementEdge => self.element_edges.len(),
        }
    }

    fn check_node(&self, node: usize) -> Result<()> {
        if node >= self.node_count {
            return Err(TcadError::InvalidTopology {
                region: self.name.clone(),
                message: format!("node {} out of range (region has {})", node, self.node_count),
            });
        }
        Ok(())
    }

    /// Add an edge between two distinct nodes, returning its index.
    pub fn add_edge(&mut self, n0: usize, n1: usize) -> Result<usize> {
        self.check_node(n0)?;
        self.check_node(n1)?;
        if n0 == n1 {
            return Err(TcadError::InvalidTopology {
                region: self.name.clone(),
                message: format!("edge connects node {} to itself", n0),
            });
        }
        self.edges.push([n0, n1]);
        Ok(self.edges.len() - 1)
    }

    /// Add an element; every node pair of the element becomes an element-edge.
    pub fn add_element(&mut self, nodes: &[usize]) -> Result<usize> {
        if nodes.len() < 2 {
            return Err(TcadError::InvalidTopology {
                region: self.name.clone(),
                message: format!("element needs at least 2 nodes, got {}", nodes.len()),
            });
        }
        for (i, &n) in nodes.iter().enumerate() {
            self.check_node(n)?;
            if nodes[..i].contains(&n) {
                return Err(TcadError::InvalidTopology {
                    region: self.name.clone(),
                    message: format!("element repeats node {}", n),
                });
            }
        }

        let element = self.elements.len();
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                self.element_edges.push(ElementEdge {
                    element,
                    nodes: [nodes[i], nodes[j]],
                });
            }
        }
        self.elements.push(nodes.to_vec());
        Ok(element)
    }

    /// Local index of `node` within element `element`.
    pub fn element_local_index(&self, element: usize, node: usize) -> Option<usize> {
        self.elements.get(element)?.iter().position(|&n| n == node)
    }

    // ============ Variables ============

    /// Register a solution variable, returning its index. Initial values are zero.
    pub fn add_variable(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        if let Some(i) = self.variable_index(&name) {
            return i;
        }
        self.variables.push(Variable {
            name,
            initial: vec![0.0; self.node_count],
        });
        self.variables.len() - 1
    }

    pub fn set_initial_values(&mut self, variable: &str, values: Vec<f64>) -> Result<()> {
        let idx = self
            .variable_index(variable)
            .ok_or_else(|| TcadError::VariableNotFound {
                region: self.name.clone(),
                variable: variable.to_string(),
            })?;
        if values.len() != self.node_count {
            return Err(TcadError::ModelLengthMismatch {
                region: self.name.clone(),
                model: variable.to_string(),
                expected: self.node_count,
                actual: values.len(),
            });
        }
        self.variables[idx].initial = values;
        Ok(())
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    /// Number of unknowns this region contributes.
    pub fn equation_count(&self) -> usize {
        self.variables.len() * self.node_count
    }

    /// Offset of (`var`, `node`) from the region's first equation.
    pub fn equation_offset(&self, var: usize, node: usize) -> usize {
        var * self.node_count + node
    }

    // ============ Node solutions ============

    pub fn add_node_solution(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.node_count {
            return Err(TcadError::ModelLengthMismatch {
                region: self.name.clone(),
                model: name,
                expected: self.node_count,
                actual: values.len(),
            });
        }
        self.node_solutions.insert(
            name,
            NodeSolution {
                values,
                parent: None,
            },
        );
        Ok(())
    }

    /// Add a solution that mirrors `parent` while it exists.
    pub fn add_auxiliary_solution(&mut self, name: impl Into<String>, parent: impl Into<String>) {
        self.node_solutions.insert(
            name.into(),
            NodeSolution {
                values: vec![0.0; self.node_count],
                parent: Some(parent.into()),
            },
        );
    }

    pub fn remove_node_solution(&mut self, name: &str) -> Option<NodeSolution> {
        self.node_solutions.remove(name)
    }

    pub fn node_solution(&self, name: &str) -> Option<&NodeSolution> {
        self.node_solutions.get(name)
    }

    // ============ Models ============

    pub fn add_model(&mut self, name: impl Into<String>, model: NamedModel) {
        self.models.insert(name.into(), model);
    }

    pub fn add_node_model(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&mut ModelContext<'_>) -> Result<Vec<f64>> + 'static,
    ) {
        self.add_model(name, NamedModel::computed(EntityKind::Node, f));
    }

    pub fn add_edge_model(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&mut ModelContext<'_>) -> Result<Vec<f64>> + 'static,
    ) {
        self.add_model(name, NamedModel::computed(EntityKind::Edge, f));
    }

    pub fn add_element_edge_model(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&mut ModelContext<'_>) -> Result<Vec<f64>> + 'static,
    ) {
        self.add_model(name, NamedModel::computed(EntityKind::ElementEdge, f));
    }

    /// Register a model with fixed values, checking their count.
    pub fn add_fixed_model(
        &mut self,
        name: impl Into<String>,
        kind: EntityKind,
        values: Vec<f64>,
    ) -> Result<()> {
        let name = name.into();
        let expected = self.entity_count(kind);
        if values.len() != expected {
            return Err(TcadError::ModelLengthMismatch {
                region: self.name.clone(),
                model: name,
                expected,
                actual: values.len(),
            });
        }
        self.add_model(name, NamedModel::fixed(kind, values));
        Ok(())
    }

    pub fn model(&self, name: &str) -> Option<&NamedModel> {
        self.models.get(name)
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn node_volume_model(&self) -> &str {
        &self.node_volume_model
    }

    pub fn edge_couple_model(&self) -> &str {
        &self.edge_couple_model
    }

    pub fn element_edge_couple_model(&self) -> &str {
        &self.element_edge_couple_model
    }

    pub fn set_node_volume_model(&mut self, name: impl Into<String>) {
        self.node_volume_model = name.into();
    }

    pub fn set_edge_couple_model(&mut self, name: impl Into<String>) {
        self.edge_couple_model = name.into();
    }

    pub fn set_element_edge_couple_model(&mut self, name: impl Into<String>) {
        self.element_edge_couple_model = name.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_element_edges() {
        let mut r = Region::new("r", 3);
        r.add_element(&[0, 1, 2]).unwrap();
        let pairs: Vec<[usize; 2]> = r.element_edges().iter().map(|e| e.nodes).collect();
        assert_eq!(pairs, vec![[0, 1], [0, 2], [1, 2]]);
        assert_eq!(r.element_local_index(0, 2), Some(2));
        assert_eq!(r.max_element_nodes(), 3);
    }

    #[test]
    fn test_topology_errors() {
        let mut r = Region::new("r", 2);
        assert!(r.add_edge(0, 2).is_err());
        assert!(r.add_edge(1, 1).is_err());
        assert!(r.add_element(&[0]).is_err());
        assert!(r.add_element(&[0, 0]).is_err());
    }

    #[test]
    fn test_variable_major_numbering() {
        let mut r = Region::new("r", 4);
        assert_eq!(r.add_variable("Potential"), 0);
        assert_eq!(r.add_variable("Electrons"), 1);
        assert_eq!(r.add_variable("Potential"), 0);
        assert_eq!(r.equation_count(), 8);
        assert_eq!(r.equation_offset(1, 2), 6);
    }

    #[test]
    fn test_fixed_model_length_checked() {
        let mut r = Region::new("r", 3);
        r.add_edge(0, 1).unwrap();
        assert!(r.add_fixed_model(EDGE_COUPLE, EntityKind::Edge, vec![1.0]).is_ok());
        let err = r
            .add_fixed_model(NODE_VOLUME, EntityKind::Node, vec![1.0])
            .unwrap_err();
        assert!(matches!(err, TcadError::ModelLengthMismatch { expected: 3, .. }));
    }
}
