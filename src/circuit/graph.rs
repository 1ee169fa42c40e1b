//! Circuit network: nodes plus element instances.

use std::fmt;

use num_complex::Complex64;
use tracing::{debug, warn};

use super::nodes::NodeKeeper;
use super::types::CircuitNode;
use crate::components::{InstanceModel, InstanceRegistry};
use crate::dsl::{CommandRecord, OptionValue};
use crate::error::{Result, TcadError};
use crate::matrix::{Assembly, RowColVal};

/// A circuit network ready for assembly.
///
/// Unknown `k` of a circuit solution is the value of node number `k`.
pub struct Circuit {
    nodes: NodeKeeper,
    instances: Vec<Box<dyn InstanceModel>>,
    registry: InstanceRegistry,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Circuit")
            .field("nodes", &self.nodes)
            .field("instances", &self.instances)
            .finish()
    }
}

impl Circuit {
    /// An empty circuit with the built-in element types.
    pub fn new() -> Self {
        Self::with_registry(InstanceRegistry::default())
    }

    pub fn with_registry(registry: InstanceRegistry) -> Self {
        Self {
            nodes: NodeKeeper::new(),
            instances: Vec::new(),
            registry,
        }
    }

    /// Build a circuit from `circuit_element` records; other records are skipped.
    pub fn from_records(records: &[CommandRecord]) -> Result<Self> {
        let mut circuit = Self::new();
        for record in records.iter().filter(|r| r.command() == "circuit_element") {
            circuit.add_record(record)?;
        }
        Ok(circuit)
    }

    /// Add one element described by a `circuit_element` record.
    ///
    /// Terminals are the options `n1`, `n2`, ...; every other numeric
    /// option is passed to [`Circuit::add_parameter`].
    pub fn add_record(&mut self, record: &CommandRecord) -> Result<()> {
        if record.command() != "circuit_element" {
            return Err(TcadError::UnknownCommand {
                command: record.command().to_string(),
            });
        }
        let name = record.require_str("name")?.to_string();
        let element = record.require_str("element")?.to_string();
        let terminals: Vec<String> = (1..)
            .map(|i| record.get_text(&format!("n{}", i)))
            .take_while(Option::is_some)
            .flatten()
            .collect();
        self.add_element(&element, &name, &terminals)?;

        for (key, value) in record.options() {
            if matches!(key.as_str(), "name" | "element") || is_terminal_key(key) {
                continue;
            }
            if let OptionValue::Double(v) = value {
                self.add_parameter(&name, key, *v)?;
            } else {
                warn!(element = %name, parameter = %key, "ignoring non-numeric parameter");
            }
        }
        Ok(())
    }

    /// Create an element of `element_type` connected to `node_names`.
    pub fn add_element(&mut self, element_type: &str, name: &str, node_names: &[String]) -> Result<()> {
        if self.instance(name).is_some() {
            return Err(TcadError::DuplicateElement {
                name: name.to_string(),
            });
        }
        let instance = self
            .registry
            .create(element_type, &mut self.nodes, name, node_names)?;
        debug!(element = name, element_type, nodes = ?node_names, "added circuit element");
        self.instances.push(instance);
        Ok(())
    }

    /// Set a parameter on an element. Unrecognized parameter names are
    /// logged and ignored; the return value reports whether it was used.
    pub fn add_parameter(&mut self, element: &str, parameter: &str, value: f64) -> Result<bool> {
        let instance = self
            .instances
            .iter_mut()
            .find(|i| i.name() == element)
            .ok_or_else(|| TcadError::ElementNotFound {
                name: element.to_string(),
            })?;
        let used = instance.add_parameter(parameter, value);
        if !used {
            warn!(element, parameter, "unrecognized circuit parameter");
        }
        Ok(used)
    }

    pub fn instance(&self, name: &str) -> Option<&dyn InstanceModel> {
        self.instances
            .iter()
            .find(|i| i.name() == name)
            .map(|i| i.as_ref())
    }

    pub fn instances(&self) -> impl Iterator<Item = &dyn InstanceModel> {
        self.instances.iter().map(|i| i.as_ref())
    }

    pub fn nodes(&self) -> &NodeKeeper {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<CircuitNode> {
        self.nodes.node(name)
    }

    /// Create a node not yet connected to any element, e.g. for a contact.
    pub fn add_node(&mut self, name: &str) -> CircuitNode {
        self.nodes.add_node(name)
    }

    /// Number of circuit unknowns.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Value of node `name` in a circuit solution.
    pub fn node_value(&self, name: &str, solution: &[f64]) -> Result<f64> {
        self.node(name)
            .map(|n| n.value(solution))
            .ok_or_else(|| TcadError::NodeNotFound {
                node: name.to_string(),
            })
    }

    // ============ Assembly ============

    /// Static contributions of every element, in circuit numbering.
    pub fn assemble_dc(&self, solution: &[f64], out: &mut Assembly) {
        for inst in &self.instances {
            inst.assemble_dc(solution, &mut out.matrix, &mut out.rhs);
        }
    }

    /// Charge contributions of every element, in circuit numbering.
    pub fn assemble_transient(&self, scale: f64, solution: &[f64], with_matrix: bool, out: &mut Assembly) {
        let Assembly { matrix, rhs } = out;
        for inst in &self.instances {
            let m: Option<&mut Vec<RowColVal>> = if with_matrix { Some(&mut *matrix) } else { None };
            inst.assemble_transient(scale, solution, m, rhs);
        }
    }

    /// Small-signal excitation of every element.
    pub fn assemble_ac_rhs(&self) -> Vec<(usize, Complex64)> {
        let mut rhs = Vec::new();
        for inst in &self.instances {
            inst.assemble_ac_rhs(&mut rhs);
        }
        rhs
    }

    /// One `circuit_element` record per element.
    pub fn serialize(&self) -> String {
        self.instances
            .iter()
            .map(|i| i.serialize())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn is_terminal_key(key: &str) -> bool {
    key.strip_prefix('n')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}
