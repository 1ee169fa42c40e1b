//! Circuit validation.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{Result, TcadError};

use super::{Circuit, NodeKind};

/// Validate a circuit before it is coupled to a device.
///
/// `is_external` reports nodes driven from outside the circuit, e.g. nodes
/// that contact equations write to.
///
/// Checks:
/// - Every named node is either connected to an element or external
/// - Nodes with a single element terminal and no external driver are reported
pub fn validate_circuit(circuit: &Circuit, is_external: impl Fn(&str) -> bool) -> Result<()> {
    let mut connections: HashMap<&str, usize> = HashMap::new();
    for inst in circuit.instances() {
        for t in inst.terminals() {
            if !t.node.is_ground() {
                *connections.entry(t.name.as_str()).or_default() += 1;
            }
        }
    }

    for name in circuit.nodes().names() {
        let Some(node) = circuit.node(name) else {
            continue;
        };
        if node.kind() == NodeKind::Internal || is_external(name) {
            continue;
        }
        match connections.get(name).copied().unwrap_or(0) {
            0 => {
                return Err(TcadError::InvalidCircuit {
                    message: format!("node '{}' is not connected to any element", name),
                })
            }
            1 => warn!(node = name, "circuit node has a single connection"),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconnected_node_rejected() {
        let mut c = Circuit::new();
        c.add_element("resistor", "R1", &["a".into(), "0".into()])
            .unwrap();
        c.add_node("top");
        assert!(validate_circuit(&c, |_| false).is_err());
        assert!(validate_circuit(&c, |n| n == "top").is_ok());
    }

    #[test]
    fn test_internal_nodes_are_exempt() {
        let mut c = Circuit::new();
        c.add_element("vsource", "V1", &["a".into(), "0".into()])
            .unwrap();
        c.add_element("resistor", "R1", &["a".into(), "0".into()])
            .unwrap();
        assert!(validate_circuit(&c, |_| false).is_ok());
    }
}
