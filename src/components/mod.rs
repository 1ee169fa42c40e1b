//! Circuit element instances.
//!
//! This module provides the element models that can be attached to a
//! device through circuit nodes:
//! - Linear: resistor, capacitor
//! - Sources: voltage source, current source
//!
//! Every element implements [`InstanceModel`] and is created by element
//! type name through an [`InstanceRegistry`].
//!
//! Sign convention: the residual of a node is the current flowing into it
//! from the element. A two-terminal element conducting `i` from its first
//! to its second terminal loads `-i` on the first and `+i` on the second.

mod linear;
mod sources;

pub use linear::{IdealCapacitor, IdealResistor};
pub use sources::{IdealCurrentSource, IdealVoltageSource};

use std::collections::BTreeMap;
use std::fmt;

use num_complex::Complex64;

use crate::circuit::{CircuitNode, NodeKeeper};
use crate::dsl::{CommandRecord, OptionValue};
use crate::error::{Result, TcadError};
use crate::matrix::{RhsEntry, RowColVal};

/// A circuit node an element is connected to.
#[derive(Debug, Clone, PartialEq)]
pub struct Terminal {
    /// Node name as given by the user.
    pub name: String,
    pub node: CircuitNode,
}

/// Physics of one circuit element instance.
///
/// Row and column numbers are circuit-local node numbers; ground is never
/// written.
pub trait InstanceModel: fmt::Debug {
    fn name(&self) -> &str;

    /// Type name used by the registry and in records.
    fn element_type(&self) -> &'static str;

    fn terminals(&self) -> &[Terminal];

    /// Load static contributions `I(x)`.
    fn assemble_dc(&self, solution: &[f64], matrix: &mut Vec<RowColVal>, rhs: &mut Vec<RhsEntry>);

    /// Load charge contributions `Q(x)` scaled by `scale`. When `matrix`
    /// is `None` only the RHS is wanted.
    fn assemble_transient(
        &self,
        scale: f64,
        solution: &[f64],
        matrix: Option<&mut Vec<RowColVal>>,
        rhs: &mut Vec<RhsEntry>,
    );

    /// Load small-signal excitation.
    fn assemble_ac_rhs(&self, _rhs: &mut Vec<(usize, Complex64)>) {}

    /// Set a parameter; returns whether the name was recognized.
    fn add_parameter(&mut self, name: &str, value: f64) -> bool;

    /// Current parameter values in record order.
    fn parameters(&self) -> Vec<(&'static str, f64)>;

    /// The `circuit_element` record reconstructing this instance.
    fn command_record(&self) -> CommandRecord {
        let mut record = CommandRecord::new("circuit_element")
            .with("name", self.name())
            .with("element", self.element_type());
        for (i, t) in self.terminals().iter().enumerate() {
            record.set(format!("n{}", i + 1), t.name.as_str());
        }
        for (key, value) in self.parameters() {
            record.set(key, value);
        }
        record
    }

    fn serialize(&self) -> String {
        self.command_record().to_string()
    }

    fn command_options(&self) -> BTreeMap<String, OptionValue> {
        self.command_record().to_map()
    }
}

/// Creates an instance, registering its nodes.
pub type InstanceFactory =
    fn(&mut NodeKeeper, &str, &[String]) -> Result<Box<dyn InstanceModel>>;

/// Element type name → factory.
#[derive(Clone)]
pub struct InstanceRegistry {
    factories: BTreeMap<String, InstanceFactory>,
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        let mut r = Self::empty();
        r.register(IdealResistor::ELEMENT, IdealResistor::create);
        r.register(IdealCapacitor::ELEMENT, IdealCapacitor::create);
        r.register(IdealVoltageSource::ELEMENT, IdealVoltageSource::create);
        r.register(IdealCurrentSource::ELEMENT, IdealCurrentSource::create);
        r
    }
}

impl fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl InstanceRegistry {
    /// A registry with no element types.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, element_type: impl Into<String>, factory: InstanceFactory) {
        self.factories.insert(element_type.into(), factory);
    }

    pub fn element_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn create(
        &self,
        element_type: &str,
        nodes: &mut NodeKeeper,
        name: &str,
        node_names: &[String],
    ) -> Result<Box<dyn InstanceModel>> {
        let factory = self
            .factories
            .get(element_type)
            .ok_or_else(|| TcadError::UnknownElementType {
                element_type: element_type.to_string(),
            })?;
        factory(nodes, name, node_names)
    }
}

/// Register `node_names` as the terminals of `name`, checking the count.
pub(crate) fn connect(
    nodes: &mut NodeKeeper,
    name: &str,
    node_names: &[String],
    expected: usize,
) -> Result<Vec<Terminal>> {
    if node_names.len() != expected {
        return Err(TcadError::TerminalCount {
            name: name.to_string(),
            expected,
            actual: node_names.len(),
        });
    }
    Ok(node_names
        .iter()
        .map(|n| Terminal {
            name: n.clone(),
            node: nodes.add_node(n),
        })
        .collect())
}

/// Load a branch carrying `i` from `a` to `b` with `di/d(va - vb) = g`.
pub(crate) fn load_branch(
    [a, b]: [CircuitNode; 2],
    i: f64,
    g: f64,
    matrix: Option<&mut Vec<RowColVal>>,
    rhs: &mut Vec<RhsEntry>,
) {
    let (ra, rb) = (a.number(), b.number());
    if let Some(r) = ra {
        rhs.push(RhsEntry::new(r, -i));
    }
    if let Some(r) = rb {
        rhs.push(RhsEntry::new(r, i));
    }
    let Some(matrix) = matrix else {
        return;
    };
    if let Some(r) = ra {
        matrix.push(RowColVal::new(r, r, -g));
        if let Some(c) = rb {
            matrix.push(RowColVal::new(r, c, g));
        }
    }
    if let Some(r) = rb {
        matrix.push(RowColVal::new(r, r, -g));
        if let Some(c) = ra {
            matrix.push(RowColVal::new(r, c, g));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builtins() {
        let r = InstanceRegistry::default();
        let types: Vec<&str> = r.element_types().collect();
        assert_eq!(types, vec!["capacitor", "isource", "resistor", "vsource"]);
    }

    #[test]
    fn test_unknown_element_type() {
        let r = InstanceRegistry::default();
        let mut nk = NodeKeeper::new();
        let err = r.create("diode", &mut nk, "D1", &[]).unwrap_err();
        assert!(matches!(err, TcadError::UnknownElementType { .. }));
    }

    #[test]
    fn test_terminal_count_checked() {
        let r = InstanceRegistry::default();
        let mut nk = NodeKeeper::new();
        let err = r
            .create("resistor", &mut nk, "R1", &["a".to_string()])
            .unwrap_err();
        assert!(matches!(
            err,
            TcadError::TerminalCount { expected: 2, actual: 1, .. }
        ));
    }
}
