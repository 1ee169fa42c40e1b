//! Voltage and current sources.

use num_complex::Complex64;

use crate::circuit::{CircuitNode, NodeKeeper};
use crate::error::Result;
use crate::matrix::{RhsEntry, RowColVal};

use super::{connect, load_branch, InstanceModel, Terminal};

/// An ideal voltage source enforcing `v1 - v2 = V`.
///
/// The branch current, flowing from `n1` through the source to `n2`, is an
/// extra unknown on the internal node `<name>.I`.
#[derive(Debug, Clone)]
pub struct IdealVoltageSource {
    name: String,
    terminals: Vec<Terminal>,
    branch: CircuitNode,
    /// DC value in volts
    pub voltage: f64,
    /// Small-signal magnitude, real part
    pub ac_real: f64,
    /// Small-signal magnitude, imaginary part
    pub ac_imag: f64,
}

impl IdealVoltageSource {
    pub const ELEMENT: &'static str = "vsource";

    pub fn create(
        nodes: &mut NodeKeeper,
        name: &str,
        node_names: &[String],
    ) -> Result<Box<dyn InstanceModel>> {
        let terminals = connect(nodes, name, node_names, 2)?;
        let branch = nodes.add_internal_node(&Self::branch_name(name));
        Ok(Box::new(Self {
            name: name.to_string(),
            terminals,
            branch,
            voltage: 0.0,
            ac_real: 0.0,
            ac_imag: 0.0,
        }))
    }

    /// Name of the circuit node carrying the branch current of source `name`.
    pub fn branch_name(name: &str) -> String {
        format!("{}.I", name)
    }
}

impl InstanceModel for IdealVoltageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn element_type(&self) -> &'static str {
        Self::ELEMENT
    }

    fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    fn assemble_dc(&self, solution: &[f64], matrix: &mut Vec<RowColVal>, rhs: &mut Vec<RhsEntry>) {
        let Some(ib) = self.branch.number() else {
            return;
        };
        let (n1, n2) = (self.terminals[0].node, self.terminals[1].node);
        let current = solution[ib];

        if let Some(r) = n1.number() {
            rhs.push(RhsEntry::new(r, -current));
            matrix.push(RowColVal::new(r, ib, -1.0));
            matrix.push(RowColVal::new(ib, r, 1.0));
        }
        if let Some(r) = n2.number() {
            rhs.push(RhsEntry::new(r, current));
            matrix.push(RowColVal::new(r, ib, 1.0));
            matrix.push(RowColVal::new(ib, r, -1.0));
        }
        rhs.push(RhsEntry::new(
            ib,
            n1.value(solution) - n2.value(solution) - self.voltage,
        ));
    }

    fn assemble_transient(
        &self,
        _scale: f64,
        _solution: &[f64],
        _matrix: Option<&mut Vec<RowColVal>>,
        _rhs: &mut Vec<RhsEntry>,
    ) {
    }

    fn assemble_ac_rhs(&self, rhs: &mut Vec<(usize, Complex64)>) {
        if let Some(ib) = self.branch.number() {
            rhs.push((ib, Complex64::new(self.ac_real, self.ac_imag)));
        }
    }

    fn add_parameter(&mut self, name: &str, value: f64) -> bool {
        match name {
            "V" => self.voltage = value,
            "acreal" => self.ac_real = value,
            "acimag" => self.ac_imag = value,
            _ => return false,
        }
        true
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("V", self.voltage),
            ("acreal", self.ac_real),
            ("acimag", self.ac_imag),
        ]
    }
}

/// An ideal current source driving `I` from `n1` through the source to `n2`.
#[derive(Debug, Clone)]
pub struct IdealCurrentSource {
    name: String,
    terminals: Vec<Terminal>,
    /// DC value in amperes
    pub current: f64,
    /// Small-signal magnitude, real part
    pub ac_real: f64,
    /// Small-signal magnitude, imaginary part
    pub ac_imag: f64,
}

impl IdealCurrentSource {
    pub const ELEMENT: &'static str = "isource";

    pub fn create(
        nodes: &mut NodeKeeper,
        name: &str,
        node_names: &[String],
    ) -> Result<Box<dyn InstanceModel>> {
        Ok(Box::new(Self {
            name: name.to_string(),
            terminals: connect(nodes, name, node_names, 2)?,
            current: 0.0,
            ac_real: 0.0,
            ac_imag: 0.0,
        }))
    }
}

impl InstanceModel for IdealCurrentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn element_type(&self) -> &'static str {
        Self::ELEMENT
    }

    fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    fn assemble_dc(&self, _solution: &[f64], _matrix: &mut Vec<RowColVal>, rhs: &mut Vec<RhsEntry>) {
        let nodes = [self.terminals[0].node, self.terminals[1].node];
        load_branch(nodes, self.current, 0.0, None, rhs);
    }

    fn assemble_transient(
        &self,
        _scale: f64,
        _solution: &[f64],
        _matrix: Option<&mut Vec<RowColVal>>,
        _rhs: &mut Vec<RhsEntry>,
    ) {
    }

    fn assemble_ac_rhs(&self, rhs: &mut Vec<(usize, Complex64)>) {
        let ac = Complex64::new(self.ac_real, self.ac_imag);
        if let Some(r) = self.terminals[0].node.number() {
            rhs.push((r, ac));
        }
        if let Some(r) = self.terminals[1].node.number() {
            rhs.push((r, -ac));
        }
    }

    fn add_parameter(&mut self, name: &str, value: f64) -> bool {
        match name {
            "I" => self.current = value,
            "acreal" => self.ac_real = value,
            "acimag" => self.ac_imag = value,
            _ => return false,
        }
        true
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("I", self.current),
            ("acreal", self.ac_real),
            ("acimag", self.ac_imag),
        ]
    }
}
