//! Linear passive elements: resistor, capacitor.

use crate::circuit::NodeKeeper;
use crate::error::Result;
use crate::matrix::{RhsEntry, RowColVal};

use super::{connect, load_branch, InstanceModel, Terminal};

/// An ideal resistor: `i = (v1 - v2) / R`.
#[derive(Debug, Clone)]
pub struct IdealResistor {
    name: String,
    terminals: Vec<Terminal>,
    /// Resistance in ohms
    pub resistance: f64,
}

impl IdealResistor {
    pub const ELEMENT: &'static str = "resistor";

    pub fn create(
        nodes: &mut NodeKeeper,
        name: &str,
        node_names: &[String],
    ) -> Result<Box<dyn InstanceModel>> {
        Ok(Box::new(Self {
            name: name.to_string(),
            terminals: connect(nodes, name, node_names, 2)?,
            resistance: 1.0,
        }))
    }

    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl InstanceModel for IdealResistor {
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
        let nodes = [self.terminals[0].node, self.terminals[1].node];
        let g = self.conductance();
        let v = nodes[0].value(solution) - nodes[1].value(solution);
        load_branch(nodes, g * v, g, Some(matrix), rhs);
    }

    fn assemble_transient(
        &self,
        _scale: f64,
        _solution: &[f64],
        _matrix: Option<&mut Vec<RowColVal>>,
        _rhs: &mut Vec<RhsEntry>,
    ) {
    }

    fn add_parameter(&mut self, name: &str, value: f64) -> bool {
        match name {
            "R" => {
                self.resistance = value;
                true
            }
            _ => false,
        }
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        vec![("R", self.resistance)]
    }
}

/// An ideal capacitor: `q = C (v1 - v2)`.
#[derive(Debug, Clone)]
pub struct IdealCapacitor {
    name: String,
    terminals: Vec<Terminal>,
    /// Capacitance in farads
    pub capacitance: f64,
}

impl IdealCapacitor {
    pub const ELEMENT: &'static str = "capacitor";

    pub fn create(
        nodes: &mut NodeKeeper,
        name: &str,
        node_names: &[String],
    ) -> Result<Box<dyn InstanceModel>> {
        Ok(Box::new(Self {
            name: name.to_string(),
            terminals: connect(nodes, name, node_names, 2)?,
            capacitance: 1.0,
        }))
    }
}

impl InstanceModel for IdealCapacitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn element_type(&self) -> &'static str {
        Self::ELEMENT
    }

    fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    fn assemble_dc(&self, _solution: &[f64], _matrix: &mut Vec<RowColVal>, _rhs: &mut Vec<RhsEntry>) {}

    fn assemble_transient(
        &self,
        scale: f64,
        solution: &[f64],
        matrix: Option<&mut Vec<RowColVal>>,
        rhs: &mut Vec<RhsEntry>,
    ) {
        let nodes = [self.terminals[0].node, self.terminals[1].node];
        let c = scale * self.capacitance;
        let v = nodes[0].value(solution) - nodes[1].value(solution);
        load_branch(nodes, c * v, c, matrix, rhs);
    }

    fn add_parameter(&mut self, name: &str, value: f64) -> bool {
        match name {
            "C" => {
                self.capacitance = value;
                true
            }
            _ => false,
        }
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        vec![("C", self.capacitance)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SparseMatrix;
    use approx::assert_relative_eq;

    fn resistor(n1: &str, n2: &str, r: f64) -> (NodeKeeper, Box<dyn InstanceModel>) {
        let mut nk = NodeKeeper::new();
        let mut inst = IdealResistor::create(&mut nk, "R1", &[n1.to_string(), n2.to_string()]).unwrap();
        assert!(inst.add_parameter("R", r));
        (nk, inst)
    }

    #[test]
    fn test_resistor_conservation() {
        let (_, r) = resistor("a", "b", 1000.0);
        let mut m = Vec::new();
        let mut rhs = Vec::new();
        r.assemble_dc(&[1.0, 0.0], &mut m, &mut rhs);

        assert_relative_eq!(rhs[0].val, -0.001);
        assert_relative_eq!(rhs[1].val, 0.001);
        assert_relative_eq!(rhs[0].val + rhs[1].val, 0.0);

        let j = SparseMatrix::from_entries(2, &m);
        assert_relative_eq!(j.get(0, 0), -0.001);
        assert_relative_eq!(j.get(0, 1), 0.001);
        assert_relative_eq!(j.get(1, 0), 0.001);
        assert_relative_eq!(j.get(1, 1), -0.001);
    }

    #[test]
    fn test_resistor_ground_elimination() {
        let (nk, r) = resistor("a", "0", 1000.0);
        assert_eq!(nk.len(), 1);
        let mut m = Vec::new();
        let mut rhs = Vec::new();
        r.assemble_dc(&[1.0], &mut m, &mut rhs);
        assert_eq!(rhs.len(), 1);
        assert_eq!(m, vec![RowColVal::new(0, 0, -0.001)]);
    }

    #[test]
    fn test_resistor_transient_is_empty() {
        let (_, r) = resistor("a", "b", 1000.0);
        let mut m = Vec::new();
        let mut rhs = Vec::new();
        r.assemble_transient(1.0, &[1.0, 0.0], Some(&mut m), &mut rhs);
        r.assemble_transient(1.0, &[1.0, 0.0], None, &mut rhs);
        assert!(m.is_empty() && rhs.is_empty());
    }

    #[test]
    fn test_unrecognized_parameter() {
        let (_, mut r) = resistor("a", "b", 1000.0);
        assert!(!r.add_parameter("C", 1.0));
        assert_eq!(r.parameters(), vec![("R", 1000.0)]);
    }

    #[test]
    fn test_capacitor_charge() {
        let mut nk = NodeKeeper::new();
        let mut c = IdealCapacitor::create(&mut nk, "C1", &["a".to_string(), "0".to_string()]).unwrap();
        c.add_parameter("C", 2e-6);
        let mut m = Vec::new();
        let mut rhs = Vec::new();
        c.assemble_transient(1.0, &[3.0], Some(&mut m), &mut rhs);
        assert_relative_eq!(rhs[0].val, -6e-6);
        assert_relative_eq!(m[0].val, -2e-6);

        let mut dc_m = Vec::new();
        let mut dc_rhs = Vec::new();
        c.assemble_dc(&[3.0], &mut dc_m, &mut dc_rhs);
        assert!(dc_m.is_empty() && dc_rhs.is_empty());
    }

    #[test]
    fn test_serialize() {
        let (_, r) = resistor("a", "0", 1000.0);
        assert_eq!(
            r.serialize(),
            "COMMAND circuit_element -name \"R1\" -element \"resistor\" -n1 \"a\" -n2 \"0\" -R 1000"
        );
    }
}
