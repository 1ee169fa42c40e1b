//! Global system builder: merges every assembler into one matrix and RHS.

use std::ops::Range;

use num_complex::Complex64;
use tracing::trace;

use crate::circuit::Circuit;
use crate::device::{Device, EquationBlock};
use crate::equation::{AssemblyContext, EquationAssembler, LoadMode, TimeMode};
use crate::error::Result;
use crate::matrix::{Assembly, PermutationMap};

/// A device coupled to a circuit, numbered as one system.
///
/// Device unknowns come first; circuit node `k` is unknown
/// `circuit_base + k`.
#[derive(Debug, Clone, Copy)]
pub struct GlobalSystem<'a> {
    device: &'a Device,
    circuit: &'a Circuit,
    circuit_base: usize,
}

impl<'a> GlobalSystem<'a> {
    pub fn new(device: &'a Device, circuit: &'a Circuit) -> Self {
        Self {
            device,
            circuit,
            circuit_base: device.equation_count(),
        }
    }

    pub fn device(&self) -> &'a Device {
        self.device
    }

    pub fn circuit(&self) -> &'a Circuit {
        self.circuit
    }

    /// Number of unknowns.
    pub fn dimension(&self) -> usize {
        self.circuit_base + self.circuit.node_count()
    }

    pub fn circuit_base(&self) -> usize {
        self.circuit_base
    }

    /// Rows of the circuit unknowns.
    pub fn circuit_rows(&self) -> Range<usize> {
        self.circuit_base..self.dimension()
    }

    /// Device blocks followed by one `circuit` block, if the circuit has nodes.
    pub fn equation_blocks(&self) -> Vec<EquationBlock> {
        let mut blocks = self.device.equation_blocks();
        if self.circuit.node_count() > 0 {
            blocks.push(EquationBlock {
                name: "circuit".to_string(),
                rows: self.circuit_rows(),
            });
        }
        blocks
    }

    /// Unknowns before any solve: device initial values, circuit at zero.
    pub fn initial_unknowns(&self) -> Vec<f64> {
        let mut x = self.device.initial_unknowns();
        x.resize(self.dimension(), 0.0);
        x
    }

    pub fn context<'s>(&'s self, unknowns: &'s [f64]) -> AssemblyContext<'s> {
        AssemblyContext::new(self.device, self.circuit, unknowns, self.circuit_base)
    }

    /// Collect the row permutations every equation declares.
    pub fn permutations(&self, unknowns: &[f64]) -> Result<PermutationMap> {
        let mut ctx = self.context(unknowns);
        let mut permutations = PermutationMap::new();
        let mut unused = Assembly::new();
        for eq in self.equations() {
            eq.assemble(
                &mut ctx,
                &mut unused,
                &mut permutations,
                LoadMode::PermutationsOnly,
                TimeMode::Dc,
            )?;
        }
        trace!(rows = permutations.len(), "collected permutations");
        Ok(permutations)
    }

    /// Run one numeric pass over all equations and the circuit.
    ///
    /// Bulk equations are loaded through `permutations`; contact and
    /// interface equations and the circuit load their rows unchanged.
    pub fn assemble(
        &self,
        unknowns: &[f64],
        permutations: &PermutationMap,
        load: LoadMode,
        time: TimeMode,
    ) -> Result<Assembly> {
        debug_assert_ne!(load, LoadMode::PermutationsOnly);
        let mut ctx = self.context(unknowns);
        let mut unused = PermutationMap::new();

        let mut bulk = Assembly::new();
        for eq in self.device.bulk_equations() {
            eq.assemble(&mut ctx, &mut bulk, &mut unused, load, time)?;
        }
        let mut out = Assembly::new();
        permutations.permute_into(&bulk, &mut out);

        for eq in self.device.contact_equations() {
            eq.assemble(&mut ctx, &mut out, &mut unused, load, time)?;
        }
        for eq in self.device.interface_equations() {
            eq.assemble(&mut ctx, &mut out, &mut unused, load, time)?;
        }

        let solution = &unknowns[self.circuit_base..];
        let mut local = Assembly::new();
        match time {
            TimeMode::Dc => self.circuit.assemble_dc(solution, &mut local),
            TimeMode::Time => {
                self.circuit
                    .assemble_transient(1.0, solution, load.matrix(), &mut local)
            }
        }
        if !load.matrix() {
            local.matrix.clear();
        }
        if !load.rhs() {
            local.rhs.clear();
        }
        out.extend_offset(&local, self.circuit_base);

        trace!(
            %time,
            matrix = out.matrix.len(),
            rhs = out.rhs.len(),
            "assembled pass"
        );
        Ok(out)
    }

    /// Small-signal excitation in global numbering.
    pub fn ac_rhs(&self) -> Vec<Complex64> {
        let mut rhs = vec![Complex64::new(0.0, 0.0); self.dimension()];
        for (row, val) in self.circuit.assemble_ac_rhs() {
            rhs[self.circuit_base + row] += val;
        }
        rhs
    }

    fn equations(&self) -> impl Iterator<Item = &'a dyn EquationAssembler> {
        let device = self.device;
        let bulk = device
            .bulk_equations()
            .iter()
            .map(|e| e as &dyn EquationAssembler);
        let contact = device
            .contact_equations()
            .iter()
            .map(|e| e as &dyn EquationAssembler);
        let interface = device
            .interface_equations()
            .iter()
            .map(|e| e as &dyn EquationAssembler);
        bulk.chain(contact).chain(interface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{EntityKind, Region};
    use crate::equation::{BulkEquation, ContactEquation};

    fn resistor_bar() -> (Device, Circuit) {
        let mut region = Region::new("bulk", 3);
        region.add_variable("V");
        region.add_edge(0, 1).unwrap();
        region.add_edge(1, 2).unwrap();
        region
            .add_fixed_model("NodeVolume", EntityKind::Node, vec![0.5, 1.0, 0.5])
            .unwrap();
        region
            .add_fixed_model("EdgeCouple", EntityKind::Edge, vec![1.0, 1.0])
            .unwrap();
        region.add_edge_model("flux", |ctx| {
            let (v0, v1) = ctx.edge_node_values("V")?;
            Ok(v0.iter().zip(&v1).map(|(a, b)| b - a).collect())
        });

        let mut device = Device::new("bar");
        device.add_region(region).unwrap();
        device
            .add_bulk_equation("bulk", BulkEquation::new("VEquation", "V").edge_model("flux"))
            .unwrap();
        device.add_contact("top", "bulk", vec![0]).unwrap();
        device
            .add_contact_equation(
                "top",
                ContactEquation::new("VEquation", "V").node_model("pin"),
            )
            .unwrap();
        let circuit = Circuit::new();
        (device, circuit)
    }

    #[test]
    fn test_numbering() {
        let (device, mut circuit) = resistor_bar();
        circuit
            .add_element("resistor", "R1", &["a".into(), "0".into()])
            .unwrap();
        let system = GlobalSystem::new(&device, &circuit);
        assert_eq!(system.circuit_base(), 3);
        assert_eq!(system.dimension(), 4);
        let blocks = system.equation_blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].rows, 3..4);
    }

    #[test]
    fn test_permutations_are_idempotent() {
        let (device, circuit) = resistor_bar();
        let system = GlobalSystem::new(&device, &circuit);
        let x = system.initial_unknowns();
        let first = system.permutations(&x).unwrap();
        let second = system.permutations(&x).unwrap();
        assert_eq!(first.len(), 1);
        assert!(first.get(0).unwrap().is_eliminated());
        assert_eq!(
            first.iter().collect::<Vec<_>>(),
            second.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_eliminated_rows_drop_bulk_terms() {
        let (mut device, circuit) = resistor_bar();
        let x = vec![1.0, 0.0, 0.0];
        {
            let system = GlobalSystem::new(&device, &circuit);
            let perm = system.permutations(&x).unwrap();
            let err = system
                .assemble(&x, &perm, LoadMode::MatrixAndRhs, TimeMode::Dc)
                .unwrap_err();
            assert!(err.is_configuration());
        }

        device.region_mut("bulk").unwrap().add_node_model("pin", |ctx| {
            Ok(ctx.values("V")?.iter().map(|v| v - 1.0).collect())
        });
        let system = GlobalSystem::new(&device, &circuit);
        let perm = system.permutations(&x).unwrap();
        let a = system
            .assemble(&x, &perm, LoadMode::Rhs, TimeMode::Dc)
            .unwrap();
        assert!(a.matrix.is_empty());
        assert_eq!(a.rhs_dense(3), vec![0.0, 1.0, 0.0]);
    }
}
