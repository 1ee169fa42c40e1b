//! Interface equations joining coincident nodes of two regions.

use std::fmt;

use crate::device::Side;
use crate::dsl::CommandRecord;
use crate::error::{Result, TcadError};
use crate::matrix::{Assembly, PermutationEntry, PermutationMap};

use super::{AssemblyContext, EquationAssembler, LoadMode, TimeMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceEquationKind {
    /// The second region's row is merged into the first region's row and
    /// replaced by the interface model (e.g. `V@r0 - V@r1`).
    Continuous,
    /// The interface model is a flux leaving the first region and entering
    /// the second.
    Fluxterm,
}

impl fmt::Display for InterfaceEquationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceEquationKind::Continuous => write!(f, "continuous"),
            InterfaceEquationKind::Fluxterm => write!(f, "fluxterm"),
        }
    }
}

/// Equation on the node pairs of one interface.
///
/// Derivatives are interface models named `model:var@r0` and `model:var@r1`.
#[derive(Debug, Clone)]
pub struct InterfaceEquation {
    name: String,
    variable: String,
    model: String,
    kind: InterfaceEquationKind,
    device: String,
    interface_name: String,
    interface: usize,
}

impl InterfaceEquation {
    pub fn new(
        name: impl Into<String>,
        variable: impl Into<String>,
        model: impl Into<String>,
        kind: InterfaceEquationKind,
    ) -> Self {
        Self {
            name: name.into(),
            variable: variable.into(),
            model: model.into(),
            kind,
            device: String::new(),
            interface_name: String::new(),
            interface: 0,
        }
    }

    pub(crate) fn bind(&mut self, device: &str, interface_name: &str, interface: usize) {
        self.device = device.to_string();
        self.interface_name = interface_name.to_string();
        self.interface = interface;
    }

    /// Index of the owning interface.
    pub fn interface(&self) -> usize {
        self.interface
    }

    pub fn kind(&self) -> InterfaceEquationKind {
        self.kind
    }
}

impl EquationAssembler for InterfaceEquation {
    fn name(&self) -> &str {
        &self.name
    }

    fn variable(&self) -> &str {
        &self.variable
    }

    fn assemble(
        &self,
        ctx: &mut AssemblyContext<'_>,
        out: &mut Assembly,
        permutations: &mut PermutationMap,
        load: LoadMode,
        time: TimeMode,
    ) -> Result<()> {
        let device = ctx.device();
        let interface = &device.interfaces()[self.interface];
        let [r0, r1] = interface.regions();
        let var_of = |r: usize| {
            let region = &device.regions()[r];
            region
                .variable_index(&self.variable)
                .ok_or_else(|| TcadError::VariableNotFound {
                    region: region.name().to_string(),
                    variable: self.variable.clone(),
                })
        };
        let first0 = device.equation_number(r0, var_of(r0)?, 0);
        let first1 = device.equation_number(r1, var_of(r1)?, 0);
        let pairs = interface.pairs();

        if load == LoadMode::PermutationsOnly {
            if self.kind == InterfaceEquationKind::Continuous {
                for &(n0, n1) in pairs {
                    permutations.insert(first1 + n1, PermutationEntry::merged(first0 + n0))?;
                }
            }
            return Ok(());
        }
        if time == TimeMode::Time {
            return Ok(());
        }

        let mut ictx = ctx.interface_context([r0, r1], pairs);
        ictx.clear_caches();
        let values = interface.evaluate(&self.model, &mut ictx)?.ok_or_else(|| {
            TcadError::unresolved_model(interface.name(), self.model.as_str())
        })?;

        // (pair, row, weight) for every residual contribution.
        let targets: Vec<(usize, usize, f64)> = match self.kind {
            InterfaceEquationKind::Continuous => pairs
                .iter()
                .enumerate()
                .map(|(i, &(_, n1))| (i, first1 + n1, 1.0))
                .collect(),
            InterfaceEquationKind::Fluxterm => pairs
                .iter()
                .zip(interface.surface_area())
                .enumerate()
                .flat_map(|(i, (&(n0, n1), &area))| {
                    [(i, first0 + n0, area), (i, first1 + n1, -area)]
                })
                .collect(),
        };

        if load.rhs() {
            for &(i, row, w) in &targets {
                out.add_rhs(row, w * values[i]);
            }
        }

        if load.matrix() {
            for side in [Side::First, Side::Second] {
                let tag = match side {
                    Side::First => "r0",
                    Side::Second => "r1",
                };
                let name = format!("{}:{}@{}", self.model, self.variable, tag);
                let Some(deriv) = interface.evaluate(&name, &mut ictx)? else {
                    continue;
                };
                for &(i, row, w) in &targets {
                    let (n0, n1) = pairs[i];
                    let col = match side {
                        Side::First => first0 + n0,
                        Side::Second => first1 + n1,
                    };
                    out.add_matrix(row, col, w * deriv[i]);
                }
            }
        }
        Ok(())
    }

    fn command_record(&self) -> CommandRecord {
        CommandRecord::new("interface_equation")
            .with("device", self.device.as_str())
            .with("interface", self.interface_name.as_str())
            .with("name", self.name.as_str())
            .with("variable_name", self.variable.as_str())
            .with("interface_model", self.model.as_str())
            .with("type", self.kind.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;
    use crate::device::{Device, Region};
    use crate::matrix::RowColVal;

    /// Two 2-node regions joined at left:1 / right:0, with the jump
    /// `V@r0 - V@r1` as the interface model.
    fn junction(kind: InterfaceEquationKind) -> Device {
        let mut device = Device::new("junction");
        for name in ["left", "right"] {
            let mut r = Region::new(name, 2);
            r.add_variable("Potential");
            device.add_region(r).unwrap();
        }
        device
            .add_interface("joint", "left", "right", vec![(1, 0)])
            .unwrap();
        let interface = device.interface_mut("joint").unwrap();
        interface.set_surface_area(vec![2.0]).unwrap();
        interface.add_model("Jump", |ctx| {
            let a = ctx.values(Side::First, "Potential")?;
            let b = ctx.values(Side::Second, "Potential")?;
            Ok(a.iter().zip(&b).map(|(a, b)| a - b).collect())
        });
        interface.add_model("Jump:Potential@r0", |_| Ok(vec![1.0]));
        interface.add_model("Jump:Potential@r1", |_| Ok(vec![-1.0]));
        device
            .add_interface_equation("joint", InterfaceEquation::new("PotentialEquation", "Potential", "Jump", kind))
            .unwrap();
        device
    }

    fn assemble(device: &Device, unknowns: &[f64], load: LoadMode, time: TimeMode) -> (Assembly, PermutationMap) {
        let circuit = Circuit::new();
        let mut ctx = AssemblyContext::new(device, &circuit, unknowns, device.equation_count());
        let mut out = Assembly::new();
        let mut perm = PermutationMap::new();
        device.interface_equations()[0]
            .assemble(&mut ctx, &mut out, &mut perm, load, time)
            .unwrap();
        (out, perm)
    }

    #[test]
    fn test_fluxterm_leaves_first_region_and_enters_second() {
        let device = junction(InterfaceEquationKind::Fluxterm);
        let x = [0.0, 2.0, 0.5, 0.0];
        let (out, perm) = assemble(&device, &x, LoadMode::MatrixAndRhs, TimeMode::Dc);

        // Jump of 1.5 over an area of 2.
        let rhs = out.rhs_dense(4);
        assert_eq!(rhs, vec![0.0, 3.0, -3.0, 0.0]);
        assert_eq!(rhs.iter().sum::<f64>(), 0.0);

        let mut matrix = out.matrix.clone();
        matrix.sort_by_key(|e| (e.row, e.col));
        assert_eq!(
            matrix,
            vec![
                RowColVal::new(1, 1, 2.0),
                RowColVal::new(1, 2, -2.0),
                RowColVal::new(2, 1, -2.0),
                RowColVal::new(2, 2, 2.0),
            ]
        );
        assert!(perm.is_empty());
    }

    #[test]
    fn test_fluxterm_declares_no_permutations() {
        let device = junction(InterfaceEquationKind::Fluxterm);
        let (out, perm) = assemble(&device, &[0.0; 4], LoadMode::PermutationsOnly, TimeMode::Dc);
        assert!(perm.is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn test_continuous_merges_second_row() {
        let device = junction(InterfaceEquationKind::Continuous);
        let (_, perm) = assemble(&device, &[0.0; 4], LoadMode::PermutationsOnly, TimeMode::Dc);
        assert_eq!(perm.len(), 1);
        assert_eq!(perm.get(2), Some(&PermutationEntry::merged(1)));

        let x = [0.0, 2.0, 0.5, 0.0];
        let (out, _) = assemble(&device, &x, LoadMode::Rhs, TimeMode::Dc);
        assert_eq!(out.rhs_dense(4), vec![0.0, 0.0, 1.5, 0.0]);
    }

    #[test]
    fn test_time_mode_is_empty() {
        let device = junction(InterfaceEquationKind::Fluxterm);
        let (out, _) = assemble(&device, &[0.0, 2.0, 0.5, 0.0], LoadMode::MatrixAndRhs, TimeMode::Time);
        assert!(out.is_empty());
    }
}
