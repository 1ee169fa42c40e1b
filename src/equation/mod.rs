//! Equation assemblers.
//!
//! Every equation contributes residual entries `f` (RHS) and Jacobian
//! entries `df/dx` (matrix) for one solution variable:
//!
//! - node models are weighted by the node volume model,
//! - edge models by the edge couple model and the edge weights
//!   (`+1` on the first node, `-1` on the second by default),
//! - element-edge models by the element-edge couple model.
//!
//! Bulk equations are loaded through the permutation map; contact and
//! interface equations write raw rows which are loaded unchanged.

mod bulk;
mod contact;
mod interface;

pub use bulk::BulkEquation;
pub use contact::ContactEquation;
pub use interface::{InterfaceEquation, InterfaceEquationKind};

use std::fmt;

use crate::circuit::Circuit;
use crate::device::{Device, InterfaceContext, ModelCache, ModelContext};
use crate::dsl::CommandRecord;
use crate::error::{Result, TcadError};
use crate::matrix::{Assembly, PermutationMap};

/// What an assembly pass produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Only declare row permutations.
    PermutationsOnly,
    Matrix,
    Rhs,
    MatrixAndRhs,
}

impl LoadMode {
    pub fn matrix(self) -> bool {
        matches!(self, LoadMode::Matrix | LoadMode::MatrixAndRhs)
    }

    pub fn rhs(self) -> bool {
        matches!(self, LoadMode::Rhs | LoadMode::MatrixAndRhs)
    }
}

/// Which half of the residual is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMode {
    /// Static terms `I(x)`.
    Dc,
    /// Charge-like terms `Q(x)` whose time derivative enters the residual.
    Time,
}

impl fmt::Display for TimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeMode::Dc => write!(f, "dc"),
            TimeMode::Time => write!(f, "time"),
        }
    }
}

/// Weights of an edge flux on its first and second node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeWeights {
    pub first: f64,
    pub second: f64,
}

impl Default for EdgeWeights {
    fn default() -> Self {
        Self {
            first: 1.0,
            second: -1.0,
        }
    }
}

/// Shared state for one assembly pass over a device and its circuit.
pub struct AssemblyContext<'a> {
    device: &'a Device,
    circuit: &'a Circuit,
    unknowns: &'a [f64],
    circuit_base: usize,
    caches: Vec<ModelCache>,
}

impl<'a> AssemblyContext<'a> {
    pub fn new(device: &'a Device, circuit: &'a Circuit, unknowns: &'a [f64], circuit_base: usize) -> Self {
        Self {
            device,
            circuit,
            unknowns,
            circuit_base,
            caches: vec![ModelCache::new(); device.regions().len()],
        }
    }

    pub fn device(&self) -> &'a Device {
        self.device
    }

    pub fn circuit(&self) -> &'a Circuit {
        self.circuit
    }

    pub fn unknowns(&self) -> &'a [f64] {
        self.unknowns
    }

    /// Model context of one region, backed by that region's cache.
    pub fn region_context(&mut self, region: usize) -> ModelContext<'_> {
        let base = self.device.region_base(region);
        ModelContext::new(
            &self.device.regions()[region],
            base,
            self.unknowns,
            &mut self.caches[region],
        )
        .with_circuit(self.circuit, self.circuit_base)
    }

    /// Model contexts of both interface regions, which must differ.
    pub fn interface_context<'s>(
        &'s mut self,
        regions: [usize; 2],
        pairs: &'s [(usize, usize)],
    ) -> InterfaceContext<'s> {
        let [r0, r1] = regions;
        debug_assert_ne!(r0, r1);
        let device = self.device;
        let (c0, c1) = if r0 < r1 {
            let (lo, hi) = self.caches.split_at_mut(r1);
            (&mut lo[r0], &mut hi[0])
        } else {
            let (lo, hi) = self.caches.split_at_mut(r0);
            (&mut hi[0], &mut lo[r1])
        };
        let first = ModelContext::new(&device.regions()[r0], device.region_base(r0), self.unknowns, c0)
            .with_circuit(self.circuit, self.circuit_base);
        let second = ModelContext::new(&device.regions()[r1], device.region_base(r1), self.unknowns, c1)
            .with_circuit(self.circuit, self.circuit_base);
        InterfaceContext::new(first, second, pairs)
    }

    /// Global row of a circuit node, `None` for ground.
    pub fn circuit_row(&self, node: &str) -> Result<Option<usize>> {
        let n = self
            .circuit
            .node(node)
            .ok_or_else(|| TcadError::NodeNotFound {
                node: node.to_string(),
            })?;
        Ok(n.number().map(|i| self.circuit_base + i))
    }
}

/// An equation that can load itself into the global system.
pub trait EquationAssembler {
    /// Equation name, unique per owner.
    fn name(&self) -> &str;

    /// Solution variable the equation is solved for.
    fn variable(&self) -> &str;

    /// Load contributions for `load`/`time`.
    ///
    /// With [`LoadMode::PermutationsOnly`] only `permutations` is written;
    /// otherwise only `out`.
    fn assemble(
        &self,
        ctx: &mut AssemblyContext<'_>,
        out: &mut Assembly,
        permutations: &mut PermutationMap,
        load: LoadMode,
        time: TimeMode,
    ) -> Result<()>;

    /// The command record reconstructing this equation.
    fn command_record(&self) -> CommandRecord;

    fn serialize(&self) -> String {
        self.command_record().to_string()
    }
}

// ============ Model kernels ============

/// Where a model's contributions land.
pub(crate) struct Placement<'p> {
    /// Row receiving the contribution of a node, or `None` to skip it.
    pub rows: &'p dyn Fn(usize) -> Option<usize>,
    /// Extra (derivative suffix, column) pairs, e.g. a circuit node.
    pub columns: &'p [(String, usize)],
}

fn check_len(ctx: &ModelContext<'_>, name: &str, len: usize, expected: usize) -> Result<()> {
    if len != expected {
        return Err(TcadError::ModelLengthMismatch {
            region: ctx.region().name().to_string(),
            model: name.to_string(),
            expected,
            actual: len,
        });
    }
    Ok(())
}

/// Load a node model weighted by node volume.
pub(crate) fn load_node_model(
    ctx: &mut ModelContext<'_>,
    model: &str,
    place: &Placement<'_>,
    load: LoadMode,
    out: &mut Assembly,
) -> Result<()> {
    let region = ctx.region();
    let n = region.node_count();
    let values = ctx.values(model)?;
    check_len(ctx, model, values.len(), n)?;
    let volume = ctx.values(region.node_volume_model())?;
    check_len(ctx, region.node_volume_model(), volume.len(), n)?;

    if load.rhs() {
        for node in 0..n {
            if let Some(row) = (place.rows)(node) {
                out.add_rhs(row, values[node] * volume[node]);
            }
        }
    }

    if load.matrix() {
        for (var, v) in region.variables().iter().enumerate() {
            let name = format!("{}:{}", model, v.name());
            let Some(deriv) = ctx.try_values(&name)? else {
                continue;
            };
            check_len(ctx, &name, deriv.len(), n)?;
            for node in 0..n {
                if let Some(row) = (place.rows)(node) {
                    out.add_matrix(row, ctx.equation_number(var, node), deriv[node] * volume[node]);
                }
            }
        }
        for (suffix, col) in place.columns {
            let name = format!("{}:{}", model, suffix);
            let Some(deriv) = ctx.try_values(&name)? else {
                continue;
            };
            check_len(ctx, &name, deriv.len(), n)?;
            for node in 0..n {
                if let Some(row) = (place.rows)(node) {
                    out.add_matrix(row, *col, deriv[node] * volume[node]);
                }
            }
        }
    }
    Ok(())
}

/// Load an edge model weighted by edge coupling and `weights`.
pub(crate) fn load_edge_model(
    ctx: &mut ModelContext<'_>,
    model: &str,
    weights: EdgeWeights,
    place: &Placement<'_>,
    load: LoadMode,
    out: &mut Assembly,
) -> Result<()> {
    let region = ctx.region();
    let edges = region.edges();
    let values = ctx.values(model)?;
    check_len(ctx, model, values.len(), edges.len())?;
    let couple = ctx.values(region.edge_couple_model())?;
    check_len(ctx, region.edge_couple_model(), couple.len(), edges.len())?;

    let scatter = |out: &mut Assembly, [n0, n1]: [usize; 2], col: Option<usize>, v: f64| {
        for (node, w) in [(n0, weights.first), (n1, weights.second)] {
            if let Some(row) = (place.rows)(node) {
                match col {
                    Some(c) => out.add_matrix(row, c, w * v),
                    None => out.add_rhs(row, w * v),
                }
            }
        }
    };

    if load.rhs() {
        for (e, &nodes) in edges.iter().enumerate() {
            scatter(out, nodes, None, values[e] * couple[e]);
        }
    }

    if load.matrix() {
        for (var, v) in region.variables().iter().enumerate() {
            for end in 0..2 {
                let name = format!("{}:{}@n{}", model, v.name(), end);
                let Some(deriv) = ctx.try_values(&name)? else {
                    continue;
                };
                check_len(ctx, &name, deriv.len(), edges.len())?;
                for (e, &nodes) in edges.iter().enumerate() {
                    let col = ctx.equation_number(var, nodes[end]);
                    scatter(out, nodes, Some(col), deriv[e] * couple[e]);
                }
            }
        }
        for (suffix, col) in place.columns {
            let name = format!("{}:{}", model, suffix);
            let Some(deriv) = ctx.try_values(&name)? else {
                continue;
            };
            check_len(ctx, &name, deriv.len(), edges.len())?;
            for (e, &nodes) in edges.iter().enumerate() {
                scatter(out, nodes, Some(*col), deriv[e] * couple[e]);
            }
        }
    }
    Ok(())
}

/// Load an element-edge model weighted by element-edge coupling and `weights`.
pub(crate) fn load_element_model(
    ctx: &mut ModelContext<'_>,
    model: &str,
    weights: EdgeWeights,
    place: &Placement<'_>,
    load: LoadMode,
    out: &mut Assembly,
) -> Result<()> {
    let region = ctx.region();
    let element_edges = region.element_edges();
    let count = element_edges.len();
    let values = ctx.values(model)?;
    check_len(ctx, model, values.len(), count)?;
    let couple = ctx.values(region.element_edge_couple_model())?;
    check_len(ctx, region.element_edge_couple_model(), couple.len(), count)?;

    let scatter = |out: &mut Assembly, [n0, n1]: [usize; 2], col: Option<usize>, v: f64| {
        for (node, w) in [(n0, weights.first), (n1, weights.second)] {
            if let Some(row) = (place.rows)(node) {
                match col {
                    Some(c) => out.add_matrix(row, c, w * v),
                    None => out.add_rhs(row, w * v),
                }
            }
        }
    };

    if load.rhs() {
        for (i, ee) in element_edges.iter().enumerate() {
            scatter(out, ee.nodes, None, values[i] * couple[i]);
        }
    }

    if load.matrix() {
        let elements = region.elements();
        for (var, v) in region.variables().iter().enumerate() {
            for k in 0..region.max_element_nodes() {
                let name = format!("{}:{}@en{}", model, v.name(), k);
                let Some(deriv) = ctx.try_values(&name)? else {
                    continue;
                };
                check_len(ctx, &name, deriv.len(), count)?;
                for (i, ee) in element_edges.iter().enumerate() {
                    let Some(&node) = elements[ee.element].get(k) else {
                        continue;
                    };
                    let col = ctx.equation_number(var, node);
                    scatter(out, ee.nodes, Some(col), deriv[i] * couple[i]);
                }
            }
        }
        for (suffix, col) in place.columns {
            let name = format!("{}:{}", model, suffix);
            let Some(deriv) = ctx.try_values(&name)? else {
                continue;
            };
            check_len(ctx, &name, deriv.len(), count)?;
            for (i, ee) in element_edges.iter().enumerate() {
                scatter(out, ee.nodes, Some(*col), deriv[i] * couple[i]);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{EntityKind, Region, EDGE_COUPLE, ELEMENT_EDGE_COUPLE, NODE_VOLUME};

    fn region() -> Region {
        let mut r = Region::new("r", 3);
        r.add_edge(0, 1).unwrap();
        r.add_edge(1, 2).unwrap();
        r.add_element(&[0, 1, 2]).unwrap();
        r.add_variable("Potential");
        r.add_fixed_model(NODE_VOLUME, EntityKind::Node, vec![0.5, 1.0, 0.5])
            .unwrap();
        r.add_fixed_model(EDGE_COUPLE, EntityKind::Edge, vec![2.0, 2.0])
            .unwrap();
        r.add_fixed_model(ELEMENT_EDGE_COUPLE, EntityKind::ElementEdge, vec![1.0; 3])
            .unwrap();
        r
    }

    fn all_rows(node: usize) -> Option<usize> {
        Some(node)
    }

    #[test]
    fn test_load_mode_flags() {
        assert!(LoadMode::MatrixAndRhs.matrix() && LoadMode::MatrixAndRhs.rhs());
        assert!(!LoadMode::Matrix.rhs());
        assert!(!LoadMode::Rhs.matrix());
        assert!(!LoadMode::PermutationsOnly.matrix() && !LoadMode::PermutationsOnly.rhs());
    }

    #[test]
    fn test_node_model_weighted_by_volume() {
        let mut r = region();
        r.add_fixed_model("Rho", EntityKind::Node, vec![1.0, 2.0, 3.0])
            .unwrap();
        r.add_fixed_model("Rho:Potential", EntityKind::Node, vec![1.0; 3])
            .unwrap();
        let unknowns = vec![0.0; 3];
        let mut cache = ModelCache::new();
        let mut ctx = ModelContext::new(&r, 0, &unknowns, &mut cache);
        let mut out = Assembly::new();
        let place = Placement {
            rows: &all_rows,
            columns: &[],
        };
        load_node_model(&mut ctx, "Rho", &place, LoadMode::MatrixAndRhs, &mut out).unwrap();
        assert_eq!(out.rhs_dense(3), vec![0.5, 2.0, 1.5]);
        assert_eq!(out.matrix.len(), 3);
        assert_eq!(out.matrix[1], crate::matrix::RowColVal::new(1, 1, 1.0));
    }

    #[test]
    fn test_edge_flux_is_conservative() {
        let mut r = region();
        r.add_fixed_model("Flux", EntityKind::Edge, vec![0.25, -0.75])
            .unwrap();
        let unknowns = vec![0.0; 3];
        let mut cache = ModelCache::new();
        let mut ctx = ModelContext::new(&r, 0, &unknowns, &mut cache);
        let mut out = Assembly::new();
        let place = Placement {
            rows: &all_rows,
            columns: &[],
        };
        load_edge_model(&mut ctx, "Flux", EdgeWeights::default(), &place, LoadMode::Rhs, &mut out)
            .unwrap();
        let rhs = out.rhs_dense(3);
        assert_eq!(rhs, vec![0.5, -2.0, 1.5]);
        assert_eq!(rhs.iter().sum::<f64>(), 0.0);
    }

    #[test]
    fn test_edge_derivatives_use_end_columns() {
        let mut r = region();
        r.add_fixed_model("Flux", EntityKind::Edge, vec![0.0; 2]).unwrap();
        r.add_fixed_model("Flux:Potential@n0", EntityKind::Edge, vec![1.0; 2])
            .unwrap();
        r.add_fixed_model("Flux:Potential@n1", EntityKind::Edge, vec![-1.0; 2])
            .unwrap();
        let unknowns = vec![0.0; 3];
        let mut cache = ModelCache::new();
        let mut ctx = ModelContext::new(&r, 0, &unknowns, &mut cache);
        let mut out = Assembly::new();
        let place = Placement {
            rows: &all_rows,
            columns: &[],
        };
        load_edge_model(&mut ctx, "Flux", EdgeWeights::default(), &place, LoadMode::Matrix, &mut out)
            .unwrap();
        let m = crate::matrix::SparseMatrix::from_entries(3, &out.matrix);
        assert_eq!(m.get(0, 0), 2.0);
        assert_eq!(m.get(0, 1), -2.0);
        assert_eq!(m.get(1, 1), 4.0);
        assert_eq!(m.get(2, 2), 2.0);
        assert!(out.rhs.is_empty());
    }

    #[test]
    fn test_element_derivatives_use_local_nodes() {
        let mut r = region();
        r.add_fixed_model("J", EntityKind::ElementEdge, vec![0.0; 3])
            .unwrap();
        r.add_fixed_model("J:Potential@en2", EntityKind::ElementEdge, vec![1.0; 3])
            .unwrap();
        let unknowns = vec![0.0; 3];
        let mut cache = ModelCache::new();
        let mut ctx = ModelContext::new(&r, 0, &unknowns, &mut cache);
        let mut out = Assembly::new();
        let place = Placement {
            rows: &all_rows,
            columns: &[],
        };
        load_element_model(&mut ctx, "J", EdgeWeights::default(), &place, LoadMode::Matrix, &mut out)
            .unwrap();
        assert!(out.matrix.iter().all(|e| e.col == 2));
        assert_eq!(out.matrix.len(), 6);
    }

    #[test]
    fn test_missing_volume_model_is_configuration_error() {
        let mut r = Region::new("r", 1);
        r.add_variable("Potential");
        r.add_fixed_model("Rho", EntityKind::Node, vec![1.0]).unwrap();
        let unknowns = vec![0.0];
        let mut cache = ModelCache::new();
        let mut ctx = ModelContext::new(&r, 0, &unknowns, &mut cache);
        let mut out = Assembly::new();
        let place = Placement {
            rows: &all_rows,
            columns: &[],
        };
        let err = load_node_model(&mut ctx, "Rho", &place, LoadMode::Rhs, &mut out).unwrap_err();
        assert!(err.is_configuration());
    }
}
