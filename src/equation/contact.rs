//! Contact equations: boundary conditions that replace the bulk rows of
//! contact nodes, optionally coupled to a circuit node.

use std::collections::BTreeMap;

use crate::device::ModelContext;
use crate::dsl::{CommandRecord, OptionValue};
use crate::error::{Result, TcadError};
use crate::matrix::{Assembly, PermutationEntry, PermutationMap};

use super::{
    load_edge_model, load_element_model, load_node_model, AssemblyContext, EdgeWeights,
    EquationAssembler, LoadMode, Placement, TimeMode,
};

/// Node, edge and element-edge model names of one model class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ModelSet {
    node: Option<String>,
    edge: Option<String>,
    element: Option<String>,
}

/// Boundary equation on the nodes of one contact.
///
/// Internal models replace the bulk equation on the contact rows. Current
/// models (DC) and charge models (time) are integrated onto the row of the
/// circuit node, when one is attached.
#[derive(Debug, Clone)]
pub struct ContactEquation {
    name: String,
    variable: String,
    device: String,
    contact_name: String,
    contact: usize,
    region: usize,
    internal: ModelSet,
    current: ModelSet,
    charge: ModelSet,
    circuit_node: Option<String>,
    weights: EdgeWeights,
}

fn non_empty(name: impl Into<String>) -> Option<String> {
    Some(name.into()).filter(|s| !s.is_empty())
}

impl ContactEquation {
    pub fn new(name: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variable: variable.into(),
            device: String::new(),
            contact_name: String::new(),
            contact: 0,
            region: 0,
            internal: ModelSet::default(),
            current: ModelSet::default(),
            charge: ModelSet::default(),
            circuit_node: None,
            weights: EdgeWeights::default(),
        }
    }

    pub fn node_model(mut self, name: impl Into<String>) -> Self {
        self.internal.node = non_empty(name);
        self
    }

    pub fn edge_model(mut self, name: impl Into<String>) -> Self {
        self.internal.edge = non_empty(name);
        self
    }

    pub fn element_model(mut self, name: impl Into<String>) -> Self {
        self.internal.element = non_empty(name);
        self
    }

    pub fn node_current_model(mut self, name: impl Into<String>) -> Self {
        self.current.node = non_empty(name);
        self
    }

    pub fn edge_current_model(mut self, name: impl Into<String>) -> Self {
        self.current.edge = non_empty(name);
        self
    }

    pub fn element_current_model(mut self, name: impl Into<String>) -> Self {
        self.current.element = non_empty(name);
        self
    }

    pub fn node_charge_model(mut self, name: impl Into<String>) -> Self {
        self.charge.node = non_empty(name);
        self
    }

    pub fn edge_charge_model(mut self, name: impl Into<String>) -> Self {
        self.charge.edge = non_empty(name);
        self
    }

    pub fn element_charge_model(mut self, name: impl Into<String>) -> Self {
        self.charge.element = non_empty(name);
        self
    }

    pub fn circuit_node(mut self, name: impl Into<String>) -> Self {
        self.circuit_node = non_empty(name);
        self
    }

    pub fn edge_weights(mut self, weights: EdgeWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Rebuild an equation from a `contact_equation` record. Device and
    /// contact identity are assigned when it is added to a device.
    pub fn from_record(record: &CommandRecord) -> Result<Self> {
        if record.command() != "contact_equation" {
            return Err(TcadError::UnknownCommand {
                command: record.command().to_string(),
            });
        }
        let opt = |key: &str| record.get_str(key).unwrap_or_default().to_string();
        Ok(Self::new(record.require_str("name")?, record.require_str("variable_name")?)
            .node_model(opt("node_model"))
            .edge_model(opt("edge_model"))
            .element_model(opt("element_model"))
            .node_current_model(opt("node_current_model"))
            .edge_current_model(opt("edge_current_model"))
            .element_current_model(opt("element_current_model"))
            .node_charge_model(opt("node_charge_model"))
            .edge_charge_model(opt("edge_charge_model"))
            .element_charge_model(opt("element_charge_model"))
            .circuit_node(opt("circuit_node")))
    }

    pub(crate) fn bind(&mut self, device: &str, contact_name: &str, contact: usize, region: usize) {
        self.device = device.to_string();
        self.contact_name = contact_name.to_string();
        self.contact = contact;
        self.region = region;
    }

    /// Index of the owning contact.
    pub fn contact(&self) -> usize {
        self.contact
    }

    pub fn contact_name(&self) -> &str {
        &self.contact_name
    }

    pub fn circuit_node_name(&self) -> Option<&str> {
        self.circuit_node.as_deref()
    }

    /// Same fields as [`EquationAssembler::serialize`], keyed by option name.
    pub fn command_options(&self) -> BTreeMap<String, OptionValue> {
        self.command_record().to_map()
    }

    /// Current through the contact: the current models integrated over its nodes.
    pub fn current(&self, ctx: &mut AssemblyContext<'_>) -> Result<f64> {
        self.integrate(ctx, &self.current)
    }

    /// Charge on the contact: the charge models integrated over its nodes.
    pub fn charge(&self, ctx: &mut AssemblyContext<'_>) -> Result<f64> {
        self.integrate(ctx, &self.charge)
    }

    fn integrate(&self, ctx: &mut AssemblyContext<'_>, models: &ModelSet) -> Result<f64> {
        let mask = self.mask(ctx);
        let rows = |node: usize| mask[node].then_some(0);
        let place = Placement {
            rows: &rows,
            columns: &[],
        };
        let mut out = Assembly::new();
        let mut mctx = ctx.region_context(self.region);
        self.load_group(&mut mctx, models, &place, LoadMode::Rhs, &mut out)?;
        Ok(out.rhs.iter().map(|e| e.val).sum())
    }

    fn mask(&self, ctx: &AssemblyContext<'_>) -> Vec<bool> {
        let device = ctx.device();
        let nodes = device.regions()[self.region].node_count();
        device.contacts()[self.contact].node_mask(nodes)
    }

    fn load_group(
        &self,
        mctx: &mut ModelContext<'_>,
        models: &ModelSet,
        place: &Placement<'_>,
        load: LoadMode,
        out: &mut Assembly,
    ) -> Result<()> {
        if let Some(m) = &models.node {
            mctx.cache_mut().clear();
            load_node_model(mctx, m, place, load, out)?;
        }
        if let Some(m) = &models.edge {
            mctx.cache_mut().clear();
            load_edge_model(mctx, m, self.weights, place, load, out)?;
        }
        if let Some(m) = &models.element {
            mctx.cache_mut().clear();
            load_element_model(mctx, m, self.weights, place, load, out)?;
        }
        Ok(())
    }
}

impl EquationAssembler for ContactEquation {
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
        let region = &device.regions()[self.region];
        let var = region
            .variable_index(&self.variable)
            .ok_or_else(|| TcadError::VariableNotFound {
                region: region.name().to_string(),
                variable: self.variable.clone(),
            })?;
        let first = device.equation_number(self.region, var, 0);
        let contact_nodes = device.contacts()[self.contact].nodes();

        if load == LoadMode::PermutationsOnly {
            // The node model is what claims the contact rows.
            if self.internal.node.is_some() {
                for &node in contact_nodes {
                    permutations.insert(first + node, PermutationEntry::eliminated())?;
                }
            }
            return Ok(());
        }

        let circuit_row = match &self.circuit_node {
            Some(node) => ctx.circuit_row(node)?,
            None => None,
        };
        let columns: Vec<(String, usize)> = match (&self.circuit_node, circuit_row) {
            (Some(name), Some(row)) => vec![(name.clone(), row)],
            _ => Vec::new(),
        };
        let mask = self.mask(ctx);

        let mut mctx = ctx.region_context(self.region);
        match time {
            TimeMode::Dc => {
                let rows = |node: usize| mask[node].then_some(first + node);
                let place = Placement {
                    rows: &rows,
                    columns: &columns,
                };
                self.load_group(&mut mctx, &self.internal, &place, load, out)?;

                if let Some(row) = circuit_row {
                    let rows = |node: usize| mask[node].then_some(row);
                    let place = Placement {
                        rows: &rows,
                        columns: &columns,
                    };
                    self.load_group(&mut mctx, &self.current, &place, load, out)?;
                }
            }
            TimeMode::Time => {
                if let Some(row) = circuit_row {
                    let rows = |node: usize| mask[node].then_some(row);
                    let place = Placement {
                        rows: &rows,
                        columns: &columns,
                    };
                    self.load_group(&mut mctx, &self.charge, &place, load, out)?;
                }
            }
        }
        Ok(())
    }

    fn command_record(&self) -> CommandRecord {
        let model = |m: &Option<String>| OptionValue::from(m.clone().unwrap_or_default());
        CommandRecord::new("contact_equation")
            .with("device", self.device.as_str())
            .with("contact", self.contact_name.as_str())
            .with("name", self.name.as_str())
            .with("variable_name", self.variable.as_str())
            .with("edge_charge_model", model(&self.charge.edge))
            .with("edge_current_model", model(&self.current.edge))
            .with("edge_model", model(&self.internal.edge))
            .with("element_charge_model", model(&self.charge.element))
            .with("element_current_model", model(&self.current.element))
            .with("element_model", model(&self.internal.element))
            .with("node_charge_model", model(&self.charge.node))
            .with("node_current_model", model(&self.current.node))
            .with("node_model", model(&self.internal.node))
            .with("circuit_node", model(&self.circuit_node))
    }
}

impl PartialEq for ContactEquation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.variable == other.variable
            && self.internal == other.internal
            && self.current == other.current
            && self.charge == other.charge
            && self.circuit_node == other.circuit_node
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::circuit::Circuit;
    use crate::device::{Device, EntityKind, Region, EDGE_COUPLE, NODE_VOLUME};

    fn equation() -> ContactEquation {
        ContactEquation::new("PotentialEquation", "Potential")
            .node_model("contact_bc")
            .edge_current_model("ElectricField")
            .node_charge_model("contact_charge")
            .circuit_node("anode")
    }

    #[test]
    fn test_serialize_format() {
        let mut eq = equation();
        eq.bind("diode", "top", 0, 0);
        assert_eq!(
            eq.serialize(),
            "COMMAND contact_equation -device \"diode\" -contact \"top\" \
             -name \"PotentialEquation\" -variable_name \"Potential\" \
             -edge_charge_model \"\" -edge_current_model \"ElectricField\" \
             -edge_model \"\" -element_charge_model \"\" -element_current_model \"\" \
             -element_model \"\" -node_charge_model \"contact_charge\" \
             -node_current_model \"\" -node_model \"contact_bc\" -circuit_node \"anode\""
        );
    }

    #[test]
    fn test_command_options_match_record() {
        let mut eq = equation();
        eq.bind("diode", "top", 0, 0);
        let opts = eq.command_options();
        assert_eq!(opts.len(), 14);
        assert_eq!(opts["node_model"], OptionValue::from("contact_bc"));
        assert_eq!(opts["element_model"], OptionValue::from(""));
    }

    #[test]
    fn test_record_round_trip() {
        let mut eq = equation();
        eq.bind("diode", "top", 0, 0);
        let records = crate::dsl::parse(&eq.serialize()).unwrap();
        let back = ContactEquation::from_record(&records[0]).unwrap();
        assert_eq!(back, eq);
        assert_eq!(back.circuit_node_name(), Some("anode"));
    }

    #[test]
    fn test_internal_and_current_groups_get_fresh_caches() {
        // `Counter` returns 1, 2, ... per evaluation; both terms read it twice
        // as `10 * first + second`.
        let calls = Rc::new(Cell::new(0.0));
        let counter = Rc::clone(&calls);
        let mut r = Region::new("bar", 2);
        r.add_edge(0, 1).unwrap();
        r.add_variable("Potential");
        r.add_fixed_model(NODE_VOLUME, EntityKind::Node, vec![1.0; 2])
            .unwrap();
        r.add_fixed_model(EDGE_COUPLE, EntityKind::Edge, vec![1.0])
            .unwrap();
        r.add_node_model("Counter", move |_| {
            counter.set(counter.get() + 1.0);
            Ok(vec![counter.get(); 2])
        });
        r.add_node_model("NodeTerm", |ctx| {
            let first = ctx.values("Counter")?;
            let second = ctx.values("Counter")?;
            Ok(first.iter().zip(second.iter()).map(|(a, b)| 10.0 * a + b).collect())
        });
        r.add_edge_model("EdgeTerm", |ctx| {
            let (first, _) = ctx.edge_node_values("Counter")?;
            let (second, _) = ctx.edge_node_values("Counter")?;
            Ok(first.iter().zip(&second).map(|(a, b)| 10.0 * a + b).collect())
        });

        let mut device = Device::new("counting");
        device.add_region(r).unwrap();
        device.add_contact("top", "bar", vec![0]).unwrap();
        device
            .add_contact_equation(
                "top",
                ContactEquation::new("PotentialEquation", "Potential")
                    .node_model("NodeTerm")
                    .edge_current_model("EdgeTerm")
                    .circuit_node("anode"),
            )
            .unwrap();
        let mut circuit = Circuit::new();
        circuit.add_node("anode");

        let unknowns = vec![0.0; 3];
        let mut ctx = AssemblyContext::new(&device, &circuit, &unknowns, 2);
        let mut out = Assembly::new();
        let mut perm = PermutationMap::new();
        device.contact_equations()[0]
            .assemble(&mut ctx, &mut out, &mut perm, LoadMode::Rhs, TimeMode::Dc)
            .unwrap();

        assert_eq!(calls.get(), 2.0);
        // Contact row gets the node term from the first evaluation; the
        // circuit row gets the edge current from the second.
        assert_eq!(out.rhs_dense(3), vec![11.0, 0.0, 22.0]);
    }
}
