//! Bulk equations on every node of a region.

use crate::dsl::{CommandRecord, OptionValue};
use crate::error::{Result, TcadError};
use crate::matrix::{Assembly, PermutationMap};

use super::{
    load_edge_model, load_element_model, load_node_model, AssemblyContext, EdgeWeights,
    EquationAssembler, LoadMode, Placement, TimeMode,
};

/// Region-wide balance equation for one variable.
///
/// In DC mode the node, edge and element models are loaded in that order,
/// each with a fresh cache. In time mode only the time node model is loaded.
#[derive(Debug, Clone)]
pub struct BulkEquation {
    name: String,
    variable: String,
    device: String,
    region_name: String,
    region: usize,
    node_model: Option<String>,
    edge_model: Option<String>,
    element_model: Option<String>,
    time_node_model: Option<String>,
    weights: EdgeWeights,
}

impl BulkEquation {
    pub fn new(name: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variable: variable.into(),
            device: String::new(),
            region_name: String::new(),
            region: 0,
            node_model: None,
            edge_model: None,
            element_model: None,
            time_node_model: None,
            weights: EdgeWeights::default(),
        }
    }

    pub fn node_model(mut self, name: impl Into<String>) -> Self {
        self.node_model = Some(name.into());
        self
    }

    pub fn edge_model(mut self, name: impl Into<String>) -> Self {
        self.edge_model = Some(name.into());
        self
    }

    pub fn element_model(mut self, name: impl Into<String>) -> Self {
        self.element_model = Some(name.into());
        self
    }

    pub fn time_node_model(mut self, name: impl Into<String>) -> Self {
        self.time_node_model = Some(name.into());
        self
    }

    pub fn edge_weights(mut self, weights: EdgeWeights) -> Self {
        self.weights = weights;
        self
    }

    pub(crate) fn bind(&mut self, device: &str, region_name: &str, region: usize) {
        self.device = device.to_string();
        self.region_name = region_name.to_string();
        self.region = region;
    }

    /// Index of the owning region.
    pub fn region(&self) -> usize {
        self.region
    }
}

impl EquationAssembler for BulkEquation {
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
        _permutations: &mut PermutationMap,
        load: LoadMode,
        time: TimeMode,
    ) -> Result<()> {
        if load == LoadMode::PermutationsOnly {
            return Ok(());
        }

        let mut mctx = ctx.region_context(self.region);
        let region = mctx.region();
        let var = region
            .variable_index(&self.variable)
            .ok_or_else(|| TcadError::VariableNotFound {
                region: region.name().to_string(),
                variable: self.variable.clone(),
            })?;
        let first = mctx.equation_number(var, 0);
        let rows = move |node: usize| Some(first + node);
        let place = Placement {
            rows: &rows,
            columns: &[],
        };

        match time {
            TimeMode::Dc => {
                if let Some(m) = &self.node_model {
                    mctx.cache_mut().clear();
                    load_node_model(&mut mctx, m, &place, load, out)?;
                }
                if let Some(m) = &self.edge_model {
                    mctx.cache_mut().clear();
                    load_edge_model(&mut mctx, m, self.weights, &place, load, out)?;
                }
                if let Some(m) = &self.element_model {
                    mctx.cache_mut().clear();
                    load_element_model(&mut mctx, m, self.weights, &place, load, out)?;
                }
            }
            TimeMode::Time => {
                if let Some(m) = &self.time_node_model {
                    mctx.cache_mut().clear();
                    load_node_model(&mut mctx, m, &place, load, out)?;
                }
            }
        }
        Ok(())
    }

    fn command_record(&self) -> CommandRecord {
        let model = |m: &Option<String>| OptionValue::from(m.clone().unwrap_or_default());
        CommandRecord::new("equation")
            .with("device", self.device.as_str())
            .with("region", self.region_name.as_str())
            .with("name", self.name.as_str())
            .with("variable_name", self.variable.as_str())
            .with("edge_model", model(&self.edge_model))
            .with("element_model", model(&self.element_model))
            .with("node_model", model(&self.node_model))
            .with("time_node_model", model(&self.time_node_model))
    }
}
