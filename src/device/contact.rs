//! Contacts and interfaces: node sets on region boundaries.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, TcadError};

use super::model::ModelContext;

/// Boundary nodes of one region where contact equations replace the bulk ones.
#[derive(Debug, Clone)]
pub struct Contact {
    name: String,
    region: usize,
    nodes: Vec<usize>,
}

impl Contact {
    pub(crate) fn new(name: String, region: usize, nodes: Vec<usize>) -> Self {
        Self {
            name,
            region,
            nodes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the owning region in the device.
    pub fn region(&self) -> usize {
        self.region
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Membership mask over the region's nodes.
    pub fn node_mask(&self, node_count: usize) -> Vec<bool> {
        let mut mask = vec![false; node_count];
        for &n in &self.nodes {
            mask[n] = true;
        }
        mask
    }
}

/// Side of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Second,
}

/// Computes one value per interface node pair.
pub type InterfaceModelFn = Box<dyn Fn(&mut InterfaceContext<'_>) -> Result<Vec<f64>>>;

/// Coincident node pairs shared by two regions.
pub struct Interface {
    name: String,
    regions: [usize; 2],
    pairs: Vec<(usize, usize)>,
    surface_area: Vec<f64>,
    models: HashMap<String, InterfaceModelFn>,
}

impl Interface {
    pub(crate) fn new(name: String, regions: [usize; 2], pairs: Vec<(usize, usize)>) -> Self {
        let surface_area = vec![1.0; pairs.len()];
        Self {
            name,
            regions,
            pairs,
            surface_area,
            models: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device indices of the first and second region.
    pub fn regions(&self) -> [usize; 2] {
        self.regions
    }

    /// (first region node, second region node) pairs.
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// Area weight per node pair, used by flux-term equations.
    pub fn surface_area(&self) -> &[f64] {
        &self.surface_area
    }

    pub fn set_surface_area(&mut self, area: Vec<f64>) -> Result<()> {
        if area.len() != self.pairs.len() {
            return Err(TcadError::ModelLengthMismatch {
                region: self.name.clone(),
                model: "SurfaceArea".to_string(),
                expected: self.pairs.len(),
                actual: area.len(),
            });
        }
        self.surface_area = area;
        Ok(())
    }

    pub fn add_model(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&mut InterfaceContext<'_>) -> Result<Vec<f64>> + 'static,
    ) {
        self.models.insert(name.into(), Box::new(f));
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Evaluate `name`, or `None` when it is not registered.
    pub fn evaluate(&self, name: &str, ctx: &mut InterfaceContext<'_>) -> Result<Option<Vec<f64>>> {
        let Some(f) = self.models.get(name) else {
            return Ok(None);
        };
        let values = f(ctx)?;
        if values.len() != self.pairs.len() {
            return Err(TcadError::ModelLengthMismatch {
                region: self.name.clone(),
                model: name.to_string(),
                expected: self.pairs.len(),
                actual: values.len(),
            });
        }
        Ok(Some(values))
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut models: Vec<&String> = self.models.keys().collect();
        models.sort();
        f.debug_struct("Interface")
            .field("name", &self.name)
            .field("regions", &self.regions)
            .field("pairs", &self.pairs)
            .field("models", &models)
            .finish()
    }
}

/// Model access on both sides of an interface.
pub struct InterfaceContext<'c> {
    first: ModelContext<'c>,
    second: ModelContext<'c>,
    pairs: &'c [(usize, usize)],
}

impl<'c> InterfaceContext<'c> {
    pub fn new(
        first: ModelContext<'c>,
        second: ModelContext<'c>,
        pairs: &'c [(usize, usize)],
    ) -> Self {
        Self {
            first,
            second,
            pairs,
        }
    }

    pub fn side(&mut self, side: Side) -> &mut ModelContext<'c> {
        match side {
            Side::First => &mut self.first,
            Side::Second => &mut self.second,
        }
    }

    /// Node model `name` of one side, gathered at the interface nodes.
    pub fn values(&mut self, side: Side, name: &str) -> Result<Vec<f64>> {
        let pairs = self.pairs;
        let ctx = self.side(side);
        let values = ctx.values(name)?;
        let region = ctx.region();
        if values.len() != region.node_count() {
            return Err(TcadError::ModelLengthMismatch {
                region: region.name().to_string(),
                model: name.to_string(),
                expected: region.node_count(),
                actual: values.len(),
            });
        }
        Ok(pairs
            .iter()
            .map(|&(n0, n1)| match side {
                Side::First => values[n0],
                Side::Second => values[n1],
            })
            .collect())
    }

    /// Clear both regions' caches.
    pub fn clear_caches(&mut self) {
        self.first.cache_mut().clear();
        self.second.cache_mut().clear();
    }
}
