//! Named models and the per-pass evaluation cache.
//!
//! A named model is a per-entity scalar field on a region: one value per
//! node, per edge or per element-edge. Derivatives are ordinary models
//! found by name:
//!
//! | Kind | Derivative name |
//! |------|-----------------|
//! | node | `model:var` |
//! | edge | `model:var@n0`, `model:var@n1` |
//! | element-edge | `model:var@en0` .. `model:var@en<k>` |
//! | any, w.r.t. a circuit node | `model:<circuit node>` |
//!
//! Values are computed lazily through a [`ModelContext`] and memoized in a
//! [`ModelCache`] for the rest of the pass. The cache is never invalidated
//! implicitly; assemblers call [`ModelCache::clear`] before each model
//! group.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::circuit::Circuit;
use crate::error::{Result, TcadError};

use super::region::Region;

/// The entity set a model is defined on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    Edge,
    ElementEdge,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Node => write!(f, "node"),
            EntityKind::Edge => write!(f, "edge"),
            EntityKind::ElementEdge => write!(f, "element edge"),
        }
    }
}

/// Computes a model's values from other models and solutions.
pub type ModelFn = Box<dyn Fn(&mut ModelContext<'_>) -> Result<Vec<f64>>>;

pub(crate) enum ModelSource {
    Fixed(Rc<[f64]>),
    Computed(ModelFn),
}

/// A model registered on a region.
pub struct NamedModel {
    kind: EntityKind,
    source: ModelSource,
}

impl NamedModel {
    pub fn fixed(kind: EntityKind, values: Vec<f64>) -> Self {
        Self {
            kind,
            source: ModelSource::Fixed(values.into()),
        }
    }

    pub fn computed(
        kind: EntityKind,
        f: impl Fn(&mut ModelContext<'_>) -> Result<Vec<f64>> + 'static,
    ) -> Self {
        Self {
            kind,
            source: ModelSource::Computed(Box::new(f)),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }
}

impl fmt::Debug for NamedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            ModelSource::Fixed(_) => "fixed",
            ModelSource::Computed(_) => "computed",
        };
        f.debug_struct("NamedModel")
            .field("kind", &self.kind)
            .field("source", &source)
            .finish()
    }
}

/// Values computed during the current pass, keyed by model name.
#[derive(Debug, Clone, Default)]
pub struct ModelCache {
    values: HashMap<String, Rc<[f64]>>,
    // Computed models whose closure is running.
    pending: HashSet<String>,
    evaluations: usize,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every cached value.
    pub fn clear(&mut self) {
        self.values.clear();
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of computed-model evaluations since creation.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}

/// Read access to circuit node values during model evaluation.
#[derive(Clone, Copy)]
pub(crate) struct CircuitValues<'c> {
    pub(crate) circuit: &'c Circuit,
    pub(crate) base: usize,
}

/// Everything a model needs to evaluate on one region for one pass.
pub struct ModelContext<'c> {
    region: &'c Region,
    base: usize,
    unknowns: &'c [f64],
    circuit: Option<CircuitValues<'c>>,
    cache: &'c mut ModelCache,
}

/// Parent chains of auxiliary solutions longer than this are treated as
/// unresolved.
const MAX_PARENT_DEPTH: usize = 16;

impl<'c> ModelContext<'c> {
    /// `base` is the first equation number of `region` in `unknowns`.
    pub fn new(
        region: &'c Region,
        base: usize,
        unknowns: &'c [f64],
        cache: &'c mut ModelCache,
    ) -> Self {
        Self {
            region,
            base,
            unknowns,
            circuit: None,
            cache,
        }
    }

    /// Make circuit node values visible to models.
    pub fn with_circuit(mut self, circuit: &'c Circuit, circuit_base: usize) -> Self {
        self.circuit = Some(CircuitValues {
            circuit,
            base: circuit_base,
        });
        self
    }

    pub fn region(&self) -> &'c Region {
        self.region
    }

    /// Global equation number of variable `var` at `node`.
    pub fn equation_number(&self, var: usize, node: usize) -> usize {
        self.base + self.region.equation_offset(var, node)
    }

    pub fn cache(&self) -> &ModelCache {
        self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ModelCache {
        self.cache
    }

    /// Values of `name`; unresolved names are a configuration error.
    pub fn values(&mut self, name: &str) -> Result<Rc<[f64]>> {
        self.try_values(name)?
            .ok_or_else(|| TcadError::unresolved_model(self.region.name(), name))
    }

    /// Values of `name`, or `None` when no model or solution has that name.
    pub fn try_values(&mut self, name: &str) -> Result<Option<Rc<[f64]>>> {
        if let Some(v) = self.cache.values.get(name) {
            return Ok(Some(Rc::clone(v)));
        }

        let region = self.region;
        let values: Rc<[f64]> = if let Some(model) = region.model(name) {
            let values = match &model.source {
                ModelSource::Fixed(v) => Rc::clone(v),
                ModelSource::Computed(f) => {
                    if !self.cache.pending.insert(name.to_string()) {
                        return Err(TcadError::CyclicModel {
                            region: region.name().to_string(),
                            model: name.to_string(),
                        });
                    }
                    self.cache.evaluations += 1;
                    let result = f(self);
                    self.cache.pending.remove(name);
                    Rc::from(result?)
                }
            };
            let expected = region.entity_count(model.kind);
            if values.len() != expected {
                return Err(TcadError::ModelLengthMismatch {
                    region: region.name().to_string(),
                    model: name.to_string(),
                    expected,
                    actual: values.len(),
                });
            }
            values
        } else if let Some(v) = self.node_solution(name) {
            Rc::from(v)
        } else {
            return Ok(None);
        };

        self.cache
            .values
            .insert(name.to_string(), Rc::clone(&values));
        Ok(Some(values))
    }

    /// Node values of a solution variable or auxiliary node solution.
    ///
    /// An auxiliary solution with a parent reads through to the parent
    /// while it exists and falls back to its own stored values otherwise.
    pub fn node_solution(&self, name: &str) -> Option<Vec<f64>> {
        self.resolve_solution(name, 0)
    }

    fn resolve_solution(&self, name: &str, depth: usize) -> Option<Vec<f64>> {
        if depth > MAX_PARENT_DEPTH {
            return None;
        }
        let region = self.region;
        if let Some(var) = region.variable_index(name) {
            let start = self.equation_number(var, 0);
            return Some(self.unknowns[start..start + region.node_count()].to_vec());
        }
        let solution = region.node_solution(name)?;
        solution
            .parent()
            .and_then(|parent| self.resolve_solution(parent, depth + 1))
            .or_else(|| Some(solution.values().to_vec()))
    }

    /// Value of a circuit node; ground reads as zero.
    pub fn circuit_value(&self, node: &str) -> Result<f64> {
        let view = self.circuit.ok_or_else(|| TcadError::NodeNotFound {
            node: node.to_string(),
        })?;
        let n = view
            .circuit
            .node(node)
            .ok_or_else(|| TcadError::NodeNotFound {
                node: node.to_string(),
            })?;
        Ok(match n.number() {
            Some(i) => self.unknowns[view.base + i],
            None => 0.0,
        })
    }

    /// Values of `name` at the first and second node of every edge.
    pub fn edge_node_values(&mut self, name: &str) -> Result<(Vec<f64>, Vec<f64>)> {
        let values = self.values(name)?;
        let region = self.region;
        if values.len() != region.node_count() {
            return Err(TcadError::ModelLengthMismatch {
                region: region.name().to_string(),
                model: name.to_string(),
                expected: region.node_count(),
                actual: values.len(),
            });
        }
        Ok(region
            .edges()
            .iter()
            .map(|[a, b]| (values[*a], values[*b]))
            .unzip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn line_region() -> Region {
        let mut r = Region::new("bulk", 3);
        r.add_edge(0, 1).unwrap();
        r.add_edge(1, 2).unwrap();
        r.add_variable("Potential");
        r
    }

    #[test]
    fn test_repeated_query_uses_cache() {
        let mut region = line_region();
        let calls = Rc::new(Cell::new(0.0));
        let counter = Rc::clone(&calls);
        region.add_node_model("Noisy", move |_ctx| {
            counter.set(counter.get() + 1.0);
            Ok(vec![counter.get(); 3])
        });

        let unknowns = vec![0.0; 3];
        let mut cache = ModelCache::new();
        let mut ctx = ModelContext::new(&region, 0, &unknowns, &mut cache);
        let first = ctx.values("Noisy").unwrap();
        let second = ctx.values("Noisy").unwrap();
        assert_eq!(&first[..], &second[..]);
        assert_eq!(ctx.cache().evaluations(), 1);

        ctx.cache_mut().clear();
        let third = ctx.values("Noisy").unwrap();
        assert_ne!(&first[..], &third[..]);
        assert_eq!(ctx.cache().evaluations(), 2);
    }

    #[test]
    fn test_models_read_solutions() {
        let mut region = line_region();
        region.add_node_model("Double", |ctx| {
            let v = ctx.values("Potential")?;
            Ok(v.iter().map(|x| 2.0 * x).collect())
        });
        let unknowns = vec![1.0, 2.0, 3.0];
        let mut cache = ModelCache::new();
        let mut ctx = ModelContext::new(&region, 0, &unknowns, &mut cache);
        assert_eq!(&ctx.values("Double").unwrap()[..], &[2.0, 4.0, 6.0]);
        assert!(ctx.cache().contains("Potential"));
    }

    #[test]
    fn test_unresolved_model_is_an_error() {
        let region = line_region();
        let unknowns = vec![0.0; 3];
        let mut cache = ModelCache::new();
        let mut ctx = ModelContext::new(&region, 0, &unknowns, &mut cache);
        let err = ctx.values("Missing").unwrap_err();
        assert!(matches!(err, TcadError::UnresolvedModel { .. }));
        assert!(ctx.try_values("Missing").unwrap().is_none());
    }

    #[test]
    fn test_cyclic_models_are_rejected() {
        let mut region = line_region();
        region.add_node_model("Loop", |ctx| Ok(ctx.values("Loop")?.to_vec()));
        region.add_node_model("Ping", |ctx| Ok(ctx.values("Pong")?.to_vec()));
        region.add_node_model("Pong", |ctx| Ok(ctx.values("Ping")?.to_vec()));
        let unknowns = vec![0.0; 3];
        let mut cache = ModelCache::new();
        let mut ctx = ModelContext::new(&region, 0, &unknowns, &mut cache);

        let err = ctx.values("Loop").unwrap_err();
        assert!(matches!(err, TcadError::CyclicModel { ref model, .. } if model == "Loop"));
        assert!(err.is_configuration());
        let err = ctx.values("Ping").unwrap_err();
        assert!(matches!(err, TcadError::CyclicModel { ref model, .. } if model == "Ping"));

        // A failed evaluation leaves nothing pending.
        assert_eq!(&ctx.values("Potential").unwrap()[..], &[0.0; 3]);
        let err = ctx.values("Loop").unwrap_err();
        assert!(matches!(err, TcadError::CyclicModel { .. }));
    }

    #[test]
    fn test_length_mismatch_is_reported() {
        let mut region = line_region();
        region.add_edge_model("Short", |_| Ok(vec![1.0]));
        let unknowns = vec![0.0; 3];
        let mut cache = ModelCache::new();
        let mut ctx = ModelContext::new(&region, 0, &unknowns, &mut cache);
        let err = ctx.values("Short").unwrap_err();
        assert!(matches!(
            err,
            TcadError::ModelLengthMismatch { expected: 2, actual: 1, .. }
        ));
    }

    #[test]
    fn test_auxiliary_solution_follows_parent() {
        let mut region = line_region();
        region
            .add_node_solution("Saved", vec![7.0, 8.0, 9.0])
            .unwrap();
        region.add_auxiliary_solution("Alias", "Potential");
        region.add_auxiliary_solution("Orphan", "Gone");

        let unknowns = vec![1.0, 2.0, 3.0];
        let mut cache = ModelCache::new();
        let ctx = ModelContext::new(&region, 0, &unknowns, &mut cache);
        assert_eq!(ctx.node_solution("Alias").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(ctx.node_solution("Orphan").unwrap(), vec![0.0, 0.0, 0.0]);
        assert_eq!(ctx.node_solution("Saved").unwrap(), vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_edge_node_values() {
        let region = line_region();
        let unknowns = vec![1.0, 2.0, 3.0];
        let mut cache = ModelCache::new();
        let mut ctx = ModelContext::new(&region, 0, &unknowns, &mut cache);
        let (a, b) = ctx.edge_node_values("Potential").unwrap();
        assert_eq!(a, vec![1.0, 2.0]);
        assert_eq!(b, vec![2.0, 3.0]);
    }
}
