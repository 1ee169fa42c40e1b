//! Circuit network representation and validation.
//!
//! A [`Circuit`] holds named nodes and element instances. Its unknowns are
//! the non-ground node values, numbered densely in creation order; elements
//! may add internal nodes for their own unknowns (e.g. source branch
//! currents).

mod graph;
mod nodes;
mod types;
mod validate;

pub use graph::Circuit;
pub use nodes::{NodeKeeper, GROUND_NAMES};
pub use types::*;
pub use validate::validate_circuit;
