//! # TCAD Core
//!
//! Equation assembly and Newton solving for device simulation coupled to
//! a lumped circuit.
//!
//! This library provides:
//! - Finite-volume assembly of bulk, contact and interface equations from
//!   named per-node, per-edge and per-element-edge models
//! - Circuit elements (resistor, capacitor, sources) sharing the same
//!   unknown vector as the device
//! - Newton iteration for DC, transient (BDF1, TR, TR-BDF2), AC
//!   small-signal and noise analysis
//! - A `COMMAND` record format for circuits and contact equations
//!
//! ## Architecture
//!
//! - [`device`] - Regions, contacts, interfaces, models and the per-pass model cache
//! - [`equation`] - Equation assemblers and the shared model kernels
//! - [`circuit`] - Circuit nodes and network
//! - [`components`] - Circuit element models and their registry
//! - [`matrix`] - Matrix entries, row permutations and linear solvers
//! - [`solver`] - Time integration, global system, Newton driver, simulator
//! - [`dsl`] - Command record reader
//! - [`math`] - Stabilized Bernoulli function
//!
//! ## Usage
//!
//! ```
//! use tcad_core::device::{Device, EntityKind, Region};
//! use tcad_core::equation::{BulkEquation, ContactEquation};
//! use tcad_core::{Circuit, Simulator};
//!
//! # fn main() -> tcad_core::Result<()> {
//! let mut region = Region::new("bar", 3);
//! region.add_variable("Potential");
//! region.add_edge(0, 1)?;
//! region.add_edge(1, 2)?;
//! region.add_fixed_model("NodeVolume", EntityKind::Node, vec![0.5, 1.0, 0.5])?;
//! region.add_fixed_model("EdgeCouple", EntityKind::Edge, vec![1.0, 1.0])?;
//! region.add_edge_model("Field", |ctx| {
//!     let (v0, v1) = ctx.edge_node_values("Potential")?;
//!     Ok(v0.iter().zip(&v1).map(|(a, b)| b - a).collect())
//! });
//! region.add_fixed_model("Field:Potential@n0", EntityKind::Edge, vec![-1.0, -1.0])?;
//! region.add_fixed_model("Field:Potential@n1", EntityKind::Edge, vec![1.0, 1.0])?;
//! region.add_node_model("Pin", |ctx| Ok(ctx.values("Potential")?.to_vec()));
//! region.add_fixed_model("Pin:Potential", EntityKind::Node, vec![1.0; 3])?;
//!
//! let mut device = Device::new("resistor");
//! device.add_region(region)?;
//! device.add_bulk_equation("bar", BulkEquation::new("PotentialEquation", "Potential").edge_model("Field"))?;
//! device.add_contact("ground", "bar", vec![2])?;
//! device.add_contact_equation("ground", ContactEquation::new("PotentialEquation", "Potential").node_model("Pin"))?;
//!
//! let mut sim = Simulator::new(device, Circuit::new())?;
//! let report = sim.dc_operating_point()?;
//! assert!(report.is_converged());
//! # Ok(())
//! # }
//! ```
//!
//! ## Sign Convention
//!
//! The residual of an equation row is the net flux into its node. Newton
//! solves `J · dx = -f` with `J = df/dx`.

pub mod circuit;
pub mod components;
pub mod device;
pub mod dsl;
pub mod equation;
pub mod error;
pub mod math;
pub mod matrix;
pub mod solver;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use device::Device;
pub use error::{Result, TcadError};
pub use solver::{Newton, NewtonConfig, Simulator, TimeParams, TransientConfig};
