//! Nonlinear solving of the coupled device and circuit system.
//!
//! ## Residual and update
//!
//! Every assembly pass produces the residual `f(x)` (the RHS entries) and
//! its Jacobian `J = df/dx` (the matrix entries). One Newton iteration
//! solves
//!
//! ```text
//! J · dx = -f
//! x      = x + dx
//! ```
//!
//! where, for a transient step,
//!
//! ```text
//! J = b0·dI/dx + a0·dQ/dx
//! f = b0·I + a0·Q + a1·Q(t-1) + a2·Q(t-2) + b1·dQ/dt(t-1)
//! ```
//!
//! with the coefficients of [`TimeParams`].
//!
//! ## Unknown numbering
//!
//! ```text
//! [ region 0 | region 1 | ... | circuit nodes ]
//! ```
//!
//! Inside a region the unknowns are variable-major:
//! `base + variable * node_count + node`.

mod newton;
mod simulator;
mod system;
mod time;

pub use newton::{
    EquationError, Newton, NewtonConfig, NewtonReport, NewtonStatus, TransientHistory,
};
pub use simulator::{Simulator, TransientConfig, TransientMethod, TransientSummary};
pub use system::GlobalSystem;
pub use time::{TimeMethod, TimeParams};

/// Maximum Newton iterations per solve.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Absolute update limit.
pub const DEFAULT_ABS_LIMIT: f64 = 1e-10;

/// Relative update limit.
pub const DEFAULT_REL_LIMIT: f64 = 1e-10;

/// Quasi-relative update limit.
pub const DEFAULT_QREL_LIMIT: f64 = 1e-10;

/// Added to `|x|` in the relative error so that `x = 0` stays finite.
pub const REL_FLOOR: f64 = 1e-20;

/// First-stage fraction of a TR-BDF2 step, `2 - sqrt(2)`.
pub const DEFAULT_TRBDF2_GAMMA: f64 = 0.585_786_437_626_904_9;
