//! Main simulator interface.

use std::fmt;
use std::str::FromStr;

use num_complex::Complex64;
use tracing::{info, warn};

use crate::circuit::{validate_circuit, Circuit};
use crate::device::Device;
use crate::equation::EquationAssembler;
use crate::error::{Result, TcadError};
use crate::matrix::{DirectSolver, LinearSolver};

use super::newton::{Newton, NewtonConfig, NewtonReport};
use super::time::TimeParams;
use super::DEFAULT_TRBDF2_GAMMA;

/// Integration scheme of a transient run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientMethod {
    /// Backward Euler.
    Bdf1,
    /// Trapezoidal rule.
    Trapezoidal,
    /// Trapezoidal stage over `gamma·h`, closed by BDF2.
    TrBdf2,
}

impl fmt::Display for TransientMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransientMethod::Bdf1 => "bdf1",
            TransientMethod::Trapezoidal => "tr",
            TransientMethod::TrBdf2 => "trbdf2",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TransientMethod {
    type Err = TcadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bdf1" | "be" => Ok(TransientMethod::Bdf1),
            "tr" | "trapezoidal" => Ok(TransientMethod::Trapezoidal),
            "trbdf2" | "tr-bdf2" => Ok(TransientMethod::TrBdf2),
            _ => Err(TcadError::invalid_param(format!(
                "unknown transient method '{}'",
                s
            ))),
        }
    }
}

/// Configuration of a transient run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransientConfig {
    /// Start time (seconds).
    pub tstart: f64,
    /// Stop time (seconds).
    pub tstop: f64,
    /// Nominal step (seconds).
    pub tstep: f64,
    /// Smallest step tried after halving before giving up.
    pub min_step: f64,
    pub method: TransientMethod,
    /// First-stage fraction of TR-BDF2.
    pub gamma: f64,
    /// Start from a fresh transient DC point. When off, the run continues
    /// from the state of a previous transient DC or transient solve.
    pub initial_dc: bool,
}

impl Default for TransientConfig {
    fn default() -> Self {
        Self {
            tstart: 0.0,
            tstop: 1e-3,
            tstep: 1e-5,
            min_step: 1e-15,
            method: TransientMethod::Bdf1,
            gamma: DEFAULT_TRBDF2_GAMMA,
            initial_dc: true,
        }
    }
}

impl TransientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tstart(mut self, tstart: f64) -> Self {
        self.tstart = tstart;
        self
    }

    pub fn with_tstop(mut self, tstop: f64) -> Self {
        self.tstop = tstop;
        self
    }

    pub fn with_tstep(mut self, tstep: f64) -> Self {
        self.tstep = tstep;
        self
    }

    pub fn with_min_step(mut self, min_step: f64) -> Self {
        self.min_step = min_step;
        self
    }

    pub fn with_method(mut self, method: TransientMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_initial_dc(mut self, initial_dc: bool) -> Self {
        self.initial_dc = initial_dc;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.tstop > self.tstart) {
            return Err(TcadError::invalid_param("tstop must be after tstart"));
        }
        if !(self.tstep > 0.0) || !(self.min_step > 0.0) || self.min_step > self.tstep {
            return Err(TcadError::invalid_param(
                "steps must satisfy 0 < min_step <= tstep",
            ));
        }
        if self.method == TransientMethod::TrBdf2 && !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(TcadError::invalid_param("TR-BDF2 gamma must lie in (0, 1)"));
        }
        Ok(())
    }
}

/// Counts of a finished transient run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransientSummary {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
}

/// A device coupled to a circuit, with a Newton driver and a linear solver.
pub struct Simulator {
    device: Device,
    circuit: Circuit,
    newton: Newton,
    solver: Box<dyn LinearSolver>,
    time: f64,
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("device", &self.device)
            .field("circuit", &self.circuit)
            .field("newton", &self.newton)
            .field("time", &self.time)
            .finish()
    }
}

impl Simulator {
    /// Create a simulator with default Newton settings and the dense solver.
    pub fn new(device: Device, circuit: Circuit) -> Result<Self> {
        Self::with_config(device, circuit, NewtonConfig::default())
    }

    pub fn with_config(device: Device, circuit: Circuit, config: NewtonConfig) -> Result<Self> {
        validate_circuit(&circuit, |node| {
            device
                .contact_equations()
                .iter()
                .any(|eq| eq.circuit_node_name() == Some(node))
        })?;
        Ok(Self {
            device,
            circuit,
            newton: Newton::new(config),
            solver: Box::new(DirectSolver::new()),
            time: 0.0,
        })
    }

    /// Use `solver` for every linear solve.
    pub fn with_solver(mut self, solver: Box<dyn LinearSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Mutable circuit access, e.g. to change source values between solves.
    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    pub fn newton(&self) -> &Newton {
        &self.newton
    }

    pub fn newton_mut(&mut self) -> &mut Newton {
        &mut self.newton
    }

    /// Simulation time of the last accepted point.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// One Newton solve with the given coefficients.
    pub fn solve(&mut self, time: &TimeParams) -> Result<NewtonReport> {
        self.newton
            .solve(&self.device, &self.circuit, self.solver.as_ref(), time)
    }

    /// DC operating point; non-convergence is an error.
    pub fn dc_operating_point(&mut self) -> Result<NewtonReport> {
        self.solve(&TimeParams::dc())?.into_result()
    }

    /// Run a transient from `config.tstart` to `config.tstop`.
    ///
    /// `on_point` is called with the time and unknowns of the starting
    /// point and of every accepted step. A step that fails is retried at half the
    /// size from the backed-up solution, down to `config.min_step`.
    pub fn transient(
        &mut self,
        config: &TransientConfig,
        mut on_point: impl FnMut(f64, &[f64]),
    ) -> Result<TransientSummary> {
        config.validate()?;
        if config.initial_dc {
            self.solve(&TimeParams::transient_dc())?.into_result()?;
        }
        self.time = config.tstart;
        on_point(self.time, self.newton.unknowns());

        let mut summary = TransientSummary::default();
        let mut step = config.tstep;
        // Absorbs rounding so the run does not end with a sliver of a step.
        let end = config.tstop - 1e-9 * config.tstep;
        while self.time < end {
            let h = step.min(config.tstop - self.time);
            self.newton.backup_solutions();
            let report = self.advance(config, h)?;
            if report.is_converged() {
                self.time += h;
                summary.accepted_steps += 1;
                info!(time = self.time, step = h, iterations = report.iterations, "accepted step");
                on_point(self.time, self.newton.unknowns());
                step = config.tstep;
                continue;
            }

            self.newton.restore_solutions();
            summary.rejected_steps += 1;
            step = h / 2.0;
            warn!(time = self.time, step = h, status = ?report.status, "rejected step");
            if step < config.min_step {
                return report.into_result().map(|_| summary);
            }
        }
        Ok(summary)
    }

    fn advance(&mut self, config: &TransientConfig, h: f64) -> Result<NewtonReport> {
        match config.method {
            TransientMethod::Bdf1 => self.solve(&TimeParams::bdf1(h, 1.0)?),
            TransientMethod::Trapezoidal => self.solve(&TimeParams::trapezoidal(h, 1.0)?),
            TransientMethod::TrBdf2 => {
                let first = self.solve(&TimeParams::trapezoidal(h, config.gamma)?)?;
                if !first.is_converged() {
                    return Ok(first);
                }
                self.solve(&TimeParams::bdf2(h, config.gamma)?)
            }
        }
    }

    /// Small-signal value of circuit node `output` at each frequency (Hz).
    pub fn ac_sweep(&self, output: &str, frequencies: &[f64]) -> Result<Vec<(f64, Complex64)>> {
        let row = self.circuit_row(output)?;
        frequencies
            .iter()
            .map(|&f| {
                let x = self
                    .newton
                    .ac_solve(&self.device, &self.circuit, self.solver.as_ref(), f)?;
                Ok((f, row.map_or(Complex64::new(0.0, 0.0), |r| x[r])))
            })
            .collect()
    }

    /// Transfer from every equation to circuit node `output` at `frequency` (Hz).
    pub fn noise(&self, output: &str, frequency: f64) -> Result<Vec<Complex64>> {
        self.newton
            .noise_solve(&self.device, &self.circuit, self.solver.as_ref(), output, frequency)
    }

    pub fn circuit_node_value(&self, name: &str) -> Result<f64> {
        self.newton
            .circuit_node_value(&self.device, &self.circuit, name)
    }

    pub fn contact_current(&self, contact: &str, equation: &str) -> Result<f64> {
        self.newton
            .contact_current(&self.device, &self.circuit, contact, equation)
    }

    pub fn contact_charge(&self, contact: &str, equation: &str) -> Result<f64> {
        self.newton
            .contact_charge(&self.device, &self.circuit, contact, equation)
    }

    /// Records of every contact equation followed by every circuit element.
    pub fn serialize(&self) -> String {
        self.device
            .contact_equations()
            .iter()
            .map(|eq| eq.serialize())
            .chain(self.circuit.instances().map(|i| i.serialize()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn circuit_row(&self, name: &str) -> Result<Option<usize>> {
        let node = self
            .circuit
            .node(name)
            .ok_or_else(|| TcadError::NodeNotFound {
                node: name.to_string(),
            })?;
        Ok(node.number().map(|n| self.device.equation_count() + n))
    }
}
