//! Newton iteration over the coupled device and circuit system.

use num_complex::Complex64;
use tracing::{debug, info, warn};

use crate::circuit::Circuit;
use crate::device::Device;
use crate::equation::{LoadMode, TimeMode};
use crate::error::{Result, TcadError};
use crate::matrix::{LinearSolver, PermutationMap, RowColVal, SparseMatrix};

use super::system::GlobalSystem;
use super::time::{TimeMethod, TimeParams};
use super::{DEFAULT_ABS_LIMIT, DEFAULT_MAX_ITERATIONS, DEFAULT_QREL_LIMIT, DEFAULT_REL_LIMIT, REL_FLOOR};

/// Convergence settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonConfig {
    /// Iteration cap per solve.
    pub max_iterations: usize,
    /// Limit on `max |dx|` of every equation block.
    pub abs_limit: f64,
    /// Limit on `max |dx| / |x|` of every equation block.
    pub rel_limit: f64,
    /// Limit on `max |dx| / (|x| + abs_limit / rel_limit)`; zero disables it.
    pub qrel_limit: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            abs_limit: DEFAULT_ABS_LIMIT,
            rel_limit: DEFAULT_REL_LIMIT,
            qrel_limit: DEFAULT_QREL_LIMIT,
        }
    }
}

impl NewtonConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_abs_limit(mut self, abs_limit: f64) -> Self {
        self.abs_limit = abs_limit;
        self
    }

    pub fn with_rel_limit(mut self, rel_limit: f64) -> Self {
        self.rel_limit = rel_limit;
        self
    }

    /// Set the quasi-relative limit; `0.0` turns the criterion off.
    pub fn with_qrel_limit(mut self, qrel_limit: f64) -> Self {
        self.qrel_limit = qrel_limit;
        self
    }

    fn qrel_offset(&self) -> f64 {
        if self.rel_limit > 0.0 {
            self.abs_limit / self.rel_limit
        } else {
            f64::INFINITY
        }
    }
}

/// Outcome of one solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonStatus {
    Converged,
    MaxIterationsExceeded,
    /// The linear solve failed.
    Failed,
}

/// Update error of one equation block in the last iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct EquationError {
    pub name: String,
    pub abs_error: f64,
    pub rel_error: f64,
    pub qrel_error: f64,
}

/// Diagnostics of one solve.
#[derive(Debug)]
pub struct NewtonReport {
    pub status: NewtonStatus,
    pub iterations: usize,
    /// Largest absolute update over all blocks in the last iteration.
    pub abs_error: f64,
    /// Largest relative update over all blocks in the last iteration.
    pub rel_error: f64,
    /// Max-norm of the residual assembled in the last iteration.
    pub residual: f64,
    pub equation_errors: Vec<EquationError>,
    failure: Option<TcadError>,
}

impl NewtonReport {
    fn new(status: NewtonStatus) -> Self {
        Self {
            status,
            iterations: 0,
            abs_error: 0.0,
            rel_error: 0.0,
            residual: 0.0,
            equation_errors: Vec::new(),
            failure: None,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.status == NewtonStatus::Converged
    }

    /// The linear solver error of a failed solve.
    pub fn failure(&self) -> Option<&TcadError> {
        self.failure.as_ref()
    }

    /// Turn a non-converged report into its error.
    pub fn into_result(self) -> Result<Self> {
        match self.status {
            NewtonStatus::Converged => Ok(self),
            NewtonStatus::MaxIterationsExceeded => Err(TcadError::convergence_failure(
                self.iterations,
                self.abs_error,
                self.rel_error,
            )),
            NewtonStatus::Failed => Err(self.failure.unwrap_or(TcadError::SingularMatrix)),
        }
    }
}

/// Charges of previous converged time points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransientHistory {
    /// `Q` at the last converged point.
    pub charge: Option<Vec<f64>>,
    /// `Q` one point earlier.
    pub charge_prev: Option<Vec<f64>>,
    /// Discrete `dQ/dt` at the last converged point.
    pub dqdt: Option<Vec<f64>>,
}

impl TransientHistory {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn level(v: &Option<Vec<f64>>, dim: usize) -> Option<&[f64]> {
        v.as_deref().filter(|v| v.len() == dim)
    }
}

/// Newton driver owning the unknown vector.
#[derive(Debug, Default)]
pub struct Newton {
    config: NewtonConfig,
    unknowns: Vec<f64>,
    history: TransientHistory,
    backup: Option<(Vec<f64>, TransientHistory, bool)>,
    permutations: PermutationMap,
    operating_point: bool,
}

impl Newton {
    pub fn new(config: NewtonConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &NewtonConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: NewtonConfig) {
        self.config = config;
    }

    /// Current unknowns in global numbering.
    pub fn unknowns(&self) -> &[f64] {
        &self.unknowns
    }

    /// Replace the unknowns, e.g. with a better initial guess.
    pub fn set_unknowns(&mut self, unknowns: Vec<f64>) {
        self.unknowns = unknowns;
        self.operating_point = false;
    }

    pub fn history(&self) -> &TransientHistory {
        &self.history
    }

    /// Whether the last solve converged, making AC and noise analysis possible.
    pub fn has_operating_point(&self) -> bool {
        self.operating_point
    }

    /// Save unknowns, transient history and whether they form an
    /// operating point.
    pub fn backup_solutions(&mut self) {
        self.backup = Some((
            self.unknowns.clone(),
            self.history.clone(),
            self.operating_point,
        ));
    }

    /// Restore what [`Newton::backup_solutions`] saved. Returns `false` if
    /// nothing was saved.
    pub fn restore_solutions(&mut self) -> bool {
        match &self.backup {
            Some((unknowns, history, operating_point)) => {
                self.unknowns = unknowns.clone();
                self.history = history.clone();
                self.operating_point = *operating_point;
                true
            }
            None => false,
        }
    }

    /// Solve the coupled system for one time point.
    ///
    /// Numerical failures are reported in the returned [`NewtonReport`] and
    /// leave the unknowns as they were before the call; configuration
    /// errors are returned as `Err`.
    pub fn solve(
        &mut self,
        device: &Device,
        circuit: &Circuit,
        solver: &dyn LinearSolver,
        time: &TimeParams,
    ) -> Result<NewtonReport> {
        let system = GlobalSystem::new(device, circuit);
        let dim = system.dimension();
        if self.unknowns.len() != dim {
            debug!(size = dim, "initializing unknowns");
            self.unknowns = system.initial_unknowns();
            self.history.clear();
        }
        self.check_history(time, dim)?;

        let snapshot = self.unknowns.clone();
        let was_operating_point = self.operating_point;
        self.operating_point = false;
        match self.iterate(&system, solver, time) {
            Ok(report) if report.is_converged() => {
                self.update_history(&system, time)?;
                self.operating_point = true;
                info!(
                    method = %time.method(),
                    iterations = report.iterations,
                    abs_error = report.abs_error,
                    "newton converged"
                );
                Ok(report)
            }
            Ok(report) => {
                warn!(
                    status = ?report.status,
                    iterations = report.iterations,
                    abs_error = report.abs_error,
                    rel_error = report.rel_error,
                    "newton did not converge, restoring unknowns"
                );
                self.unknowns = snapshot;
                self.operating_point = was_operating_point;
                Ok(report)
            }
            Err(e) => {
                self.unknowns = snapshot;
                self.operating_point = was_operating_point;
                Err(e)
            }
        }
    }

    fn check_history(&self, time: &TimeParams, dim: usize) -> Result<()> {
        if !time.is_integration() {
            return Ok(());
        }
        let h = &self.history;
        let missing = TransientHistory::level(&h.charge, dim).is_none()
            || TransientHistory::level(&h.dqdt, dim).is_none()
            || (time.needs_two_levels() && TransientHistory::level(&h.charge_prev, dim).is_none());
        if missing {
            return Err(TcadError::invalid_param(format!(
                "{} step requires a converged transient_dc solve first",
                time.method()
            )));
        }
        Ok(())
    }

    fn iterate(
        &mut self,
        system: &GlobalSystem<'_>,
        solver: &dyn LinearSolver,
        time: &TimeParams,
    ) -> Result<NewtonReport> {
        let blocks = system.equation_blocks();
        let mut report = NewtonReport::new(NewtonStatus::MaxIterationsExceeded);

        for iteration in 1..=self.config.max_iterations {
            if iteration == 1 {
                self.permutations = system.permutations(&self.unknowns)?;
            }
            let (jacobian, residual) = self.assemble_step(system, time)?;
            report.iterations = iteration;
            report.residual = residual.iter().fold(0.0, |m, f| m.max(f.abs()));

            let rhs: Vec<f64> = residual.iter().map(|f| -f).collect();
            let dx = match solver.solve(&jacobian, &rhs) {
                Ok(dx) => dx,
                Err(e) => {
                    warn!(iteration, error = %e, "linear solve failed");
                    report.status = NewtonStatus::Failed;
                    report.failure = Some(e);
                    return Ok(report);
                }
            };
            for (x, d) in self.unknowns.iter_mut().zip(&dx) {
                *x += d;
            }

            report.equation_errors = blocks
                .iter()
                .map(|b| self.block_error(&b.name, &dx[b.rows.clone()], &self.unknowns[b.rows.clone()]))
                .collect();
            report.abs_error = report.equation_errors.iter().fold(0.0, |m, e| m.max(e.abs_error));
            report.rel_error = report.equation_errors.iter().fold(0.0, |m, e| m.max(e.rel_error));
            debug!(
                iteration,
                abs_error = report.abs_error,
                rel_error = report.rel_error,
                residual = report.residual,
                "newton iteration"
            );

            if report.equation_errors.iter().all(|e| self.is_block_converged(e)) {
                report.status = NewtonStatus::Converged;
                return Ok(report);
            }
        }
        Ok(report)
    }

    fn block_error(&self, name: &str, dx: &[f64], x: &[f64]) -> EquationError {
        let offset = self.config.qrel_offset();
        let mut e = EquationError {
            name: name.to_string(),
            abs_error: 0.0,
            rel_error: 0.0,
            qrel_error: 0.0,
        };
        for (d, v) in dx.iter().zip(x) {
            let d = d.abs();
            e.abs_error = e.abs_error.max(d);
            e.rel_error = e.rel_error.max(d / (v.abs() + REL_FLOOR));
            e.qrel_error = e.qrel_error.max(d / (v.abs() + offset));
        }
        e
    }

    fn is_block_converged(&self, e: &EquationError) -> bool {
        let c = &self.config;
        (e.abs_error < c.abs_limit && e.rel_error < c.rel_limit)
            || (c.qrel_limit > 0.0 && e.qrel_error < c.qrel_limit)
    }

    /// Jacobian `b0·dI/dx + a0·dQ/dx` and residual of the current unknowns.
    fn assemble_step(
        &self,
        system: &GlobalSystem<'_>,
        time: &TimeParams,
    ) -> Result<(SparseMatrix<f64>, Vec<f64>)> {
        let dim = system.dimension();
        let dc = system.assemble(&self.unknowns, &self.permutations, LoadMode::MatrixAndRhs, TimeMode::Dc)?;
        let b0 = time.b0();
        let mut entries: Vec<RowColVal> = dc
            .matrix
            .iter()
            .map(|e| RowColVal::new(e.row, e.col, b0 * e.val))
            .collect();
        let mut residual: Vec<f64> = dc.rhs_dense(dim).into_iter().map(|f| b0 * f).collect();

        if time.is_integration() {
            let q = system.assemble(&self.unknowns, &self.permutations, LoadMode::MatrixAndRhs, TimeMode::Time)?;
            let a0 = time.a0();
            entries.extend(q.matrix.iter().map(|e| RowColVal::new(e.row, e.col, a0 * e.val)));
            let charge = q.rhs_dense(dim);
            self.add_charge_terms(time, &charge, &mut residual);
        }
        Ok((SparseMatrix::from_entries(dim, &entries), residual))
    }

    /// Add `a0·Q + a1·Q(t-1) + a2·Q(t-2) + b1·dQ/dt(t-1)` to `out`.
    fn add_charge_terms(&self, time: &TimeParams, charge: &[f64], out: &mut [f64]) {
        let dim = charge.len();
        let levels = [
            (time.a0(), Some(charge)),
            (time.a1(), TransientHistory::level(&self.history.charge, dim)),
            (time.a2(), TransientHistory::level(&self.history.charge_prev, dim)),
            (time.b1(), TransientHistory::level(&self.history.dqdt, dim)),
        ];
        for (coeff, values) in levels {
            if coeff == 0.0 {
                continue;
            }
            if let Some(values) = values {
                for (o, v) in out.iter_mut().zip(values) {
                    *o += coeff * v;
                }
            }
        }
    }

    fn update_history(&mut self, system: &GlobalSystem<'_>, time: &TimeParams) -> Result<()> {
        if time.is_dc_only() {
            return Ok(());
        }
        let dim = system.dimension();
        let charge = system
            .assemble(&self.unknowns, &self.permutations, LoadMode::Rhs, TimeMode::Time)?
            .rhs_dense(dim);
        let dqdt = if time.method() == TimeMethod::TransientDc {
            vec![0.0; dim]
        } else {
            let mut dqdt = vec![0.0; dim];
            self.add_charge_terms(time, &charge, &mut dqdt);
            dqdt
        };
        self.history.charge_prev = self.history.charge.take();
        self.history.charge = Some(charge);
        self.history.dqdt = Some(dqdt);
        Ok(())
    }

    /// Small-signal matrix `J + jωC` about the last converged point.
    fn small_signal_matrix(&self, system: &GlobalSystem<'_>, frequency: f64) -> Result<SparseMatrix<Complex64>> {
        if !self.operating_point || self.unknowns.len() != system.dimension() {
            return Err(TcadError::NoOperatingPoint);
        }
        let dim = system.dimension();
        let dc = system.assemble(&self.unknowns, &self.permutations, LoadMode::Matrix, TimeMode::Dc)?;
        let q = system.assemble(&self.unknowns, &self.permutations, LoadMode::Matrix, TimeMode::Time)?;
        let omega = 2.0 * std::f64::consts::PI * frequency;
        Ok(SparseMatrix::<Complex64>::from_parts(
            &SparseMatrix::from_entries(dim, &dc.matrix),
            &SparseMatrix::from_entries(dim, &q.matrix),
            omega,
        ))
    }

    /// Small-signal response to the circuit AC sources at `frequency` (Hz).
    pub fn ac_solve(
        &self,
        device: &Device,
        circuit: &Circuit,
        solver: &dyn LinearSolver,
        frequency: f64,
    ) -> Result<Vec<Complex64>> {
        let system = GlobalSystem::new(device, circuit);
        let matrix = self.small_signal_matrix(&system, frequency)?;
        let response = solver.solve_complex(&matrix, &system.ac_rhs())?;
        debug!(frequency, "ac solve");
        Ok(response)
    }

    /// Transfer from every equation to circuit node `output` at `frequency`
    /// (Hz), from one adjoint solve.
    pub fn noise_solve(
        &self,
        device: &Device,
        circuit: &Circuit,
        solver: &dyn LinearSolver,
        output: &str,
        frequency: f64,
    ) -> Result<Vec<Complex64>> {
        let system = GlobalSystem::new(device, circuit);
        let node = circuit
            .node(output)
            .ok_or_else(|| TcadError::NodeNotFound {
                node: output.to_string(),
            })?;
        let row = node.number().ok_or_else(|| {
            TcadError::invalid_param(format!("noise output '{}' is ground", output))
        })?;
        let matrix = self.small_signal_matrix(&system, frequency)?.transpose();
        let mut rhs = vec![Complex64::new(0.0, 0.0); system.dimension()];
        rhs[system.circuit_base() + row] = Complex64::new(1.0, 0.0);
        let transfer = solver.solve_complex(&matrix, &rhs)?;
        debug!(frequency, output, "noise solve");
        Ok(transfer)
    }

    /// Value of circuit node `name` in the current unknowns.
    pub fn circuit_node_value(&self, device: &Device, circuit: &Circuit, name: &str) -> Result<f64> {
        let base = device.equation_count();
        let solution = self.unknowns.get(base..).unwrap_or(&[]);
        let node = circuit.node(name).ok_or_else(|| TcadError::NodeNotFound {
            node: name.to_string(),
        })?;
        match node.number() {
            Some(i) if i >= solution.len() => Err(TcadError::NoOperatingPoint),
            _ => Ok(node.value(solution)),
        }
    }

    /// Integrated current of contact equation `equation` on `contact`.
    pub fn contact_current(&self, device: &Device, circuit: &Circuit, contact: &str, equation: &str) -> Result<f64> {
        let system = self.checked_system(device, circuit)?;
        let eq = device.contact_equation(contact, equation)?;
        eq.current(&mut system.context(&self.unknowns))
    }

    /// Integrated charge of contact equation `equation` on `contact`.
    pub fn contact_charge(&self, device: &Device, circuit: &Circuit, contact: &str, equation: &str) -> Result<f64> {
        let system = self.checked_system(device, circuit)?;
        let eq = device.contact_equation(contact, equation)?;
        eq.charge(&mut system.context(&self.unknowns))
    }

    fn checked_system<'a>(&self, device: &'a Device, circuit: &'a Circuit) -> Result<GlobalSystem<'a>> {
        let system = GlobalSystem::new(device, circuit);
        if self.unknowns.len() != system.dimension() {
            return Err(TcadError::NoOperatingPoint);
        }
        Ok(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::DirectSolver;
    use approx::assert_relative_eq;

    fn divider() -> Circuit {
        let mut c = Circuit::new();
        c.add_element("vsource", "V1", &["in".into(), "0".into()])
            .unwrap();
        c.add_parameter("V1", "V", 1.0).unwrap();
        c.add_parameter("V1", "acreal", 1.0).unwrap();
        c.add_element("resistor", "R1", &["in".into(), "out".into()])
            .unwrap();
        c.add_parameter("R1", "R", 1000.0).unwrap();
        c.add_element("resistor", "R2", &["out".into(), "0".into()])
            .unwrap();
        c.add_parameter("R2", "R", 1000.0).unwrap();
        c
    }

    fn rc() -> Circuit {
        let mut c = Circuit::new();
        c.add_element("vsource", "V1", &["in".into(), "0".into()])
            .unwrap();
        c.add_parameter("V1", "V", 1.0).unwrap();
        c.add_element("resistor", "R1", &["in".into(), "out".into()])
            .unwrap();
        c.add_parameter("R1", "R", 1.0).unwrap();
        c.add_element("capacitor", "C1", &["out".into(), "0".into()])
            .unwrap();
        c.add_parameter("C1", "C", 1.0).unwrap();
        c
    }

    #[test]
    fn test_linear_dc() {
        let device = Device::new("none");
        let circuit = divider();
        let mut newton = Newton::default();
        let report = newton
            .solve(&device, &circuit, &DirectSolver, &TimeParams::dc())
            .unwrap()
            .into_result()
            .unwrap();
        assert!(report.iterations <= 2);
        let out = newton.circuit_node_value(&device, &circuit, "out").unwrap();
        assert_relative_eq!(out, 0.5, epsilon = 1e-12);
        let i = newton.circuit_node_value(&device, &circuit, "V1.I").unwrap();
        assert_relative_eq!(i, -5e-4, epsilon = 1e-15);
    }

    #[test]
    fn test_exact_guess_converges_in_one_iteration() {
        let device = Device::new("none");
        let circuit = divider();
        let mut newton = Newton::default();
        // in, V1.I, out
        newton.set_unknowns(vec![1.0, -5e-4, 0.5]);
        let report = newton
            .solve(&device, &circuit, &DirectSolver, &TimeParams::dc())
            .unwrap();
        assert!(report.is_converged());
        assert_eq!(report.iterations, 1);
        assert_eq!(report.abs_error, 0.0);
    }

    #[test]
    fn test_max_iterations_restores_unknowns() {
        let device = Device::new("none");
        let circuit = divider();
        let mut newton = Newton::new(NewtonConfig::new().with_max_iterations(0));
        newton.set_unknowns(vec![0.25, 0.0, 0.0]);
        let report = newton
            .solve(&device, &circuit, &DirectSolver, &TimeParams::dc())
            .unwrap();
        assert_eq!(report.status, NewtonStatus::MaxIterationsExceeded);
        assert_eq!(newton.unknowns(), &[0.25, 0.0, 0.0]);
        assert!(matches!(
            report.into_result(),
            Err(TcadError::ConvergenceFailure { .. })
        ));
    }

    #[test]
    fn test_singular_system_fails() {
        let device = Device::new("none");
        let mut circuit = Circuit::new();
        circuit
            .add_element("capacitor", "C1", &["a".into(), "0".into()])
            .unwrap();
        let mut newton = Newton::default();
        let report = newton
            .solve(&device, &circuit, &DirectSolver, &TimeParams::dc())
            .unwrap();
        assert_eq!(report.status, NewtonStatus::Failed);
        assert!(!newton.has_operating_point());
        assert!(matches!(report.into_result(), Err(TcadError::SingularMatrix)));
    }

    #[test]
    fn test_integration_requires_history() {
        let device = Device::new("none");
        let circuit = rc();
        let mut newton = Newton::default();
        let step = TimeParams::bdf1(0.1, 1.0).unwrap();
        assert!(newton.solve(&device, &circuit, &DirectSolver, &step).is_err());
    }

    #[test]
    fn test_backward_euler_step() {
        let device = Device::new("none");
        let circuit = rc();
        let mut newton = Newton::default();
        // Discharged start: transient DC point with the source off.
        let mut off = rc();
        off.add_parameter("V1", "V", 0.0).unwrap();
        newton
            .solve(&device, &off, &DirectSolver, &TimeParams::transient_dc())
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(newton.history().dqdt, Some(vec![0.0; 3]));

        let step = TimeParams::bdf1(0.1, 1.0).unwrap();
        newton
            .solve(&device, &circuit, &DirectSolver, &step)
            .unwrap()
            .into_result()
            .unwrap();
        // (v - 0) / 0.1 = (1 - v) / 1  =>  v = 1 / 11
        let out = newton.circuit_node_value(&device, &circuit, "out").unwrap();
        assert_relative_eq!(out, 1.0 / 11.0, epsilon = 1e-12);
    }

    #[test]
    fn test_backup_and_restore() {
        let mut newton = Newton::default();
        assert!(!newton.restore_solutions());
        newton.set_unknowns(vec![1.0, 2.0]);
        newton.backup_solutions();
        newton.set_unknowns(vec![3.0, 4.0]);
        assert!(newton.restore_solutions());
        assert_eq!(newton.unknowns(), &[1.0, 2.0]);
    }

    #[test]
    fn test_restore_keeps_operating_point() {
        let device = Device::new("none");
        let circuit = divider();
        let mut newton = Newton::default();
        newton
            .solve(&device, &circuit, &DirectSolver, &TimeParams::dc())
            .unwrap();
        newton.backup_solutions();

        // A failed solve rolls back to the converged point.
        newton.set_config(NewtonConfig::new().with_max_iterations(0));
        newton.set_unknowns(vec![0.0; 3]);
        let report = newton
            .solve(&device, &circuit, &DirectSolver, &TimeParams::dc())
            .unwrap();
        assert!(!report.is_converged());
        assert!(!newton.has_operating_point());

        assert!(newton.restore_solutions());
        assert!(newton.has_operating_point());
        let x = newton.ac_solve(&device, &circuit, &DirectSolver, 1e3).unwrap();
        let out = circuit.node("out").unwrap().number().unwrap();
        assert_relative_eq!(x[out].re, 0.5, epsilon = 1e-12);
        assert!(newton
            .noise_solve(&device, &circuit, &DirectSolver, "out", 1e3)
            .is_ok());
    }

    #[test]
    fn test_ac_requires_operating_point() {
        let device = Device::new("none");
        let circuit = divider();
        let newton = Newton::default();
        assert!(matches!(
            newton.ac_solve(&device, &circuit, &DirectSolver, 1e3),
            Err(TcadError::NoOperatingPoint)
        ));
    }

    #[test]
    fn test_ac_and_noise_on_divider() {
        let device = Device::new("none");
        let circuit = divider();
        let mut newton = Newton::default();
        newton
            .solve(&device, &circuit, &DirectSolver, &TimeParams::dc())
            .unwrap();
        let x = newton.ac_solve(&device, &circuit, &DirectSolver, 1e3).unwrap();
        let out = circuit.node("out").unwrap().number().unwrap();
        assert_relative_eq!(x[out].re, 0.5, epsilon = 1e-12);
        assert_relative_eq!(x[out].im, 0.0, epsilon = 1e-12);

        // A unit AC source on the branch row reaches "out" with gain 0.5.
        let y = newton
            .noise_solve(&device, &circuit, &DirectSolver, "out", 1e3)
            .unwrap();
        let ib = circuit.node("V1.I").unwrap().number().unwrap();
        assert_relative_eq!(y[ib].re, 0.5, epsilon = 1e-12);
    }
}
