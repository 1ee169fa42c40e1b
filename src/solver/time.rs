//! Time integration coefficients.
//!
//! The residual of a time step is
//!
//! ```text
//! f = b0·I(x) + a0·Q(x) + a1·Q(t-1) + a2·Q(t-2) + b1·dQ/dt(t-1)
//! ```
//!
//! and its Jacobian `b0·dI/dx + a0·dQ/dx`.

use std::fmt;

use crate::error::{Result, TcadError};

/// Integration scheme of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMethod {
    /// Static solve; charge terms are ignored.
    DcOnly,
    /// Static solve that starts a transient; numerically identical to `DcOnly`.
    TransientDc,
    /// Backward Euler.
    Bdf1,
    /// Second step of TR-BDF2.
    Bdf2,
    /// Trapezoidal rule.
    Trapezoidal,
}

impl fmt::Display for TimeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeMethod::DcOnly => "dc",
            TimeMethod::TransientDc => "transient_dc",
            TimeMethod::Bdf1 => "bdf1",
            TimeMethod::Bdf2 => "bdf2",
            TimeMethod::Trapezoidal => "tr",
        };
        write!(f, "{}", s)
    }
}

/// Coefficients of one time step. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeParams {
    method: TimeMethod,
    tstep: f64,
    gamma: f64,
    tdelta: f64,
    a0: f64,
    a1: f64,
    a2: f64,
    b0: f64,
    b1: f64,
    b2: f64,
}

impl TimeParams {
    fn zeroed(method: TimeMethod, tstep: f64, gamma: f64) -> Self {
        Self {
            method,
            tstep,
            gamma,
            tdelta: 0.0,
            a0: 0.0,
            a1: 0.0,
            a2: 0.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
        }
    }

    /// DC analysis.
    pub fn dc() -> Self {
        Self::zeroed(TimeMethod::DcOnly, 0.0, 0.0)
    }

    /// Initial DC point of a transient simulation.
    pub fn transient_dc() -> Self {
        Self::zeroed(TimeMethod::TransientDc, 0.0, 0.0)
    }

    /// Backward Euler over `gamma·tstep`.
    pub fn bdf1(tstep: f64, gamma: f64) -> Result<Self> {
        check_step(tstep, gamma)?;
        let tdelta = gamma * tstep;
        let a0 = 1.0 / tdelta;
        Ok(Self {
            tdelta,
            a0,
            a1: -a0,
            ..Self::zeroed(TimeMethod::Bdf1, tstep, gamma)
        })
    }

    /// BDF2 closing a TR-BDF2 step of total length `tstep` whose first
    /// stage covered `gamma·tstep`.
    pub fn bdf2(tstep: f64, gamma: f64) -> Result<Self> {
        check_step(tstep, gamma)?;
        if gamma >= 1.0 {
            return Err(TcadError::invalid_param(format!(
                "BDF2 gamma must lie in (0, 1), got {}",
                gamma
            )));
        }
        let tdelta = (1.0 - gamma) * tstep;
        Ok(Self {
            tdelta,
            a0: (2.0 - gamma) / tdelta,
            a1: -1.0 / (gamma * tdelta),
            a2: (1.0 - gamma) / (gamma * tstep),
            ..Self::zeroed(TimeMethod::Bdf2, tstep, gamma)
        })
    }

    /// Trapezoidal rule over `gamma·tstep`.
    pub fn trapezoidal(tstep: f64, gamma: f64) -> Result<Self> {
        check_step(tstep, gamma)?;
        let tdelta = gamma * tstep;
        let a0 = 2.0 / tdelta;
        Ok(Self {
            tdelta,
            a0,
            a1: -a0,
            b1: -1.0,
            ..Self::zeroed(TimeMethod::Trapezoidal, tstep, gamma)
        })
    }

    pub fn method(&self) -> TimeMethod {
        self.method
    }

    pub fn tstep(&self) -> f64 {
        self.tstep
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Time actually advanced by this step.
    pub fn tdelta(&self) -> f64 {
        self.tdelta
    }

    pub fn a0(&self) -> f64 {
        self.a0
    }

    pub fn a1(&self) -> f64 {
        self.a1
    }

    pub fn a2(&self) -> f64 {
        self.a2
    }

    pub fn b0(&self) -> f64 {
        self.b0
    }

    pub fn b1(&self) -> f64 {
        self.b1
    }

    pub fn b2(&self) -> f64 {
        self.b2
    }

    pub fn is_dc_only(&self) -> bool {
        self.method == TimeMethod::DcOnly
    }

    /// Static solve, with or without a transient to follow.
    pub fn is_dc_method(&self) -> bool {
        matches!(self.method, TimeMethod::DcOnly | TimeMethod::TransientDc)
    }

    /// Part of a transient simulation.
    pub fn is_transient(&self) -> bool {
        self.method != TimeMethod::DcOnly
    }

    /// Charge terms enter the residual.
    pub fn is_integration(&self) -> bool {
        !self.is_dc_method()
    }

    /// Whether the previous charge `Q(t-2)` is needed.
    pub(crate) fn needs_two_levels(&self) -> bool {
        self.a2 != 0.0
    }
}

fn check_step(tstep: f64, gamma: f64) -> Result<()> {
    if !tstep.is_finite() || tstep <= 0.0 {
        return Err(TcadError::invalid_param(format!(
            "time step must be positive and finite, got {}",
            tstep
        )));
    }
    if !gamma.is_finite() || gamma <= 0.0 {
        return Err(TcadError::invalid_param(format!(
            "gamma must be positive and finite, got {}",
            gamma
        )));
    }
    Ok(())
}
