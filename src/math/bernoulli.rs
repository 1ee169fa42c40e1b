//! Bernoulli function B(x) = x / (e^x - 1) and its derivative.
//!
//! Evaluated piecewise:
//! - |x| < 1e-4: truncated series, avoiding the 0/0 cancellation
//! - |x| < ln(f64::MAX): direct exponential ratio
//! - x below -ln(f64::MAX): B(x) = -x, since B(-x) = B(x) + x and B(x) ~ 0
//! - x above ln(f64::MAX): 0

use std::sync::LazyLock;

/// Below this magnitude the series branch is used.
const SERIES_LIMIT: f64 = 1.0e-4;

static LN_MAX: LazyLock<f64> = LazyLock::new(|| f64::MAX.ln());

/// Natural log of the largest finite double; exp() overflows above it.
pub fn ln_max() -> f64 {
    *LN_MAX
}

#[inline]
pub(crate) fn bernoulli_series(x: f64) -> f64 {
    // 1 / (1 + x/2 + x^2/6 + x^3/24)
    let mut d = 1.0;
    let mut xv = x;
    d += xv / 2.0;
    xv *= x;
    d += xv / 6.0;
    xv *= x;
    d += xv / 24.0;
    1.0 / d
}

#[inline]
pub(crate) fn bernoulli_direct(x: f64) -> f64 {
    x / x.exp_m1()
}

/// Stabilized x / (e^x - 1).
pub fn bernoulli(x: f64) -> f64 {
    let fx = x.abs();
    if fx < SERIES_LIMIT {
        bernoulli_series(x)
    } else if fx < ln_max() {
        bernoulli_direct(x)
    } else if x < 0.0 {
        -x
    } else {
        0.0
    }
}

#[inline]
fn der_bernoulli_series(x: f64) -> f64 {
    let mut num = -0.5;
    let mut den = 1.0;
    let mut xv = x;
    num -= xv / 3.0;
    den += xv;
    xv *= x;
    num -= xv / 8.0;
    den += 7.0 / 12.0 * xv;
    xv *= x;
    num -= xv / 30.0;
    den += xv / 4.0;
    num / den
}

#[inline]
fn der_bernoulli_direct(x: f64) -> f64 {
    let ex = x.exp();
    let ex1 = x.exp_m1();
    if ex != ex1 {
        (ex1 - x * ex) / (ex1 * ex1)
    } else {
        // ex1 == ex only once e^x dwarfs 1
        (1.0 - x) / ex
    }
}

/// Derivative dB/dx.
pub fn der_bernoulli(x: f64) -> f64 {
    let fx = x.abs();
    if fx < SERIES_LIMIT {
        der_bernoulli_series(x)
    } else if fx < ln_max() {
        der_bernoulli_direct(x)
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}
