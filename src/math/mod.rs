//! Numerically stabilized special functions used by physics models.

mod bernoulli;

pub use bernoulli::{bernoulli, der_bernoulli, ln_max};
