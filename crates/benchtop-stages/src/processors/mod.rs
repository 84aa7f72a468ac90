//! Processors-under-test.

mod gain;
mod parametric_eq;

pub use gain::Gain;
pub use parametric_eq::ParametricEq;
