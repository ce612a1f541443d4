//! Reference physics used by the binary and the tests: a first-order
//! Godunov scheme for the 2D Euler equations, and the stability criteria of
//! the physical processes which limit the time step.

pub mod euler;
pub mod kernel;
pub mod limiters;

pub use kernel::{EulerKernel, FluxKernel};
