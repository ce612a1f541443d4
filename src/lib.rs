//! Gridsync keeps the levels of a block-structured adaptive mesh refinement
//! (AMR) hierarchy consistent with one another while each level advances
//! with its own time step (Berger-Oliger subcycling). After a level and the
//! finer levels above it have reached the same time, the coarse zones along
//! the coarse-fine interface are corrected with the fine-level fluxes
//! (refluxing), the coarse zones under the fine level are replaced by the
//! average of the fine zones (average-down), and a self-gravitating
//! potential is corrected for the mass moved by refluxing. The crate also
//! selects every level's time step from the competing physical stability
//! limits, so that the fine steps always divide the coarse step exactly.
//!
//! The physics (flux kernel, limiter kernels, equation of state, elliptic
//! solver) plugs in through narrow traits; reference implementations for
//! the 2D Euler equations with monopole self-gravity are included.

pub mod average_down;
pub mod checkpoint;
pub mod config;
pub mod derived;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod flux_register;
pub mod geometry;
pub mod ghost;
pub mod gravity;
pub mod hydro;
pub mod index_space;
pub mod level;
pub mod message;
pub mod patch;
pub mod patch_set;
pub mod potential;
pub mod reflux;
pub mod scheduler;
pub mod state;
pub mod timestep;

pub use error::{Error, Result};
