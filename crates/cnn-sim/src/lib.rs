//! Cellular Neural Network simulation engine.
//!
//! A CNN is a rectangular grid of identical coupled nonlinear ODE cells.
//! Each cell's state evolves under a local stencil of neighbors (the
//! feedback matrix `A`), a precomputed feed-forward term derived from a
//! fixed input image (matrix `B` plus bias `Z`), and a unit self-decay:
//!
//! ```text
//! dx/dt[i] = FF[i] - x[i] + sum(A * y(x-neighborhood of i))
//! ```
//!
//! Provides:
//! - boundary-condition-aware neighborhood evaluation (Constant / ZeroFlux
//!   / Periodic), with a branch-free fast path for interior cells
//! - one-time feed-forward precomputation
//! - an adaptive Runge-Kutta-Fehlberg 4(5) evolver
//! - [`CnnSimulation`]: stepping, run-to-completion, and cooperative
//!   cancellation via a per-step handler

pub mod boundary;
pub mod dynamics;
pub mod engine;
pub mod error;
pub mod grid;
pub mod integrator;
pub mod neighborhood;

// Re-exports for public API
pub use engine::CnnSimulation;
pub use error::{SimError, SimResult};
pub use grid::GridShape;
pub use integrator::{Evolver, StepControl};
