//! The simulation driver: construction, stepping, and run loops.

use cnn_core::{saturate, GrayscaleImage, Real, Template, Tolerances};

use crate::dynamics::{dynamic_eq, feed_forward};
use crate::error::{SimError, SimResult};
use crate::grid::GridShape;
use crate::integrator::{Evolver, StepControl};

/// A single CNN run: owns the state vector, the precomputed feed-forward
/// image, and the adaptive evolver. Constructed per run; starts at `t = 0`
/// and finishes when the horizon is reached, a handler cancels, or the
/// evolver fails.
///
/// Single-threaded by design: steps are synchronous, and cancellation is
/// cooperative through the handler's return value. An in-flight substep
/// always completes.
#[derive(Debug)]
pub struct CnnSimulation {
    shape: GridShape,
    x: Vec<Real>,
    ff: Vec<Real>,
    template: Template,
    t_max: Real,
    h: Real,
    evolver: Evolver,
    finished: bool,
}

impl CnnSimulation {
    /// Validates the buffers against the grid shape, precomputes the
    /// feed-forward image, and sets up the adaptive evolver. The initial
    /// step hint is `rel_tol * abs_tol`, matching the classical controller
    /// seed under the default 1e-3 tolerances.
    pub fn new(
        shape: GridShape,
        initial_state: Vec<Real>,
        input: &[Real],
        template: Template,
        t_max: Real,
        tolerances: Tolerances,
    ) -> SimResult<Self> {
        let dimension = shape.dimension();
        if initial_state.len() != dimension {
            return Err(SimError::DimensionMismatch {
                what: "initial state",
                expected: dimension,
                actual: initial_state.len(),
            });
        }
        if input.len() != dimension {
            return Err(SimError::DimensionMismatch {
                what: "input image",
                expected: dimension,
                actual: input.len(),
            });
        }
        if !(t_max > 0.0) {
            return Err(SimError::InvalidArg {
                what: "t_max must be positive",
            });
        }
        if !(tolerances.abs > 0.0) || !(tolerances.rel > 0.0) {
            return Err(SimError::InvalidArg {
                what: "tolerances must be positive",
            });
        }

        let ff = feed_forward(input, shape, &template);
        let control = StepControl::from_tolerances(tolerances);
        let h = tolerances.rel * tolerances.abs;

        tracing::debug!(
            width = shape.width(),
            height = shape.height(),
            radius = template.radius(),
            t_max,
            "simulation constructed"
        );

        Ok(Self {
            shape,
            x: initial_state,
            ff,
            template,
            t_max,
            h,
            evolver: Evolver::new(dimension, control),
            finished: false,
        })
    }

    /// Convenience constructor from decoded images; the input image fixes
    /// the grid shape and the initial-state image must match it.
    pub fn from_images(
        initial_state: &GrayscaleImage,
        input: &GrayscaleImage,
        template: Template,
        t_max: Real,
        tolerances: Tolerances,
    ) -> SimResult<Self> {
        let shape = GridShape::new(input.width(), input.height())?;
        if initial_state.width() != input.width() || initial_state.height() != input.height() {
            return Err(SimError::DimensionMismatch {
                what: "initial state image",
                expected: shape.dimension(),
                actual: initial_state.width() * initial_state.height(),
            });
        }
        Self::new(
            shape,
            initial_state.buf().to_vec(),
            input.buf(),
            template,
            t_max,
            tolerances,
        )
    }

    /// Advance by one adaptive substep, mutating the state in place and
    /// the caller's time cursor. Returns `true` while more work remains;
    /// `false` once the horizon is reached or the evolver fails (the
    /// failure is logged and latched, so further calls return `false`).
    pub fn step(&mut self, t: &mut Real) -> bool {
        if self.finished {
            return false;
        }

        let shape = self.shape;
        let t_max = self.t_max;
        let Self {
            evolver,
            x,
            ff,
            template,
            h,
            ..
        } = self;

        let result = evolver.evolve(
            |_t, y, dydt| {
                dynamic_eq(y, dydt, shape, template, ff);
                Ok(())
            },
            t,
            t_max,
            h,
            x,
        );

        match result {
            Ok(()) => {
                if *t < t_max {
                    true
                } else {
                    self.finished = true;
                    false
                }
            }
            Err(e) => {
                tracing::warn!(t = *t, error = %e, "integration step failed");
                self.finished = true;
                false
            }
        }
    }

    /// Step to completion with no intermediate observation; returns the
    /// final time.
    pub fn run(&mut self) -> Real {
        let mut t = 0.0;
        while self.step(&mut t) {}
        t
    }

    /// Step to completion, invoking `handler` with the new time after
    /// every successful step (one call per step, in step order). A `false`
    /// return cancels the run cooperatively.
    pub fn run_with_handler(&mut self, mut handler: impl FnMut(Real) -> bool) -> Real {
        let mut t = 0.0;
        loop {
            if !self.step(&mut t) {
                break;
            }
            if !handler(t) {
                break;
            }
        }
        t
    }

    /// Read-only view of the raw cell states.
    pub fn state(&self) -> &[Real] {
        &self.x
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn time_limit(&self) -> Real {
        self.t_max
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Map the state through the output nonlinearity into a displayable
    /// image.
    pub fn extract_output(&self) -> GrayscaleImage {
        let mut img = GrayscaleImage::filled(self.shape.width(), self.shape.height(), 0.0);
        for (dst, &v) in img.buf_mut().iter_mut().zip(&self.x) {
            *dst = saturate(v);
        }
        img
    }
}
