//! Adaptive explicit ODE stepping: embedded Runge-Kutta-Fehlberg 4(5).
//!
//! The 5th-order solution advances the state; the difference against the
//! embedded 4th-order solution estimates the local error, which drives the
//! step-size controller. The evolver is generic over the right-hand side
//! and owns all stage work buffers for the run.

use cnn_core::{Real, Tolerances};

use crate::error::{SimError, SimResult};

// Fehlberg tableau: stage nodes.
const C2: Real = 1.0 / 4.0;
const C3: Real = 3.0 / 8.0;
const C4: Real = 12.0 / 13.0;
const C5: Real = 1.0;
const C6: Real = 1.0 / 2.0;

// Stage couplings.
const A21: Real = 1.0 / 4.0;
const A31: Real = 3.0 / 32.0;
const A32: Real = 9.0 / 32.0;
const A41: Real = 1932.0 / 2197.0;
const A42: Real = -7200.0 / 2197.0;
const A43: Real = 7296.0 / 2197.0;
const A51: Real = 439.0 / 216.0;
const A52: Real = -8.0;
const A53: Real = 3680.0 / 513.0;
const A54: Real = -845.0 / 4104.0;
const A61: Real = -8.0 / 27.0;
const A62: Real = 2.0;
const A63: Real = -3544.0 / 2565.0;
const A64: Real = 1859.0 / 4104.0;
const A65: Real = -11.0 / 40.0;

// 5th-order solution weights.
const B1: Real = 16.0 / 135.0;
const B3: Real = 6656.0 / 12825.0;
const B4: Real = 28561.0 / 56430.0;
const B5: Real = -9.0 / 50.0;
const B6: Real = 2.0 / 55.0;

// Embedded error weights (5th minus 4th order).
const E1: Real = 1.0 / 360.0;
const E3: Real = -128.0 / 4275.0;
const E4: Real = -2197.0 / 75240.0;
const E5: Real = 1.0 / 50.0;
const E6: Real = 2.0 / 55.0;

/// Step-size controller configuration.
#[derive(Clone, Copy, Debug)]
pub struct StepControl {
    /// Absolute error tolerance per component
    pub abs_tol: Real,
    /// Relative error tolerance per component
    pub rel_tol: Real,
    /// Safety factor applied to every step-size update
    pub safety: Real,
    /// Lower bound on any single shrink factor
    pub min_shrink: Real,
    /// Upper bound on any single growth factor
    pub max_grow: Real,
    /// Rejected-step retries before giving up on a substep
    pub max_retries: usize,
    /// Smallest step size before the controller reports failure
    pub min_step: Real,
}

impl Default for StepControl {
    fn default() -> Self {
        Self::from_tolerances(Tolerances::default())
    }
}

impl StepControl {
    pub fn from_tolerances(tol: Tolerances) -> Self {
        Self {
            abs_tol: tol.abs,
            rel_tol: tol.rel,
            safety: 0.9,
            min_shrink: 0.2,
            max_grow: 5.0,
            max_retries: 20,
            min_step: 1e-12,
        }
    }
}

/// Adaptive-step driver advancing a flat state vector in place.
#[derive(Debug)]
pub struct Evolver {
    control: StepControl,
    // Stage derivative buffers k1..k6 and the stage state scratch.
    k: [Vec<Real>; 6],
    y_stage: Vec<Real>,
    y_next: Vec<Real>,
}

impl Evolver {
    pub fn new(dimension: usize, control: StepControl) -> Self {
        Self {
            control,
            k: std::array::from_fn(|_| vec![0.0; dimension]),
            y_stage: vec![0.0; dimension],
            y_next: vec![0.0; dimension],
        }
    }

    pub fn control(&self) -> &StepControl {
        &self.control
    }

    /// Advance `x` by one adaptive substep toward `t_max`.
    ///
    /// `h` is the mutable step-size hint: it is clamped so the step never
    /// overshoots `t_max`, shrunk on error-norm rejection, and updated with
    /// the controller's suggestion for the next call. On acceptance `t` and
    /// `x` are advanced in place; a step clamped to the horizon lands on
    /// `t_max` exactly. Failure to meet the tolerance within the retry
    /// budget (or step-size underflow) is [`SimError::StepFailed`]; any
    /// retry beyond that is caller policy.
    pub fn evolve<F>(
        &mut self,
        mut rhs: F,
        t: &mut Real,
        t_max: Real,
        h: &mut Real,
        x: &mut [Real],
    ) -> SimResult<()>
    where
        F: FnMut(Real, &[Real], &mut [Real]) -> SimResult<()>,
    {
        let n = x.len();
        debug_assert_eq!(self.y_stage.len(), n);

        if *t >= t_max {
            return Ok(());
        }
        if !h.is_finite() || *h <= 0.0 {
            *h = self.control.min_step;
        }

        let mut h_try = *h;

        for _ in 0..=self.control.max_retries {
            let remaining = t_max - *t;
            let reaches_end = h_try >= remaining;
            if reaches_end {
                h_try = remaining;
            }

            self.stages(&mut rhs, *t, h_try, x)?;

            // Candidate solution and max error ratio against the per
            // component scale abs + rel * |y|.
            let mut err_ratio: Real = 0.0;
            for i in 0..n {
                let y = x[i]
                    + h_try
                        * (B1 * self.k[0][i]
                            + B3 * self.k[2][i]
                            + B4 * self.k[3][i]
                            + B5 * self.k[4][i]
                            + B6 * self.k[5][i]);
                let err = h_try
                    * (E1 * self.k[0][i]
                        + E3 * self.k[2][i]
                        + E4 * self.k[3][i]
                        + E5 * self.k[4][i]
                        + E6 * self.k[5][i]);
                let scale = self.control.abs_tol + self.control.rel_tol * y.abs();
                err_ratio = err_ratio.max(err.abs() / scale);
                self.y_next[i] = y;
            }

            if !err_ratio.is_finite() {
                return Err(SimError::StepFailed {
                    t: *t,
                    what: "non-finite error estimate",
                });
            }

            if err_ratio <= 1.0 {
                x.copy_from_slice(&self.y_next);
                *t = if reaches_end { t_max } else { *t + h_try };

                let grow = if err_ratio == 0.0 {
                    self.control.max_grow
                } else {
                    (self.control.safety * err_ratio.powf(-0.2))
                        .clamp(self.control.min_shrink, self.control.max_grow)
                };
                *h = h_try * grow;
                return Ok(());
            }

            // Rejected: shrink and retry the same point.
            let shrink = (self.control.safety * err_ratio.powf(-0.25))
                .clamp(self.control.min_shrink, 0.9);
            h_try *= shrink;
            if h_try < self.control.min_step {
                return Err(SimError::StepFailed {
                    t: *t,
                    what: "step size underflow",
                });
            }
        }

        Err(SimError::StepFailed {
            t: *t,
            what: "tolerance not met within retry budget",
        })
    }

    /// Evaluate the six Fehlberg stages at the current point.
    fn stages<F>(&mut self, rhs: &mut F, t: Real, h: Real, x: &[Real]) -> SimResult<()>
    where
        F: FnMut(Real, &[Real], &mut [Real]) -> SimResult<()>,
    {
        let n = x.len();

        rhs(t, x, &mut self.k[0])?;

        for i in 0..n {
            self.y_stage[i] = x[i] + h * A21 * self.k[0][i];
        }
        rhs(t + C2 * h, &self.y_stage, &mut self.k[1])?;

        for i in 0..n {
            self.y_stage[i] = x[i] + h * (A31 * self.k[0][i] + A32 * self.k[1][i]);
        }
        rhs(t + C3 * h, &self.y_stage, &mut self.k[2])?;

        for i in 0..n {
            self.y_stage[i] =
                x[i] + h * (A41 * self.k[0][i] + A42 * self.k[1][i] + A43 * self.k[2][i]);
        }
        rhs(t + C4 * h, &self.y_stage, &mut self.k[3])?;

        for i in 0..n {
            self.y_stage[i] = x[i]
                + h * (A51 * self.k[0][i]
                    + A52 * self.k[1][i]
                    + A53 * self.k[2][i]
                    + A54 * self.k[3][i]);
        }
        rhs(t + C5 * h, &self.y_stage, &mut self.k[4])?;

        for i in 0..n {
            self.y_stage[i] = x[i]
                + h * (A61 * self.k[0][i]
                    + A62 * self.k[1][i]
                    + A63 * self.k[2][i]
                    + A64 * self.k[3][i]
                    + A65 * self.k[4][i]);
        }
        rhs(t + C6 * h, &self.y_stage, &mut self.k[5])?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tight_control() -> StepControl {
        StepControl::from_tolerances(Tolerances {
            abs: 1e-8,
            rel: 1e-8,
        })
    }

    fn decay_rhs(_t: Real, x: &[Real], dxdt: &mut [Real]) -> SimResult<()> {
        for (d, &v) in dxdt.iter_mut().zip(x) {
            *d = -v;
        }
        Ok(())
    }

    #[test]
    fn exponential_decay_matches_analytic_solution() {
        let mut evolver = Evolver::new(1, tight_control());
        let mut x = [1.0];
        let mut t = 0.0;
        let mut h = 1e-6;

        while t < 1.0 {
            evolver
                .evolve(decay_rhs, &mut t, 1.0, &mut h, &mut x)
                .unwrap();
        }

        assert_eq!(t, 1.0);
        assert!((x[0] - (-1.0f64).exp()).abs() < 1e-6, "x = {}", x[0]);
    }

    #[test]
    fn step_hint_grows_on_smooth_problems() {
        let mut evolver = Evolver::new(1, tight_control());
        let mut x = [1.0];
        let mut t = 0.0;
        let mut h = 1e-6;

        for _ in 0..5 {
            evolver
                .evolve(decay_rhs, &mut t, 100.0, &mut h, &mut x)
                .unwrap();
        }
        assert!(h > 1e-4, "hint failed to grow: {h}");
    }

    #[test]
    fn clamped_step_lands_exactly_on_t_max() {
        let mut evolver = Evolver::new(1, StepControl::default());
        let mut x = [1.0];
        let mut t = 0.0;
        let mut h = 10.0; // hint far beyond the horizon

        evolver
            .evolve(decay_rhs, &mut t, 0.5, &mut h, &mut x)
            .unwrap();
        assert!(t <= 0.5);
        while t < 0.5 {
            evolver
                .evolve(decay_rhs, &mut t, 0.5, &mut h, &mut x)
                .unwrap();
        }
        assert_eq!(t, 0.5);
    }

    #[test]
    fn evolve_past_horizon_is_a_no_op() {
        let mut evolver = Evolver::new(1, StepControl::default());
        let mut x = [1.0];
        let mut t = 2.0;
        let mut h = 0.1;
        evolver
            .evolve(decay_rhs, &mut t, 1.0, &mut h, &mut x)
            .unwrap();
        assert_eq!(t, 2.0);
        assert_eq!(x[0], 1.0);
    }

    #[test]
    fn rhs_failure_propagates() {
        let mut evolver = Evolver::new(1, StepControl::default());
        let mut x = [1.0];
        let mut t = 0.0;
        let mut h = 0.1;
        let err = evolver
            .evolve(
                |_, _, _| {
                    Err(SimError::StepFailed {
                        t: 0.0,
                        what: "synthetic",
                    })
                },
                &mut t,
                1.0,
                &mut h,
                &mut x,
            )
            .unwrap_err();
        assert!(matches!(err, SimError::StepFailed { .. }));
    }

    #[test]
    fn two_component_system_integrates_independently() {
        // dx/dt = -x alongside dx/dt = -2x
        let rhs = |_t: Real, x: &[Real], dxdt: &mut [Real]| -> SimResult<()> {
            dxdt[0] = -x[0];
            dxdt[1] = -2.0 * x[1];
            Ok(())
        };
        let mut evolver = Evolver::new(2, tight_control());
        let mut x = [1.0, 1.0];
        let mut t = 0.0;
        let mut h = 1e-6;
        while t < 1.0 {
            evolver.evolve(rhs, &mut t, 1.0, &mut h, &mut x).unwrap();
        }
        assert!((x[0] - (-1.0f64).exp()).abs() < 1e-6);
        assert!((x[1] - (-2.0f64).exp()).abs() < 1e-6);
    }
}
