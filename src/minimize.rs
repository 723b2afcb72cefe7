//! Unconstrained quasi-Newton minimization
//!
//! BFGS with forward difference gradients. The objectives minimized here are only
//! piecewise smooth (norms and linear penalties have kinks), so the solver never
//! trusts its own convergence test alone and always hands back the best point seen.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::FloatType;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BfgsSettings {
    /// Stop once the largest gradient component falls below this
    pub gradient_tolerance: FloatType,
    /// Stop once an iteration lowers the value by less than this, relative to `max(|f|, 1)`
    pub value_tolerance: FloatType,
    /// Iteration cap per unit of problem dimension
    pub iterations_per_dimension: usize,
    /// Sufficient decrease constant of the Armijo condition
    pub armijo: FloatType,
    /// Step halvings before a line search is abandoned
    pub max_backtracks: usize,
}

impl Default for BfgsSettings {
    fn default() -> Self {
        Self {
            gradient_tolerance: 1e-5,
            value_tolerance: 1e-12,
            iterations_per_dimension: 200,
            armijo: 1e-4,
            max_backtracks: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: DVector<FloatType>,
    pub value: FloatType,
    pub iterations: usize,
    /// Whether the gradient or value test was met, as opposed to stalling or running out
    /// of iterations
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bfgs {
    pub settings: BfgsSettings,
}

impl Bfgs {
    pub fn new(settings: BfgsSettings) -> Self {
        Self { settings }
    }

    pub fn minimize(
        &self,
        objective: impl Fn(&DVector<FloatType>) -> FloatType,
        x0: DVector<FloatType>,
    ) -> Minimum {
        let settings = &self.settings;
        let dimension = x0.len();
        let max_iterations = settings.iterations_per_dimension * dimension.max(1);

        let mut x = x0;
        let mut value = objective(&x);
        let mut gradient = forward_gradient(&objective, &x, value);
        let mut inverse_hessian = DMatrix::identity(dimension, dimension);
        let mut previous_value = value + gradient.norm() / 2.0;

        let mut best = (x.clone(), value);
        let mut converged = false;
        let mut iterations = 0;

        while iterations < max_iterations {
            if gradient.amax() <= settings.gradient_tolerance {
                converged = true;
                break;
            }

            let mut direction = -(&inverse_hessian * &gradient);
            let mut slope = gradient.dot(&direction);
            if slope >= 0.0 || slope.is_nan() {
                // Lost a descent direction, restart from steepest descent
                inverse_hessian.fill_with_identity();
                direction = -&gradient;
                slope = gradient.dot(&direction);
            }

            let Some((step, next_x, next_value)) =
                self.line_search(&objective, &x, value, &direction, slope, previous_value)
            else {
                trace!(iterations, value, "Line search stalled");
                break;
            };

            let next_gradient = forward_gradient(&objective, &next_x, next_value);
            let s = direction * step;
            let y = &next_gradient - &gradient;

            previous_value = value;
            x = next_x;
            value = next_value;
            gradient = next_gradient;
            iterations += 1;

            if value < best.1 {
                best = (x.clone(), value);
            }

            let scale = value.abs().max(previous_value.abs()).max(1.0);
            if previous_value - value <= settings.value_tolerance * scale {
                converged = true;
                break;
            }

            let curvature = y.dot(&s);
            if curvature > 1e-10 {
                let rho = 1.0 / curvature;
                let hy = &inverse_hessian * &y;
                let yhy = y.dot(&hy);

                // H += (ρ²·yᵀHy + ρ)·ssᵀ - ρ·(Hy·sᵀ + s·(Hy)ᵀ)
                inverse_hessian.ger(rho * rho * yhy + rho, &s, &s, 1.0);
                inverse_hessian.ger(-rho, &hy, &s, 1.0);
                inverse_hessian.ger(-rho, &s, &hy, 1.0);
            }
        }

        trace!(iterations, converged, value = best.1, "BFGS finished");

        Minimum {
            x: best.0,
            value: best.1,
            iterations,
            converged,
        }
    }

    /// Backtracking Armijo search, returns the accepted step, point and value
    fn line_search(
        &self,
        objective: &impl Fn(&DVector<FloatType>) -> FloatType,
        x: &DVector<FloatType>,
        value: FloatType,
        direction: &DVector<FloatType>,
        slope: FloatType,
        previous_value: FloatType,
    ) -> Option<(FloatType, DVector<FloatType>, FloatType)> {
        // Initial step assumes the same decrease as the previous iteration
        let guess = 1.01 * 2.0 * (value - previous_value) / slope;
        let mut step = if guess.is_finite() && guess > 0.0 {
            guess.min(1.0)
        } else {
            1.0
        };

        for _ in 0..self.settings.max_backtracks {
            let candidate = x + direction * step;
            let candidate_value = objective(&candidate);

            if candidate_value <= value + self.settings.armijo * step * slope {
                return Some((step, candidate, candidate_value));
            }

            step *= 0.5;
        }

        None
    }
}

fn forward_gradient(
    objective: &impl Fn(&DVector<FloatType>) -> FloatType,
    x: &DVector<FloatType>,
    value: FloatType,
) -> DVector<FloatType> {
    let base_step = FloatType::EPSILON.sqrt();
    let mut shifted = x.clone();

    DVector::from_fn(x.len(), |idx, _| {
        let step = base_step * x[idx].abs().max(1.0);

        shifted[idx] = x[idx] + step;
        let derivative = (objective(&shifted) - value) / step;
        shifted[idx] = x[idx];

        derivative
    })
}
