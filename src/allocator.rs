use nalgebra::{DVector, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    allocation::AllocationModel,
    geometry::thruster_forces,
    minimize::{Bfgs, BfgsSettings},
    penalty::{effort, thruster_report, ConstraintSettings, ThrusterState},
    FloatType, Result, Wrench,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorSettings {
    /// Penalty below which an assignment counts as feasible
    pub feasibility_tolerance: FloatType,
    /// Penalty slope of the first minimization stage
    pub initial_slope: FloatType,
    /// Factor between the slopes of consecutive stages
    pub slope_growth: FloatType,
    /// Slope the smoothed stages grow to, capped by the configured slope
    pub relaxed_slope: FloatType,
    /// Width the kinks are rounded over in the first stage, relative to `|M⁺·w|`
    pub initial_smoothing: FloatType,
    /// Factor the smoothing shrinks by once the relaxed slope is reached
    pub smoothing_decay: FloatType,
    /// Smallest smoothing of a staged minimization, the last stage is exact
    pub final_smoothing: FloatType,
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self {
            feasibility_tolerance: 0.01,
            initial_slope: 10.0,
            slope_growth: 10.0,
            relaxed_slope: 1e3,
            initial_smoothing: 1e-2,
            smoothing_decay: 0.1,
            final_smoothing: 1e-8,
        }
    }
}

/// One minimization of the relaxed cost
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stage {
    pub slope: FloatType,
    /// Relative to the size of the minimum norm solution
    pub smoothing: FloatType,
}

impl AllocatorSettings {
    /// Stages of the minimization, ending with an exact stage at `final_slope`
    ///
    /// The slope grows first, then the smoothing shrinks. An `initial_smoothing` of zero
    /// leaves only the exact stage.
    pub fn stages(&self, final_slope: FloatType) -> Vec<Stage> {
        let relaxed_slope = self.relaxed_slope.min(final_slope);
        let mut slope = self.initial_slope.min(relaxed_slope);
        let mut smoothing = self.initial_smoothing;
        let mut stages = Vec::new();

        while smoothing > 0.0 && smoothing >= self.final_smoothing {
            stages.push(Stage { slope, smoothing });

            if slope < relaxed_slope && self.slope_growth > 1.0 {
                slope = (slope * self.slope_growth).min(relaxed_slope);
            } else if self.smoothing_decay > 0.0 && self.smoothing_decay < 1.0 {
                smoothing *= self.smoothing_decay;
            } else {
                break;
            }
        }
        stages.push(Stage {
            slope: final_slope,
            smoothing: 0.0,
        });

        stages
    }
}

#[derive(Debug, Clone)]
pub struct Allocation {
    /// Stacked per thruster force vectors
    pub forces: DVector<FloatType>,
    /// Only when set can the forces be trusted to respect the caps and cones
    pub feasible: bool,
    pub penalty: FloatType,
    pub effort: FloatType,
    /// Minimizer iterations summed over all stages
    pub iterations: usize,
    /// Convergence of the final, exact stage
    pub converged: bool,
}

impl Allocation {
    pub fn thruster_forces(&self) -> impl Iterator<Item = Vector3<FloatType>> + '_ {
        thruster_forces(&self.forces)
    }

    /// Largest force magnitude over all thrusters
    pub fn peak_force(&self) -> FloatType {
        self.thruster_forces()
            .map(|force| force.norm())
            .fold(0.0, FloatType::max)
    }
}

/// Finds the least effort thruster forces realizing a wrench
#[derive(Debug, Clone)]
pub struct Allocator<'a> {
    model: &'a AllocationModel,
    constraints: ConstraintSettings,
    settings: AllocatorSettings,
    minimizer: Bfgs,
}

impl<'a> Allocator<'a> {
    pub fn new(
        model: &'a AllocationModel,
        constraints: ConstraintSettings,
        settings: AllocatorSettings,
        minimizer: BfgsSettings,
    ) -> Self {
        Self {
            model,
            constraints,
            settings,
            minimizer: Bfgs::new(minimizer),
        }
    }

    pub fn model(&self) -> &'a AllocationModel {
        self.model
    }

    pub fn constraints(&self) -> &ConstraintSettings {
        &self.constraints
    }

    /// Finds the least effort forces realizing `target`, over the null space offsets of
    /// the exact solution
    ///
    /// The returned forces always realize `target` exactly, only their feasibility is
    /// approximate. Non-convergence of the minimizer is not an error, its best iterate
    /// is used regardless.
    ///
    /// Each stage minimizes [`ConstraintSettings::relaxed_cost`] warm started from the
    /// previous one, the verdict is taken on the exact [`ConstraintSettings::penalty`].
    pub fn allocate(&self, target: &Wrench) -> Result<Allocation> {
        let model = self.model;
        let geometry = model.geometry();
        let particular = model.particular_solution(target)?;
        let size = particular.norm();

        let mut free = DVector::zeros(model.free_dimension());
        let mut iterations = 0;
        let mut converged = false;

        for stage in self.settings.stages(self.constraints.slope) {
            let constraints = ConstraintSettings {
                slope: stage.slope,
                ..self.constraints
            };
            let smoothing = stage.smoothing * size;

            let minimum = self.minimizer.minimize(
                |free| {
                    let forces = model.forces_free(&particular, free);
                    constraints.relaxed_cost(geometry, &forces, smoothing)
                },
                free,
            );

            trace!(
                slope = stage.slope,
                smoothing,
                value = minimum.value,
                iterations = minimum.iterations,
                "Finished stage"
            );

            free = minimum.x;
            iterations += minimum.iterations;
            converged = minimum.converged;
        }

        let forces = model.forces_free(&particular, &free);
        let penalty = self.constraints.penalty(geometry, &forces);
        let effort = effort(&forces);
        let feasible = penalty < self.settings.feasibility_tolerance;

        debug!(
            ?target,
            feasible,
            penalty,
            effort,
            iterations,
            "Allocated wrench"
        );

        Ok(Allocation {
            forces,
            feasible,
            penalty,
            effort,
            iterations,
            converged,
        })
    }

    pub fn report<'b>(
        &'b self,
        allocation: &'b Allocation,
    ) -> impl Iterator<Item = ThrusterState> + 'b {
        thruster_report(self.model.geometry(), &allocation.forces)
    }
}
