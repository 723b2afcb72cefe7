//! Largest feasible wrench along a direction
//!
//! The search relies on feasibility being monotone in scale: if a wrench is feasible,
//! any positive fraction of it is assumed feasible too. This holds for the underlying
//! constraint set but is only approximately honored by the penalty based allocator.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    allocator::{Allocation, Allocator},
    Error, FloatType, Result, Wrench,
};

/// What the feasible solution is rescaled against to produce a radius
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RadiusScaling {
    /// `scale * thruster_count / peak_force`
    #[default]
    ThrusterCount,
    /// `scale * max_force / peak_force`, the scale at which the busiest thruster hits its cap
    ForceCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeSettings {
    /// Halvings tried before a direction is declared infeasible
    pub max_halvings: u32,
    pub radius_scaling: RadiusScaling,
}

impl Default for EnvelopeSettings {
    fn default() -> Self {
        Self {
            max_halvings: 64,
            radius_scaling: RadiusScaling::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvelopeSample {
    /// Unit length direction that was searched
    pub direction: Wrench,
    /// Extent of the envelope along the searched direction, in multiples of the input wrench
    pub radius: FloatType,
    /// First scale of the input wrench the allocator realized feasibly
    pub scale: FloatType,
    pub halvings: u32,
    /// Largest thruster force of the feasible allocation
    pub peak_force: FloatType,
    pub allocation: Allocation,
}

pub struct EnvelopeSearch<'a> {
    allocator: Allocator<'a>,
    settings: EnvelopeSettings,
}

impl<'a> EnvelopeSearch<'a> {
    pub fn new(allocator: Allocator<'a>, settings: EnvelopeSettings) -> Self {
        Self {
            allocator,
            settings,
        }
    }

    pub fn allocator(&self) -> &Allocator<'a> {
        &self.allocator
    }

    /// Largest `radius` such that `radius * direction` is realizable
    pub fn max_radius(&self, direction: &Wrench) -> Result<FloatType> {
        self.search(direction).map(|sample| sample.radius)
    }

    /// Halves the scale of `direction` until the allocator finds a feasible solution,
    /// then rescales that solution to the envelope
    pub fn search(&self, direction: &Wrench) -> Result<EnvelopeSample> {
        let components = direction.to_vector();
        if components.iter().any(|it| !it.is_finite()) {
            return Err(Error::NonFiniteDirection);
        }

        let largest = components.amax();
        if largest == 0.0 {
            return Err(Error::ZeroDirection);
        }
        // Dividing out the largest component first keeps the squares from overflowing
        let shape = components / largest;
        let shape_norm = shape.norm();
        let unit = Wrench::from(shape / shape_norm);

        // `fraction` of the unit direction is `fraction / norm` of the input wrench
        let mut fraction: FloatType = 1.0;

        for halvings in 0..=self.settings.max_halvings {
            let allocation = self.allocator.allocate(&(unit * fraction))?;
            let scale = fraction / shape_norm / largest;

            if allocation.feasible {
                return self.finish(unit, scale, halvings, allocation);
            }

            debug!(scale, halvings, "Infeasible, halving scale");
            fraction /= 2.0;
        }

        warn!(
            ?direction,
            halvings = self.settings.max_halvings,
            "No feasible scale found"
        );

        Err(Error::NoFeasibleScale {
            halvings: self.settings.max_halvings,
        })
    }

    fn finish(
        &self,
        direction: Wrench,
        scale: FloatType,
        halvings: u32,
        allocation: Allocation,
    ) -> Result<EnvelopeSample> {
        let peak_force = allocation.peak_force();
        // A feasible allocation with no thrust at all means the wrench itself was zero
        if peak_force <= 0.0 || peak_force.is_nan() {
            return Err(Error::ZeroDirection);
        }

        let numerator = match self.settings.radius_scaling {
            RadiusScaling::ThrusterCount => self.allocator.model().geometry().len() as FloatType,
            RadiusScaling::ForceCap => self.allocator.constraints().max_force,
        };
        let radius = scale * numerator / peak_force;

        info!(?direction, radius, scale, halvings, "Found envelope radius");

        Ok(EnvelopeSample {
            direction,
            radius,
            scale,
            halvings,
            peak_force,
            allocation,
        })
    }

    /// Searches every direction in parallel, results are in input order
    pub fn sweep(&self, directions: &[Wrench]) -> Vec<Result<EnvelopeSample>> {
        directions
            .par_iter()
            .map(|direction| self.search(direction))
            .collect()
    }
}
