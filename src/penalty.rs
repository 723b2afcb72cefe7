use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::{
    geometry::{thruster_forces, ThrusterGeometry},
    FloatType,
};

/// Per thruster magnitude cap and thrust cone, enforced through a steep linear penalty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintSettings {
    /// Largest force magnitude a single thruster may produce
    pub max_force: FloatType,
    /// Cosine of the cone half angle around each thruster normal
    pub cos_gamma: FloatType,
    /// Penalty added per unit of constraint violation
    pub slope: FloatType,
}

impl Default for ConstraintSettings {
    fn default() -> Self {
        Self {
            max_force: 1.0,
            cos_gamma: 0.1,
            slope: 1e10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrusterState {
    pub magnitude: FloatType,
    /// Cosine between the force and the thruster normal, `None` when the thruster is idle
    pub cosine: Option<FloatType>,
}

impl ThrusterState {
    pub fn within(&self, constraints: &ConstraintSettings, tolerance: FloatType) -> bool {
        self.magnitude <= constraints.max_force + tolerance
            && self
                .cosine
                .map_or(true, |cosine| cosine >= constraints.cos_gamma - tolerance)
    }
}

// Forces shorter than this are treated as an idle thruster
const IDLE_FORCE: FloatType = 1e-12;

impl ConstraintSettings {
    /// Sum of `slope * violation` over both constraints of every thruster
    ///
    /// Zero iff every thruster is within its cap and cone.
    pub fn penalty(&self, geometry: &ThrusterGeometry, forces: &DVector<FloatType>) -> FloatType {
        thruster_report(geometry, forces)
            .map(|state| {
                let mut penalty = 0.0;

                if state.magnitude > self.max_force {
                    penalty += (state.magnitude - self.max_force) * self.slope;
                }
                if let Some(cosine) = state.cosine {
                    if cosine < self.cos_gamma {
                        penalty += (self.cos_gamma - cosine) * self.slope;
                    }
                }

                penalty
            })
            .sum()
    }

    /// Effort plus a penalty that stays continuous as a thruster goes idle
    ///
    /// The cone violation is measured as `cos_gamma·|f| − f·n`, which vanishes with the
    /// force instead of keeping a fixed angle deficit. Every kink is rounded over
    /// `smoothing` (in force units), zero gives the exact piecewise linear cost.
    /// [`penalty`](Self::penalty) stays the measure of feasibility.
    pub fn relaxed_cost(
        &self,
        geometry: &ThrusterGeometry,
        forces: &DVector<FloatType>,
        smoothing: FloatType,
    ) -> FloatType {
        geometry
            .thrusters()
            .iter()
            .zip(thruster_forces(forces))
            .map(|(thruster, force)| {
                let magnitude = force.norm().hypot(smoothing);
                let over_cap = magnitude - self.max_force;
                let outside_cone = self.cos_gamma * magnitude - force.dot(&thruster.normal);

                let violation =
                    smooth_hinge(over_cap, smoothing) + smooth_hinge(outside_cone, smoothing);

                magnitude + self.slope * violation
            })
            .sum()
    }
}

/// `max(0, x)` with the corner rounded over `width`
fn smooth_hinge(x: FloatType, width: FloatType) -> FloatType {
    0.5 * (x + x.hypot(width))
}

/// Total thrust, the sum of per thruster force magnitudes
pub fn effort(forces: &DVector<FloatType>) -> FloatType {
    thruster_forces(forces).map(|force| force.norm()).sum()
}

pub fn thruster_report<'a>(
    geometry: &'a ThrusterGeometry,
    forces: &'a DVector<FloatType>,
) -> impl Iterator<Item = ThrusterState> + 'a {
    geometry
        .thrusters()
        .iter()
        .zip(thruster_forces(forces))
        .map(|(thruster, force)| {
            let magnitude = force.norm();
            let cosine = (magnitude > IDLE_FORCE).then(|| force.dot(&thruster.normal) / magnitude);

            ThrusterState { magnitude, cosine }
        })
}
