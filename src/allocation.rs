//! Pseudo-inverse and null-space projector of the wrench map
//!
//! Every thruster force assignment realizing a reachable wrench `w` can be written as
//! `M⁺·w + A·v` for some free vector `v`, where `A = I - M⁺·M` projects onto the null
//! space of the wrench map `M`.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::{geometry::ThrusterGeometry, Error, FloatType, Result, Wrench, WRENCH_DIMENSION};

/// Singular values below this fraction of the largest one count as zero
pub const RANK_EPSILON: FloatType = 1e-9;
/// Relative residual above which a target is considered outside the map's range
pub const REACHABILITY_EPSILON: FloatType = 1e-9;

#[derive(Debug, Clone)]
pub struct AllocationModel {
    geometry: ThrusterGeometry,
    matrix: DMatrix<FloatType>,
    pseudo_inverse: DMatrix<FloatType>,
    null_projector: DMatrix<FloatType>,
    rank: usize,
}

impl AllocationModel {
    pub fn new(geometry: ThrusterGeometry) -> Result<Self> {
        let matrix = geometry.wrench_matrix();

        let svd = matrix.clone().svd(true, true);
        let largest = svd.singular_values.max();
        let epsilon = RANK_EPSILON * largest.max(1.0);
        let rank = svd.rank(epsilon);
        let pseudo_inverse = svd.pseudo_inverse(epsilon).map_err(Error::PseudoInverse)?;

        let dimension = geometry.force_dimension();
        let null_projector = DMatrix::identity(dimension, dimension) - &pseudo_inverse * &matrix;

        if rank < WRENCH_DIMENSION {
            warn!(
                rank,
                thrusters = geometry.len(),
                "Wrench map is rank deficient, some wrenches are unreachable"
            );
        } else {
            debug!(thrusters = geometry.len(), "Built allocation model");
        }

        Ok(Self {
            geometry,
            matrix,
            pseudo_inverse,
            null_projector,
            rank,
        })
    }

    pub fn geometry(&self) -> &ThrusterGeometry {
        &self.geometry
    }

    pub fn matrix(&self) -> &DMatrix<FloatType> {
        &self.matrix
    }

    pub fn pseudo_inverse(&self) -> &DMatrix<FloatType> {
        &self.pseudo_inverse
    }

    pub fn null_projector(&self) -> &DMatrix<FloatType> {
        &self.null_projector
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn is_full_rank(&self) -> bool {
        self.rank == WRENCH_DIMENSION
    }

    /// Dimension of the free parameter, three per thruster
    pub fn free_dimension(&self) -> usize {
        self.geometry.force_dimension()
    }

    /// Minimum norm force assignment `M⁺·w`
    ///
    /// Fails with [`Error::DegenerateGeometry`] if `target` lies outside the range of
    /// the wrench map, as the least squares solution would silently realize a different
    /// wrench.
    pub fn particular_solution(&self, target: &Wrench) -> Result<DVector<FloatType>> {
        let target = target.to_dvector();
        let forces = &self.pseudo_inverse * &target;

        if !self.is_full_rank() {
            let residual = (&self.matrix * &forces - &target).norm();
            if residual > REACHABILITY_EPSILON * target.norm().max(1.0) {
                return Err(Error::DegenerateGeometry {
                    rank: self.rank,
                    residual,
                });
            }
        }

        Ok(forces)
    }

    /// `particular + A·free`, realizes the same wrench as `particular` for any `free`
    pub fn forces_free(
        &self,
        particular: &DVector<FloatType>,
        free: &DVector<FloatType>,
    ) -> DVector<FloatType> {
        let mut forces = particular.clone();
        forces.gemv(1.0, &self.null_projector, free, 1.0);
        forces
    }

    pub fn realized_wrench(&self, forces: &DVector<FloatType>) -> Wrench {
        let wrench = &self.matrix * forces;
        Wrench::new(
            wrench.fixed_rows::<3>(0).into_owned(),
            wrench.fixed_rows::<3>(3).into_owned(),
        )
    }
}
