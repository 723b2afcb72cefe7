pub mod allocation;
pub mod allocator;
pub mod envelope;
pub mod error;
pub mod geometry;
pub mod minimize;
pub mod penalty;
pub mod report;
pub mod sampling;
pub mod settings;

use std::ops::{Mul, Neg};

use nalgebra::{vector, DVector, Vector3, Vector6};

pub use error::{Error, Result};

pub type FloatType = f64;

/// Number of wrench components, 3 force followed by 3 torque
pub const WRENCH_DIMENSION: usize = 6;

/// Net force and torque acting on the body, in the body frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Wrench {
    pub force: Vector3<FloatType>,
    pub torque: Vector3<FloatType>,
}

impl Wrench {
    pub fn new(force: Vector3<FloatType>, torque: Vector3<FloatType>) -> Self {
        Self { force, torque }
    }

    pub fn pure_force(force: Vector3<FloatType>) -> Self {
        Self {
            force,
            torque: Vector3::zeros(),
        }
    }

    pub fn pure_torque(torque: Vector3<FloatType>) -> Self {
        Self {
            force: Vector3::zeros(),
            torque,
        }
    }

    /// Stacked `[force; torque]`
    pub fn to_vector(&self) -> Vector6<FloatType> {
        Vector6::new(
            self.force.x,
            self.force.y,
            self.force.z,
            self.torque.x,
            self.torque.y,
            self.torque.z,
        )
    }

    pub fn to_dvector(&self) -> DVector<FloatType> {
        DVector::from_column_slice(self.to_vector().as_slice())
    }

    pub fn norm(&self) -> FloatType {
        self.to_vector().norm()
    }

    pub fn normalize(&self) -> Self {
        *self * (1.0 / self.norm())
    }
}

impl From<[FloatType; WRENCH_DIMENSION]> for Wrench {
    fn from([fx, fy, fz, tx, ty, tz]: [FloatType; WRENCH_DIMENSION]) -> Self {
        Self {
            force: vector![fx, fy, fz],
            torque: vector![tx, ty, tz],
        }
    }
}

impl From<Vector6<FloatType>> for Wrench {
    fn from(value: Vector6<FloatType>) -> Self {
        Self {
            force: value.fixed_rows::<3>(0).into_owned(),
            torque: value.fixed_rows::<3>(3).into_owned(),
        }
    }
}

impl TryFrom<&[FloatType]> for Wrench {
    type Error = Error;

    fn try_from(value: &[FloatType]) -> Result<Self> {
        let raw: [FloatType; WRENCH_DIMENSION] = value
            .try_into()
            .map_err(|_| Error::WrenchLength(value.len()))?;

        Ok(Self::from(raw))
    }
}

impl Mul<FloatType> for Wrench {
    type Output = Wrench;

    fn mul(self, rhs: FloatType) -> Self::Output {
        Self {
            force: self.force * rhs,
            torque: self.torque * rhs,
        }
    }
}

impl Neg for Wrench {
    type Output = Wrench;

    fn neg(self) -> Self::Output {
        self * -1.0
    }
}
