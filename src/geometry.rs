//! Thruster layout and the linear map from thruster forces to the net wrench

use std::{fs::File, io::Read, path::Path};

use nalgebra::{vector, DMatrix, DVector, Matrix3, Vector3};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, FloatType, Result, Wrench, WRENCH_DIMENSION};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thruster {
    /// Body frame position
    pub position: Vector3<FloatType>,
    /// Unit vector along which the thruster pushes
    pub normal: Vector3<FloatType>,
}

impl Thruster {
    /// Normalizes `normal`, returns `None` if it has no length
    pub fn new(position: Vector3<FloatType>, normal: Vector3<FloatType>) -> Option<Self> {
        let normal = normal.try_normalize(FloatType::EPSILON)?;

        Some(Self { position, normal })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrusterGeometry {
    thrusters: Vec<Thruster>,
}

impl ThrusterGeometry {
    pub fn new(thrusters: Vec<Thruster>) -> Result<Self> {
        if thrusters.is_empty() {
            return Err(Error::NoThrusters);
        }

        Ok(Self { thrusters })
    }

    /// Builds a geometry from raw positions and normals, normalizing the latter
    pub fn from_parts(
        positions: &[Vector3<FloatType>],
        normals: &[Vector3<FloatType>],
    ) -> Result<Self> {
        if positions.len() != normals.len() {
            return Err(Error::MismatchedParts {
                positions: positions.len(),
                normals: normals.len(),
            });
        }

        let thrusters = positions
            .iter()
            .zip(normals)
            .enumerate()
            .map(|(index, (&position, &normal))| {
                Thruster::new(position, normal).ok_or(Error::ZeroNormal { index })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(thrusters)
    }

    /// Four thrusters on the vertices of a regular tetrahedron, pushing outwards
    pub fn tetrahedral(radius: FloatType) -> Self {
        let scale = radius / FloatType::sqrt(3.0);
        let vertices = [
            vector![1.0, 1.0, 1.0],
            vector![1.0, -1.0, -1.0],
            vector![-1.0, 1.0, -1.0],
            vector![-1.0, -1.0, 1.0],
        ];

        let thrusters = vertices
            .into_iter()
            .map(|vertex: Vector3<FloatType>| Thruster {
                position: vertex * scale,
                normal: vertex.normalize(),
            })
            .collect();

        Self { thrusters }
    }

    /// Random layout: positions from a standard normal, normals uniform on the sphere
    pub fn random(count: usize, rng: &mut impl Rng) -> Result<Self> {
        let thrusters = (0..count)
            .map(|_| Thruster {
                position: standard_normal(rng),
                normal: random_unit_vector(rng),
            })
            .collect();

        Self::new(thrusters)
    }

    pub fn thrusters(&self) -> &[Thruster] {
        &self.thrusters
    }

    pub fn len(&self) -> usize {
        self.thrusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thrusters.is_empty()
    }

    /// Length of a stacked force vector, three components per thruster
    pub fn force_dimension(&self) -> usize {
        3 * self.thrusters.len()
    }

    /// The 6 x 3N map taking stacked thruster forces to `[net force; net torque]`
    pub fn wrench_matrix(&self) -> DMatrix<FloatType> {
        let mut matrix = DMatrix::zeros(WRENCH_DIMENSION, self.force_dimension());

        for (idx, thruster) in self.thrusters.iter().enumerate() {
            matrix
                .fixed_view_mut::<3, 3>(0, 3 * idx)
                .copy_from(&Matrix3::identity());
            // position x force as a linear map of force
            matrix
                .fixed_view_mut::<3, 3>(3, 3 * idx)
                .copy_from(&thruster.position.cross_matrix());
        }

        debug!(thrusters = self.thrusters.len(), "Built wrench matrix");

        matrix
    }

    /// Net wrench produced by stacked thruster forces
    pub fn net_wrench(&self, forces: &DVector<FloatType>) -> Wrench {
        let mut wrench = Wrench::default();

        for (thruster, force) in self.thrusters.iter().zip(thruster_forces(forces)) {
            wrench.force += force;
            wrench.torque += thruster.position.cross(&force);
        }

        wrench
    }
}

/// Splits a stacked 3N force vector into per thruster 3-vectors
pub fn thruster_forces(
    forces: &DVector<FloatType>,
) -> impl Iterator<Item = Vector3<FloatType>> + '_ {
    forces
        .as_slice()
        .chunks_exact(3)
        .map(|chunk| vector![chunk[0], chunk[1], chunk[2]])
}

fn standard_normal(rng: &mut impl Rng) -> Vector3<FloatType> {
    Vector3::from_fn(|_, _| rng.sample(StandardNormal))
}

// A normalized standard normal sample is uniform on the sphere
fn random_unit_vector(rng: &mut impl Rng) -> Vector3<FloatType> {
    loop {
        if let Some(unit) = standard_normal(rng).try_normalize(1e-6) {
            return unit;
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct ThrusterRecord {
    pub x: FloatType,
    pub y: FloatType,
    pub z: FloatType,
    pub nx: FloatType,
    pub ny: FloatType,
    pub nz: FloatType,
}

impl From<&Thruster> for ThrusterRecord {
    fn from(thruster: &Thruster) -> Self {
        Self {
            x: thruster.position.x,
            y: thruster.position.y,
            z: thruster.position.z,
            nx: thruster.normal.x,
            ny: thruster.normal.y,
            nz: thruster.normal.z,
        }
    }
}

pub fn read_geometry(path: impl AsRef<Path>) -> Result<ThrusterGeometry> {
    let file = File::open(path)?;
    read_geometry_from_reader(file)
}

/// Reads a `x,y,z,nx,ny,nz` CSV, one thruster per row
pub fn read_geometry_from_reader(reader: impl Read) -> Result<ThrusterGeometry> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    for result in reader.into_deserialize() {
        let record: ThrusterRecord = result?;
        positions.push(vector![record.x, record.y, record.z]);
        normals.push(vector![record.nx, record.ny, record.nz]);
    }

    ThrusterGeometry::from_parts(&positions, &normals)
}
