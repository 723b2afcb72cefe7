use std::{
    f64::consts::PI,
    fmt::{self, Display},
};

use hexasphere::shapes::IcoSphere;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{FloatType, Wrench};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvelopeKind {
    Force,
    Torque,
}

impl EnvelopeKind {
    pub const ALL: [EnvelopeKind; 2] = [EnvelopeKind::Force, EnvelopeKind::Torque];

    /// Lifts a 3D direction to a pure force or pure torque wrench
    pub fn wrench(&self, direction: Vector3<FloatType>) -> Wrench {
        match self {
            EnvelopeKind::Force => Wrench::pure_force(direction),
            EnvelopeKind::Torque => Wrench::pure_torque(direction),
        }
    }

    pub fn wrenches(&self, directions: &[Vector3<FloatType>]) -> Vec<Wrench> {
        directions.iter().map(|&it| self.wrench(it)).collect()
    }
}

impl Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeKind::Force => write!(f, "force"),
            EnvelopeKind::Torque => write!(f, "torque"),
        }
    }
}

/// The 12 vertices of a regular icosahedron, as unit vectors
pub fn icosahedron_vertices() -> Vec<Vector3<FloatType>> {
    icosphere_directions(0)
}

/// Vertices of a subdivided icosahedron, as unit vectors
pub fn icosphere_directions(subdivisions: usize) -> Vec<Vector3<FloatType>> {
    let generated = IcoSphere::new(subdivisions, |_| ());

    generated
        .raw_points()
        .iter()
        .map(|&point| Vector3::from(point.normalize()).cast::<FloatType>())
        .collect()
}

/// `samples` nearly evenly spaced unit vectors on a golden angle spiral around z
///
/// Each point sits at the middle of an equal area latitude band, so neither pole is
/// sampled twice and a single sample lands on the equator.
pub fn fibonacci_sphere(samples: usize) -> Vec<Vector3<FloatType>> {
    let golden_angle = PI * (3.0 - FloatType::sqrt(5.0));
    let bands = samples as FloatType;

    (0..samples)
        .map(|idx| {
            let z = 1.0 - (2 * idx + 1) as FloatType / bands;
            let ring = (1.0 - z * z).sqrt();
            let (sin, cos) = (golden_angle * idx as FloatType).sin_cos();

            Vector3::new(ring * cos, ring * sin, z)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use nalgebra::vector;

    use super::*;

    #[test]
    fn icosahedron_has_twelve_unit_vertices() {
        let vertices = icosahedron_vertices();

        assert_eq!(vertices.len(), 12);
        for vertex in &vertices {
            assert!((vertex.norm() - 1.0).abs() < 1e-6);
            // Every vertex has its antipode
            assert!(vertices.iter().any(|other| (other + vertex).norm() < 1e-5));
        }
    }

    #[test]
    fn subdivision_adds_points() {
        assert!(icosphere_directions(1).len() > icosahedron_vertices().len());
    }

    #[test]
    fn fibonacci_points_cover_the_sphere() {
        let points = fibonacci_sphere(200);

        assert_eq!(points.len(), 200);
        assert!(points.iter().all(|it| (it.norm() - 1.0).abs() < 1e-9));
        // Evenly spread points balance out
        let centroid = points.iter().sum::<Vector3<FloatType>>() / 200.0;
        assert!(centroid.norm() < 0.05, "{centroid}");
        assert!(points.windows(2).all(|pair| pair[1].z < pair[0].z));
    }

    #[test]
    fn single_fibonacci_point_is_on_the_equator() {
        let points = fibonacci_sphere(1);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0], vector![1.0, 0.0, 0.0]);
        assert!(fibonacci_sphere(0).is_empty());
    }

    #[test]
    fn kinds_lift_directions() {
        let direction = vector![0.0, 0.6, 0.8];

        assert_eq!(EnvelopeKind::Force.wrench(direction).force, direction);
        assert_eq!(
            EnvelopeKind::Torque.wrench(direction).force,
            Vector3::zeros()
        );
        assert_eq!(EnvelopeKind::Torque.to_string(), "torque");
    }
}
