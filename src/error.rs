use thiserror::Error;

use crate::FloatType;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("thruster geometry needs at least one thruster")]
    NoThrusters,
    #[error("thruster {index} has a zero length normal")]
    ZeroNormal { index: usize },
    #[error("got {positions} thruster positions but {normals} normals")]
    MismatchedParts { positions: usize, normals: usize },
    #[error("a wrench has 6 components, got {0}")]
    WrenchLength(usize),
    #[error("wrench map has rank {rank} and cannot realize the target (residual {residual:.3e})")]
    DegenerateGeometry { rank: usize, residual: FloatType },
    #[error("pseudo-inverse failed: {0}")]
    PseudoInverse(&'static str),
    #[error("wrench direction has zero length")]
    ZeroDirection,
    #[error("wrench direction has a non-finite component")]
    NonFiniteDirection,
    #[error("no feasible scale found after {halvings} halvings")]
    NoFeasibleScale { halvings: u32 },
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
