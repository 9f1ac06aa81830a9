//! Typed failure conditions for the solver pipeline.

use std::error::Error;
use std::fmt;

/// Error type shared by every stage of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Grid or physical parameters rejected before any solve begins.
    InvalidConfiguration(String),
    /// A lattice point coincides with the coordinate origin, where the
    /// nuclear potential diverges. The field records the flattened index.
    SingularPotential { index: usize },
    /// The Poisson conjugate-gradient solve hit its iteration cap above
    /// tolerance. Recoverable: the driver's stall policy decides.
    SolverDidNotConverge { iterations: usize, residual: f64 },
    /// A Lanczos band exhausted its iteration budget. Recoverable like
    /// the Poisson case.
    EigenSolverDidNotConverge {
        band: usize,
        iterations: usize,
        residual: f64,
    },
    /// The density came out negative or non-finite beyond rounding,
    /// indicating a deeper numerical fault.
    InvalidDensity { index: usize, value: f64 },
    /// Operator and vector lengths disagree. Programming error.
    DimensionMismatch { expected: usize, found: usize },
    /// The run was aborted through a cancellation token.
    Cancelled,
}

impl SolverError {
    /// Whether the driver may retry or degrade instead of failing outright.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SolverError::SolverDidNotConverge { .. }
                | SolverError::EigenSolverDidNotConverge { .. }
        )
    }
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::InvalidConfiguration(msg) => {
                write!(f, "invalid configuration: {}", msg)
            }
            SolverError::SingularPotential { index } => {
                write!(
                    f,
                    "grid point {} sits at the coordinate origin where the nuclear potential is singular",
                    index
                )
            }
            SolverError::SolverDidNotConverge { iterations, residual } => {
                write!(
                    f,
                    "Poisson solve stopped after {} iterations at relative residual {:.3e}",
                    iterations, residual
                )
            }
            SolverError::EigenSolverDidNotConverge {
                band,
                iterations,
                residual,
            } => {
                write!(
                    f,
                    "eigensolver band {} stopped after {} iterations at residual {:.3e}",
                    band, iterations, residual
                )
            }
            SolverError::InvalidDensity { index, value } => {
                write!(f, "invalid density {} at grid point {}", value, index)
            }
            SolverError::DimensionMismatch { expected, found } => {
                write!(
                    f,
                    "dimension mismatch: expected length {}, found {}",
                    expected, found
                )
            }
            SolverError::Cancelled => write!(f, "run cancelled"),
        }
    }
}

impl Error for SolverError {}
