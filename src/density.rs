//! Occupied electron density from the lowest orbital.

use crate::error::SolverError;
use crate::ELECTRON_COUNT;

/// Forms `n = 2 psi^2` from the lowest eigenvector.
///
/// The eigenvector is normalized by its Euclidean norm and rescaled by
/// `h^{-3/2}`, so the volume integral `sum(psi^2) h^3` is one and the
/// density integrates to the electron count. Non-finite input is a solver
/// fault and raises `InvalidDensity`.
pub fn occupied_density(psi: &[f64], spacing: f64) -> Result<Vec<f64>, SolverError> {
    let mut norm_sq = 0.0;
    for (index, &c) in psi.iter().enumerate() {
        if !c.is_finite() {
            return Err(SolverError::InvalidDensity { index, value: c });
        }
        norm_sq += c * c;
    }
    if norm_sq <= 0.0 {
        return Err(SolverError::InvalidDensity {
            index: 0,
            value: 0.0,
        });
    }

    let scale = 1.0 / (norm_sq.sqrt() * spacing.powf(1.5));
    Ok(psi
        .iter()
        .map(|&c| {
            let wave = c * scale;
            ELECTRON_COUNT * wave * wave
        })
        .collect())
}

/// Checks a density field for the non-negativity invariant. Mixing of
/// valid densities preserves it, so a violation means an upstream fault.
pub fn validate(density: &[f64]) -> Result<(), SolverError> {
    for (index, &value) in density.iter().enumerate() {
        if !value.is_finite() || value < -1e-12 {
            return Err(SolverError::InvalidDensity { index, value });
        }
    }
    Ok(())
}
