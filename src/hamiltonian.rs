//! Effective one-electron Hamiltonian.

use crate::error::SolverError;
use crate::operator::{CsrMatrix, LinearOperator};

/// Kinetic prefactor `-hbar^2 / (2m)` in atomic units.
const KINETIC_SCALE: f64 = -0.5;

/// Kinetic operator plus a summed diagonal potential.
///
/// The sum `T + Vext + V_H + Vx` is never materialized as a matrix: the
/// diagonal terms collapse into one vector and the operator applies as
/// `y = -1/2 (L3 x) + veff .* x` in a single sparse pass.
#[derive(Debug, Clone)]
pub struct Hamiltonian<'a> {
    laplacian: &'a CsrMatrix,
    potential: Vec<f64>,
}

impl<'a> Hamiltonian<'a> {
    /// Sums the diagonal potentials over the kinetic operator. Every
    /// potential must match the operator dimension.
    pub fn assemble(
        laplacian: &'a CsrMatrix,
        potentials: &[&[f64]],
    ) -> Result<Self, SolverError> {
        let n = laplacian.dim();
        let mut potential = vec![0.0; n];
        for part in potentials {
            if part.len() != n {
                return Err(SolverError::DimensionMismatch {
                    expected: n,
                    found: part.len(),
                });
            }
            for (acc, &v) in potential.iter_mut().zip(part.iter()) {
                *acc += v;
            }
        }
        Ok(Hamiltonian {
            laplacian,
            potential,
        })
    }

    /// The summed effective potential diagonal.
    pub fn potential(&self) -> &[f64] {
        &self.potential
    }
}

impl LinearOperator for Hamiltonian<'_> {
    fn dim(&self) -> usize {
        self.laplacian.dim()
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        self.laplacian
            .apply_affine(KINETIC_SCALE, Some(&self.potential), x, y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::laplacian::laplacian_3d;

    #[test]
    fn apply_is_kinetic_plus_potential() {
        let grid = Grid::new(6, 2.0).unwrap();
        let lap = laplacian_3d(&grid);
        let va: Vec<f64> = (0..grid.len()).map(|i| i as f64 * 0.01).collect();
        let vb: Vec<f64> = (0..grid.len()).map(|i| 1.0 - i as f64 * 0.005).collect();
        let h = Hamiltonian::assemble(&lap, &[&va, &vb]).unwrap();

        let x: Vec<f64> = (0..grid.len()).map(|i| ((i * 7) % 13) as f64).collect();
        let mut got = vec![0.0; grid.len()];
        h.apply(&x, &mut got);

        let mut lap_x = vec![0.0; grid.len()];
        lap.apply_affine(1.0, None, &x, &mut lap_x);
        for i in 0..grid.len() {
            let expected = -0.5 * lap_x[i] + (va[i] + vb[i]) * x[i];
            assert!(
                (got[i] - expected).abs() < 1e-11,
                "component {}: {} vs {}",
                i,
                got[i],
                expected
            );
        }
    }

    #[test]
    fn mismatched_potential_is_rejected() {
        let grid = Grid::new(4, 2.0).unwrap();
        let lap = laplacian_3d(&grid);
        let short = vec![0.0; grid.len() - 1];
        match Hamiltonian::assemble(&lap, &[&short]) {
            Err(SolverError::DimensionMismatch { expected, found }) => {
                assert_eq!(expected, grid.len());
                assert_eq!(found, grid.len() - 1);
            }
            other => panic!("expected DimensionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn empty_potential_list_is_pure_kinetic() {
        let grid = Grid::new(4, 2.0).unwrap();
        let lap = laplacian_3d(&grid);
        let h = Hamiltonian::assemble(&lap, &[]).unwrap();
        assert!(h.potential().iter().all(|&v| v == 0.0));
        assert_eq!(h.dim(), grid.len());
    }
}
