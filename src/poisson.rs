//! Conjugate-gradient Poisson solve for the Hartree potential.
//!
//! The discrete problem is `L3 v = -4 pi (n + ncomp)`. Under Dirichlet
//! truncation `-L3` is symmetric positive definite, so CG runs on the
//! negated system `(-L3) v = 4 pi (n + ncomp)`. The compensation charge on
//! the right-hand side restores net neutrality on the finite box; its
//! analytic potential is subtracted from the raw solution afterwards.
//!
//! `solve`/`hartree_potential` fail on a hit iteration cap; the `_partial`
//! variants return the flagged best iterate instead, for callers whose
//! stall policy accepts degraded solves.

use crate::cancel::CancelToken;
use crate::error::SolverError;
use crate::operator::CsrMatrix;
use crate::potential::StaticPotentials;

const FOUR_PI: f64 = 4.0 * std::f64::consts::PI;
/// Inner-loop granularity of cancellation checks.
const CANCEL_STRIDE: usize = 32;

/// Result of one linear solve. `converged` is false when the iteration cap
/// was reached first; `potential` then holds the best iterate.
#[derive(Debug, Clone)]
pub struct PoissonSolution {
    pub potential: Vec<f64>,
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
}

impl PoissonSolution {
    fn stall_error(&self) -> SolverError {
        SolverError::SolverDidNotConverge {
            iterations: self.iterations,
            residual: self.residual,
        }
    }
}

/// Conjugate-gradient solver with a relative-residual stopping rule.
#[derive(Debug, Clone, Copy)]
pub struct PoissonSolver {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl PoissonSolver {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        PoissonSolver {
            tolerance,
            max_iterations,
        }
    }

    /// Same solver with an enlarged iteration budget, for stall retries.
    pub fn with_budget_factor(&self, factor: usize) -> Self {
        PoissonSolver {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations * factor,
        }
    }

    /// Hartree potential of the density: assembles the neutralized
    /// right-hand side, solves, and removes the compensation contribution.
    pub fn hartree_potential(
        &self,
        laplacian: &CsrMatrix,
        density: &[f64],
        statics: &StaticPotentials,
        cancel: Option<&CancelToken>,
    ) -> Result<PoissonSolution, SolverError> {
        let solution = self.hartree_partial(laplacian, density, statics, cancel)?;
        if solution.converged {
            Ok(solution)
        } else {
            Err(solution.stall_error())
        }
    }

    /// `hartree_potential` without the convergence gate.
    pub fn hartree_partial(
        &self,
        laplacian: &CsrMatrix,
        density: &[f64],
        statics: &StaticPotentials,
        cancel: Option<&CancelToken>,
    ) -> Result<PoissonSolution, SolverError> {
        if density.len() != laplacian.dim() {
            return Err(SolverError::DimensionMismatch {
                expected: laplacian.dim(),
                found: density.len(),
            });
        }
        let rhs: Vec<f64> = density
            .iter()
            .zip(&statics.comp_charge)
            .map(|(&n, &c)| FOUR_PI * (n + c))
            .collect();
        let mut solution = self.solve_partial(laplacian, &rhs, cancel)?;
        for (v, &c) in solution.potential.iter_mut().zip(&statics.comp_potential) {
            *v -= c;
        }
        Ok(solution)
    }

    /// Solves `(-L3) x = b`, failing on a hit iteration cap.
    pub fn solve(
        &self,
        laplacian: &CsrMatrix,
        b: &[f64],
        cancel: Option<&CancelToken>,
    ) -> Result<PoissonSolution, SolverError> {
        let solution = self.solve_partial(laplacian, b, cancel)?;
        if solution.converged {
            Ok(solution)
        } else {
            Err(solution.stall_error())
        }
    }

    /// Plain conjugate gradients on `(-L3) x = b`, run to tolerance or cap.
    pub fn solve_partial(
        &self,
        laplacian: &CsrMatrix,
        b: &[f64],
        cancel: Option<&CancelToken>,
    ) -> Result<PoissonSolution, SolverError> {
        let n = laplacian.dim();
        if b.len() != n {
            return Err(SolverError::DimensionMismatch {
                expected: n,
                found: b.len(),
            });
        }

        let b_norm = norm(b);
        let mut x = vec![0.0; n];
        if b_norm == 0.0 {
            return Ok(PoissonSolution {
                potential: x,
                iterations: 0,
                residual: 0.0,
                converged: true,
            });
        }

        let mut r = b.to_vec();
        let mut p = b.to_vec();
        let mut ap = vec![0.0; n];
        let mut rr = b_norm * b_norm;

        for iteration in 0..self.max_iterations {
            if iteration % CANCEL_STRIDE == 0 {
                if let Some(token) = cancel {
                    if token.is_cancelled() {
                        return Err(SolverError::Cancelled);
                    }
                }
            }

            laplacian.apply_affine(-1.0, None, &p, &mut ap);
            let alpha = rr / dot(&p, &ap);
            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }
            let rr_next = dot(&r, &r);
            if rr_next.sqrt() <= self.tolerance * b_norm {
                return Ok(PoissonSolution {
                    potential: x,
                    iterations: iteration + 1,
                    residual: rr_next.sqrt() / b_norm,
                    converged: true,
                });
            }
            let beta = rr_next / rr;
            rr = rr_next;
            for i in 0..n {
                p[i] = r[i] + beta * p[i];
            }
        }

        Ok(PoissonSolution {
            potential: x,
            iterations: self.max_iterations,
            residual: rr.sqrt() / b_norm,
            converged: false,
        })
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}
