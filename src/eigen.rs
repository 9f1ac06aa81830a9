//! Lanczos eigensolver for the lowest states of the effective Hamiltonian.
//!
//! Bands are extracted one at a time: each runs a Lanczos recurrence with
//! full reorthogonalization, deflated against all previously converged
//! bands, and watches the smallest Ritz pair of the projected tridiagonal
//! system. A band is accepted when its Ritz residual `beta * |y_last|`
//! drops below the solver tolerance, on happy breakdown, or when the
//! Krylov space has exhausted the deflated subspace (the projection is
//! then exact). Deflation makes repeated eigenvalues reachable: once one
//! copy of a degenerate level is locked, the next copy is extremal in the
//! orthogonal complement.
//!
//! `lowest` fails when a band exhausts its iteration budget; the
//! `lowest_partial` variant accepts the band at its best Ritz estimate and
//! reports the stall alongside, for callers with a degrading stall policy.

use nalgebra::DMatrix;

use crate::cancel::CancelToken;
use crate::error::SolverError;
use crate::operator::LinearOperator;

const CANCEL_STRIDE: usize = 32;
/// Below this recurrence norm the Krylov space is invariant.
const BREAKDOWN: f64 = 1e-12;

/// Eigenpairs ascending by eigenvalue, with per-band Lanczos iteration
/// counts. Vectors are unit Euclidean norm; volume-integral normalization
/// for densities happens downstream.
#[derive(Debug, Clone)]
pub struct EigenPairs {
    pub values: Vec<f64>,
    pub vectors: Vec<Vec<f64>>,
    pub iterations: Vec<usize>,
}

struct BandResult {
    value: f64,
    vector: Vec<f64>,
    iterations: usize,
    residual: f64,
    converged: bool,
}

/// Deflated Lanczos solver for the `k` algebraically-smallest eigenpairs.
#[derive(Debug, Clone, Copy)]
pub struct LanczosSolver {
    pub num_states: usize,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl LanczosSolver {
    pub fn new(num_states: usize, tolerance: f64, max_iterations: usize) -> Self {
        LanczosSolver {
            num_states,
            tolerance,
            max_iterations,
        }
    }

    /// Same solver with an enlarged per-band budget, for stall retries.
    pub fn with_budget_factor(&self, factor: usize) -> Self {
        LanczosSolver {
            num_states: self.num_states,
            tolerance: self.tolerance,
            max_iterations: self.max_iterations * factor,
        }
    }

    /// Computes the lowest `num_states` eigenpairs of `op`. `initial`
    /// seeds band `b` with `initial[b]` where available (warm start from
    /// a previous cycle); missing bands fall back to a deterministic
    /// seeded start vector.
    pub fn lowest<O: LinearOperator>(
        &self,
        op: &O,
        initial: Option<&[Vec<f64>]>,
        cancel: Option<&CancelToken>,
    ) -> Result<EigenPairs, SolverError> {
        let (pairs, stall) = self.lowest_partial(op, initial, cancel)?;
        match stall {
            Some(error) => Err(error),
            None => Ok(pairs),
        }
    }

    /// Like `lowest`, but a stalled band is kept at its best Ritz estimate
    /// and the first stall is returned alongside the pairs.
    pub fn lowest_partial<O: LinearOperator>(
        &self,
        op: &O,
        initial: Option<&[Vec<f64>]>,
        cancel: Option<&CancelToken>,
    ) -> Result<(EigenPairs, Option<SolverError>), SolverError> {
        let n = op.dim();
        if self.num_states == 0 || self.num_states > n {
            return Err(SolverError::InvalidConfiguration(format!(
                "cannot extract {} eigenstates from an operator of dimension {}",
                self.num_states, n
            )));
        }

        let mut pairs = EigenPairs {
            values: Vec::with_capacity(self.num_states),
            vectors: Vec::with_capacity(self.num_states),
            iterations: Vec::with_capacity(self.num_states),
        };
        let mut stall: Option<SolverError> = None;

        for band in 0..self.num_states {
            let start = initial
                .and_then(|vs| vs.get(band))
                .filter(|v| v.len() == n)
                .cloned()
                .unwrap_or_else(|| seeded_vector(n, band as u64));
            let result = self.run_band(op, &pairs.vectors, start, cancel)?;
            if !result.converged && stall.is_none() {
                stall = Some(SolverError::EigenSolverDidNotConverge {
                    band,
                    iterations: result.iterations,
                    residual: result.residual,
                });
            }
            pairs.values.push(result.value);
            pairs.vectors.push(result.vector);
            pairs.iterations.push(result.iterations);
        }

        Ok((pairs, stall))
    }

    fn run_band<O: LinearOperator>(
        &self,
        op: &O,
        locked: &[Vec<f64>],
        start: Vec<f64>,
        cancel: Option<&CancelToken>,
    ) -> Result<BandResult, SolverError> {
        let n = op.dim();
        let space = n - locked.len();

        let mut v = start;
        project_out(&mut v, locked);
        project_out(&mut v, locked);
        if normalize(&mut v) < BREAKDOWN {
            // start vector lived entirely in the locked span
            v = seeded_vector(n, 0x5eed + locked.len() as u64);
            project_out(&mut v, locked);
            project_out(&mut v, locked);
            normalize(&mut v);
        }

        let mut basis: Vec<Vec<f64>> = vec![v];
        let mut alpha: Vec<f64> = Vec::new();
        let mut beta: Vec<f64> = Vec::new();
        let mut w = vec![0.0; n];
        let mut best = (f64::INFINITY, Vec::new(), f64::INFINITY);

        for j in 0..self.max_iterations {
            if j % CANCEL_STRIDE == 0 {
                if let Some(token) = cancel {
                    if token.is_cancelled() {
                        return Err(SolverError::Cancelled);
                    }
                }
            }

            op.apply(&basis[j], &mut w);
            if j > 0 {
                axpy(-beta[j - 1], &basis[j - 1], &mut w);
            }
            let a = dot(&basis[j], &w);
            alpha.push(a);
            axpy(-a, &basis[j], &mut w);
            // full reorthogonalization against locked bands and the whole
            // Krylov basis, two passes
            for _ in 0..2 {
                project_out(&mut w, locked);
                project_out(&mut w, &basis);
            }

            let b = dot(&w, &w).sqrt();
            let (theta, y) = smallest_ritz(&alpha, &beta);
            let residual = b * y[j].abs();
            best = (theta, y, residual);

            if residual <= self.tolerance || b <= BREAKDOWN || j + 1 >= space {
                return Ok(BandResult {
                    value: theta,
                    vector: assemble(&basis, &best.1, n),
                    iterations: j + 1,
                    residual,
                    converged: true,
                });
            }

            beta.push(b);
            for slot in &mut w {
                *slot /= b;
            }
            basis.push(std::mem::replace(&mut w, vec![0.0; n]));
        }

        Ok(BandResult {
            value: best.0,
            vector: assemble(&basis, &best.1, n),
            iterations: self.max_iterations,
            residual: best.2,
            converged: false,
        })
    }
}

fn assemble(basis: &[Vec<f64>], y: &[f64], n: usize) -> Vec<f64> {
    let mut x = vec![0.0; n];
    for (q, &coeff) in basis.iter().zip(y) {
        axpy(coeff, q, &mut x);
    }
    normalize(&mut x);
    x
}

/// Smallest eigenpair of the Lanczos tridiagonal projection.
fn smallest_ritz(alpha: &[f64], beta: &[f64]) -> (f64, Vec<f64>) {
    let m = alpha.len();
    let mut t = DMatrix::zeros(m, m);
    for i in 0..m {
        t[(i, i)] = alpha[i];
        if i + 1 < m {
            t[(i, i + 1)] = beta[i];
            t[(i + 1, i)] = beta[i];
        }
    }
    let eig = t.symmetric_eigen();
    let mut best = 0;
    for i in 1..m {
        if eig.eigenvalues[i] < eig.eigenvalues[best] {
            best = i;
        }
    }
    let y: Vec<f64> = eig.eigenvectors.column(best).iter().copied().collect();
    (eig.eigenvalues[best], y)
}

/// Deterministic start vector; `seed` keeps distinct bands distinct.
pub(crate) fn seeded_vector(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(0xD1B5_4A32_D192_ED03);
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
        })
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

fn axpy(coeff: f64, src: &[f64], dst: &mut [f64]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d += coeff * s;
    }
}

fn normalize(v: &mut [f64]) -> f64 {
    let nrm = dot(v, v).sqrt();
    if nrm > 0.0 {
        for slot in v.iter_mut() {
            *slot /= nrm;
        }
    }
    nrm
}

fn project_out(v: &mut [f64], basis: &[Vec<f64>]) {
    for q in basis {
        let c = dot(q, v);
        axpy(-c, q, v);
    }
}
