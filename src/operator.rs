//! Sparse linear operators in compressed-row storage.

use rayon::prelude::*;

/// Row-parallel chunk size for matrix-vector products.
const PAR_CHUNK: usize = 1024;

/// A real square linear operator that can be applied to a vector.
pub trait LinearOperator {
    fn dim(&self) -> usize;

    /// Computes `y = A x`. Panics if the slice lengths disagree with
    /// `dim()`; length agreement is the caller's contract.
    fn apply(&self, x: &[f64], y: &mut [f64]);
}

/// Square sparse matrix, compressed-row storage, explicit index bookkeeping.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    dim: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Assembles a matrix from raw CSR arrays. The arrays must describe
    /// `dim` rows with ascending column indices inside each row.
    pub fn from_parts(
        dim: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        assert_eq!(row_ptr.len(), dim + 1, "row pointer array length");
        assert_eq!(col_idx.len(), values.len(), "column/value array lengths");
        assert_eq!(*row_ptr.last().unwrap_or(&0), values.len(), "row pointer tail");
        CsrMatrix {
            dim,
            row_ptr,
            col_idx,
            values,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Stored entries of one row as `(column, value)` pairs.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let span = self.row_ptr[row]..self.row_ptr[row + 1];
        self.col_idx[span.clone()]
            .iter()
            .zip(&self.values[span])
            .map(|(&c, &v)| (c, v))
    }

    /// Computes `y = scale * (A x) + diag .* x` in a single row-parallel
    /// pass. `diag` of `None` drops the pointwise term. This one routine
    /// backs the plain Laplacian apply (`scale = 1`), the negated Poisson
    /// system (`scale = -1`), and the kinetic-plus-potential Hamiltonian
    /// (`scale = -1/2`, `diag = effective potential`).
    pub fn apply_affine(&self, scale: f64, diag: Option<&[f64]>, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.dim, "input vector length");
        assert_eq!(y.len(), self.dim, "output vector length");
        if let Some(d) = diag {
            assert_eq!(d.len(), self.dim, "diagonal length");
        }

        let row_ptr = &self.row_ptr;
        let col_idx = &self.col_idx;
        let values = &self.values;
        y.par_chunks_mut(PAR_CHUNK)
            .enumerate()
            .for_each(|(chunk, out)| {
                let base = chunk * PAR_CHUNK;
                for (offset, slot) in out.iter_mut().enumerate() {
                    let row = base + offset;
                    let mut acc = 0.0;
                    for t in row_ptr[row]..row_ptr[row + 1] {
                        acc += values[t] * x[col_idx[t]];
                    }
                    let mut val = scale * acc;
                    if let Some(d) = diag {
                        val += d[row] * x[row];
                    }
                    *slot = val;
                }
            });
    }
}

impl LinearOperator for CsrMatrix {
    fn dim(&self) -> usize {
        self.dim
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        self.apply_affine(1.0, None, x, y);
    }
}
