//! Finite-difference Laplacian operators on the grid.
//!
//! The 1-D second derivative uses the central three-point stencil
//! `[1, -2, 1]/h^2`. The 3-D operator is the Kronecker sum
//! `L (x) I (x) I + I (x) L (x) I + I (x) I (x) L`, which collapses to the
//! 7-point stencil and is assembled row by row directly in compressed-row
//! storage, so the full `g^3 x g^3` operator never exists densely. Points
//! outside the grid are treated as zero (Dirichlet truncation).

use crate::grid::Grid;
use crate::operator::CsrMatrix;

/// 1-D second-derivative operator on `points` lattice sites.
pub fn second_difference(points: usize, spacing: f64) -> CsrMatrix {
    let inv_h2 = 1.0 / (spacing * spacing);
    let mut row_ptr = Vec::with_capacity(points + 1);
    let mut col_idx = Vec::with_capacity(3 * points);
    let mut values = Vec::with_capacity(3 * points);

    row_ptr.push(0);
    for i in 0..points {
        if i > 0 {
            col_idx.push(i - 1);
            values.push(inv_h2);
        }
        col_idx.push(i);
        values.push(-2.0 * inv_h2);
        if i + 1 < points {
            col_idx.push(i + 1);
            values.push(inv_h2);
        }
        row_ptr.push(col_idx.len());
    }

    CsrMatrix::from_parts(points, row_ptr, col_idx, values)
}

/// 3-D Laplacian on the grid as a sparse 7-point operator.
pub fn laplacian_3d(grid: &Grid) -> CsrMatrix {
    let g = grid.points_per_axis();
    let n = grid.len();
    let inv_h2 = 1.0 / (grid.spacing() * grid.spacing());
    let plane = g * g;

    let mut row_ptr = Vec::with_capacity(n + 1);
    let mut col_idx = Vec::with_capacity(7 * n);
    let mut values = Vec::with_capacity(7 * n);

    row_ptr.push(0);
    for i in 0..g {
        for j in 0..g {
            for k in 0..g {
                let row = grid.index(i, j, k);
                // columns pushed in ascending order: -g^2, -g, -1, 0, +1, +g, +g^2
                if i > 0 {
                    col_idx.push(row - plane);
                    values.push(inv_h2);
                }
                if j > 0 {
                    col_idx.push(row - g);
                    values.push(inv_h2);
                }
                if k > 0 {
                    col_idx.push(row - 1);
                    values.push(inv_h2);
                }
                col_idx.push(row);
                values.push(-6.0 * inv_h2);
                if k + 1 < g {
                    col_idx.push(row + 1);
                    values.push(inv_h2);
                }
                if j + 1 < g {
                    col_idx.push(row + g);
                    values.push(inv_h2);
                }
                if i + 1 < g {
                    col_idx.push(row + plane);
                    values.push(inv_h2);
                }
                row_ptr.push(col_idx.len());
            }
        }
    }

    CsrMatrix::from_parts(n, row_ptr, col_idx, values)
}
