//! Uniform cubic real-space grid centered on the origin.

use crate::error::SolverError;

/// Discretized cubic domain `[-L, L]^3` with `g` points per axis.
///
/// Points are addressed by a row-major flattened index
/// `(i*g + j)*g + k` for axis indices `(i, j, k)`. The mapping between
/// indices and coordinates is fixed for the lifetime of the grid.
#[derive(Debug, Clone)]
pub struct Grid {
    points: usize,
    half_width: f64,
    spacing: f64,
    axis: Vec<f64>,
    radius: Vec<f64>,
}

impl Grid {
    /// Builds the grid from the per-axis point count `g` and half-width `L`.
    pub fn new(points: usize, half_width: f64) -> Result<Self, SolverError> {
        if points < 2 {
            return Err(SolverError::InvalidConfiguration(format!(
                "grid needs at least 2 points per axis, got {}",
                points
            )));
        }
        if !(half_width > 0.0) {
            return Err(SolverError::InvalidConfiguration(format!(
                "grid half-width must be positive, got {}",
                half_width
            )));
        }

        let spacing = 2.0 * half_width / (points as f64 - 1.0);
        let axis: Vec<f64> = (0..points)
            .map(|i| -half_width + i as f64 * spacing)
            .collect();

        let mut radius = Vec::with_capacity(points * points * points);
        for &x in &axis {
            for &y in &axis {
                for &z in &axis {
                    radius.push((x * x + y * y + z * z).sqrt());
                }
            }
        }

        Ok(Grid {
            points,
            half_width,
            spacing,
            axis,
            radius,
        })
    }

    /// Points per axis.
    pub fn points_per_axis(&self) -> usize {
        self.points
    }

    /// Total number of grid points, `g^3`.
    pub fn len(&self) -> usize {
        self.radius.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radius.is_empty()
    }

    /// Half-width `L` of the domain.
    pub fn half_width(&self) -> f64 {
        self.half_width
    }

    /// Lattice spacing `h = 2L/(g-1)`.
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Volume element `h^3` used in grid-weighted integrals.
    pub fn volume_element(&self) -> f64 {
        self.spacing * self.spacing * self.spacing
    }

    /// Axis coordinate values, shared by all three axes.
    pub fn axis(&self) -> &[f64] {
        &self.axis
    }

    /// Radial distance from the origin for every flattened point.
    pub fn radius(&self) -> &[f64] {
        &self.radius
    }

    /// Flattened index of the axis triple `(i, j, k)`.
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.points + j) * self.points + k
    }

    /// Coordinate triple of a flattened index.
    pub fn coordinate(&self, index: usize) -> [f64; 3] {
        let g = self.points;
        let k = index % g;
        let j = (index / g) % g;
        let i = index / (g * g);
        [self.axis[i], self.axis[j], self.axis[k]]
    }

    /// Grid-weighted integral `sum(f) * h^3`.
    pub fn integrate(&self, field: &[f64]) -> f64 {
        field.iter().sum::<f64>() * self.volume_element()
    }
}
