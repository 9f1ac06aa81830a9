//! Static external potential and the neutralizing compensation pair.

use crate::error::SolverError;
use crate::grid::Grid;
use crate::ELECTRON_COUNT;

/// Potentials and charges fixed at setup, shared read-only by every cycle.
///
/// `comp_charge` is a Gaussian `-C exp(-r^2/2)` scaled so its grid-weighted
/// sum is exactly `-ELECTRON_COUNT`; adding it to the electron density makes
/// the Poisson right-hand side net-neutral on the finite box. Its closed-form
/// electrostatic potential `comp_potential = -(2/r) erf(r/sqrt(2))` is
/// subtracted from the raw Hartree solve to undo that addition.
#[derive(Debug, Clone)]
pub struct StaticPotentials {
    pub external: Vec<f64>,
    pub comp_charge: Vec<f64>,
    pub comp_potential: Vec<f64>,
}

impl StaticPotentials {
    pub fn build(grid: &Grid, nuclear_charge: f64) -> Result<Self, SolverError> {
        if !(nuclear_charge > 0.0) {
            return Err(SolverError::InvalidConfiguration(format!(
                "nuclear charge must be positive, got {}",
                nuclear_charge
            )));
        }

        // A symmetric grid puts a lattice point on the origin exactly when
        // the per-axis count is odd; the bare-Coulomb terms diverge there.
        let origin_tol = grid.spacing() * 1e-9;
        if let Some(index) = grid.radius().iter().position(|&r| r < origin_tol) {
            return Err(SolverError::SingularPotential { index });
        }

        let n = grid.len();
        let mut external = Vec::with_capacity(n);
        let mut comp_charge = Vec::with_capacity(n);
        let mut comp_potential = Vec::with_capacity(n);

        let mut gauss_sum = 0.0;
        for &r in grid.radius() {
            external.push(-nuclear_charge / r);
            let gauss = -(-0.5 * r * r).exp();
            gauss_sum += gauss;
            comp_charge.push(gauss);
            comp_potential.push(-(2.0 / r) * libm::erf(r / std::f64::consts::SQRT_2));
        }

        // normalize the Gaussian so sum(comp_charge) * h^3 = -ELECTRON_COUNT
        let scale = -ELECTRON_COUNT / (gauss_sum * grid.volume_element());
        for q in &mut comp_charge {
            *q *= scale;
        }

        Ok(StaticPotentials {
            external,
            comp_charge,
            comp_potential,
        })
    }
}
