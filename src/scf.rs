//! Self-consistent-field driver.
//!
//! One cycle assembles the effective Hamiltonian from the current
//! potentials, extracts the lowest eigenpairs, forms and mixes the
//! occupied density, and recomputes the Hartree and exchange potentials
//! for the next cycle. The first cycle sees the external potential alone.
//! The loop stops when the total-energy change drops below the
//! convergence threshold, the cycle cap is reached, or a component fails;
//! every run ends in exactly one of `Converged`, `MaxIterationsExceeded`,
//! or `Failed`.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::density;
use crate::eigen::{seeded_vector, EigenPairs, LanczosSolver};
use crate::error::SolverError;
use crate::grid::Grid;
use crate::hamiltonian::Hamiltonian;
use crate::laplacian::laplacian_3d;
use crate::operator::CsrMatrix;
use crate::poisson::{PoissonSolution, PoissonSolver};
use crate::potential::StaticPotentials;
use crate::xc;
use crate::{ELECTRON_COUNT, EV_PER_HARTREE};

/// Iteration-budget multiplier for the `Retry` stall policy.
const RETRY_BUDGET_FACTOR: usize = 4;

/// Response to a recoverable inner-solver stall (Poisson or eigensolver
/// hitting its iteration cap above tolerance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StallPolicy {
    /// Rerun the stalled solve once with a 4x iteration budget, then fail.
    Retry,
    /// Accept the partial result with a warning and keep iterating.
    Degrade,
    /// Terminate the run immediately.
    Fail,
}

/// Numeric inputs of one SCF run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScfParameters {
    pub grid_points: usize,
    pub half_width: f64,
    pub nuclear_charge: f64,
    pub eigenstates: usize,
    pub density_mixing: f64,
    pub convergence_threshold: f64,
    pub max_cycle: usize,
    pub stall_policy: StallPolicy,
    pub poisson_tolerance: f64,
    pub poisson_max_iterations: usize,
    pub eigen_tolerance: f64,
    pub eigen_max_iterations: usize,
}

impl Default for ScfParameters {
    fn default() -> Self {
        ScfParameters {
            grid_points: 30,
            half_width: 5.0,
            nuclear_charge: 2.0,
            eigenstates: 3,
            density_mixing: 0.5,
            convergence_threshold: 1e-6,
            max_cycle: 100,
            stall_policy: StallPolicy::Retry,
            poisson_tolerance: 1e-7,
            poisson_max_iterations: 400,
            eigen_tolerance: 1e-6,
            eigen_max_iterations: 400,
        }
    }
}

impl ScfParameters {
    /// Rejects parameters no solve should be attempted with.
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.grid_points < 2 {
            return Err(SolverError::InvalidConfiguration(format!(
                "grid needs at least 2 points per axis, got {}",
                self.grid_points
            )));
        }
        if !(self.half_width > 0.0) {
            return Err(SolverError::InvalidConfiguration(format!(
                "grid half-width must be positive, got {}",
                self.half_width
            )));
        }
        if !(self.nuclear_charge > 0.0) {
            return Err(SolverError::InvalidConfiguration(format!(
                "nuclear charge must be positive, got {}",
                self.nuclear_charge
            )));
        }
        if self.eigenstates == 0 {
            return Err(SolverError::InvalidConfiguration(
                "at least one eigenstate must be extracted".to_string(),
            ));
        }
        if !(self.density_mixing > 0.0 && self.density_mixing <= 1.0) {
            return Err(SolverError::InvalidConfiguration(format!(
                "density mixing must lie in (0, 1], got {}",
                self.density_mixing
            )));
        }
        if !(self.convergence_threshold > 0.0) {
            return Err(SolverError::InvalidConfiguration(format!(
                "convergence threshold must be positive, got {}",
                self.convergence_threshold
            )));
        }
        if self.max_cycle == 0 {
            return Err(SolverError::InvalidConfiguration(
                "SCF cycle cap must be at least 1".to_string(),
            ));
        }
        if !(self.poisson_tolerance > 0.0) || !(self.eigen_tolerance > 0.0) {
            return Err(SolverError::InvalidConfiguration(
                "solver tolerances must be positive".to_string(),
            ));
        }
        if self.poisson_max_iterations == 0 || self.eigen_max_iterations == 0 {
            return Err(SolverError::InvalidConfiguration(
                "solver iteration caps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Static data built once at `Initializing` and shared read-only by every
/// cycle: the grid, the sparse Laplacian, and the external/compensation
/// potentials.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub grid: Grid,
    pub laplacian: CsrMatrix,
    pub statics: StaticPotentials,
}

impl RunContext {
    pub fn build(params: &ScfParameters) -> Result<Self, SolverError> {
        params.validate()?;
        let grid = Grid::new(params.grid_points, params.half_width)?;
        let laplacian = laplacian_3d(&grid);
        let statics = StaticPotentials::build(&grid, params.nuclear_charge)?;
        Ok(RunContext {
            grid,
            laplacian,
            statics,
        })
    }
}

/// Numeric outputs of a finished (converged or stagnant) run.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Total energy in Hartree.
    pub energy: f64,
    pub eigenvalues: Vec<f64>,
    pub wavefunctions: Vec<Vec<f64>>,
    pub density: Vec<f64>,
    pub hartree: Vec<f64>,
    pub exchange: Vec<f64>,
    pub cycles: usize,
    pub energy_history: Vec<f64>,
}

impl Solution {
    pub fn energy_ev(&self) -> f64 {
        self.energy * EV_PER_HARTREE
    }
}

/// Terminal state of an SCF run.
#[derive(Debug, Clone)]
pub enum ScfOutcome {
    Converged(Solution),
    /// Cycle cap hit with the energy still moving; carries the
    /// best-available outputs. Numerically stagnant, not erroneous.
    MaxIterationsExceeded(Solution),
    Failed {
        error: SolverError,
        cycle: usize,
    },
}

impl ScfOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, ScfOutcome::Converged(_))
    }

    pub fn solution(&self) -> Option<&Solution> {
        match self {
            ScfOutcome::Converged(solution) => Some(solution),
            ScfOutcome::MaxIterationsExceeded(solution) => Some(solution),
            ScfOutcome::Failed { .. } => None,
        }
    }
}

/// Total energy `2 e0 - sum((V_H/2 + Vx/4) n) h^3`.
///
/// The band energy `2 e0` counts the Hartree interaction twice and the
/// exchange potential at full strength; the integral removes the double
/// counting and corrects the exchange down to the Slater functional value.
pub fn total_energy(
    lowest: f64,
    density: &[f64],
    hartree: &[f64],
    exchange: &[f64],
    volume_element: f64,
) -> f64 {
    let correction: f64 = density
        .iter()
        .zip(hartree)
        .zip(exchange)
        .map(|((&n, &vh), &vx)| (0.5 * vh + 0.25 * vx) * n)
        .sum();
    ELECTRON_COUNT * lowest - correction * volume_element
}

/// Bounded fixed-point driver over the component pipeline.
#[derive(Debug, Clone)]
pub struct ScfDriver {
    params: ScfParameters,
    poisson: PoissonSolver,
    eigen: LanczosSolver,
}

impl ScfDriver {
    pub fn new(params: ScfParameters) -> Self {
        let poisson = PoissonSolver::new(params.poisson_tolerance, params.poisson_max_iterations);
        let eigen = LanczosSolver::new(
            params.eigenstates,
            params.eigen_tolerance,
            params.eigen_max_iterations,
        );
        ScfDriver {
            params,
            poisson,
            eigen,
        }
    }

    pub fn parameters(&self) -> &ScfParameters {
        &self.params
    }

    /// Runs the full state machine, building the run context first.
    /// Setup failures surface as `Failed` at cycle 0.
    pub fn run(&self, cancel: Option<&CancelToken>) -> ScfOutcome {
        let context = match RunContext::build(&self.params) {
            Ok(context) => context,
            Err(error) => {
                warn!("SCF setup failed: {}", error);
                return ScfOutcome::Failed { error, cycle: 0 };
            }
        };
        self.run_with_context(&context, cancel)
    }

    /// Runs the iteration against a prebuilt context.
    pub fn run_with_context(
        &self,
        context: &RunContext,
        cancel: Option<&CancelToken>,
    ) -> ScfOutcome {
        let mut cycle = 0;
        match self.iterate(context, cancel, &mut cycle) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!("SCF terminated at cycle {}: {}", cycle, error);
                ScfOutcome::Failed { error, cycle }
            }
        }
    }

    fn iterate(
        &self,
        context: &RunContext,
        cancel: Option<&CancelToken>,
        cycle_out: &mut usize,
    ) -> Result<ScfOutcome, SolverError> {
        let n = context.grid.len();
        let spacing = context.grid.spacing();
        let volume = context.grid.volume_element();

        let mut density = vec![0.0; n];
        let mut hartree = vec![0.0; n];
        let mut exchange = vec![0.0; n];
        let mut warm = initial_guesses(&context.grid, self.params.eigenstates);
        let mut last_pairs: Option<EigenPairs> = None;
        let mut old_energy = 0.0;
        let mut history = Vec::new();

        for cycle in 0..self.params.max_cycle {
            *cycle_out = cycle;
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(SolverError::Cancelled);
                }
            }

            let hamiltonian = Hamiltonian::assemble(
                &context.laplacian,
                &[&context.statics.external, &hartree, &exchange],
            )?;
            let pairs = self.eigensolve(&hamiltonian, &warm, cancel)?;

            let fresh = density::occupied_density(&pairs.vectors[0], spacing)?;
            if cycle == 0 {
                density = fresh;
            } else {
                let alpha = self.params.density_mixing;
                for (held, &new) in density.iter_mut().zip(&fresh) {
                    *held = alpha * new + (1.0 - alpha) * *held;
                }
            }
            density::validate(&density)?;

            let solved = self.hartree(context, &density, cancel)?;
            hartree = solved.potential;
            exchange = xc::exchange_potential(&density);

            let energy = total_energy(pairs.values[0], &density, &hartree, &exchange, volume);
            let change = energy - old_energy;
            info!(
                "Cycle {}: e0 = {:.8} au, E = {:.10} au, dE = {:.3e} au, eigen iterations {:?}, poisson iterations {}",
                cycle, pairs.values[0], energy, change, pairs.iterations, solved.iterations
            );
            history.push(energy);

            if cycle > 0 && change.abs() < self.params.convergence_threshold {
                info!("SCF converged in {} cycles", cycle + 1);
                return Ok(ScfOutcome::Converged(solution(
                    energy,
                    pairs,
                    density,
                    hartree,
                    exchange,
                    cycle + 1,
                    history,
                )));
            }

            old_energy = energy;
            warm = pairs.vectors.clone();
            last_pairs = Some(pairs);
        }

        warn!(
            "SCF stopped after {} cycles with the energy still moving",
            self.params.max_cycle
        );
        // max_cycle >= 1 was validated, so at least one cycle ran
        let pairs = last_pairs.ok_or_else(|| {
            SolverError::InvalidConfiguration("SCF cycle cap must be at least 1".to_string())
        })?;
        Ok(ScfOutcome::MaxIterationsExceeded(solution(
            old_energy,
            pairs,
            density,
            hartree,
            exchange,
            self.params.max_cycle,
            history,
        )))
    }

    /// Eigensolve under the stall policy.
    fn eigensolve(
        &self,
        hamiltonian: &Hamiltonian,
        warm: &[Vec<f64>],
        cancel: Option<&CancelToken>,
    ) -> Result<EigenPairs, SolverError> {
        let (pairs, stall) = self.eigen.lowest_partial(hamiltonian, Some(warm), cancel)?;
        let Some(error) = stall else {
            return Ok(pairs);
        };
        match self.params.stall_policy {
            StallPolicy::Fail => Err(error),
            StallPolicy::Degrade => {
                warn!("{}; accepting the partial eigensolve", error);
                Ok(pairs)
            }
            StallPolicy::Retry => {
                warn!(
                    "{}; retrying with a {}x iteration budget",
                    error, RETRY_BUDGET_FACTOR
                );
                self.eigen
                    .with_budget_factor(RETRY_BUDGET_FACTOR)
                    .lowest(hamiltonian, Some(warm), cancel)
            }
        }
    }

    /// Hartree solve under the stall policy.
    fn hartree(
        &self,
        context: &RunContext,
        density: &[f64],
        cancel: Option<&CancelToken>,
    ) -> Result<PoissonSolution, SolverError> {
        let solved =
            self.poisson
                .hartree_partial(&context.laplacian, density, &context.statics, cancel)?;
        if solved.converged {
            return Ok(solved);
        }
        let error = SolverError::SolverDidNotConverge {
            iterations: solved.iterations,
            residual: solved.residual,
        };
        match self.params.stall_policy {
            StallPolicy::Fail => Err(error),
            StallPolicy::Degrade => {
                warn!("{}; accepting the partial Hartree potential", error);
                Ok(solved)
            }
            StallPolicy::Retry => {
                warn!(
                    "{}; retrying with a {}x iteration budget",
                    error, RETRY_BUDGET_FACTOR
                );
                self.poisson
                    .with_budget_factor(RETRY_BUDGET_FACTOR)
                    .hartree_potential(&context.laplacian, density, &context.statics, cancel)
            }
        }
    }
}

fn solution(
    energy: f64,
    pairs: EigenPairs,
    density: Vec<f64>,
    hartree: Vec<f64>,
    exchange: Vec<f64>,
    cycles: usize,
    energy_history: Vec<f64>,
) -> Solution {
    Solution {
        energy,
        eigenvalues: pairs.values,
        wavefunctions: pairs.vectors,
        density,
        hartree,
        exchange,
        cycles,
        energy_history,
    }
}

/// First-cycle eigensolver seeds: a Gaussian envelope with a small seeded
/// perturbation, so degenerate and odd-parity states stay reachable.
fn initial_guesses(grid: &Grid, bands: usize) -> Vec<Vec<f64>> {
    (0..bands)
        .map(|band| {
            let noise = seeded_vector(grid.len(), band as u64 + 1);
            grid.radius()
                .iter()
                .zip(noise)
                .map(|(&r, p)| (-0.5 * r * r).exp() + 0.05 * p)
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_validate() {
        assert!(ScfParameters::default().validate().is_ok());
    }

    #[test]
    fn bad_parameters_are_rejected() {
        let cases: Vec<Box<dyn Fn(&mut ScfParameters)>> = vec![
            Box::new(|p| p.grid_points = 1),
            Box::new(|p| p.half_width = 0.0),
            Box::new(|p| p.nuclear_charge = -1.0),
            Box::new(|p| p.eigenstates = 0),
            Box::new(|p| p.density_mixing = 0.0),
            Box::new(|p| p.density_mixing = 1.5),
            Box::new(|p| p.convergence_threshold = 0.0),
            Box::new(|p| p.max_cycle = 0),
            Box::new(|p| p.poisson_max_iterations = 0),
            Box::new(|p| p.eigen_tolerance = -1e-6),
        ];
        for (i, tweak) in cases.iter().enumerate() {
            let mut params = ScfParameters::default();
            tweak(&mut params);
            assert!(
                matches!(
                    params.validate(),
                    Err(SolverError::InvalidConfiguration(_))
                ),
                "case {} passed validation",
                i
            );
        }
    }

    #[test]
    fn energy_bookkeeping_formula() {
        let density = vec![1.0, 2.0];
        let hartree = vec![0.5, 0.25];
        let exchange = vec![-0.4, -0.8];
        // correction = (0.25 - 0.1) + (0.25 - 0.4) = 0.0
        let e = total_energy(-0.5, &density, &hartree, &exchange, 0.1);
        assert!((e + 1.0).abs() < 1e-14, "got {}", e);
    }

    #[test]
    fn context_rejects_singular_grid() {
        let params = ScfParameters {
            grid_points: 9,
            ..ScfParameters::default()
        };
        assert!(matches!(
            RunContext::build(&params),
            Err(SolverError::SingularPotential { .. })
        ));
    }

    #[test]
    fn initial_guesses_are_distinct_per_band() {
        let grid = Grid::new(6, 2.0).unwrap();
        let guesses = initial_guesses(&grid, 3);
        assert_eq!(guesses.len(), 3);
        let overlap: f64 = guesses[0]
            .iter()
            .zip(&guesses[1])
            .map(|(&a, &b)| (a - b).abs())
            .sum();
        assert!(overlap > 0.0, "band seeds are identical");
    }
}
