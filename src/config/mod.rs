//! Configuration management for SCF runs
//!
//! YAML-deserializable sections with per-field defaults, mapped onto the
//! numeric `ScfParameters` the driver consumes.

mod args;

pub use args::Args;

use serde::{Deserialize, Serialize};

use crate::scf::{ScfParameters, StallPolicy};

/// Main configuration structure for an SCF run
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub system: SystemParams,
    #[serde(default)]
    pub scf: ScfSection,
    #[serde(default)]
    pub poisson: PoissonSection,
    #[serde(default)]
    pub eigen: EigenSection,
}

/// Physical system and grid parameters
#[derive(Debug, Deserialize, Serialize)]
pub struct SystemParams {
    pub grid_points: Option<usize>,
    pub half_width: Option<f64>,
    pub nuclear_charge: Option<f64>,
    pub eigenstates: Option<usize>,
}

impl Default for SystemParams {
    fn default() -> Self {
        SystemParams {
            grid_points: Some(30),
            half_width: Some(5.0),
            nuclear_charge: Some(2.0),
            eigenstates: Some(3),
        }
    }
}

impl SystemParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.grid_points.is_none() {
            self.grid_points = defaults.grid_points;
        }
        if self.half_width.is_none() {
            self.half_width = defaults.half_width;
        }
        if self.nuclear_charge.is_none() {
            self.nuclear_charge = defaults.nuclear_charge;
        }
        if self.eigenstates.is_none() {
            self.eigenstates = defaults.eigenstates;
        }
        self
    }
}

/// SCF loop parameters
#[derive(Debug, Deserialize, Serialize)]
pub struct ScfSection {
    pub density_mixing: Option<f64>,
    pub max_cycle: Option<usize>,
    pub convergence_threshold: Option<f64>,
    pub stall_policy: Option<StallPolicy>,
}

impl Default for ScfSection {
    fn default() -> Self {
        ScfSection {
            density_mixing: Some(0.5),
            max_cycle: Some(100),
            convergence_threshold: Some(1e-6),
            stall_policy: Some(StallPolicy::Retry),
        }
    }
}

impl ScfSection {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.density_mixing.is_none() {
            self.density_mixing = defaults.density_mixing;
        }
        if self.max_cycle.is_none() {
            self.max_cycle = defaults.max_cycle;
        }
        if self.convergence_threshold.is_none() {
            self.convergence_threshold = defaults.convergence_threshold;
        }
        if self.stall_policy.is_none() {
            self.stall_policy = defaults.stall_policy;
        }
        self
    }
}

/// Hartree (Poisson) solver parameters
#[derive(Debug, Deserialize, Serialize)]
pub struct PoissonSection {
    pub tolerance: Option<f64>,
    pub max_iterations: Option<usize>,
}

impl Default for PoissonSection {
    fn default() -> Self {
        PoissonSection {
            tolerance: Some(1e-7),
            max_iterations: Some(400),
        }
    }
}

impl PoissonSection {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.tolerance.is_none() {
            self.tolerance = defaults.tolerance;
        }
        if self.max_iterations.is_none() {
            self.max_iterations = defaults.max_iterations;
        }
        self
    }
}

/// Eigensolver parameters
#[derive(Debug, Deserialize, Serialize)]
pub struct EigenSection {
    pub tolerance: Option<f64>,
    pub max_iterations: Option<usize>,
}

impl Default for EigenSection {
    fn default() -> Self {
        EigenSection {
            tolerance: Some(1e-6),
            max_iterations: Some(400),
        }
    }
}

impl EigenSection {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.tolerance.is_none() {
            self.tolerance = defaults.tolerance;
        }
        if self.max_iterations.is_none() {
            self.max_iterations = defaults.max_iterations;
        }
        self
    }
}

impl Config {
    /// Apply defaults to all configuration sections
    pub fn with_defaults(mut self) -> Self {
        self.system = self.system.with_defaults();
        self.scf = self.scf.with_defaults();
        self.poisson = self.poisson.with_defaults();
        self.eigen = self.eigen.with_defaults();
        self
    }

    /// Numeric driver parameters; missing fields fall back to the same
    /// defaults `with_defaults` would install.
    pub fn parameters(&self) -> ScfParameters {
        let defaults = ScfParameters::default();
        ScfParameters {
            grid_points: self.system.grid_points.unwrap_or(defaults.grid_points),
            half_width: self.system.half_width.unwrap_or(defaults.half_width),
            nuclear_charge: self
                .system
                .nuclear_charge
                .unwrap_or(defaults.nuclear_charge),
            eigenstates: self.system.eigenstates.unwrap_or(defaults.eigenstates),
            density_mixing: self.scf.density_mixing.unwrap_or(defaults.density_mixing),
            convergence_threshold: self
                .scf
                .convergence_threshold
                .unwrap_or(defaults.convergence_threshold),
            max_cycle: self.scf.max_cycle.unwrap_or(defaults.max_cycle),
            stall_policy: self.scf.stall_policy.unwrap_or(defaults.stall_policy),
            poisson_tolerance: self
                .poisson
                .tolerance
                .unwrap_or(defaults.poisson_tolerance),
            poisson_max_iterations: self
                .poisson
                .max_iterations
                .unwrap_or(defaults.poisson_max_iterations),
            eigen_tolerance: self.eigen.tolerance.unwrap_or(defaults.eigen_tolerance),
            eigen_max_iterations: self
                .eigen
                .max_iterations
                .unwrap_or(defaults.eigen_max_iterations),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gets_all_defaults() {
        let config: Config = serde_yml::from_str("{}").unwrap();
        let params = config.with_defaults().parameters();
        assert_eq!(params, ScfParameters::default());
    }

    #[test]
    fn partial_sections_are_filled_in() {
        let yaml = "
system:
  grid_points: 16
  nuclear_charge: 1.0
scf:
  density_mixing: 0.3
  stall_policy: degrade
";
        let config: Config = serde_yml::from_str(yaml).unwrap();
        let params = config.with_defaults().parameters();
        assert_eq!(params.grid_points, 16);
        assert_eq!(params.nuclear_charge, 1.0);
        assert_eq!(params.half_width, 5.0);
        assert_eq!(params.density_mixing, 0.3);
        assert_eq!(params.stall_policy, StallPolicy::Degrade);
        assert_eq!(params.max_cycle, 100);
        assert_eq!(params.poisson_max_iterations, 400);
    }

    #[test]
    fn unknown_stall_policy_is_a_parse_error() {
        let yaml = "
scf:
  stall_policy: panic
";
        assert!(serde_yml::from_str::<Config>(yaml).is_err());
    }
}
