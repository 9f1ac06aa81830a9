//! Command-line argument parsing for SCF runs

use clap::Parser;

/// Single-atom Kohn-Sham SCF calculation with YAML configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override grid points per axis
    #[arg(long)]
    pub grid_points: Option<usize>,

    /// Override the domain half-width in bohr
    #[arg(long)]
    pub half_width: Option<f64>,

    /// Override the nuclear charge
    #[arg(long)]
    pub nuclear_charge: Option<f64>,

    /// Override the number of eigenstates to extract
    #[arg(long)]
    pub eigenstates: Option<usize>,

    /// Override density mixing parameter
    #[arg(long)]
    pub density_mixing: Option<f64>,

    /// Override maximum SCF cycles
    #[arg(long)]
    pub max_cycle: Option<usize>,

    /// Override convergence threshold
    #[arg(long)]
    pub convergence_threshold: Option<f64>,

    /// Override output file (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,
}
