//! SCF Calculation Command-Line Interface
//!
//! Entry point for running single-atom Kohn-Sham SCF calculations with
//! YAML configuration.

use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use std::fs;
use tracing::info;

use gridscf::config::{Args, Config};
use gridscf::io::{report_outcome, setup_output};
use gridscf::scf::{ScfDriver, ScfOutcome, ScfParameters};

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_output(args.output.as_ref());

    // Load and parse configuration
    info!("Reading configuration from: {}", args.config_file);
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;

    let config: Config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults();

    info!("Configuration loaded:\n{:?}", config);

    let params = apply_overrides(config.parameters(), &args);

    info!("\nStarting SCF cycle...\n");
    let driver = ScfDriver::new(params);
    let outcome = driver.run(None);

    report_outcome(&outcome);

    match outcome {
        ScfOutcome::Failed { error, cycle } => {
            Err(eyre!("SCF failed at cycle {}: {}", cycle, error))
        }
        _ => Ok(()),
    }
}

/// Override configuration parameters with command-line arguments if provided
fn apply_overrides(mut params: ScfParameters, args: &Args) -> ScfParameters {
    if let Some(g) = args.grid_points {
        info!("Overriding grid_points with: {}", g);
        params.grid_points = g;
    }
    if let Some(l) = args.half_width {
        info!("Overriding half_width with: {}", l);
        params.half_width = l;
    }
    if let Some(z) = args.nuclear_charge {
        info!("Overriding nuclear_charge with: {}", z);
        params.nuclear_charge = z;
    }
    if let Some(k) = args.eigenstates {
        info!("Overriding eigenstates with: {}", k);
        params.eigenstates = k;
    }
    if let Some(dm) = args.density_mixing {
        info!("Overriding density_mixing with: {}", dm);
        params.density_mixing = dm;
    }
    if let Some(mc) = args.max_cycle {
        info!("Overriding max_cycle with: {}", mc);
        params.max_cycle = mc;
    }
    if let Some(ct) = args.convergence_threshold {
        info!("Overriding convergence_threshold with: {}", ct);
        params.convergence_threshold = ct;
    }
    params
}
