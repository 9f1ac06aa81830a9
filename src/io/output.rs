//! Output formatting and logging utilities

use std::fmt;
use std::fs::File;
use std::time::SystemTime as StdSystemTime;
use tracing::info;
use tracing_subscriber::{
    fmt::format::Writer, fmt::layer, fmt::time::FormatTime, layer::SubscriberExt,
    util::SubscriberInitExt, Registry,
};

use crate::scf::{ScfOutcome, Solution};

/// Custom time formatter that shows only seconds
struct SecondPrecisionTimer;

impl FormatTime for SecondPrecisionTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = StdSystemTime::now();
        let duration = now
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();

        // Format as HH:MM:SS (only seconds precision)
        let total_seconds = duration.as_secs();
        let hours = (total_seconds / 3600) % 24;
        let minutes = (total_seconds / 60) % 60;
        let seconds = total_seconds % 60;

        write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Setup output logging to file or stdout
pub fn setup_output(output_path: Option<&String>) {
    match output_path {
        Some(path) => {
            info!("Output will be written to: {}", path);
            if let Ok(log) = File::create(path) {
                let file_layer = layer()
                    .with_writer(log)
                    .with_timer(SecondPrecisionTimer)
                    .with_ansi(false);
                Registry::default().with(file_layer).init();
            } else {
                eprintln!("Could not create output file: {}", path);
            }
        }
        None => {
            // Initialize tracing for stdout
            let stdout_layer = layer()
                .with_writer(std::io::stdout)
                .with_timer(SecondPrecisionTimer)
                .with_ansi(true);
            Registry::default().with(stdout_layer).init();
            info!("Output will be printed to stdout");
        }
    }
}

/// Log the terminal state and the numeric results of a finished run
pub fn report_outcome(outcome: &ScfOutcome) {
    match outcome {
        ScfOutcome::Converged(solution) => {
            info!("\nSCF calculation finished: converged in {} cycles", solution.cycles);
            report_solution(solution);
        }
        ScfOutcome::MaxIterationsExceeded(solution) => {
            info!(
                "\nSCF calculation stagnant: {} cycles without meeting the threshold",
                solution.cycles
            );
            report_solution(solution);
        }
        ScfOutcome::Failed { error, cycle } => {
            info!("\nSCF calculation failed at cycle {}: {}", cycle, error);
        }
    }
}

fn report_solution(solution: &Solution) {
    info!("\nFinal Energy Levels:");
    for (i, energy) in solution.eigenvalues.iter().enumerate() {
        info!("  Level {}: {:.8} au", i + 1, energy);
    }
    info!(
        "\nTotal energy: {:.10} au ({:.6} eV)",
        solution.energy,
        solution.energy_ev()
    );
}
