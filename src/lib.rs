// Grid-based Kohn-Sham SCF solver for a single atom

pub mod cancel;
pub mod config;
pub mod density;
pub mod eigen;
pub mod error;
pub mod grid;
pub mod hamiltonian;
pub mod io;
pub mod laplacian;
pub mod operator;
pub mod poisson;
pub mod potential;
pub mod scf;
pub mod xc;

/// Electrons in the one doubly occupied orbital (closed shell, fixed).
pub const ELECTRON_COUNT: f64 = 2.0;

/// Conversion factor from Hartree atomic units to electron volts.
pub const EV_PER_HARTREE: f64 = 27.21;
