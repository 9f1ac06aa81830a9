//! Logging setup and run reporting

mod output;

pub use output::{report_outcome, setup_output};
