//! Command-line interface for the scout binary.

mod commands;

pub use commands::{is_verbose, run};
