//! Command-line interface for rating-forge.
//!
//! Provides commands for compiling, publishing and running the pipeline.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
