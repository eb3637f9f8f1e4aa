//! Stepwise CLI library
//!
//! Argument parsing, logging setup and the journey runner behind the
//! `stepwise` binary.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
mod runner;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, RunArgs, SimulatedSite};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
pub use runner::JourneyRunner;
