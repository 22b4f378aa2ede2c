//! Pixelgate CLI Library
//!
//! Command-line interface for the Pixelgate visual regression engine.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{
    ApproveArgs, CleanupArgs, Cli, ColorArg, Commands, CompareArgs, ConfigArgs, IdentityArgs,
    ListArgs, OutputFormat, StoreArgs, ValidateArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use handlers::CommandOutcome;
pub use output::Reporter;
