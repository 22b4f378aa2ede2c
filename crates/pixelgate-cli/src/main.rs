//! Pixelgate CLI: visual regression verdicts from the command line
//!
//! ## Usage
//!
//! ```bash
//! pixelgate compare base.png shot.png --tolerance 0.01   # Compare two files
//! pixelgate validate --class LoginTest --step home \
//!     --capture shot.png --root baselines                 # Validate against the store
//! pixelgate approve --class LoginTest --step home         # Accept the latest capture
//! pixelgate cleanup --max-age-hours 48                    # Drop stale artifacts
//! ```

use clap::Parser;
use pixelgate_cli::{
    handlers, logging, Cli, CliConfig, CliResult, ColorChoice, CommandOutcome, Commands, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(ColorChoice::from(cli.color))
        .with_log_json(cli.log_json);
    logging::init_logging(config.verbosity, config.log_json);

    match load_engine(&cli, config).and_then(|config| run(&cli, &config)) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprintln!("Error: {e}");
            CommandOutcome::Broken.exit_code()
        }
    }
}

fn load_engine(cli: &Cli, config: CliConfig) -> CliResult<CliConfig> {
    match &cli.config {
        Some(path) => config.with_engine_file(path),
        None => Ok(config),
    }
}

fn run(cli: &Cli, config: &CliConfig) -> CliResult<CommandOutcome> {
    match &cli.command {
        Commands::Compare(args) => handlers::execute_compare(config, args),
        Commands::Validate(args) => handlers::execute_validate(config, args),
        Commands::Approve(args) => handlers::execute_approve(config, args),
        Commands::Cleanup(args) => handlers::execute_cleanup(config, args),
        Commands::List(args) => handlers::execute_list(config, args),
        Commands::Config(args) => handlers::execute_config(config, args),
    }
}
