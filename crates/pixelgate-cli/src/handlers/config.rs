//! Config command handler

use super::CommandOutcome;
use crate::commands::ConfigArgs;
use crate::config::CliConfig;
use crate::error::CliResult;
use pixelgate::EngineConfig;

/// Render the configuration the command would print
pub fn render_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<String> {
    let engine = if args.defaults {
        EngineConfig::default()
    } else {
        config.engine.clone()
    };
    Ok(engine.to_yaml()?)
}

/// Execute the config command
pub fn execute_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<CommandOutcome> {
    print!("{}", render_config(config, args)?);
    Ok(CommandOutcome::Clean)
}
