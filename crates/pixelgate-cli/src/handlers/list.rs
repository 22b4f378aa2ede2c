//! List command handler

use super::CommandOutcome;
use crate::commands::{ListArgs, OutputFormat};
use crate::config::CliConfig;
use crate::error::CliResult;
use pixelgate::BaselineStore;

/// Execute the list command
pub fn execute_list(config: &CliConfig, args: &ListArgs) -> CliResult<CommandOutcome> {
    let mut store_config = config.engine.store.clone();
    args.store.apply(&mut store_config);
    let store = BaselineStore::from_config(&store_config)?;
    let keys = store.list_baselines()?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
        OutputFormat::Text => {
            for key in &keys {
                println!("{key}");
            }
            if !config.verbosity.is_quiet() {
                eprintln!("{} baseline(s) in {}", keys.len(), store.root().display());
            }
        }
    }
    Ok(CommandOutcome::Clean)
}
