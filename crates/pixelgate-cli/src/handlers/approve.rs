//! Approve command handler

use super::CommandOutcome;
use crate::commands::ApproveArgs;
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::Reporter;
use pixelgate::Validator;

/// Execute the approve command
pub fn execute_approve(config: &CliConfig, args: &ApproveArgs) -> CliResult<CommandOutcome> {
    let mut engine = config.engine.clone();
    args.store.apply(&mut engine.store);
    let validator = Validator::new(engine)?;

    let identity = args.identity.identity();
    let update = validator.approve(&identity)?;

    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.success(&format!("approved {identity}"));
    reporter.detail("baseline", &update.path.display().to_string());
    if let Some(backup) = &update.backup {
        reporter.detail("previous", &backup.display().to_string());
    }
    Ok(CommandOutcome::Clean)
}
