//! Validate command handler.
//!
//! Orchestrates: read capture -> validate against the store -> render verdict.

use super::CommandOutcome;
use crate::commands::{OutputFormat, ValidateArgs};
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::Reporter;
use pixelgate::{
    EngineConfig, FileCapture, MismatchBehavior, ValidationRequest, ValidationStatus, Validator,
};

/// Engine configuration with the command's overrides applied
#[must_use]
pub fn effective_engine(config: &CliConfig, args: &ValidateArgs) -> EngineConfig {
    let mut engine = config.engine.clone();
    args.store.apply(&mut engine.store);
    if args.no_auto_create {
        engine.auto_create_baseline = false;
    }
    if args.no_model {
        engine.model_enabled = false;
    }
    engine
}

/// Map a verdict status to a process outcome
#[must_use]
pub const fn outcome_for(status: ValidationStatus) -> CommandOutcome {
    match status {
        ValidationStatus::Failure => CommandOutcome::Regression,
        ValidationStatus::Error => CommandOutcome::Broken,
        ValidationStatus::Success
        | ValidationStatus::Warning
        | ValidationStatus::Skipped
        | ValidationStatus::Ignored
        | ValidationStatus::BaselineCreated => CommandOutcome::Clean,
    }
}

/// Execute the validate command
pub fn execute_validate(config: &CliConfig, args: &ValidateArgs) -> CliResult<CommandOutcome> {
    let validator = Validator::new(effective_engine(config, args))?;

    let mut request = ValidationRequest::new(args.identity.identity());
    if let Some(tolerance) = args.tolerance {
        request = request.with_tolerance(tolerance);
    }
    if let Some(policy) = &args.policy {
        request = request.with_policy(MismatchBehavior::parse_or_default(policy));
    }
    if let Some(ignore) = &args.ignore {
        request = request.with_ignore_spec(ignore);
    }

    let verdict = validator.validate(&FileCapture::new(&args.capture), &request);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&verdict.record)?),
        OutputFormat::Text => {
            Reporter::new(config.color.should_color(), config.verbosity.is_quiet())
                .verdict(&verdict.record);
        }
    }

    Ok(outcome_for(verdict.status()))
}
