//! Cleanup command handler

use super::CommandOutcome;
use crate::commands::CleanupArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use pixelgate::BaselineStore;
use std::time::Duration;

/// Convert an age in hours to a duration
pub fn max_age(hours: u64) -> CliResult<Duration> {
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| CliError::invalid_argument(format!("max age of {hours} hours is too large")))
}

/// Execute the cleanup command
pub fn execute_cleanup(config: &CliConfig, args: &CleanupArgs) -> CliResult<CommandOutcome> {
    let mut store_config = config.engine.store.clone();
    args.store.apply(&mut store_config);
    let store = BaselineStore::from_config(&store_config)?;

    let report = store.cleanup(max_age(args.max_age_hours)?)?;

    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.success(&format!(
        "removed {} stale artifacts older than {}h",
        report.total(),
        args.max_age_hours
    ));
    reporter.detail("actual", &report.actual_removed.to_string());
    reporter.detail("diff", &report.diff_removed.to_string());
    Ok(CommandOutcome::Clean)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::StoreArgs;
    use crate::config::ColorChoice;
    use pixelgate::{BaselineIdentity, Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_max_age() {
        assert_eq!(max_age(2).unwrap(), Duration::from_secs(7200));
        assert!(max_age(u64::MAX).is_err());
    }

    #[test]
    fn test_cleanup_zero_age_removes_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path(), "default", "default").unwrap();
        let id = BaselineIdentity::new("A", "b");
        let img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        store.save_baseline(&id, &img).unwrap();
        store.save_actual(&id, &img).unwrap();

        let args = CleanupArgs {
            max_age_hours: 0,
            store: StoreArgs {
                root: Some(dir.path().to_path_buf()),
                channel: None,
                locale: None,
            },
        };
        let config = CliConfig::new().with_color(ColorChoice::Never);
        execute_cleanup(&config, &args).unwrap();

        assert!(store.exists(&id).unwrap());
        assert!(store.load_actual(&id).is_err());
    }
}
