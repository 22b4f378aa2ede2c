//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use pixelgate::StoreConfig;
use std::path::PathBuf;

/// Pixelgate: hybrid visual regression verdicts for screenshot tests
#[derive(Parser, Debug)]
#[command(name = "pixelgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Engine configuration file (.yaml, .yml, or .json)
    #[arg(long, global = true, env = "PIXELGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare two image files with the hybrid engine
    Compare(CompareArgs),

    /// Validate a capture against its stored baseline
    Validate(ValidateArgs),

    /// Promote the latest capture to the baseline
    Approve(ApproveArgs),

    /// Remove stale capture and diff artifacts
    Cleanup(CleanupArgs),

    /// List stored baselines
    List(ListArgs),

    /// Print the effective engine configuration as YAML
    Config(ConfigArgs),
}

/// Store location overrides shared by store-backed commands
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Baseline store root directory
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Browser or channel name
    #[arg(long)]
    pub channel: Option<String>,

    /// Locale name
    #[arg(long)]
    pub locale: Option<String>,
}

impl StoreArgs {
    /// Apply these overrides to a store configuration
    pub fn apply(&self, store: &mut StoreConfig) {
        if let Some(root) = &self.root {
            store.root.clone_from(root);
        }
        if let Some(channel) = &self.channel {
            store.channel.clone_from(channel);
        }
        if let Some(locale) = &self.locale {
            store.locale.clone_from(locale);
        }
    }
}

/// Baseline identity arguments
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    /// Test class name
    #[arg(long = "class")]
    pub class_name: String,

    /// Test step name
    #[arg(long = "step")]
    pub step_name: String,

    /// Optional suffix (e.g. a step counter)
    #[arg(long)]
    pub suffix: Option<String>,
}

impl IdentityArgs {
    /// Build the library identity
    #[must_use]
    pub fn identity(&self) -> pixelgate::BaselineIdentity {
        let id = pixelgate::BaselineIdentity::new(&self.class_name, &self.step_name);
        match &self.suffix {
            Some(suffix) => id.with_suffix(suffix),
            None => id,
        }
    }
}

/// Arguments for the compare command
#[derive(Parser, Debug)]
pub struct CompareArgs {
    /// Baseline image
    pub baseline: PathBuf,

    /// Actual image
    pub actual: PathBuf,

    /// Maximum diff ratio (0.0-1.0) for a match
    #[arg(short, long)]
    pub tolerance: Option<f64>,

    /// Ignore regions, "x,y,w,h;x,y,w,h"
    #[arg(long)]
    pub ignore: Option<String>,

    /// Write the annotated diff image here
    #[arg(long)]
    pub diff_out: Option<PathBuf>,

    /// Disable the similarity model
    #[arg(long)]
    pub no_model: bool,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Captured image to validate
    #[arg(long)]
    pub capture: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Mismatch policy (fail, warn, ignore, default)
    #[arg(long)]
    pub policy: Option<String>,

    /// Maximum diff ratio (0.0-1.0) for a match
    #[arg(short, long)]
    pub tolerance: Option<f64>,

    /// Ignore regions, "x,y,w,h;x,y,w,h"
    #[arg(long)]
    pub ignore: Option<String>,

    /// Do not create a missing baseline
    #[arg(long)]
    pub no_auto_create: bool,

    /// Disable the similarity model
    #[arg(long)]
    pub no_model: bool,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the approve command
#[derive(Parser, Debug)]
pub struct ApproveArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Arguments for the cleanup command
#[derive(Parser, Debug)]
pub struct CleanupArgs {
    /// Remove artifacts older than this many hours
    #[arg(long, default_value = "24")]
    pub max_age_hours: u64,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Print built-in defaults, ignoring any configuration file
    #[arg(long)]
    pub defaults: bool,
}

/// Output format for reports
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output for CI integration
    Json,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compare() {
        let cli = Cli::try_parse_from([
            "pixelgate", "compare", "a.png", "b.png", "--tolerance", "0.05", "--format", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Compare(args) => {
                assert_eq!(args.baseline, PathBuf::from("a.png"));
                assert_eq!(args.tolerance, Some(0.05));
                assert_eq!(args.format, OutputFormat::Json);
                assert!(!args.no_model);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from([
            "pixelgate", "-vv", "validate", "--class", "LoginTest", "--step", "home",
            "--suffix", "2", "--capture", "shot.png", "--root", "/tmp/b", "--policy", "warn",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Validate(args) => {
                assert_eq!(args.identity.identity().key().unwrap(), "LoginTest/home_2");
                assert_eq!(args.store.root, Some(PathBuf::from("/tmp/b")));
                assert_eq!(args.policy.as_deref(), Some("warn"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_store_args_apply() {
        let mut store = StoreConfig::default();
        StoreArgs {
            root: Some(PathBuf::from("shots")),
            channel: None,
            locale: Some("fr".to_string()),
        }
        .apply(&mut store);
        assert_eq!(store.root, PathBuf::from("shots"));
        assert_eq!(store.channel, "default");
        assert_eq!(store.locale, "fr");
    }

    #[test]
    fn test_cleanup_default_age() {
        let cli = Cli::try_parse_from(["pixelgate", "cleanup"]).unwrap();
        match cli.command {
            Commands::Cleanup(args) => assert_eq!(args.max_age_hours, 24),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["pixelgate"]).is_err());
    }
}
