//! Log subscriber setup

use crate::config::Verbosity;
use tracing_subscriber::EnvFilter;

/// Filter directive used when `RUST_LOG` is unset
#[must_use]
pub const fn default_directive(verbosity: Verbosity) -> &'static str {
    if verbosity.is_quiet() {
        "error"
    } else if verbosity.is_debug() {
        "debug"
    } else if verbosity.is_verbose() {
        "info"
    } else {
        "warn"
    }
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` overrides the verbosity flags. Calling this twice is harmless;
/// the second call is ignored.
pub fn init_logging(verbosity: Verbosity, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(Verbosity::Quiet), "error");
        assert_eq!(default_directive(Verbosity::Normal), "warn");
        assert_eq!(default_directive(Verbosity::Verbose), "info");
        assert_eq!(default_directive(Verbosity::Debug), "debug");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(Verbosity::Normal, false);
        init_logging(Verbosity::Debug, true);
    }
}
