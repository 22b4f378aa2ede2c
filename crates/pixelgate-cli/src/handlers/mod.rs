//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains:
//! - The execution logic for a CLI command
//! - Pure helper functions
//! - Tests

pub mod approve;
pub mod cleanup;
pub mod compare;
pub mod config;
pub mod list;
pub mod validate;

use std::process::ExitCode;

pub use approve::execute_approve;
pub use cleanup::execute_cleanup;
pub use compare::execute_compare;
pub use config::execute_config;
pub use list::execute_list;
pub use validate::execute_validate;

/// How a command finished, mapped onto the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Nothing to report (exit 0)
    Clean,
    /// A visual regression was detected (exit 1)
    Regression,
    /// The command could not do its job (exit 2)
    Broken,
}

impl CommandOutcome {
    /// Numeric exit code
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Clean => 0,
            Self::Regression => 1,
            Self::Broken => 2,
        }
    }

    /// Process exit code
    #[must_use]
    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self.code())
    }
}
