use std::path::PathBuf;
use std::str::FromStr;

use super::command::CommandMap;
use crate::error::{ErrorCode, Result, StageGateError};

/// How many task processes may run at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    /// Patterns and groups run one after another
    Sequential,
    /// Bounded by the available parallelism
    #[default]
    Parallel,
    /// At most this many processes
    Limit(usize),
}

impl Concurrency {
    pub fn is_sequential(&self) -> bool {
        matches!(self, Concurrency::Sequential)
    }

    /// Size of the process semaphore
    pub fn permits(&self) -> usize {
        match self {
            Concurrency::Sequential => 1,
            Concurrency::Parallel => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            Concurrency::Limit(n) => *n,
        }
    }
}

impl FromStr for Concurrency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "true" => Ok(Concurrency::Parallel),
            "false" => Ok(Concurrency::Sequential),
            other => other
                .parse::<usize>()
                .map(Concurrency::Limit)
                .map_err(|_| format!("expected `true`, `false` or a number, got `{other}`")),
        }
    }
}

/// Options of a single run
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Allow a commit that tasks turned empty
    pub allow_empty: bool,
    /// Run against every tracked file instead of the staged ones
    pub all: bool,
    pub concurrent: Concurrency,
    /// Explicit configuration file
    pub config_path: Option<PathBuf>,
    /// Configuration supplied in code, taking precedence over files
    pub config: Option<CommandMap>,
    pub cwd: Option<PathBuf>,
    pub debug: bool,
    pub diff: Option<String>,
    pub diff_filter: Option<String>,
    pub max_arg_length: Option<usize>,
    pub quiet: bool,
    /// Pass paths relative to the task directory
    pub relative: bool,
    /// Run commands through the system shell
    pub shell: bool,
    /// Create a backup stash; defaults to on unless `diff` or `all` is set
    pub stash: Option<bool>,
    pub hide_partially_staged: Option<bool>,
    /// Show task output even on success
    pub verbose: bool,
}

impl Options {
    fn invalid(message: impl Into<String>, field: &str) -> StageGateError {
        StageGateError::validation_with_code(
            ErrorCode::VALIDATION_INVALID_OPTIONS,
            message,
            Some(field.to_string()),
        )
    }

    /// Check option combinations before anything touches git
    pub fn validate(&self) -> Result<()> {
        if self.all && self.diff.is_some() {
            return Err(Self::invalid("Option --all conflicts with --diff", "all"));
        }
        if self.all && self.diff_filter.is_some() {
            return Err(Self::invalid(
                "Option --all conflicts with --diff-filter",
                "all",
            ));
        }
        if let Some(cwd) = &self.cwd {
            if !cwd.is_dir() {
                return Err(Self::invalid(
                    format!("{} is not a directory", cwd.display()),
                    "cwd",
                ));
            }
        }
        if self.concurrent == Concurrency::Limit(0) {
            return Err(Self::invalid(
                "Concurrency must be at least 1",
                "concurrent",
            ));
        }
        if self.max_arg_length == Some(0) {
            return Err(Self::invalid(
                "Maximum argument length must be positive",
                "max_arg_length",
            ));
        }
        Ok(())
    }

    /// Whether a backup stash should be made, before checking for an initial commit
    pub fn stash_enabled(&self) -> bool {
        self.stash
            .unwrap_or(self.diff.is_none() && !self.all)
    }

    pub fn hide_partially_staged_enabled(&self) -> bool {
        self.hide_partially_staged.unwrap_or(self.stash_enabled())
    }

    /// Directory the run starts from
    pub fn resolved_cwd(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => std::env::current_dir().map_err(|e| {
                StageGateError::validation_with_code(
                    ErrorCode::VALIDATION_INVALID_OPTIONS,
                    format!("Cannot determine current directory: {e}"),
                    Some("cwd".to_string()),
                )
            }),
        }
    }
}
