//! # stagegate
//!
//! Run linters and formatters against the files staged for the next git
//! commit, add their fixes to the commit, and roll everything back from a
//! backup stash when something fails.
//!
//! ## Usage
//!
//! ```bash
//! stagegate [--config <path>] [--concurrent <bool|n>] [--no-stash] [--diff <range>]
//! ```
//!
//! ## Modules
//!
//! - `cli` - Command-line arguments
//! - `config` - Run options and task configuration discovery
//! - `git` - Staged file listing and the staging transaction
//! - `matching` - Glob patterns against staged files
//! - `orchestrator` - The run from option validation to cleanup
//! - `subprocess` - Process execution with cancellable process trees
//! - `tasks` - Building, chunking and scheduling task processes
pub mod cancel;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod git;
pub mod matching;
pub mod messages;
pub mod orchestrator;
pub mod report;
pub mod state;
pub mod subprocess;
pub mod tasks;

pub use config::{CommandMap, CommandSpec, Options};
pub use error::{ErrorKind, StageGateError};
pub use orchestrator::{run, run_all, RunFailure, RunSummary};
pub use report::Reporter;
