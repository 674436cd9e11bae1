//! Turning configured commands into processes
//!
//! [`build`] normalizes a [`CommandSpec`](crate::config::CommandSpec) into
//! [`Task`]s with chunked [`Invocation`]s, [`execute`] runs them with bounded
//! concurrency and cancels everything still running on the first failure.

pub mod build;
pub mod chunk;
pub mod execute;
pub mod resolve;

pub use build::{build_tasks, TaskOptions};
pub use chunk::{chunk_files, default_max_arg_length};
pub use execute::{
    GroupRun, InvocationFailure, PatternRun, TaskFailure, TaskOutcome, TaskScheduler, TaskSummary,
};
pub use resolve::resolve_program;

use std::path::PathBuf;

/// One process to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Paths appended after `args`; empty when the command embeds its own
    pub files: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.args.len() + self.files.len());
        parts.push(self.program.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        parts.extend(self.files.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// A configured command applied to the files of one pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub title: String,
    /// The command as configured, without file arguments
    pub command: String,
    pub invocations: Vec<Invocation>,
    /// False when a function produced the command and put paths in it itself
    pub should_be_provided_paths: bool,
    pub cwd: PathBuf,
}
