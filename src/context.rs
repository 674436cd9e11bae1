//! Shared state of a single run.
//!
//! One [`ExecutionContext`] is created per run and threaded by `&mut`
//! through every phase. Task completions are folded into it one at a time
//! by the scheduler, so it needs no interior locking; only the
//! cancellation token is shared with running processes.

use std::collections::BTreeSet;

use crate::cancel::CancellationToken;
use crate::error::{ErrorKind, StageGateError};

/// A task or pattern that did not run, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ExecutionContext {
    pub errors: BTreeSet<ErrorKind>,
    /// Output to print once the run settles
    pub output: Vec<String>,
    pub skipped: Vec<Skip>,
    pub should_backup: bool,
    pub should_hide_partially_staged: bool,
    pub has_partially_staged_files: bool,
    pub quiet: bool,
    /// Fired on the first task failure or on interrupt
    pub events: CancellationToken,
}

impl ExecutionContext {
    pub fn new(should_backup: bool, quiet: bool) -> Self {
        Self {
            should_backup,
            should_hide_partially_staged: should_backup,
            quiet,
            ..Default::default()
        }
    }

    pub fn has(&self, kind: ErrorKind) -> bool {
        self.errors.contains(&kind)
    }

    pub fn add_error(&mut self, kind: ErrorKind) {
        self.errors.insert(kind);
    }

    /// Record every kind `error` stands for
    pub fn record(&mut self, error: &StageGateError) {
        self.errors.extend(error.kinds());
    }

    pub fn skip(&mut self, title: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(Skip {
            title: title.into(),
            reason: reason.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_record_adds_all_kinds() {
        let mut ctx = ExecutionContext::new(true, false);
        let err = StageGateError::git(ErrorCode::GIT_EMPTY_COMMIT, "empty", "apply");

        ctx.record(&err);

        assert!(ctx.has(ErrorKind::Git));
        assert!(ctx.has(ErrorKind::ApplyEmptyCommit));
        assert!(!ctx.has(ErrorKind::Task));
    }

    #[test]
    fn test_new_hides_partially_staged_with_backup() {
        let ctx = ExecutionContext::new(true, false);
        assert!(ctx.should_hide_partially_staged);
        assert!(!ctx.has_errors());
        assert!(!ctx.events.is_cancelled());
    }
}
