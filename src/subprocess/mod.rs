pub mod builder;
pub mod error;
pub mod mock;
pub mod runner;
pub mod tree;


pub use builder::ProcessCommandBuilder;
pub use error::{KillError, ProcessError};
pub use mock::{MockCommandConfig, MockProcessRunner};
pub use runner::ProcessCommand;
pub use runner::{ExitStatus, ProcessOutput, ProcessRunner, TokioProcessRunner};
pub use tree::{kill_process_tree, ProcessTree, SystemProcessTree};

use std::path::Path;
use std::sync::Arc;

use crate::git::GitClient;

#[derive(Clone)]
pub struct SubprocessManager {
    runner: Arc<dyn ProcessRunner>,
}

impl SubprocessManager {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    pub fn production() -> Self {
        Self::new(Arc::new(TokioProcessRunner::new(Arc::new(SystemProcessTree))))
    }

    pub fn mock() -> (Self, MockProcessRunner) {
        let mock = MockProcessRunner::new();
        let runner = Arc::new(mock.clone()) as Arc<dyn ProcessRunner>;
        (Self::new(runner), mock)
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }

    /// Git client running commands in `cwd`
    pub fn git(&self, cwd: &Path) -> GitClient {
        GitClient::new(Arc::clone(&self.runner), cwd)
    }
}
