#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cancelled before '{command}' could start")]
    Cancelled { command: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

/// Errors from signalling a single process; never surfaced to the user.
#[derive(Debug, thiserror::Error)]
pub enum KillError {
    #[error("No such process: {0}")]
    NoSuchProcess(u32),

    #[error("Failed to kill process {pid}: {message}")]
    Failed { pid: u32, message: String },
}
