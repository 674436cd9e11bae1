use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner};
use crate::cancel::CancellationToken;

#[derive(Clone)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<ProcessCommand>>>,
    cancelled_history: Arc<Mutex<Vec<ProcessCommand>>>,
}

#[derive(Clone, Copy)]
enum MockBehavior {
    Respond,
    FailToSpawn,
    BlockUntilCancelled,
}

struct MockExpectation {
    program: String,
    #[allow(clippy::type_complexity)]
    args_matcher: Option<Box<dyn Fn(&[String]) -> bool + Send + Sync>>,
    response: ProcessOutput,
    behavior: MockBehavior,
    delay: Option<Duration>,
    times_called: usize,
    expected_times: Option<usize>,
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

/// What a matched expectation tells the runner to do once the lock is released
struct Scripted {
    response: ProcessOutput,
    behavior: MockBehavior,
    delay: Option<Duration>,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(Vec::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
            cancelled_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn expect_command(&self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                args_matcher: None,
                response: ProcessOutput {
                    status: ExitStatus::Success,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: Duration::from_millis(10),
                    cancelled: false,
                },
                behavior: MockBehavior::Respond,
                delay: None,
                times_called: 0,
                expected_times: None,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        let history = self.call_history.lock().unwrap();
        let count = history.iter().filter(|cmd| cmd.program == program).count();
        count == times
    }

    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        self.call_history.lock().unwrap().clone()
    }

    /// Commands whose run was interrupted by cancellation
    pub fn get_cancelled_history(&self) -> Vec<ProcessCommand> {
        self.cancelled_history.lock().unwrap().clone()
    }

    fn script_for(&self, command: &ProcessCommand) -> Result<Scripted, ProcessError> {
        self.call_history.lock().unwrap().push(command.clone());

        let mut expectations = self.expectations.lock().unwrap();

        for expectation in expectations.iter_mut() {
            if expectation.program != command.program {
                continue;
            }

            if let Some(ref args_matcher) = expectation.args_matcher {
                if !(args_matcher)(&command.args) {
                    continue;
                }
            }

            if let Some(expected) = expectation.expected_times {
                if expectation.times_called >= expected {
                    continue;
                }
            }

            expectation.times_called += 1;

            return Ok(Scripted {
                response: expectation.response.clone(),
                behavior: expectation.behavior,
                delay: expectation.delay,
            });
        }

        Err(ProcessError::MockExpectationNotMet(format!(
            "No expectation found for command: {} {:?}",
            command.program, command.args
        )))
    }

    fn cancelled_output(&self, command: &ProcessCommand) -> ProcessOutput {
        self.cancelled_history.lock().unwrap().push(command.clone());
        ProcessOutput {
            status: ExitStatus::Signal(15),
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::from_millis(1),
            cancelled: true,
        }
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let scripted = self.script_for(&command)?;

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }

        match scripted.behavior {
            MockBehavior::FailToSpawn => Err(ProcessError::CommandNotFound(command.program)),
            MockBehavior::Respond | MockBehavior::BlockUntilCancelled => Ok(scripted.response),
        }
    }

    async fn run_cancellable(
        &self,
        command: ProcessCommand,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ProcessError> {
        if cancel.is_cancelled() {
            self.call_history.lock().unwrap().push(command.clone());
            return Err(ProcessError::Cancelled {
                command: command.display(),
            });
        }

        let scripted = self.script_for(&command)?;

        if let MockBehavior::FailToSpawn = scripted.behavior {
            return Err(ProcessError::CommandNotFound(command.program));
        }

        if let MockBehavior::BlockUntilCancelled = scripted.behavior {
            cancel.cancelled().await;
            return Ok(self.cancelled_output(&command));
        }

        if let Some(delay) = scripted.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Ok(self.cancelled_output(&command)),
            }
        }

        Ok(scripted.response)
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.expectation.response.stdout = stdout.to_string();
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.expectation.response.stderr = stderr.to_string();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.response.status = if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Error(code)
        };
        self
    }

    pub fn returns_signal(mut self, signal: i32) -> Self {
        self.expectation.response.status = ExitStatus::Signal(signal);
        self
    }

    pub fn returns_success(mut self) -> Self {
        self.expectation.response.status = ExitStatus::Success;
        self
    }

    /// Respond only after `delay`, or earlier if the run is cancelled
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.expectation.delay = Some(delay);
        self
    }

    /// Simulate a long-running process that only ends when killed
    pub fn blocks_until_cancelled(mut self) -> Self {
        self.expectation.behavior = MockBehavior::BlockUntilCancelled;
        self
    }

    pub fn fails_to_spawn(mut self) -> Self {
        self.expectation.behavior = MockBehavior::FailToSpawn;
        self
    }

    /// Match at most `n` calls; later calls fall through to other expectations
    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        self.runner
            .expectations
            .lock()
            .unwrap()
            .push(self.expectation);
    }
}

impl Default for MockProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}
