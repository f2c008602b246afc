//! Runner that records invocations instead of spawning them
//!
//! Queued responses are replayed in order; once the queue is empty every
//! invocation succeeds with empty output. Used for `--dry-run` and tests.
//! Only a runner built with [`RecordingRunner::dry_run`] reports itself as a
//! dry run; tests queue outputs to stand in for a real host.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::modules::{
    error::ModuleError,
    executor::{CommandRunner, ExecutionOutput, Invocation},
};

#[derive(Debug)]
enum Response {
    Output(ExecutionOutput),
    SpawnFailure,
}

#[derive(Debug, Default)]
pub struct RecordingRunner {
    invocations: Mutex<Vec<Invocation>>,
    responses: Mutex<VecDeque<Response>>,
    dry_run: bool,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder for `--dry-run`: adapters skip checks that need a real host.
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    /// Queue the result of the next unanswered invocation.
    pub fn push_output(&self, output: impl Into<String>, exit_code: i32) -> &Self {
        self.lock_responses()
            .push_back(Response::Output(ExecutionOutput::new(output, exit_code)));
        self
    }

    /// Queue a spawn failure, as if the program did not exist.
    pub fn push_spawn_failure(&self) -> &Self {
        self.lock_responses().push_back(Response::SpawnFailure);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        match self.invocations.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(Invocation::command_line)
            .collect()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Response>> {
        match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionOutput, ModuleError> {
        match self.invocations.lock() {
            Ok(mut guard) => guard.push(invocation.clone()),
            Err(poisoned) => poisoned.into_inner().push(invocation.clone()),
        }

        match self.lock_responses().pop_front() {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::SpawnFailure) => Err(ModuleError::Spawn {
                program: invocation.program_name(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "program not found"),
            }),
            None => Ok(ExecutionOutput::new("", 0)),
        }
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}
