//! Mock dispatchers for testing.

use crate::command::StageCommand;
use crate::dispatch::{JobDispatcher, JobHandle};
use crate::errors::{DispatchError, JobFailure};
use async_trait::async_trait;
use parking_lot::Mutex;

/// A spy dispatcher that records every dispatched command line.
///
/// Commands complete instantly and successfully unless scripted otherwise:
/// [`fail_on`](Self::fail_on) makes matching commands exit non-zero,
/// [`refuse_on`](Self::refuse_on) makes the backend reject them outright.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    dispatched: Mutex<Vec<String>>,
    failing: Mutex<Vec<String>>,
    refusing: Mutex<Vec<String>>,
}

impl RecordingDispatcher {
    /// Creates a new spy dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts commands whose rendered line contains `needle` to fail.
    pub fn fail_on(&self, needle: impl Into<String>) {
        self.failing.lock().push(needle.into());
    }

    /// Scripts commands whose rendered line contains `needle` to be refused
    /// by the backend.
    pub fn refuse_on(&self, needle: impl Into<String>) {
        self.refusing.lock().push(needle.into());
    }

    /// Returns every dispatched command line, in dispatch order.
    #[must_use]
    pub fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().clone()
    }

    /// Returns the number of dispatched commands.
    #[must_use]
    pub fn dispatch_count(&self) -> usize {
        self.dispatched.lock().len()
    }

    /// Returns true if any dispatched command line contains `needle`.
    #[must_use]
    pub fn was_dispatched(&self, needle: &str) -> bool {
        self.dispatched.lock().iter().any(|line| line.contains(needle))
    }
}

#[async_trait]
impl JobDispatcher for RecordingDispatcher {
    async fn submit(&self, cmd: &StageCommand) -> Result<JobHandle, DispatchError> {
        let rendered = cmd.rendered();

        if self
            .refusing
            .lock()
            .iter()
            .any(|needle| rendered.contains(needle))
        {
            return Err(DispatchError::new(&rendered, "backend refused job"));
        }

        let mut dispatched = self.dispatched.lock();
        dispatched.push(rendered.clone());
        let backend_job_id = format!("spy-{}", dispatched.len());
        drop(dispatched);

        let result = if self
            .failing
            .lock()
            .iter()
            .any(|needle| rendered.contains(needle))
        {
            Err(JobFailure::exit(&rendered, 1))
        } else {
            Ok(())
        };

        Ok(JobHandle::completed(rendered, backend_job_id, result))
    }
}
