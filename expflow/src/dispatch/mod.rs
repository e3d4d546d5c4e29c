//! Job dispatch and barrier synchronization.
//!
//! A [`JobDispatcher`] submits a [`StageCommand`] to a compute backend and
//! returns a [`JobHandle`]. Foreground commands are resolved before `submit`
//! returns; background commands stay live until [`join`] drains them. `join`
//! is the stage barrier: every handle reaches a terminal status before it
//! returns.

mod local;
mod queue;

pub use local::LocalDispatcher;
pub use queue::QueueDispatcher;

use crate::command::StageCommand;
use crate::config::RunConfig;
use crate::errors::{DispatchError, JobFailure};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::watch;
use tracing::debug;

/// Trait for compute backends that can run stage commands.
#[async_trait]
pub trait JobDispatcher: Send + Sync + Debug {
    /// Submits a command to the backend.
    ///
    /// If the command is foreground, blocks until it completes and returns a
    /// handle in a terminal state. If it is background, returns immediately
    /// with a handle in the `Running` state.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] if the backend could not accept the job.
    async fn submit(&self, cmd: &StageCommand) -> Result<JobHandle, DispatchError>;
}

/// Selects the dispatcher implied by a run configuration.
#[must_use]
pub fn from_config(config: &RunConfig) -> Arc<dyn JobDispatcher> {
    if config.use_accelerated_backend {
        Arc::new(QueueDispatcher::new(config.queue.clone()))
    } else {
        Arc::new(LocalDispatcher::new())
    }
}

/// Status of a dispatched job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted by the backend but not yet running.
    Pending,
    /// Running asynchronously; resolved at the stage barrier.
    Running,
    /// Terminal: the command completed successfully.
    Succeeded,
    /// Terminal: the command failed.
    Failed,
}

impl JobStatus {
    /// Returns true for terminal statuses.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// A handle to a dispatched job.
///
/// Handles live for the duration of one pipeline run; [`join`] consumes them
/// at the stage barrier.
#[derive(Debug)]
pub struct JobHandle {
    command: String,
    backend_job_id: String,
    outcome: HandleOutcome,
}

#[derive(Debug)]
enum HandleOutcome {
    Completed(Result<(), JobFailure>),
    Pending(RunningJob),
}

impl JobHandle {
    /// Creates a handle already in a terminal state.
    ///
    /// Used by dispatchers for foreground commands, and by test doubles.
    #[must_use]
    pub fn completed(
        command: impl Into<String>,
        backend_job_id: impl Into<String>,
        result: Result<(), JobFailure>,
    ) -> Self {
        Self {
            command: command.into(),
            backend_job_id: backend_job_id.into(),
            outcome: HandleOutcome::Completed(result),
        }
    }

    pub(crate) fn running(
        command: impl Into<String>,
        backend_job_id: impl Into<String>,
        job: RunningJob,
    ) -> Self {
        Self {
            command: command.into(),
            backend_job_id: backend_job_id.into(),
            outcome: HandleOutcome::Pending(job),
        }
    }

    /// Returns the rendered command line this handle tracks.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the opaque backend job ID.
    #[must_use]
    pub fn backend_job_id(&self) -> &str {
        &self.backend_job_id
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        match &self.outcome {
            HandleOutcome::Completed(Ok(())) => JobStatus::Succeeded,
            HandleOutcome::Completed(Err(_)) => JobStatus::Failed,
            HandleOutcome::Pending(_) => JobStatus::Running,
        }
    }

    /// Returns the failure, if the handle is in the `Failed` state.
    #[must_use]
    pub fn failure(&self) -> Option<&JobFailure> {
        match &self.outcome {
            HandleOutcome::Completed(Err(failure)) => Some(failure),
            _ => None,
        }
    }
}

/// Controls how [`join`] treats sibling jobs once one of them fails.
///
/// The default kills outstanding siblings, an improvement over the shell
/// `wait` idiom where backgrounded siblings run to completion after the
/// controlling script exits. [`JoinPolicy::run_to_completion`] restores that
/// behavior.
#[derive(Debug, Clone, Copy)]
pub struct JoinPolicy {
    /// Kill outstanding sibling jobs after the first failure.
    pub cancel_stragglers: bool,
}

impl Default for JoinPolicy {
    fn default() -> Self {
        Self {
            cancel_stragglers: true,
        }
    }
}

impl JoinPolicy {
    /// Creates the default policy (cancel stragglers).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets sibling jobs run to completion after a failure.
    #[must_use]
    pub fn run_to_completion() -> Self {
        Self {
            cancel_stragglers: false,
        }
    }
}

/// Outcome of joining a set of job handles.
#[derive(Debug)]
pub enum JoinOutcome {
    /// Every command in the set completed successfully.
    Succeeded,
    /// At least one command failed; carries the first observed failure.
    Failed(JobFailure),
}

impl JoinOutcome {
    /// Returns true if every command succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns the failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&JobFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::Succeeded => None,
        }
    }
}

/// Blocks until every handle reaches a terminal status.
///
/// Failures already recorded on terminal handles take precedence, in submit
/// order; otherwise the first failure observed among live jobs wins. When the
/// policy cancels stragglers, outstanding siblings are killed as soon as a
/// failure is known; their cancellation records never override the primary
/// cause.
pub async fn join(handles: Vec<JobHandle>, policy: JoinPolicy) -> JoinOutcome {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut first_failure: Option<JobFailure> = None;
    let mut live = FuturesUnordered::new();

    for handle in handles {
        match handle.outcome {
            HandleOutcome::Completed(Ok(())) => {}
            HandleOutcome::Completed(Err(failure)) => {
                if first_failure.is_none() {
                    first_failure = Some(failure);
                }
            }
            HandleOutcome::Pending(job) => {
                live.push(job.resolve(Some(cancel_rx.clone())));
            }
        }
    }

    if first_failure.is_some() && policy.cancel_stragglers {
        let _ = cancel_tx.send(true);
    }

    while let Some(result) = live.next().await {
        if let Err(failure) = result {
            if first_failure.is_none() {
                first_failure = Some(failure);
                if policy.cancel_stragglers {
                    let _ = cancel_tx.send(true);
                }
            } else {
                debug!(command = failure.command(), "additional job failure after first");
            }
        }
    }

    match first_failure {
        Some(failure) => JoinOutcome::Failed(failure),
        None => JoinOutcome::Succeeded,
    }
}

/// Kills and reaps every live job among the handles.
///
/// Used when a stage must be abandoned before its barrier, e.g. after the
/// backend rejects a sibling submission.
pub async fn cancel_all(handles: Vec<JobHandle>) {
    let (_cancel_tx, cancel_rx) = watch::channel(true);
    let mut live = FuturesUnordered::new();

    for handle in handles {
        if let HandleOutcome::Pending(job) = handle.outcome {
            live.push(job.resolve(Some(cancel_rx.clone())));
        }
    }

    while live.next().await.is_some() {}
}

/// A live OS process backing a `Running` handle.
#[derive(Debug)]
pub(crate) struct RunningJob {
    child: Child,
    command: String,
    timeout: Option<Duration>,
}

enum WaitEnd {
    Exited(std::process::ExitStatus),
    Cancelled,
}

impl RunningJob {
    pub(crate) fn new(child: Child, command: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            child,
            command: command.into(),
            timeout,
        }
    }

    /// Drives the process to a terminal state.
    ///
    /// Honors the per-command timeout and, when a cancel channel is supplied,
    /// kills the process as soon as cancellation is signalled.
    pub(crate) async fn resolve(
        mut self,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<(), JobFailure> {
        let end = match self.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, wait_or_cancel(&mut self.child, cancel)).await {
                    Ok(end) => end,
                    Err(_elapsed) => {
                        let _ = self.child.start_kill();
                        let _ = self.child.wait().await;
                        return Err(JobFailure::timed_out(&self.command, limit.as_secs()));
                    }
                }
            }
            None => wait_or_cancel(&mut self.child, cancel).await,
        };

        match end {
            Ok(WaitEnd::Cancelled) => Err(JobFailure::cancelled(&self.command)),
            Ok(WaitEnd::Exited(status)) if status.success() => Ok(()),
            Ok(WaitEnd::Exited(status)) => match status.code() {
                Some(code) => Err(JobFailure::exit(&self.command, code)),
                None => Err(JobFailure::signalled(&self.command)),
            },
            Err(err) => {
                debug!(command = %self.command, error = %err, "lost track of child process");
                Err(JobFailure::signalled(&self.command))
            }
        }
    }
}

async fn wait_or_cancel(
    child: &mut Child,
    cancel: Option<watch::Receiver<bool>>,
) -> io::Result<WaitEnd> {
    let Some(mut cancel) = cancel else {
        return child.wait().await.map(WaitEnd::Exited);
    };

    loop {
        if *cancel.borrow() {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Ok(WaitEnd::Cancelled);
        }

        tokio::select! {
            status = child.wait() => return status.map(WaitEnd::Exited),
            changed = cancel.changed() => {
                if changed.is_err() {
                    // Sender dropped; cancellation can no longer arrive.
                    return child.wait().await.map(WaitEnd::Exited);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn test_completed_handle_accessors() {
        let handle = JobHandle::completed("echo ok", "42", Ok(()));

        assert_eq!(handle.command(), "echo ok");
        assert_eq!(handle.backend_job_id(), "42");
        assert_eq!(handle.status(), JobStatus::Succeeded);
        assert!(handle.failure().is_none());
    }

    #[test]
    fn test_failed_handle_carries_failure() {
        let handle = JobHandle::completed("false", "7", Err(JobFailure::exit("false", 1)));

        assert_eq!(handle.status(), JobStatus::Failed);
        assert_eq!(handle.failure().and_then(JobFailure::exit_code), Some(1));
    }

    #[tokio::test]
    async fn test_join_all_succeeded() {
        let handles = vec![
            JobHandle::completed("a", "1", Ok(())),
            JobHandle::completed("b", "2", Ok(())),
        ];

        let outcome = join(handles, JoinPolicy::default()).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_join_empty_set_succeeds() {
        let outcome = join(Vec::new(), JoinPolicy::default()).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_join_identifies_first_failure_in_submit_order() {
        let handles = vec![
            JobHandle::completed("a", "1", Ok(())),
            JobHandle::completed("b", "2", Err(JobFailure::exit("b", 2))),
            JobHandle::completed("c", "3", Err(JobFailure::exit("c", 3))),
        ];

        let outcome = join(handles, JoinPolicy::default()).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.command(), "b");
        assert_eq!(failure.exit_code(), Some(2));
    }

    #[test]
    fn test_from_config_selects_backend() {
        use crate::config::QueueConfig;

        let local = from_config(&RunConfig::new());
        assert!(format!("{local:?}").contains("LocalDispatcher"));

        let queue =
            from_config(&RunConfig::new().with_accelerated_backend(QueueConfig::new("slurm.pl")));
        assert!(format!("{queue:?}").contains("QueueDispatcher"));
    }

    #[test]
    fn test_join_policy_defaults() {
        assert!(JoinPolicy::new().cancel_stragglers);
        assert!(!JoinPolicy::run_to_completion().cancel_stragglers);
    }
}
