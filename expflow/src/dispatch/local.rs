//! Local process backend.

use super::{JobDispatcher, JobHandle, RunningJob};
use crate::command::StageCommand;
use crate::errors::DispatchError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs stage commands as OS processes on the local machine.
///
/// Resource hints are ignored; a workstation run gets whatever the machine
/// has, matching the original scripts' local execution mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDispatcher;

impl LocalDispatcher {
    /// Creates a local dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobDispatcher for LocalDispatcher {
    async fn submit(&self, cmd: &StageCommand) -> Result<JobHandle, DispatchError> {
        let rendered = cmd.rendered();

        let mut process = Command::new(cmd.program());
        process
            .args(cmd.arguments())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let child = process
            .spawn()
            .map_err(|err| DispatchError::new(&rendered, err.to_string()))?;

        let backend_job_id = child
            .id()
            .map_or_else(|| "-".to_string(), |pid| pid.to_string());
        debug!(command = %rendered, pid = %backend_job_id, "spawned local process");

        let job = RunningJob::new(child, &rendered, cmd.timeout());
        if cmd.is_background() {
            Ok(JobHandle::running(rendered, backend_job_id, job))
        } else {
            let result = job.resolve(None).await;
            Ok(JobHandle::completed(rendered, backend_job_id, result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{join, JobStatus, JoinPolicy};
    use crate::errors::JobFailure;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> StageCommand {
        StageCommand::new("/bin/sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_foreground_success() {
        let dispatcher = LocalDispatcher::new();
        let handle = dispatcher.submit(&sh("exit 0")).await.unwrap();

        assert_eq!(handle.status(), JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_foreground_failure_reports_exit_code() {
        let dispatcher = LocalDispatcher::new();
        let handle = dispatcher.submit(&sh("exit 3")).await.unwrap();

        assert_eq!(handle.status(), JobStatus::Failed);
        assert_eq!(handle.failure().and_then(JobFailure::exit_code), Some(3));
    }

    #[tokio::test]
    async fn test_missing_executable_is_dispatch_error() {
        let dispatcher = LocalDispatcher::new();
        let cmd = StageCommand::new("/nonexistent/expflow-test-binary");

        let err = dispatcher.submit(&cmd).await.unwrap_err();
        assert!(err.command.contains("expflow-test-binary"));
    }

    #[tokio::test]
    async fn test_background_resolves_at_join() {
        let dispatcher = LocalDispatcher::new();
        let handle = dispatcher.submit(&sh("exit 0").background()).await.unwrap();

        assert_eq!(handle.status(), JobStatus::Running);

        let outcome = join(vec![handle], JoinPolicy::default()).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_join_failure_identifies_failing_command() {
        let dispatcher = LocalDispatcher::new();
        let ok = dispatcher.submit(&sh("exit 0").background()).await.unwrap();
        let bad = dispatcher.submit(&sh("exit 7").background()).await.unwrap();

        let outcome = join(vec![ok, bad], JoinPolicy::default()).await;
        let failure = outcome.failure().unwrap();

        assert_eq!(failure.exit_code(), Some(7));
        assert!(failure.command().contains("exit 7"));
    }

    #[tokio::test]
    async fn test_failure_cancels_straggling_sibling() {
        let dispatcher = LocalDispatcher::new();
        let slow = dispatcher.submit(&sh("sleep 30").background()).await.unwrap();
        let bad = dispatcher.submit(&sh("exit 1").background()).await.unwrap();

        let start = Instant::now();
        let outcome = join(vec![slow, bad], JoinPolicy::default()).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.failure().unwrap().exit_code(), Some(1));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_run_to_completion_waits_for_siblings() {
        let dispatcher = LocalDispatcher::new();
        let slow = dispatcher
            .submit(&sh("sleep 0.3; exit 0").background())
            .await
            .unwrap();
        let bad = dispatcher.submit(&sh("exit 1").background()).await.unwrap();

        let start = Instant::now();
        let outcome = join(vec![slow, bad], JoinPolicy::run_to_completion()).await;

        assert!(!outcome.is_success());
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let dispatcher = LocalDispatcher::new();
        let cmd = sh("sleep 30").with_timeout(Duration::from_millis(100));

        let start = Instant::now();
        let handle = dispatcher.submit(&cmd).await.unwrap();

        assert_eq!(handle.status(), JobStatus::Failed);
        assert!(matches!(
            handle.failure(),
            Some(JobFailure::TimedOut { .. })
        ));
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
