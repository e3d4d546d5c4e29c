//! Pipeline execution.

use super::{Stage, StageGraph};
use crate::context::RunIdentity;
use crate::dispatch::{cancel_all, join, JobDispatcher, JobHandle, JobStatus, JoinOutcome, JoinPolicy};
use crate::errors::ExpflowError;
use crate::events::{EventSink, NoOpEventSink};
use crate::utils::{now_utc, Timestamp};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Walks a stage graph in index order, dispatching each stage's commands and
/// holding at the barrier until all of them resolve.
///
/// Fail-fast: the first failed stage ends the run; later stages are never
/// dispatched. Completed stages' outputs persist on the filesystem, so a
/// failed run can be resumed with a later start index.
pub struct PipelineRunner {
    dispatcher: Arc<dyn JobDispatcher>,
    sink: Arc<dyn EventSink>,
    policy: JoinPolicy,
}

impl PipelineRunner {
    /// Creates a runner over the given compute backend.
    #[must_use]
    pub fn new(dispatcher: Arc<dyn JobDispatcher>) -> Self {
        Self {
            dispatcher,
            sink: Arc::new(NoOpEventSink),
            policy: JoinPolicy::default(),
        }
    }

    /// Sets the event sink receiving run lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the sibling policy applied at each stage barrier.
    #[must_use]
    pub fn with_join_policy(mut self, policy: JoinPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs the graph from the requested start stage.
    ///
    /// Stages with index below `start_stage` are skipped. Re-running with a
    /// smaller start index re-executes completed stages; idempotence is the
    /// responsibility of the external tools, which overwrite their outputs.
    pub async fn run(&self, graph: &StageGraph, start_stage: u32) -> PipelineRun {
        let identity = RunIdentity::new().with_experiment(graph.name());
        let started_at = now_utc();

        info!(
            pipeline = graph.name(),
            run_id = %identity.run_id,
            start_stage,
            "pipeline run started"
        );
        self.sink.try_emit(
            "run.started",
            Some(json!({
                "run_id": identity.run_id_str(),
                "pipeline": graph.name(),
                "start_stage": start_stage,
            })),
        );

        let mut last_stage = None;
        for stage in graph.stages_from(start_stage) {
            last_stage = Some(stage.index());
            info!(
                stage = stage.name(),
                index = stage.index(),
                commands = stage.commands().len(),
                "stage started"
            );
            self.sink.try_emit(
                "stage.started",
                Some(json!({"index": stage.index(), "name": stage.name()})),
            );

            if let Err(cause) = self.run_stage(stage).await {
                error!(stage = stage.name(), index = stage.index(), error = %cause, "stage failed");
                self.sink.try_emit(
                    "stage.failed",
                    Some(json!({
                        "index": stage.index(),
                        "name": stage.name(),
                        "error": cause.to_string(),
                    })),
                );
                self.sink.try_emit(
                    "run.failed",
                    Some(json!({
                        "run_id": identity.run_id_str(),
                        "stage_index": stage.index(),
                    })),
                );

                return PipelineRun {
                    identity,
                    pipeline: graph.name().to_string(),
                    requested_start: start_stage,
                    last_stage,
                    outcome: RunOutcome::Failed {
                        stage_index: stage.index(),
                        cause,
                    },
                    started_at,
                    finished_at: now_utc(),
                };
            }

            self.sink.try_emit(
                "stage.completed",
                Some(json!({"index": stage.index(), "name": stage.name()})),
            );
        }

        info!(pipeline = graph.name(), run_id = %identity.run_id, "pipeline run completed");
        self.sink.try_emit(
            "run.completed",
            Some(json!({"run_id": identity.run_id_str()})),
        );

        PipelineRun {
            identity,
            pipeline: graph.name().to_string(),
            requested_start: start_stage,
            last_stage,
            outcome: RunOutcome::Succeeded,
            started_at,
            finished_at: now_utc(),
        }
    }

    /// Dispatches one stage's commands and holds at the barrier.
    async fn run_stage(&self, stage: &Stage) -> Result<(), ExpflowError> {
        let mut handles: Vec<JobHandle> = Vec::with_capacity(stage.commands().len());

        for command in stage.commands() {
            self.sink.try_emit(
                "command.dispatched",
                Some(json!({
                    "stage": stage.name(),
                    "command": command.rendered(),
                    "background": command.is_background(),
                })),
            );

            match self.dispatcher.submit(command).await {
                Ok(handle) => {
                    let failed = handle.status() == JobStatus::Failed;
                    handles.push(handle);
                    if failed {
                        // A foreground failure stops further dispatch within
                        // the stage, matching `set -e`.
                        break;
                    }
                }
                Err(err) => {
                    cancel_all(handles).await;
                    return Err(err.into());
                }
            }
        }

        match join(handles, self.policy).await {
            JoinOutcome::Succeeded => {
                warn_missing_outputs(stage);
                Ok(())
            }
            JoinOutcome::Failed(failure) => Err(failure.into()),
        }
    }
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("dispatcher", &self.dispatcher)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn warn_missing_outputs(stage: &Stage) {
    for command in stage.commands() {
        for path in command.expected_outputs() {
            if !path.exists() {
                warn!(
                    stage = stage.name(),
                    path = %path.display(),
                    "expected output missing after stage completed"
                );
            }
        }
    }
}

/// Record of one pipeline invocation.
#[derive(Debug)]
pub struct PipelineRun {
    /// Identity of this run.
    pub identity: RunIdentity,
    /// The pipeline name.
    pub pipeline: String,
    /// The requested start stage index.
    pub requested_start: u32,
    /// Index of the last stage the run progressed to, if any ran.
    pub last_stage: Option<u32>,
    /// Terminal outcome of the run.
    pub outcome: RunOutcome,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run reached its terminal outcome.
    pub finished_at: Timestamp,
}

impl PipelineRun {
    /// Returns true if every executed stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Returns the index of the failed stage, if the run failed.
    #[must_use]
    pub fn failed_stage(&self) -> Option<u32> {
        match &self.outcome {
            RunOutcome::Failed { stage_index, .. } => Some(*stage_index),
            _ => None,
        }
    }

    /// Returns the wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Outcome of a pipeline run.
#[derive(Debug)]
pub enum RunOutcome {
    /// The run is still executing.
    Running,
    /// Every executed stage succeeded.
    Succeeded,
    /// A stage failed; no later stage was dispatched.
    Failed {
        /// Index of the failed stage.
        stage_index: u32,
        /// What failed the stage.
        cause: ExpflowError,
    },
}

impl RunOutcome {
    /// Returns true for terminal outcomes.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}
