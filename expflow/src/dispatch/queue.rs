//! Queue-backed compute backend.
//!
//! Wraps each command with a launcher executable that submits it to a cluster
//! queue and blocks until the job finishes, the way `queue.pl`-style wrappers
//! do. Resource hints become launcher flags; everything after them is the
//! original command line, untouched.

use super::{JobDispatcher, JobHandle, LocalDispatcher};
use crate::command::StageCommand;
use crate::config::QueueConfig;
use crate::errors::DispatchError;
use async_trait::async_trait;

/// Submits stage commands through a queue launcher.
#[derive(Debug, Clone)]
pub struct QueueDispatcher {
    config: QueueConfig,
    local: LocalDispatcher,
}

impl QueueDispatcher {
    /// Creates a queue dispatcher with the given launcher settings.
    #[must_use]
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            local: LocalDispatcher::new(),
        }
    }

    /// Returns the launcher settings.
    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn wrap(&self, cmd: &StageCommand) -> StageCommand {
        let mut wrapped = StageCommand::new(&self.config.launcher)
            .args(self.config.launcher_args.iter().cloned());

        let hints = cmd.resources();
        if let Some(cpus) = hints.cpus {
            wrapped = wrapped.arg("--num-threads").arg(cpus.to_string());
        }
        if let Some(gpus) = hints.gpus {
            wrapped = wrapped.arg("--gpu").arg(gpus.to_string());
        }
        if let Some(memory_mb) = hints.memory_mb {
            wrapped = wrapped.arg("--mem").arg(format!("{memory_mb}M"));
        }
        wrapped = wrapped.args(hints.extra.iter().cloned());

        wrapped = wrapped.arg(cmd.program()).args(cmd.arguments().iter().cloned());

        for output in cmd.expected_outputs() {
            wrapped = wrapped.expect_output(output.clone());
        }
        if cmd.is_background() {
            wrapped = wrapped.background();
        }
        if let Some(timeout) = cmd.timeout() {
            wrapped = wrapped.with_timeout(timeout);
        }
        wrapped
    }
}

#[async_trait]
impl JobDispatcher for QueueDispatcher {
    async fn submit(&self, cmd: &StageCommand) -> Result<JobHandle, DispatchError> {
        self.local.submit(&self.wrap(cmd)).await
    }
}
