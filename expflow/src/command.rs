//! External command invocations, the leaf unit of pipeline work.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A single external invocation belonging to a stage.
///
/// The orchestrator never interprets argument semantics; a command is an
/// opaque executable reference plus an ordered argument list. Immutable once
/// built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageCommand {
    program: String,
    args: Vec<String>,
    expected_outputs: Vec<PathBuf>,
    background: bool,
    #[serde(default, skip_serializing_if = "ResourceHints::is_empty")]
    resources: ResourceHints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout: Option<Duration>,
}

impl StageCommand {
    /// Creates a command for the given executable.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            expected_outputs: Vec::new(),
            background: false,
            resources: ResourceHints::default(),
            timeout: None,
        }
    }

    /// Appends a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends a path argument.
    #[must_use]
    pub fn path_arg(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push(path.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Marks the command to run in the background.
    ///
    /// A background command returns from dispatch immediately; completion is
    /// observed at the stage barrier.
    #[must_use]
    pub fn background(mut self) -> Self {
        self.background = true;
        self
    }

    /// Declares a path the command is expected to produce.
    ///
    /// Expected outputs are advisory: the runner logs a warning if one is
    /// missing after the command's stage completes, but missing outputs do
    /// not fail the run.
    #[must_use]
    pub fn expect_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.expected_outputs.push(path.into());
        self
    }

    /// Sets resource requirements, passed through to the compute backend.
    #[must_use]
    pub fn with_resources(mut self, resources: ResourceHints) -> Self {
        self.resources = resources;
        self
    }

    /// Sets a wall-clock limit for the command.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the executable reference.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the ordered argument list.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Returns the declared expected output paths.
    #[must_use]
    pub fn expected_outputs(&self) -> &[PathBuf] {
        &self.expected_outputs
    }

    /// Returns true if the command runs in the background.
    #[must_use]
    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Returns the resource requirements.
    #[must_use]
    pub fn resources(&self) -> &ResourceHints {
        &self.resources
    }

    /// Returns the wall-clock limit, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Renders the command line for logs and error messages.
    ///
    /// Arguments containing whitespace are single-quoted.
    #[must_use]
    pub fn rendered(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.chars().any(char::is_whitespace) {
                line.push('\'');
                line.push_str(arg);
                line.push('\'');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

impl fmt::Display for StageCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rendered())
    }
}

/// Resource requirements attached to a command.
///
/// Never interpreted by the orchestrator core; a queue-backed dispatcher
/// translates them into launcher flags, the local dispatcher ignores them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHints {
    /// Requested CPU threads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,
    /// Requested GPUs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpus: Option<u32>,
    /// Requested memory in megabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    /// Raw extra launcher arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
}

impl ResourceHints {
    /// Creates empty resource hints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests CPU threads.
    #[must_use]
    pub fn cpus(mut self, cpus: u32) -> Self {
        self.cpus = Some(cpus);
        self
    }

    /// Requests GPUs.
    #[must_use]
    pub fn gpus(mut self, gpus: u32) -> Self {
        self.gpus = Some(gpus);
        self
    }

    /// Requests memory in megabytes.
    #[must_use]
    pub fn memory_mb(mut self, memory_mb: u64) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }

    /// Appends a raw launcher argument.
    #[must_use]
    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra.push(arg.into());
        self
    }

    /// Returns true if no requirement is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cpus.is_none() && self.gpus.is_none() && self.memory_mb.is_none() && self.extra.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = StageCommand::new("local/score.sh")
            .arg("--backend-dir")
            .path_arg("/exp/backend")
            .arg("sre16")
            .background()
            .expect_output("/exp/scores/sre16/sre16_results");

        assert_eq!(cmd.program(), "local/score.sh");
        assert_eq!(cmd.arguments().len(), 3);
        assert!(cmd.is_background());
        assert_eq!(cmd.expected_outputs().len(), 1);
    }

    #[test]
    fn test_rendered_quotes_whitespace() {
        let cmd = StageCommand::new("/bin/sh").arg("-c").arg("exit 0");
        assert_eq!(cmd.rendered(), "/bin/sh -c 'exit 0'");
    }

    #[test]
    fn test_default_is_foreground_without_hints() {
        let cmd = StageCommand::new("true");
        assert!(!cmd.is_background());
        assert!(cmd.resources().is_empty());
        assert!(cmd.timeout().is_none());
    }

    #[test]
    fn test_resource_hints_builder() {
        let hints = ResourceHints::new().cpus(4).gpus(1).memory_mb(16_000);

        assert_eq!(hints.cpus, Some(4));
        assert_eq!(hints.gpus, Some(1));
        assert_eq!(hints.memory_mb, Some(16_000));
        assert!(!hints.is_empty());
    }

    #[test]
    fn test_command_serialization() {
        let cmd = StageCommand::new("local/calibrate.sh")
            .arg("--prior")
            .arg("0.05")
            .with_resources(ResourceHints::new().cpus(2));

        let json = serde_json::to_string(&cmd).unwrap();
        let back: StageCommand = serde_json::from_str(&json).unwrap();

        assert_eq!(back.program(), "local/calibrate.sh");
        assert_eq!(back.resources().cpus, Some(2));
    }
}
