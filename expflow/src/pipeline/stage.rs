//! Stage definitions.

use crate::command::StageCommand;
use serde::{Deserialize, Serialize};

/// One numbered phase of a pipeline.
///
/// Carries an index, a name, and the commands to dispatch. Immutable once
/// defined; a stage with no commands is a legal no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    index: u32,
    name: String,
    commands: Vec<StageCommand>,
}

impl Stage {
    /// Creates a stage with the given index and name.
    #[must_use]
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            commands: Vec::new(),
        }
    }

    /// Appends a command.
    #[must_use]
    pub fn command(mut self, command: StageCommand) -> Self {
        self.commands.push(command);
        self
    }

    /// Appends several commands.
    #[must_use]
    pub fn with_commands(mut self, commands: impl IntoIterator<Item = StageCommand>) -> Self {
        self.commands.extend(commands);
        self
    }

    /// Returns the stage index.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the commands in dispatch order.
    #[must_use]
    pub fn commands(&self) -> &[StageCommand] {
        &self.commands
    }

    /// Returns true if the stage executes for the given requested start index.
    ///
    /// Monotonic: once `start > index`, the stage is skipped for every later
    /// start as well.
    #[must_use]
    pub fn runs_from(&self, start: u32) -> bool {
        self.index >= start
    }
}
