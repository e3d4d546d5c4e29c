//! Ordered stage graphs with index validation.

use super::Stage;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// An ordered list of stages validated once at definition time.
///
/// Replaces the repeated `if [ $stage -le $N ]` guards of the original
/// scripts with a single declarative structure: stages execute in index
/// order, and a run can start anywhere in the sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageGraph {
    name: String,
    stages: Vec<Stage>,
}

impl StageGraph {
    /// Defines a graph from stages in execution order.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the list is empty, an index is zero, or
    /// indices are not strictly increasing in definition order.
    pub fn define(name: impl Into<String>, stages: Vec<Stage>) -> Result<Self, ConfigError> {
        let name = name.into();

        if stages.is_empty() {
            return Err(ConfigError::new(format!(
                "pipeline '{name}' has no stages"
            )));
        }

        for stage in &stages {
            if stage.index() == 0 {
                return Err(ConfigError::new(format!(
                    "stage '{}' has index 0; stage indices start at 1",
                    stage.name()
                ))
                .with_stage_indices([0]));
            }
        }

        for pair in stages.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.index() <= prev.index() {
                return Err(ConfigError::new(format!(
                    "stage indices must be strictly increasing: '{}' (index {}) follows '{}' (index {})",
                    next.name(),
                    next.index(),
                    prev.name(),
                    prev.index()
                ))
                .with_stage_indices([prev.index(), next.index()]));
            }
        }

        Ok(Self { name, stages })
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns all stages in index order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the stages with index >= `start`, in index order.
    ///
    /// Lazy and restartable; calling it again yields a fresh iterator.
    pub fn stages_from(&self, start: u32) -> impl Iterator<Item = &Stage> {
        self.stages.iter().filter(move |stage| stage.runs_from(start))
    }
}
