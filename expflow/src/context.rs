//! Run identity for tracking pipeline executions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a single pipeline run.
///
/// A fresh identity is minted per invocation; the experiment label is the
/// operator-chosen name the run's directory tree is keyed by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this pipeline run.
    pub run_id: Uuid,

    /// The experiment this run belongs to, if named.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment: Option<String>,
}

impl RunIdentity {
    /// Creates a new run identity with a generated run ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            experiment: None,
        }
    }

    /// Sets the experiment label.
    #[must_use]
    pub fn with_experiment(mut self, experiment: impl Into<String>) -> Self {
        self.experiment = Some(experiment.into());
        self
    }

    /// Returns the run ID as a string.
    #[must_use]
    pub fn run_id_str(&self) -> String {
        self.run_id.to_string()
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}
