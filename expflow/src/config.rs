//! Run configuration.
//!
//! An explicit, enumerated configuration object replaces the ambient shell
//! variables the original experiment scripts inherited from sourced files.
//! Knobs like `embed_dim` and `cohort_size` parameterize which commands a
//! recipe constructs; the orchestrator core passes them through opaquely.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// First stage index to execute. Stages below it are skipped.
    pub start_stage: u32,

    /// Selects the queue-backed compute backend instead of local processes.
    pub use_accelerated_backend: bool,

    /// Queue launcher settings, used when the accelerated backend is selected.
    pub queue: QueueConfig,

    /// Embedding dimensionality forwarded to extraction and backend tools.
    pub embed_dim: u32,

    /// Cohort size forwarded to the score-normalization tool.
    pub cohort_size: u32,

    /// Evaluation datasets the scoring stages fan out over.
    pub datasets: Vec<String>,

    /// Additional knobs forwarded to external tools without interpretation.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_stage: 1,
            use_accelerated_backend: false,
            queue: QueueConfig::default(),
            embed_dim: 256,
            cohort_size: 1000,
            datasets: Vec::new(),
            extra: HashMap::new(),
        }
    }
}

impl RunConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the first stage index to execute.
    #[must_use]
    pub fn with_start_stage(mut self, start_stage: u32) -> Self {
        self.start_stage = start_stage;
        self
    }

    /// Selects the queue-backed compute backend.
    #[must_use]
    pub fn with_accelerated_backend(mut self, queue: QueueConfig) -> Self {
        self.use_accelerated_backend = true;
        self.queue = queue;
        self
    }

    /// Sets the embedding dimensionality.
    #[must_use]
    pub fn with_embed_dim(mut self, embed_dim: u32) -> Self {
        self.embed_dim = embed_dim;
        self
    }

    /// Sets the normalization cohort size.
    #[must_use]
    pub fn with_cohort_size(mut self, cohort_size: u32) -> Self {
        self.cohort_size = cohort_size;
        self
    }

    /// Adds an evaluation dataset.
    #[must_use]
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.datasets.push(dataset.into());
        self
    }

    /// Adds several evaluation datasets.
    #[must_use]
    pub fn with_datasets(mut self, datasets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.datasets.extend(datasets.into_iter().map(Into::into));
        self
    }

    /// Adds an opaque passthrough knob.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `start_stage` is zero or `embed_dim` is
    /// zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_stage == 0 {
            return Err(ConfigError::new("start_stage must be at least 1"));
        }
        if self.embed_dim == 0 {
            return Err(ConfigError::new("embed_dim must be non-zero"));
        }
        Ok(())
    }
}

/// Queue launcher settings for the accelerated backend.
///
/// The launcher is an external program that submits its trailing arguments as
/// a cluster job and blocks until the job finishes, in the manner of
/// `queue.pl`-style wrappers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// The launcher executable.
    pub launcher: String,

    /// Fixed arguments placed before any per-command resource flags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub launcher_args: Vec<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            launcher: "queue.pl".to_string(),
            launcher_args: Vec::new(),
        }
    }
}

impl QueueConfig {
    /// Creates queue settings for the given launcher executable.
    #[must_use]
    pub fn new(launcher: impl Into<String>) -> Self {
        Self {
            launcher: launcher.into(),
            launcher_args: Vec::new(),
        }
    }

    /// Appends a fixed launcher argument.
    #[must_use]
    pub fn launcher_arg(mut self, arg: impl Into<String>) -> Self {
        self.launcher_args.push(arg.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();

        assert_eq!(config.start_stage, 1);
        assert!(!config.use_accelerated_backend);
        assert_eq!(config.embed_dim, 256);
        assert_eq!(config.cohort_size, 1000);
        assert!(config.datasets.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RunConfig::new()
            .with_start_stage(3)
            .with_datasets(["sre16", "sre18", "voxceleb1"])
            .with_embed_dim(512)
            .with_extra("plda_iters", serde_json::json!(10));

        assert_eq!(config.start_stage, 3);
        assert_eq!(config.datasets.len(), 3);
        assert_eq!(config.embed_dim, 512);
        assert_eq!(config.extra["plda_iters"], serde_json::json!(10));
    }

    #[test]
    fn test_validate_rejects_zero_start_stage() {
        let config = RunConfig::new().with_start_stage(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_accelerated_backend_selection() {
        let config = RunConfig::new()
            .with_accelerated_backend(QueueConfig::new("slurm.pl").launcher_arg("--config"));

        assert!(config.use_accelerated_backend);
        assert_eq!(config.queue.launcher, "slurm.pl");
        assert_eq!(config.queue.launcher_args, vec!["--config".to_string()]);
    }

    #[test]
    fn test_round_trip_serialization() {
        let config = RunConfig::new().with_dataset("janus");
        let json = serde_json::to_string(&config).unwrap();
        let back: RunConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(back.datasets, vec!["janus".to_string()]);
        assert_eq!(back.cohort_size, config.cohort_size);
    }
}
