//! Experiment directory layout.
//!
//! Stages communicate exclusively through the filesystem. The layout derives
//! the well-known directory tree an experiment is keyed by: an embeddings
//! directory, a backend-model directory, and a per-dataset scores directory.
//! Pure path arithmetic; the orchestrator threads these paths into commands
//! without interpreting them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory tree of one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentLayout {
    root: PathBuf,
}

impl ExperimentLayout {
    /// Creates a layout rooted at the given experiment directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the experiment root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory the embedding-extraction stage writes to.
    #[must_use]
    pub fn embeddings_dir(&self) -> PathBuf {
        self.root.join("xvectors")
    }

    /// Directory the backend-training stage writes its models to.
    #[must_use]
    pub fn backend_dir(&self) -> PathBuf {
        self.root.join("backend")
    }

    /// Scores directory for one dataset.
    ///
    /// Parallel scoring jobs avoid write conflicts by construction: each
    /// dataset gets its own directory.
    #[must_use]
    pub fn scores_dir(&self, dataset: &str) -> PathBuf {
        self.root.join("scores").join(dataset)
    }

    /// Conventional path of a dataset's plain-text result file.
    #[must_use]
    pub fn results_path(&self, dataset: &str) -> PathBuf {
        self.scores_dir(dataset).join(format!("{dataset}_results"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_layout_paths() {
        let layout = ExperimentLayout::new("/exp/sre21");

        assert_eq!(layout.embeddings_dir(), PathBuf::from("/exp/sre21/xvectors"));
        assert_eq!(layout.backend_dir(), PathBuf::from("/exp/sre21/backend"));
        assert_eq!(
            layout.scores_dir("sre16"),
            PathBuf::from("/exp/sre21/scores/sre16")
        );
        assert_eq!(
            layout.results_path("sre16"),
            PathBuf::from("/exp/sre21/scores/sre16/sre16_results")
        );
    }

    #[test]
    fn test_datasets_get_distinct_scores_dirs() {
        let layout = ExperimentLayout::new("/exp/run");
        assert_ne!(layout.scores_dir("sre16"), layout.scores_dir("sre18"));
    }

    #[test]
    fn test_layout_serialization() {
        let layout = ExperimentLayout::new("/exp/run");
        let json = serde_json::to_string(&layout).unwrap();
        let back: ExperimentLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(layout, back);
    }
}
