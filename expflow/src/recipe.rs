//! Canonical speaker-verification recipe.
//!
//! Builds the stage graph the experiment scripts repeat for every benchmark:
//! extract embeddings, train the scoring backend, score each evaluation
//! dataset in parallel, normalize scores against a cohort, calibrate, and
//! report. Tool semantics stay opaque; the recipe only sequences executables
//! and threads layout paths between them.

use crate::collector::ResultCollector;
use crate::command::{ResourceHints, StageCommand};
use crate::config::RunConfig;
use crate::errors::ConfigError;
use crate::layout::ExperimentLayout;
use crate::pipeline::{Stage, StageGraph};
use tracing::warn;

/// Executable references for each recipe step.
///
/// Defaults follow the `local/` script convention of recipe directories.
#[derive(Debug, Clone)]
pub struct RecipeTools {
    /// Embedding-extraction executable.
    pub extract_embeddings: String,
    /// Backend-training executable.
    pub train_backend: String,
    /// Per-dataset scoring executable.
    pub score: String,
    /// Score-normalization executable.
    pub normalize: String,
    /// Calibration executable.
    pub calibrate: String,
}

impl Default for RecipeTools {
    fn default() -> Self {
        Self {
            extract_embeddings: "local/extract_xvectors.sh".to_string(),
            train_backend: "local/train_backend.sh".to_string(),
            score: "local/score.sh".to_string(),
            normalize: "local/normalize_scores.sh".to_string(),
            calibrate: "local/calibrate_scores.sh".to_string(),
        }
    }
}

impl RecipeTools {
    /// Creates the default tool set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the embedding-extraction executable.
    #[must_use]
    pub fn with_extract_embeddings(mut self, program: impl Into<String>) -> Self {
        self.extract_embeddings = program.into();
        self
    }

    /// Sets the backend-training executable.
    #[must_use]
    pub fn with_train_backend(mut self, program: impl Into<String>) -> Self {
        self.train_backend = program.into();
        self
    }

    /// Sets the scoring executable.
    #[must_use]
    pub fn with_score(mut self, program: impl Into<String>) -> Self {
        self.score = program.into();
        self
    }

    /// Sets the score-normalization executable.
    #[must_use]
    pub fn with_normalize(mut self, program: impl Into<String>) -> Self {
        self.normalize = program.into();
        self
    }

    /// Sets the calibration executable.
    #[must_use]
    pub fn with_calibrate(mut self, program: impl Into<String>) -> Self {
        self.calibrate = program.into();
        self
    }
}

/// Builds the speaker-verification stage graph from a run configuration.
#[derive(Debug, Clone)]
pub struct VerificationRecipe {
    config: RunConfig,
    layout: ExperimentLayout,
    tools: RecipeTools,
}

impl VerificationRecipe {
    /// Creates a recipe over the given configuration and layout.
    #[must_use]
    pub fn new(config: RunConfig, layout: ExperimentLayout) -> Self {
        Self {
            config,
            layout,
            tools: RecipeTools::default(),
        }
    }

    /// Overrides the tool executables.
    #[must_use]
    pub fn with_tools(mut self, tools: RecipeTools) -> Self {
        self.tools = tools;
        self
    }

    /// Returns the run configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Returns the experiment layout.
    #[must_use]
    pub fn layout(&self) -> &ExperimentLayout {
        &self.layout
    }

    /// Builds the stage graph.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn build(&self) -> Result<StageGraph, ConfigError> {
        self.config.validate()?;

        let embed_dim = self.config.embed_dim.to_string();

        let mut extract = StageCommand::new(&self.tools.extract_embeddings)
            .arg("--embed-dim")
            .arg(&embed_dim)
            .path_arg(self.layout.embeddings_dir());
        if self.config.use_accelerated_backend {
            extract = extract.with_resources(ResourceHints::new().gpus(1));
        }

        let mut train = StageCommand::new(&self.tools.train_backend)
            .arg("--embed-dim")
            .arg(&embed_dim);
        let mut extras: Vec<(&String, &serde_json::Value)> = self.config.extra.iter().collect();
        extras.sort_by_key(|(key, _)| key.clone());
        for (key, value) in extras {
            train = train.arg(format!("--{key}")).arg(scalar(value));
        }
        train = train
            .path_arg(self.layout.embeddings_dir())
            .path_arg(self.layout.backend_dir());

        let score_commands = self.config.datasets.iter().map(|dataset| {
            StageCommand::new(&self.tools.score)
                .path_arg(self.layout.backend_dir())
                .arg(dataset)
                .path_arg(self.layout.scores_dir(dataset))
                .background()
                .expect_output(self.layout.results_path(dataset))
        });

        let cohort_size = self.config.cohort_size.to_string();
        let normalize_commands = self.config.datasets.iter().map(|dataset| {
            StageCommand::new(&self.tools.normalize)
                .arg("--cohort-size")
                .arg(&cohort_size)
                .path_arg(self.layout.scores_dir(dataset))
                .background()
        });

        let mut calibrate = StageCommand::new(&self.tools.calibrate);
        for dataset in &self.config.datasets {
            calibrate = calibrate.path_arg(self.layout.scores_dir(dataset));
        }

        StageGraph::define(
            "speaker-verification",
            vec![
                Stage::new(1, "extract-embeddings").command(extract),
                Stage::new(2, "train-backend").command(train),
                Stage::new(3, "score").with_commands(score_commands),
                Stage::new(4, "normalize-scores").with_commands(normalize_commands),
                Stage::new(5, "calibrate").command(calibrate),
            ],
        )
    }

    /// Harvests and renders every dataset's result files.
    ///
    /// A dataset whose scores directory is missing is reported as a warning
    /// and skipped; collection problems never fail a run.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        for dataset in &self.config.datasets {
            match ResultCollector::collect(self.layout.scores_dir(dataset), "*_results") {
                Ok(artifacts) => out.push_str(&ResultCollector::render(&artifacts)),
                Err(err) => {
                    warn!(dataset = %dataset, error = %err, "skipping result collection");
                }
            }
        }
        out
    }
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recipe() -> VerificationRecipe {
        let config = RunConfig::new().with_datasets(["sre16", "sre18"]);
        VerificationRecipe::new(config, ExperimentLayout::new("/exp/run"))
    }

    #[test]
    fn test_build_produces_five_stages() {
        let graph = recipe().build().unwrap();

        assert_eq!(graph.name(), "speaker-verification");
        let indices: Vec<u32> = graph.stages().iter().map(Stage::index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_scoring_fans_out_per_dataset_in_background() {
        let graph = recipe().build().unwrap();
        let score = &graph.stages()[2];

        assert_eq!(score.name(), "score");
        assert_eq!(score.commands().len(), 2);
        for command in score.commands() {
            assert!(command.is_background());
            assert_eq!(command.expected_outputs().len(), 1);
        }
        assert!(score.commands()[0].rendered().contains("sre16"));
        assert!(score.commands()[1].rendered().contains("sre18"));
    }

    #[test]
    fn test_train_backend_receives_knobs() {
        let config = RunConfig::new()
            .with_embed_dim(512)
            .with_extra("plda-iters", serde_json::json!(10))
            .with_extra("lda-dim", serde_json::json!(150));
        let recipe = VerificationRecipe::new(config, ExperimentLayout::new("/exp/run"));

        let graph = recipe.build().unwrap();
        let train = graph.stages()[1].commands()[0].rendered();

        assert!(train.contains("--embed-dim 512"));
        // Extras are sorted for a stable command line.
        assert!(train.contains("--lda-dim 150 --plda-iters 10"));
    }

    #[test]
    fn test_no_datasets_yields_noop_scoring_stages() {
        let config = RunConfig::new();
        let recipe = VerificationRecipe::new(config, ExperimentLayout::new("/exp/run"));

        let graph = recipe.build().unwrap();
        assert!(graph.stages()[2].commands().is_empty());
        assert!(graph.stages()[3].commands().is_empty());
    }

    #[test]
    fn test_accelerated_backend_requests_gpu_for_extraction() {
        let config = RunConfig::new().with_accelerated_backend(crate::config::QueueConfig::default());
        let recipe = VerificationRecipe::new(config, ExperimentLayout::new("/exp/run"));

        let graph = recipe.build().unwrap();
        let extract = &graph.stages()[0].commands()[0];
        assert_eq!(extract.resources().gpus, Some(1));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = RunConfig::new().with_start_stage(0);
        let recipe = VerificationRecipe::new(config, ExperimentLayout::new("/exp/run"));
        assert!(recipe.build().is_err());
    }

    #[test]
    fn test_report_skips_missing_dataset_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ExperimentLayout::new(dir.path());
        let config = RunConfig::new().with_datasets(["sre16", "sre18"]);

        let scores = layout.scores_dir("sre16");
        std::fs::create_dir_all(&scores).unwrap();
        std::fs::write(scores.join("sre16_results"), "EER 5.0\n").unwrap();
        // sre18 never ran; its directory is missing.

        let recipe = VerificationRecipe::new(config, layout);
        let report = recipe.report();

        assert!(report.contains("=== sre16_results ==="));
        assert!(report.contains("EER 5.0"));
        assert!(!report.contains("sre18"));
    }
}
