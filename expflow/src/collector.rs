//! Result artifact collection for operator-facing reporting.
//!
//! Scoring and calibration tools drop plain-text result files into their
//! stage's output directory. The collector harvests them by naming
//! convention after a run; it never feeds back into pipeline control flow.

use crate::errors::{ConfigError, ExpflowError, NotFoundError};
use regex::Regex;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// A plain-text result file produced by an external tool.
///
/// Read-only; observed, not owned, by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultArtifact {
    /// Where the artifact was found.
    pub path: PathBuf,
    /// The artifact's full textual content.
    pub textual_content: String,
}

impl ResultArtifact {
    /// Returns the artifact's file name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("")
    }
}

/// Harvests result artifacts from stage output directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultCollector;

impl ResultCollector {
    /// Collects the files in `directory` whose names match `pattern`.
    ///
    /// The pattern is a shell-style wildcard (`*` matches any run of
    /// characters, `?` a single character), e.g. `*_results`. Matches are
    /// returned in lexicographic file-name order with their content read in
    /// full. An empty match set is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] (wrapped) if `directory` does not exist, and
    /// an IO error if a matching file cannot be read.
    pub fn collect(
        directory: impl AsRef<Path>,
        pattern: &str,
    ) -> Result<Vec<ResultArtifact>, ExpflowError> {
        Self::iter_collect(directory, pattern)?.collect()
    }

    /// Lazy variant of [`collect`](Self::collect).
    ///
    /// The directory is enumerated and matched up front; file contents are
    /// read one artifact at a time as the iterator advances.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] (wrapped) if `directory` does not exist.
    pub fn iter_collect(
        directory: impl AsRef<Path>,
        pattern: &str,
    ) -> Result<ResultArtifacts, ExpflowError> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(NotFoundError::new(directory).into());
        }

        let matcher = wildcard_matcher(pattern)?;

        let mut paths: Vec<PathBuf> = fs::read_dir(directory)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| matcher.is_match(name))
            })
            .collect();
        paths.sort();

        Ok(ResultArtifacts {
            paths: paths.into_iter(),
        })
    }

    /// Renders artifacts for the operator: a banner per file, then content.
    #[must_use]
    pub fn render(artifacts: &[ResultArtifact]) -> String {
        let mut out = String::new();
        for artifact in artifacts {
            let _ = writeln!(out, "=== {} ===", artifact.name());
            out.push_str(&artifact.textual_content);
            if !artifact.textual_content.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// Lazy sequence of result artifacts, in lexicographic file-name order.
#[derive(Debug)]
pub struct ResultArtifacts {
    paths: std::vec::IntoIter<PathBuf>,
}

impl Iterator for ResultArtifacts {
    type Item = Result<ResultArtifact, ExpflowError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        Some(
            fs::read_to_string(&path)
                .map(|textual_content| ResultArtifact {
                    path,
                    textual_content,
                })
                .map_err(ExpflowError::from),
        )
    }
}

/// Compiles a shell-style wildcard into an anchored regex.
fn wildcard_matcher(pattern: &str) -> Result<Regex, ConfigError> {
    let mut expr = String::with_capacity(pattern.len() + 2);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            _ => expr.push_str(&regex::escape(&ch.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr)
        .map_err(|err| ConfigError::new(format!("invalid result pattern '{pattern}': {err}")))
}
