//! Error types for the clustering engine

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The two map/reduce stages of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Assignment,
  Aggregation,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Stage::Assignment => f.write_str("assignment"),
      Stage::Aggregation => f.write_str("aggregation"),
    }
  }
}

/// Errors surfaced by the engine.
///
/// Malformed input lines are not represented here at the loader level: they are
/// skipped and reported through `tracing`. `Parse` only escapes from the
/// single-line parsers so callers can decide what to do with the line.
#[derive(Debug, Error)]
pub enum KmError {
  /// Required initial centroid file does not exist
  #[error("initial centroids file not found: {}", .0.display())]
  ConfigurationMissing(PathBuf),

  /// None of the candidate centroid files exist
  #[error("no centroid file found, tried: {tried}")]
  NotFound { tried: String },

  /// A single line could not be parsed
  #[error("malformed line {line:?}: {reason}")]
  Parse { line: String, reason: String },

  /// A stage terminated abnormally; the run is aborted
  #[error("{stage} stage failed: {reason}")]
  StageFailure { stage: Stage, reason: String },

  /// The centroid file does not hold exactly k centroids
  #[error("expected {expected} centroids, got {got}")]
  CentroidCountMismatch { expected: usize, got: usize },

  /// Engine parameters out of range
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  /// Controller operation not valid in its current state
  #[error("invalid controller state: {0}")]
  InvalidState(String),

  /// Mean requested over an empty group
  #[error("mean of an empty point group is undefined")]
  EmptyGroup,

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serialization(String),
}

impl KmError {
  pub(crate) fn stage(stage: Stage, reason: impl Into<String>) -> Self {
    KmError::StageFailure {
      stage,
      reason: reason.into(),
    }
  }

  pub(crate) fn parse(line: &str, reason: impl Into<String>) -> Self {
    KmError::Parse {
      line: line.to_string(),
      reason: reason.into(),
    }
  }

  /// Whether this error ended a run (as opposed to a recoverable parse issue)
  pub fn is_fatal(&self) -> bool {
    !matches!(self, KmError::Parse { .. })
  }
}

pub type Result<T> = std::result::Result<T, KmError>;
