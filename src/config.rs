//! Run configuration: numeric engine parameters and explicit file locations.

use std::path::{Path, PathBuf};

use crate::constants::{
  CURRENT_CENTROIDS_FILE, DEFAULT_CONVERGENCE_THRESHOLD, DEFAULT_K, DEFAULT_MAX_ITERATIONS,
  FINAL_CENTROIDS_FILE, RESULTS_FILE,
};
use crate::error::{KmError, Result};
use crate::stage::Parallelism;

// ============================================================================
// Engine parameters
// ============================================================================

/// Parameters fixed for the duration of a run
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
  /// Number of clusters (k)
  pub k: usize,
  /// Iteration cap
  pub max_iterations: usize,
  /// Converged once no centroid moves further than this
  pub convergence_threshold: f64,
  /// Execution mode of the assignment stage
  pub parallelism: Parallelism,
  /// Keep per-round stage outputs under `output_dir/iteration_<n>/`
  pub trace_iterations: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      k: DEFAULT_K,
      max_iterations: DEFAULT_MAX_ITERATIONS,
      convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
      parallelism: Parallelism::default(),
      trace_iterations: false,
    }
  }
}

impl EngineConfig {
  pub fn new(k: usize) -> Self {
    Self {
      k,
      ..Default::default()
    }
  }

  pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
    self.max_iterations = max_iterations;
    self
  }

  pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
    self.convergence_threshold = threshold;
    self
  }

  pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
    self.parallelism = parallelism;
    self
  }

  pub fn with_trace_iterations(mut self, trace: bool) -> Self {
    self.trace_iterations = trace;
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.k == 0 {
      return Err(KmError::InvalidConfig("k must be at least 1".into()));
    }
    if self.max_iterations == 0 {
      return Err(KmError::InvalidConfig(
        "max_iterations must be at least 1".into(),
      ));
    }
    if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0.0 {
      return Err(KmError::InvalidConfig(format!(
        "convergence threshold must be a non-negative number, got {}",
        self.convergence_threshold
      )));
    }
    if self.parallelism == Parallelism::Workers(0) {
      return Err(KmError::InvalidConfig(
        "worker count must be at least 1".into(),
      ));
    }
    Ok(())
  }
}

// ============================================================================
// File locations
// ============================================================================

/// Every file the controller touches, given explicitly by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
  /// Fixed point set
  pub points: PathBuf,
  /// Externally supplied round-0 centroids
  pub initial_centroids: PathBuf,
  /// Holds the current and final centroid files
  pub work_dir: PathBuf,
  /// Holds the results artifact and iteration traces
  pub output_dir: PathBuf,
}

impl Default for RunPaths {
  fn default() -> Self {
    Self {
      points: PathBuf::from("data/data_points_1000.txt"),
      initial_centroids: PathBuf::from("data/initial_centroids.txt"),
      work_dir: PathBuf::from("data"),
      output_dir: PathBuf::from("output"),
    }
  }
}

impl RunPaths {
  pub fn new(
    points: impl Into<PathBuf>,
    initial_centroids: impl Into<PathBuf>,
    work_dir: impl Into<PathBuf>,
    output_dir: impl Into<PathBuf>,
  ) -> Self {
    Self {
      points: points.into(),
      initial_centroids: initial_centroids.into(),
      work_dir: work_dir.into(),
      output_dir: output_dir.into(),
    }
  }

  /// Layout rooted at one directory: `<root>/data/...` and `<root>/output`
  pub fn under(root: &Path) -> Self {
    let data = root.join("data");
    Self {
      points: data.join("data_points_1000.txt"),
      initial_centroids: data.join("initial_centroids.txt"),
      work_dir: data,
      output_dir: root.join("output"),
    }
  }

  pub fn current_centroids(&self) -> PathBuf {
    self.work_dir.join(CURRENT_CENTROIDS_FILE)
  }

  pub fn final_centroids(&self) -> PathBuf {
    self.work_dir.join(FINAL_CENTROIDS_FILE)
  }

  pub fn results(&self) -> PathBuf {
    self.output_dir.join(RESULTS_FILE)
  }

  pub fn iteration_dir(&self, iteration: usize) -> PathBuf {
    self.output_dir.join(format!("iteration_{iteration}"))
  }
}
