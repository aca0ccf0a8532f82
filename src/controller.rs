//! Iteration controller.
//!
//! Drives Lloyd rounds over a fixed point set:
//!
//! ```text
//! Initializing -> Iterating -> Converged | ExhaustedIterations
//!       \             \
//!        +-------------+-> Failed
//! ```
//!
//! Each round runs the assignment stage, the shuffle barrier and the
//! aggregation stage, persists the new centroids atomically, records metrics,
//! and tests convergence. Rounds are strictly sequential. The controller is the
//! only writer of the centroid sequence; stages get it read-only.

use std::fmt::Write as _;

use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, RunPaths};
use crate::constants::{MAP_OUTPUT_FILE, REDUCE_OUTPUT_FILE, SORTED_OUTPUT_FILE};
use crate::error::{KmError, Result, Stage};
use crate::geometry::max_movement;
use crate::metrics::{cluster_sizes, wcss, IterationSnapshot, RunReport};
use crate::stage::stream::{format_assignment, format_reduced};
use crate::stage::{
  aggregate, group_by_key, map_all, Mapper, MeanReducer, NearestCentroid, Partitions, Reducer,
};
use crate::store::{self, copy_atomic, load_points, write_atomic};
use crate::types::{Assignment, Point};

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
  Initializing,
  Iterating,
  Converged,
  ExhaustedIterations,
  Failed,
}

impl RunState {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      RunState::Converged | RunState::ExhaustedIterations | RunState::Failed
    )
  }
}

/// Result of one completed round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
  pub snapshot: IterationSnapshot,
  pub converged: bool,
}

/// Converged iff every centroid moved at most `threshold`
pub fn has_converged(old: &[Point], new: &[Point], threshold: f64) -> bool {
  old.len() == new.len() && max_movement(old, new) <= threshold
}

pub struct IterationController<M = NearestCentroid, R = MeanReducer> {
  config: EngineConfig,
  paths: RunPaths,
  mapper: M,
  reducer: R,
  state: RunState,
  points: Vec<Point>,
  centroids: Vec<Point>,
  history: Vec<IterationSnapshot>,
}

impl IterationController {
  /// Controller with the standard nearest-centroid mapper and mean reducer
  pub fn new(config: EngineConfig, paths: RunPaths) -> Result<Self> {
    let mapper = NearestCentroid::new(config.parallelism);
    Self::with_stages(config, paths, mapper, MeanReducer)
  }
}

impl<M: Mapper, R: Reducer> IterationController<M, R> {
  pub fn with_stages(config: EngineConfig, paths: RunPaths, mapper: M, reducer: R) -> Result<Self> {
    config.validate()?;
    Ok(Self {
      config,
      paths,
      mapper,
      reducer,
      state: RunState::Initializing,
      points: Vec::new(),
      centroids: Vec::new(),
      history: Vec::new(),
    })
  }

  pub fn state(&self) -> RunState {
    self.state
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn paths(&self) -> &RunPaths {
    &self.paths
  }

  /// Current centroid sequence (empty before initialization)
  pub fn centroids(&self) -> &[Point] {
    &self.centroids
  }

  pub fn points(&self) -> &[Point] {
    &self.points
  }

  pub fn history(&self) -> &[IterationSnapshot] {
    &self.history
  }

  fn fail(&mut self, err: KmError) -> KmError {
    self.state = RunState::Failed;
    error!(error = %err, rounds = self.history.len(), "run failed");
    err
  }

  fn expect_state(&self, expected: RunState) -> Result<()> {
    if self.state != expected {
      return Err(KmError::InvalidState(format!(
        "expected {:?}, controller is {:?}",
        expected, self.state
      )));
    }
    Ok(())
  }

  // ==========================================================================
  // Initializing
  // ==========================================================================

  /// Copy the initial centroid file into the current location, load it and the
  /// point set. Moves to `Iterating` on success, `Failed` otherwise.
  pub fn initialize(&mut self) -> Result<()> {
    self.expect_state(RunState::Initializing)?;
    match self.load_initial() {
      Ok(()) => {
        self.state = RunState::Iterating;
        Ok(())
      }
      Err(e) => Err(self.fail(e)),
    }
  }

  fn load_initial(&mut self) -> Result<()> {
    let initial = &self.paths.initial_centroids;
    if !initial.exists() {
      return Err(KmError::ConfigurationMissing(initial.clone()));
    }
    if !self.paths.points.exists() {
      return Err(KmError::ConfigurationMissing(self.paths.points.clone()));
    }

    let current = self.paths.current_centroids();
    copy_atomic(initial, &current)?;
    let centroids = store::load(&current)?;
    if centroids.len() != self.config.k {
      return Err(KmError::CentroidCountMismatch {
        expected: self.config.k,
        got: centroids.len(),
      });
    }

    let points = load_points(&self.paths.points)?;
    if points.is_empty() {
      warn!(path = %self.paths.points.display(), "point set is empty");
    }

    info!(
      k = self.config.k,
      points = points.len(),
      max_iterations = self.config.max_iterations,
      threshold = self.config.convergence_threshold,
      "initial centroids loaded"
    );
    for (id, c) in centroids.iter().enumerate() {
      debug!(cluster = id, x = c.x, y = c.y, "initial centroid");
    }

    self.centroids = centroids;
    self.points = points;
    Ok(())
  }

  // ==========================================================================
  // Iterating
  // ==========================================================================

  /// Run one round. Moves to `Converged` or `ExhaustedIterations` when the run
  /// is over, to `Failed` if a stage fails.
  pub fn step(&mut self) -> Result<RoundOutcome> {
    self.expect_state(RunState::Iterating)?;
    match self.run_round() {
      Ok(outcome) => {
        if outcome.converged {
          self.state = RunState::Converged;
        } else if self.history.len() >= self.config.max_iterations {
          self.state = RunState::ExhaustedIterations;
        }
        Ok(outcome)
      }
      Err(e) => Err(self.fail(e)),
    }
  }

  fn run_round(&mut self) -> Result<RoundOutcome> {
    let iteration = self.history.len() + 1;
    let old = self.centroids.clone();

    let pairs = map_all(&self.mapper, &self.points, &old)?;
    if self.config.trace_iterations {
      self.write_map_trace(iteration, &pairs)?;
    }

    // Barrier: aggregation sees only the complete, grouped assignment set
    let partitions = group_by_key(pairs, self.config.k)?;

    let new = aggregate(&self.reducer, &partitions, &old)?;
    if new.len() != self.config.k {
      return Err(KmError::stage(
        Stage::Aggregation,
        format!("produced {} centroids, expected {}", new.len(), self.config.k),
      ));
    }

    let movement = max_movement(&old, &new);
    let snapshot = IterationSnapshot {
      iteration,
      wcss: wcss(&partitions, &new),
      cluster_sizes: cluster_sizes(&partitions),
      centroids: new.clone(),
      max_movement: movement,
    };
    if self.config.trace_iterations {
      self.write_reduce_trace(iteration, &partitions, &new)?;
    }

    // Commit point: nothing after the save can fail the round
    store::save(&new, &self.paths.current_centroids())?;

    let converged = has_converged(&old, &new, self.config.convergence_threshold);
    info!(
      iteration,
      wcss = snapshot.wcss,
      sizes = ?snapshot.cluster_sizes,
      max_movement = movement,
      converged,
      "round complete"
    );

    self.history.push(snapshot.clone());
    self.centroids = new;
    Ok(RoundOutcome { snapshot, converged })
  }

  fn write_map_trace(&self, iteration: usize, pairs: &[Assignment]) -> Result<()> {
    let mut out = String::new();
    for pair in pairs {
      let _ = writeln!(out, "{}", format_assignment(pair));
    }
    write_atomic(
      &self.paths.iteration_dir(iteration).join(MAP_OUTPUT_FILE),
      out.as_bytes(),
    )
  }

  fn write_reduce_trace(&self, iteration: usize, partitions: &Partitions, new: &[Point]) -> Result<()> {
    let dir = self.paths.iteration_dir(iteration);

    let mut sorted = String::new();
    for pair in partitions.to_sorted_pairs() {
      let _ = writeln!(sorted, "{}", format_assignment(&pair));
    }
    write_atomic(&dir.join(SORTED_OUTPUT_FILE), sorted.as_bytes())?;

    let mut reduced = String::new();
    for (id, points) in partitions.iter() {
      if !points.is_empty() {
        let _ = writeln!(reduced, "{}", format_reduced(id, &new[id]));
      }
    }
    write_atomic(&dir.join(REDUCE_OUTPUT_FILE), reduced.as_bytes())
  }

  // ==========================================================================
  // Terminal states
  // ==========================================================================

  /// Report for the rounds run so far; `None` before the first round
  pub fn report(&self) -> Option<RunReport> {
    let last = self.history.last()?;
    Some(RunReport {
      converged: self.state == RunState::Converged,
      total_iterations: self.history.len(),
      final_centroids: self.centroids.clone(),
      final_wcss: last.wcss,
      final_cluster_sizes: last.cluster_sizes.clone(),
      history: self.history.clone(),
    })
  }

  fn finish(&mut self) -> Result<RunReport> {
    copy_atomic(&self.paths.current_centroids(), &self.paths.final_centroids())?;
    let report = self
      .report()
      .ok_or_else(|| KmError::InvalidState("run ended without a completed round".into()))?;
    report.to_artifact(&self.config).write(&self.paths.results())?;

    info!(
      converged = report.converged,
      iterations = report.total_iterations,
      wcss = report.final_wcss,
      sizes = ?report.final_cluster_sizes,
      results = %self.paths.results().display(),
      "run complete"
    );
    Ok(report)
  }

  /// Run to a terminal state: initialize if needed, iterate until converged or
  /// the iteration cap is hit, then publish the final centroids and the
  /// results artifact. Reaching the cap is a normal outcome
  /// (`converged == false`); any stage failure aborts the run.
  pub fn run(&mut self) -> Result<RunReport> {
    if self.state == RunState::Initializing {
      self.initialize()?;
    }
    while self.state == RunState::Iterating {
      self.step()?;
    }

    match self.state {
      RunState::Converged | RunState::ExhaustedIterations => match self.finish() {
        Ok(report) => Ok(report),
        Err(e) => Err(self.fail(e)),
      },
      other => Err(KmError::InvalidState(format!(
        "cannot finish a run in state {other:?}"
      ))),
    }
  }
}
