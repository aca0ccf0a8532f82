//! Clustering quality metrics, iteration history and the results artifact.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::constants::ALGORITHM_NAME;
use crate::error::{KmError, Result};
use crate::geometry::squared_distance;
use crate::stage::Partitions;
use crate::store::write_atomic;
use crate::types::Point;

/// Within-cluster sum of squares of an assignment against `centroids`.
///
/// Uses the partitions produced by the round's assignment stage, so the value
/// always agrees with the cluster sizes reported next to it.
pub fn wcss(partitions: &Partitions, centroids: &[Point]) -> f64 {
  partitions
    .iter()
    .filter_map(|(id, points)| centroids.get(id).map(|c| (c, points)))
    .map(|(c, points)| points.iter().map(|p| squared_distance(p, c)).sum::<f64>())
    .sum()
}

/// Points per cluster id
pub fn cluster_sizes(partitions: &Partitions) -> Vec<usize> {
  partitions.sizes()
}

/// Metrics recorded once per completed round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSnapshot {
  pub iteration: usize,
  pub wcss: f64,
  pub cluster_sizes: Vec<usize>,
  pub centroids: Vec<Point>,
  /// Largest distance any centroid moved this round
  pub max_movement: f64,
}

/// Outcome of a run that terminated normally
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
  pub converged: bool,
  pub total_iterations: usize,
  pub final_centroids: Vec<Point>,
  pub final_wcss: f64,
  pub final_cluster_sizes: Vec<usize>,
  pub history: Vec<IterationSnapshot>,
}

impl RunReport {
  /// Results artifact for this report, stamped with the current time
  pub fn to_artifact(&self, config: &EngineConfig) -> ResultsArtifact {
    self.to_artifact_at(config, Utc::now())
  }

  pub fn to_artifact_at(&self, config: &EngineConfig, timestamp: DateTime<Utc>) -> ResultsArtifact {
    ResultsArtifact {
      algorithm: ALGORITHM_NAME.to_string(),
      parameters: RunParameters {
        k: config.k,
        max_iterations: config.max_iterations,
        convergence_threshold: config.convergence_threshold,
      },
      execution: ExecutionSummary {
        converged: self.converged,
        total_iterations: self.total_iterations,
        timestamp,
      },
      final_results: FinalResults {
        wcss: self.final_wcss,
        cluster_sizes: self.final_cluster_sizes.clone(),
        centroids: self.final_centroids.clone(),
      },
      iteration_history: self.history.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
  pub k: usize,
  pub max_iterations: usize,
  pub convergence_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
  pub converged: bool,
  pub total_iterations: usize,
  pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResults {
  pub wcss: f64,
  pub cluster_sizes: Vec<usize>,
  pub centroids: Vec<Point>,
}

/// The JSON document written once per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsArtifact {
  pub algorithm: String,
  pub parameters: RunParameters,
  pub execution: ExecutionSummary,
  pub final_results: FinalResults,
  pub iteration_history: Vec<IterationSnapshot>,
}

impl ResultsArtifact {
  pub fn to_json(&self) -> Result<String> {
    serde_json::to_string_pretty(self)
      .map_err(|error| KmError::Serialization(format!("encode results failed: {error}")))
  }

  /// Write the artifact atomically to `path`
  pub fn write(&self, path: &Path) -> Result<()> {
    write_atomic(path, self.to_json()?.as_bytes())
  }

  pub fn read(path: &Path) -> Result<Self> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes)
      .map_err(|error| KmError::Serialization(format!("decode results failed: {error}")))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::stage::group_by_key;
  use crate::types::Assignment;
  use tempfile::tempdir;

  fn sample_partitions() -> Partitions {
    group_by_key(
      vec![
        Assignment::new(0, Point::new(0.0, 0.0)),
        Assignment::new(0, Point::new(0.0, 1.0)),
        Assignment::new(1, Point::new(10.0, 10.0)),
        Assignment::new(1, Point::new(10.0, 11.0)),
      ],
      3,
    )
    .unwrap()
  }

  #[test]
  fn test_wcss_against_new_centroids() {
    let parts = sample_partitions();
    let centroids = [
      Point::new(0.0, 0.5),
      Point::new(10.0, 10.5),
      Point::new(50.0, 50.0),
    ];
    // four points, each 0.5 away: 4 * 0.25
    assert!((wcss(&parts, &centroids) - 1.0).abs() < 1e-12);
    assert_eq!(cluster_sizes(&parts), vec![2, 2, 0]);
  }

  #[test]
  fn test_wcss_empty() {
    assert_eq!(wcss(&Partitions::empty(2), &[Point::default(); 2]), 0.0);
  }

  fn sample_report() -> RunReport {
    let snapshot = IterationSnapshot {
      iteration: 1,
      wcss: 1.0,
      cluster_sizes: vec![2, 2],
      centroids: vec![Point::new(0.0, 0.5), Point::new(10.0, 10.5)],
      max_movement: 0.5,
    };
    RunReport {
      converged: true,
      total_iterations: 1,
      final_centroids: snapshot.centroids.clone(),
      final_wcss: 1.0,
      final_cluster_sizes: vec![2, 2],
      history: vec![snapshot],
    }
  }

  #[test]
  fn test_artifact_layout() {
    let config = EngineConfig::new(2).with_max_iterations(10);
    let artifact = sample_report().to_artifact(&config);
    let value: serde_json::Value = serde_json::from_str(&artifact.to_json().unwrap()).unwrap();

    assert_eq!(value["algorithm"], "K-Means MapReduce");
    assert_eq!(value["parameters"]["k"], 2);
    assert_eq!(value["parameters"]["max_iterations"], 10);
    assert_eq!(value["execution"]["converged"], true);
    assert_eq!(value["execution"]["total_iterations"], 1);
    assert!(value["execution"]["timestamp"].is_string());
    assert_eq!(value["final_results"]["centroids"][1][1], 10.5);
    assert_eq!(value["iteration_history"][0]["cluster_sizes"][0], 2);
  }

  #[test]
  fn test_artifact_write_read() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("out").join("kmeans_results.json");
    let artifact = sample_report().to_artifact(&EngineConfig::new(2));

    artifact.write(&path).expect("write");
    let back = ResultsArtifact::read(&path).expect("read");
    assert_eq!(back, artifact);
  }
}
