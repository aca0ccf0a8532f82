//! Aggregation stage ("reduce"): one new centroid per cluster id.
//!
//! Each partition is reduced by exactly one unit, so a key is never split
//! across concurrent reducers. An id that received no points keeps its previous
//! centroid unchanged.

use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use tracing::info;

use super::shuffle::Partitions;
use crate::error::{KmError, Result, Stage};
use crate::geometry::mean;
use crate::types::{ClusterId, Point};

/// Reduce function applied to the non-empty group of one cluster id
pub trait Reducer: Send + Sync {
  fn reduce(&self, cluster: ClusterId, points: &[Point]) -> Result<Point>;
}

/// Arithmetic mean of the group (Lloyd update)
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanReducer;

impl Reducer for MeanReducer {
  fn reduce(&self, _cluster: ClusterId, points: &[Point]) -> Result<Point> {
    mean(points)
  }
}

fn as_stage_failure(err: KmError) -> KmError {
  match err {
    KmError::StageFailure { .. } => err,
    other => KmError::stage(Stage::Aggregation, other.to_string()),
  }
}

/// Reduce every partition and reconcile the result into a complete sequence of
/// exactly `k` centroids, `previous` supplying the value of empty clusters.
pub fn aggregate<R: Reducer + ?Sized>(
  reducer: &R,
  partitions: &Partitions,
  previous: &[Point],
) -> Result<Vec<Point>> {
  if previous.len() != partitions.k() {
    return Err(KmError::stage(
      Stage::Aggregation,
      format!(
        "{} partitions for {} previous centroids",
        partitions.k(),
        previous.len()
      ),
    ));
  }

  catch_unwind(AssertUnwindSafe(|| {
    partitions
      .groups()
      .par_iter()
      .enumerate()
      .map(|(id, group)| {
        if group.is_empty() {
          info!(cluster = id, "empty cluster keeps previous centroid");
          return Ok(previous[id]);
        }
        let centroid = reducer.reduce(id, group).map_err(as_stage_failure)?;
        if !centroid.is_finite() {
          return Err(KmError::stage(
            Stage::Aggregation,
            format!("non-finite centroid for cluster {id}"),
          ));
        }
        Ok(centroid)
      })
      .collect::<Result<Vec<Point>>>()
  }))
  .map_err(|_| KmError::stage(Stage::Aggregation, "reducer panicked"))?
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::stage::shuffle::group_by_key;
  use crate::types::Assignment;

  const EPS: f64 = 1e-9;

  #[test]
  fn test_mean_per_cluster() {
    let pairs = vec![
      Assignment::new(0, Point::new(0.0, 0.0)),
      Assignment::new(0, Point::new(0.0, 1.0)),
      Assignment::new(1, Point::new(10.0, 10.0)),
      Assignment::new(1, Point::new(10.0, 11.0)),
    ];
    let parts = group_by_key(pairs, 2).unwrap();
    let previous = [Point::new(0.0, 0.0), Point::new(10.0, 10.0)];

    let next = aggregate(&MeanReducer, &parts, &previous).unwrap();
    assert!((next[0].x - 0.0).abs() < EPS && (next[0].y - 0.5).abs() < EPS);
    assert!((next[1].x - 10.0).abs() < EPS && (next[1].y - 10.5).abs() < EPS);
  }

  #[test]
  fn test_huge_finite_coordinates_reduce() {
    let pairs = vec![
      Assignment::new(0, Point::new(1e308, 1e308)),
      Assignment::new(0, Point::new(1e308, 1e308)),
    ];
    let parts = group_by_key(pairs, 1).unwrap();

    let next = aggregate(&MeanReducer, &parts, &[Point::default()]).unwrap();
    assert!(next[0].is_finite());
    assert!((next[0].x - 1e308).abs() <= 1e293);
  }

  #[test]
  fn test_empty_cluster_keeps_previous_value() {
    let pairs = vec![
      Assignment::new(0, Point::new(1.0, 1.0)),
      Assignment::new(0, Point::new(3.0, 3.0)),
    ];
    let parts = group_by_key(pairs, 3).unwrap();
    let previous = [
      Point::new(0.0, 0.0),
      Point::new(-7.5, 42.0),
      Point::new(100.0, 100.0),
    ];

    let next = aggregate(&MeanReducer, &parts, &previous).unwrap();
    assert_eq!(next.len(), 3);
    assert_eq!(next[0], Point::new(2.0, 2.0));
    assert_eq!(next[1], previous[1]);
    assert_eq!(next[2], previous[2]);
  }

  #[test]
  fn test_length_mismatch_fails() {
    let parts = Partitions::empty(2);
    let result = aggregate(&MeanReducer, &parts, &[Point::default()]);
    assert!(matches!(
      result,
      Err(KmError::StageFailure {
        stage: Stage::Aggregation,
        ..
      })
    ));
  }

  struct Failing;

  impl Reducer for Failing {
    fn reduce(&self, cluster: ClusterId, _points: &[Point]) -> Result<Point> {
      Err(KmError::InvalidConfig(format!("cannot reduce {cluster}")))
    }
  }

  struct Panicking;

  impl Reducer for Panicking {
    fn reduce(&self, _cluster: ClusterId, _points: &[Point]) -> Result<Point> {
      panic!("boom");
    }
  }

  #[test]
  fn test_reducer_error_becomes_stage_failure() {
    let parts = group_by_key(vec![Assignment::new(0, Point::default())], 1).unwrap();
    let err = aggregate(&Failing, &parts, &[Point::default()]).unwrap_err();
    assert!(matches!(
      err,
      KmError::StageFailure {
        stage: Stage::Aggregation,
        ..
      }
    ));
  }

  #[test]
  fn test_reducer_panic_becomes_stage_failure() {
    let parts = group_by_key(vec![Assignment::new(0, Point::default())], 1).unwrap();
    let err = aggregate(&Panicking, &parts, &[Point::default()]).unwrap_err();
    assert!(err.to_string().contains("panicked"));
  }
}
