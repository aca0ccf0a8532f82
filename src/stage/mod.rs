//! The map and reduce stages of one clustering round, plus the barrier
//! between them.

pub mod aggregate;
pub mod assign;
pub mod shuffle;
pub mod stream;

pub use aggregate::{aggregate, MeanReducer, Reducer};
pub use assign::{nearest_centroid, Mapper, NearestCentroid, Parallelism};
pub use shuffle::{group_by_key, Partitions};

use crate::error::{KmError, Result, Stage};
use crate::types::{Assignment, Point};

/// Run the assignment stage over the whole point set and check that it emitted
/// exactly one pair per point.
pub fn map_all<M: Mapper + ?Sized>(
  mapper: &M,
  points: &[Point],
  centroids: &[Point],
) -> Result<Vec<Assignment>> {
  let pairs = mapper.map(points, centroids).map_err(|e| match e {
    KmError::StageFailure { .. } => e,
    other => KmError::stage(Stage::Assignment, other.to_string()),
  })?;
  if pairs.len() != points.len() {
    return Err(KmError::stage(
      Stage::Assignment,
      format!("{} pairs emitted for {} points", pairs.len(), points.len()),
    ));
  }
  Ok(pairs)
}

/// Run the assignment stage and the shuffle barrier: every point is labelled
/// and grouped by id before this returns.
pub fn assign<M: Mapper + ?Sized>(
  mapper: &M,
  points: &[Point],
  centroids: &[Point],
) -> Result<Partitions> {
  group_by_key(map_all(mapper, points, centroids)?, centroids.len())
}
