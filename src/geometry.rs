//! Euclidean geometry over 2-D points

use crate::error::{KmError, Result};
use crate::types::Point;

/// Squared Euclidean distance
#[inline]
pub fn squared_distance(a: &Point, b: &Point) -> f64 {
  let dx = a.x - b.x;
  let dy = a.y - b.y;
  dx * dx + dy * dy
}

/// Euclidean distance
#[inline]
pub fn distance(a: &Point, b: &Point) -> f64 {
  squared_distance(a, b).sqrt()
}

/// Componentwise arithmetic mean.
///
/// Fails with [`KmError::EmptyGroup`] on an empty slice; the aggregation stage
/// never calls it for a cluster without points.
pub fn mean(points: &[Point]) -> Result<Point> {
  if points.is_empty() {
    return Err(KmError::EmptyGroup);
  }
  let n = points.len() as f64;
  let (sum_x, sum_y) = points
    .iter()
    .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
  if sum_x.is_finite() && sum_y.is_finite() {
    return Ok(Point::new(sum_x / n, sum_y / n));
  }

  // Large finite coordinates overflow the plain sum; scale each term instead
  let (mean_x, mean_y) = points
    .iter()
    .fold((0.0, 0.0), |(mx, my), p| (mx + p.x / n, my + p.y / n));
  Ok(Point::new(mean_x, mean_y))
}

/// Largest per-index distance between two centroid sequences of equal length
pub fn max_movement(old: &[Point], new: &[Point]) -> f64 {
  debug_assert_eq!(old.len(), new.len());
  old
    .iter()
    .zip(new.iter())
    .map(|(a, b)| distance(a, b))
    .fold(0.0, f64::max)
}
