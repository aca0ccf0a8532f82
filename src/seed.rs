//! Synthetic data and initial centroid selection.
//!
//! Produces the two external inputs of a run: a point file and an initial
//! centroid file. Everything is driven by a seeded `StdRng`, so a given seed
//! always yields the same files.

use std::fmt::Write as _;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{KmError, Result};
use crate::geometry::squared_distance;
use crate::store::{self, write_atomic};
use crate::types::Point;

fn rng_for(seed: Option<u64>) -> StdRng {
  match seed {
    Some(s) => StdRng::seed_from_u64(s),
    None => StdRng::from_entropy(),
  }
}

fn check_range(lo: i64, hi: i64) -> Result<()> {
  if lo > hi {
    return Err(KmError::InvalidConfig(format!(
      "empty coordinate range [{lo}, {hi}]"
    )));
  }
  Ok(())
}

/// `n` points with integer coordinates drawn uniformly from `[lo, hi]`
pub fn generate_points(n: usize, lo: i64, hi: i64, seed: Option<u64>) -> Result<Vec<Point>> {
  check_range(lo, hi)?;
  let mut rng = rng_for(seed);
  Ok(
    (0..n)
      .map(|_| Point::new(rng.gen_range(lo..=hi) as f64, rng.gen_range(lo..=hi) as f64))
      .collect(),
  )
}

/// `k` centroids drawn the same way as the points, independent of them
pub fn random_centroids(k: usize, lo: i64, hi: i64, seed: Option<u64>) -> Result<Vec<Point>> {
  generate_points(k, lo, hi, seed)
}

/// k-means++ selection: the first centroid is a random point, every further
/// one is a point drawn with probability proportional to its squared distance
/// to the nearest centroid chosen so far.
pub fn kmeans_plus_plus(points: &[Point], k: usize, seed: Option<u64>) -> Result<Vec<Point>> {
  if k == 0 {
    return Err(KmError::InvalidConfig("k must be at least 1".into()));
  }
  if points.len() < k {
    return Err(KmError::InvalidConfig(format!(
      "not enough points: {} < {} clusters",
      points.len(),
      k
    )));
  }

  let mut rng = rng_for(seed);
  let mut centroids = Vec::with_capacity(k);
  centroids.push(points[rng.gen_range(0..points.len())]);

  let mut min_dists = vec![f64::INFINITY; points.len()];
  for _ in 1..k {
    let last = centroids[centroids.len() - 1];
    let mut total = 0.0;
    for (d, p) in min_dists.iter_mut().zip(points.iter()) {
      *d = d.min(squared_distance(p, &last));
      total += *d;
    }

    // All remaining points coincide with a chosen centroid
    if total <= 0.0 {
      centroids.push(points[rng.gen_range(0..points.len())]);
      continue;
    }

    let mut r = rng.gen::<f64>() * total;
    let mut selected = None;
    for (i, &d) in min_dists.iter().enumerate() {
      if d <= 0.0 {
        continue;
      }
      selected = Some(i);
      r -= d;
      if r <= 0.0 {
        break;
      }
    }
    // total > 0 guarantees at least one positive weight
    let selected = selected.unwrap_or(0);
    centroids.push(points[selected]);
  }

  Ok(centroids)
}

/// Point file lines, `"<x>,<y>"`
pub fn format_points(points: &[Point]) -> String {
  let mut out = String::with_capacity(points.len() * 12);
  for p in points {
    let _ = writeln!(out, "{},{}", p.x, p.y);
  }
  out
}

/// Write a point file and an initial centroid file
pub fn write_dataset(
  points_path: &Path,
  centroids_path: &Path,
  points: &[Point],
  centroids: &[Point],
) -> Result<()> {
  write_atomic(points_path, format_points(points).as_bytes())?;
  store::save(centroids, centroids_path)
}
