//! Assignment stage ("map"): nearest-centroid labelling of every point.
//!
//! Points are independent of each other, so the stage fans out freely. Three
//! execution modes produce the same multiset of pairs:
//!
//! - `Sequential`: a plain loop on the calling thread
//! - `Rayon`: data-parallel over the global rayon pool
//! - `Workers(n)`: point chunks sent to `n` scoped worker threads over a
//!   channel, results collected over a second channel
//!
//! All results of a round are collected before this function returns; the
//! caller never observes a partial assignment set.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crossbeam_channel::unbounded;
use rayon::prelude::*;
use tracing::debug;

use crate::constants::WORKER_CHUNK_SIZE;
use crate::error::{KmError, Result, Stage};
use crate::geometry::distance;
use crate::types::{Assignment, ClusterId, Point};

/// How the assignment stage spreads work across threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
  Sequential,
  #[default]
  Rayon,
  /// Fixed number of channel-fed worker threads
  Workers(usize),
}

/// Index of the centroid closest to `point`; ties go to the smaller id.
///
/// Returns `None` only for an empty centroid sequence.
#[inline]
pub fn nearest_centroid(point: &Point, centroids: &[Point]) -> Option<ClusterId> {
  let mut best: Option<(ClusterId, f64)> = None;
  for (id, centroid) in centroids.iter().enumerate() {
    let dist = distance(point, centroid);
    match best {
      Some((_, best_dist)) if dist >= best_dist => {}
      _ => best = Some((id, dist)),
    }
  }
  best.map(|(id, _)| id)
}

/// A map function over the whole point set
pub trait Mapper: Send + Sync {
  fn map(&self, points: &[Point], centroids: &[Point]) -> Result<Vec<Assignment>>;
}

/// The standard mapper: nearest centroid by Euclidean distance
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestCentroid {
  parallelism: Parallelism,
}

impl NearestCentroid {
  pub fn new(parallelism: Parallelism) -> Self {
    Self { parallelism }
  }

  pub fn parallelism(&self) -> Parallelism {
    self.parallelism
  }
}

fn assign_one(point: &Point, centroids: &[Point]) -> Assignment {
  // centroids is checked non-empty before any fan-out
  let cluster = nearest_centroid(point, centroids).unwrap_or(0);
  Assignment::new(cluster, *point)
}

fn panic_reason(payload: Box<dyn std::any::Any + Send>) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "worker panicked".to_string()
  }
}

impl Mapper for NearestCentroid {
  fn map(&self, points: &[Point], centroids: &[Point]) -> Result<Vec<Assignment>> {
    if centroids.is_empty() {
      return Err(KmError::stage(Stage::Assignment, "no centroids to assign to"));
    }

    let pairs = match self.parallelism {
      Parallelism::Sequential => points.iter().map(|p| assign_one(p, centroids)).collect(),
      Parallelism::Rayon => catch_unwind(AssertUnwindSafe(|| {
        points
          .par_iter()
          .map(|p| assign_one(p, centroids))
          .collect::<Vec<_>>()
      }))
      .map_err(|payload| KmError::stage(Stage::Assignment, panic_reason(payload)))?,
      Parallelism::Workers(n) => map_with_workers(points, centroids, n.max(1))?,
    };

    debug!(
      points = points.len(),
      mode = ?self.parallelism,
      "assignment stage complete"
    );
    Ok(pairs)
  }
}

fn map_with_workers(points: &[Point], centroids: &[Point], workers: usize) -> Result<Vec<Assignment>> {
  let (task_tx, task_rx) = unbounded::<(usize, &[Point])>();
  let (out_tx, out_rx) = unbounded::<(usize, Vec<Assignment>)>();

  let mut panicked: Option<String> = None;
  std::thread::scope(|scope| {
    let handles: Vec<_> = (0..workers)
      .map(|_| {
        let rx = task_rx.clone();
        let tx = out_tx.clone();
        scope.spawn(move || {
          for (chunk_idx, chunk) in rx {
            let out = chunk.iter().map(|p| assign_one(p, centroids)).collect();
            if tx.send((chunk_idx, out)).is_err() {
              break;
            }
          }
        })
      })
      .collect();
    drop(task_rx);
    drop(out_tx);

    for (chunk_idx, chunk) in points.chunks(WORKER_CHUNK_SIZE).enumerate() {
      if task_tx.send((chunk_idx, chunk)).is_err() {
        // every worker is gone; the join below reports why
        break;
      }
    }
    drop(task_tx);

    for handle in handles {
      if let Err(payload) = handle.join() {
        panicked.get_or_insert_with(|| panic_reason(payload));
      }
    }
  });

  if let Some(reason) = panicked {
    return Err(KmError::stage(Stage::Assignment, reason));
  }

  let mut chunks: Vec<(usize, Vec<Assignment>)> = out_rx.try_iter().collect();
  chunks.sort_unstable_by_key(|(idx, _)| *idx);
  let pairs: Vec<Assignment> = chunks.into_iter().flat_map(|(_, out)| out).collect();

  if pairs.len() != points.len() {
    return Err(KmError::stage(
      Stage::Assignment,
      format!(
        "incomplete assignment: {} of {} points",
        pairs.len(),
        points.len()
      ),
    ));
  }
  Ok(pairs)
}
