//! Shuffle/sort barrier between the two stages.
//!
//! Grouping by key is the only hard requirement: every point of one cluster id
//! ends up in exactly one partition, and aggregation starts only once the full
//! assignment set is partitioned.

use crate::error::{KmError, Result, Stage};
use crate::types::{Assignment, ClusterId, Point};

/// Assignment output grouped by cluster id; always exactly `k` partitions
#[derive(Debug, Clone, PartialEq)]
pub struct Partitions {
  groups: Vec<Vec<Point>>,
}

impl Partitions {
  /// `k` empty partitions
  pub fn empty(k: usize) -> Self {
    Self {
      groups: vec![Vec::new(); k],
    }
  }

  pub fn k(&self) -> usize {
    self.groups.len()
  }

  /// Points assigned to `cluster` (empty slice for an out-of-range id)
  pub fn get(&self, cluster: ClusterId) -> &[Point] {
    self.groups.get(cluster).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn sizes(&self) -> Vec<usize> {
    self.groups.iter().map(Vec::len).collect()
  }

  pub fn total(&self) -> usize {
    self.groups.iter().map(Vec::len).sum()
  }

  /// Ids with no assigned points
  pub fn empty_clusters(&self) -> Vec<ClusterId> {
    self
      .groups
      .iter()
      .enumerate()
      .filter(|(_, g)| g.is_empty())
      .map(|(id, _)| id)
      .collect()
  }

  pub fn iter(&self) -> impl Iterator<Item = (ClusterId, &[Point])> {
    self.groups.iter().enumerate().map(|(id, g)| (id, g.as_slice()))
  }

  pub(crate) fn groups(&self) -> &[Vec<Point>] {
    &self.groups
  }

  /// Assignment pairs in key order
  pub fn to_sorted_pairs(&self) -> Vec<Assignment> {
    self
      .iter()
      .flat_map(|(id, pts)| pts.iter().map(move |p| Assignment::new(id, *p)))
      .collect()
  }
}

/// Group a complete assignment set by cluster id.
///
/// An id outside `[0, k)` means the assignment stage emitted garbage and fails
/// the round.
pub fn group_by_key(pairs: Vec<Assignment>, k: usize) -> Result<Partitions> {
  let mut partitions = Partitions::empty(k);
  for pair in pairs {
    match partitions.groups.get_mut(pair.cluster) {
      Some(group) => group.push(pair.point),
      None => {
        return Err(KmError::stage(
          Stage::Assignment,
          format!("emitted cluster id {} outside [0, {k})", pair.cluster),
        ))
      }
    }
  }
  Ok(partitions)
}

fn line_key(line: &str) -> usize {
  line
    .split_once('\t')
    .and_then(|(key, _)| key.trim().parse().ok())
    .unwrap_or(0)
}

/// Stable sort of assignment-stage text output by its numeric key, so equal
/// keys become contiguous for the streaming reducer. Lines without a parseable
/// key sort as key 0.
pub fn sort_lines(lines: &mut [String]) {
  lines.sort_by_key(|line| line_key(line));
}
