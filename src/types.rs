//! Core data types shared by the stages and the controller

use serde::{Deserialize, Serialize};

use crate::constants::COORD_PRECISION;

/// Cluster identifier: the centroid's position in the centroid sequence
pub type ClusterId = usize;

/// An immutable 2-D point. Centroids use the same representation; their id is
/// their index in the sequence that holds them.
///
/// Serializes as an `[x, y]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
  pub x: f64,
  pub y: f64,
}

impl Point {
  pub const fn new(x: f64, y: f64) -> Self {
    Self { x, y }
  }

  pub fn is_finite(&self) -> bool {
    self.x.is_finite() && self.y.is_finite()
  }

  /// `"<x>,<y>"` with six decimal places
  pub fn to_fixed(&self) -> String {
    format!(
      "{:.prec$},{:.prec$}",
      self.x,
      self.y,
      prec = COORD_PRECISION
    )
  }
}

impl From<[f64; 2]> for Point {
  fn from(v: [f64; 2]) -> Self {
    Self::new(v[0], v[1])
  }
}

impl From<Point> for [f64; 2] {
  fn from(p: Point) -> Self {
    [p.x, p.y]
  }
}

impl From<(f64, f64)> for Point {
  fn from((x, y): (f64, f64)) -> Self {
    Self::new(x, y)
  }
}

/// One (centroid-id, point) pair emitted by the assignment stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
  pub cluster: ClusterId,
  pub point: Point,
}

impl Assignment {
  pub fn new(cluster: ClusterId, point: Point) -> Self {
    Self { cluster, point }
  }
}
