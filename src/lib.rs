//! kmeans-mr - iterative k-means clustering on a simulated map/reduce model
//!
//! # Architecture
//!
//! Every round runs the classic map/reduce pipeline in-process:
//!
//! - **Assignment** (map): each point is labelled with its nearest centroid
//! - **Shuffle**: the labelled points are grouped by centroid id (barrier)
//! - **Aggregation** (reduce): each group's mean becomes the new centroid
//!
//! The [`controller::IterationController`] repeats rounds until the centroids
//! stop moving or the iteration cap is reached, persisting the centroid file
//! atomically after every round and recording WCSS and cluster sizes.
//!
//! The [`stage::stream`] module keeps the line protocols of both stages, so
//! the same logic also runs as shell pipeline filters.

#![deny(clippy::all)]

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod metrics;
pub mod seed;
pub mod stage;
pub mod store;
pub mod types;

// Re-export commonly used items
pub use config::{EngineConfig, RunPaths};
pub use controller::{IterationController, RoundOutcome, RunState};
pub use error::{KmError, Result, Stage};
pub use metrics::{IterationSnapshot, ResultsArtifact, RunReport};
pub use stage::{MeanReducer, Mapper, NearestCentroid, Parallelism, Reducer};
pub use types::{Assignment, ClusterId, Point};
