//! Defaults and fixed names for the clustering engine

// ============================================================================
// Engine defaults
// ============================================================================

/// Default number of clusters
pub const DEFAULT_K: usize = 5;

/// Default iteration cap
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Default convergence threshold (max centroid movement)
pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 0.001;

/// Decimal places used when writing coordinates
pub const COORD_PRECISION: usize = 6;

/// Points per chunk handed to a channel worker
pub const WORKER_CHUNK_SIZE: usize = 256;

// ============================================================================
// File names
// ============================================================================

/// Centroids read by the assignment stage of the next round
pub const CURRENT_CENTROIDS_FILE: &str = "current_centroids.txt";

/// Centroids published when a run terminates normally
pub const FINAL_CENTROIDS_FILE: &str = "final_centroids.txt";

/// Results artifact
pub const RESULTS_FILE: &str = "kmeans_results.json";

pub const MAP_OUTPUT_FILE: &str = "map_output.txt";
pub const SORTED_OUTPUT_FILE: &str = "sorted_output.txt";
pub const REDUCE_OUTPUT_FILE: &str = "new_centroids.txt";

/// Label written into the results artifact
pub const ALGORITHM_NAME: &str = "K-Means MapReduce";

// ============================================================================
// Data generation defaults
// ============================================================================

pub const DEFAULT_POINT_COUNT: usize = 1000;
pub const DEFAULT_COORD_MIN: i64 = 100;
pub const DEFAULT_COORD_MAX: i64 = 1000;
pub const DEFAULT_POINT_SEED: u64 = 42;
pub const DEFAULT_CENTROID_SEED: u64 = 123;
