//! File-backed state: the centroid store and the fixed point set

pub mod centroids;
pub mod fs;
pub mod lines;
pub mod points;

pub use centroids::{format_centroids, load, load_first, parse_centroid_line, save};
pub use fs::{copy_atomic, write_atomic};
pub use lines::decoded_lines;
pub use points::{load_points, parse_point_line, read_points};
