pub mod distance_matrix;

pub use distance_matrix::{DistanceMatrix, DEFAULT_TOLERANCE, MAX_TAXA};
