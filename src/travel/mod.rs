mod distance_matrix;
mod duration_text;
mod estimator;

pub use distance_matrix::DistanceMatrixEstimator;
pub use duration_text::parse_duration_text;
pub use estimator::{Departure, DurationEstimator, Route, UnconfiguredEstimator};
