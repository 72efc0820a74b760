use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, Result};
use crate::models::{Coordinates, LocationPair, TravelMode};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Route {
    pub origin: Coordinates,
    pub destination: Coordinates,
}

impl From<&LocationPair> for Route {
    fn from(pair: &LocationPair) -> Self {
        Self {
            origin: pair.origin.coordinates,
            destination: pair.destination.coordinates,
        }
    }
}

/// Longest leg an estimator may report. Anything longer is treated as a bad
/// answer rather than laid out.
const MAX_TRAVEL_MINUTES: i64 = 7 * 24 * 60;

/// Converts an upstream minute count into a leg duration.
pub(super) fn travel_duration(minutes: i64) -> Result<Duration> {
    if !(0..=MAX_TRAVEL_MINUTES).contains(&minutes) {
        return Err(AppError::Estimator(format!(
            "travel time of {minutes} minutes is out of range"
        )));
    }
    Ok(Duration::minutes(minutes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    Now,
    At(DateTime<Utc>),
}

/// Source of travel durations between two points.
///
/// Implementations make one blocking network round trip per call and do not
/// retry; callers decide how a failure degrades the chain.
#[async_trait]
pub trait DurationEstimator: Send + Sync {
    async fn estimate(&self, route: Route, mode: TravelMode, departure: Departure) -> Result<Duration>;
}

/// Stand-in used when no estimator is configured. Every call fails, so
/// chains are built without travel legs.
pub struct UnconfiguredEstimator;

#[async_trait]
impl DurationEstimator for UnconfiguredEstimator {
    async fn estimate(&self, _route: Route, _mode: TravelMode, _departure: Departure) -> Result<Duration> {
        Err(AppError::Estimator("no maps API key configured".to_string()))
    }
}
