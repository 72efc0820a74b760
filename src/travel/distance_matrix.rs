use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::TravelMode;

use super::duration_text::parse_duration_text;
use super::estimator::{travel_duration, Departure, DurationEstimator, Route};

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    duration: Option<MatrixDuration>,
    duration_in_traffic: Option<MatrixDuration>,
}

#[derive(Debug, Deserialize)]
struct MatrixDuration {
    text: Option<String>,
    value: Option<i64>,
}

impl MatrixDuration {
    fn to_duration(&self) -> Result<Duration> {
        match (self.value, self.text.as_deref()) {
            (Some(seconds), _) => travel_duration(seconds.saturating_add(30) / 60),
            (None, Some(text)) => parse_duration_text(text),
            (None, None) => Err(AppError::Estimator("duration carries no value".to_string())),
        }
    }
}

/// Travel durations from a Distance Matrix style HTTP API.
pub struct DistanceMatrixEstimator {
    client: Client,
    base_url: String,
    api_key: String,
}

impl DistanceMatrixEstimator {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(timeout_secs))
            .connect_timeout(StdDuration::from_secs(timeout_secs.min(5)))
            .user_agent("dayplan-server/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn request_url(&self, route: Route, mode: TravelMode, departure: Departure) -> Result<Url> {
        let departure_time = match departure {
            Departure::Now => "now".to_string(),
            Departure::At(at) => at.timestamp().to_string(),
        };
        Url::parse_with_params(
            &self.base_url,
            &[
                ("origins", route.origin.query_value()),
                ("destinations", route.destination.query_value()),
                ("mode", mode.as_str().to_string()),
                ("departure_time", departure_time),
                ("key", self.api_key.clone()),
            ],
        )
        .map_err(|e| AppError::Config(format!("invalid estimator url {}: {e}", self.base_url)))
    }
}

#[async_trait]
impl DurationEstimator for DistanceMatrixEstimator {
    async fn estimate(&self, route: Route, mode: TravelMode, departure: Departure) -> Result<Duration> {
        let url = self.request_url(route, mode, departure)?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Estimator(format!(
                "Distance matrix request failed: HTTP {}",
                response.status()
            )));
        }

        let matrix: MatrixResponse = response.json().await?;
        if matrix.status != "OK" {
            return Err(AppError::Estimator(format!(
                "Distance matrix status {}: {}",
                matrix.status,
                matrix.error_message.unwrap_or_default()
            )));
        }

        let element = matrix
            .rows
            .first()
            .and_then(|row| row.elements.first())
            .ok_or_else(|| AppError::Estimator("Distance matrix returned no elements".to_string()))?;

        if element.status != "OK" {
            return Err(AppError::Estimator(format!(
                "Distance matrix element status {}",
                element.status
            )));
        }

        let duration = element
            .duration_in_traffic
            .as_ref()
            .or(element.duration.as_ref())
            .ok_or_else(|| AppError::Estimator("Distance matrix element has no duration".to_string()))?
            .to_duration()?;

        tracing::debug!(
            "Estimated {} min {} from {} to {}",
            duration.num_minutes(),
            mode.as_str(),
            route.origin.query_value(),
            route.destination.query_value()
        );

        Ok(duration)
    }
}
