//! HTTP and websocket surface.

mod routines;
mod schedules;
mod ws;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::error::AppError;
use crate::notify::Notifier;
use crate::schedule::ScheduleService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScheduleService>,
    pub notifier: Arc<Notifier>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(schedules::router())
        .merge(routines::router())
        .merge(ws::router())
        .with_state(state)
        .layer(cors)
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Maps service errors onto HTTP statuses.
pub struct ApiError(AppError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;
