//! Schedule endpoints

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::clock::parse_date;
use crate::error::Result;
use crate::models::{ItemEdit, ScheduleItem};
use crate::schedule::{AnchorSpec, CreateOutcome, SeriesEdit};

use super::{ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/schedules", post(create_schedule))
        .route("/schedules/all/{owner}/{date}", get(list_day))
        .route(
            "/schedules/{id}",
            get(get_schedule).patch(update_schedule).delete(delete_group),
        )
        .route(
            "/schedules/recurrence/{recurrence_id}",
            patch(update_recurrence).delete(delete_recurrence),
        )
}

/// Optional `from=DD-MM-YYYY` lower bound for series operations.
#[derive(Deserialize)]
pub struct FromQuery {
    pub from: Option<String>,
}

impl FromQuery {
    fn date(&self) -> Result<Option<NaiveDate>> {
        self.from.as_deref().map(parse_date).transpose()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Removed {
    pub removed: usize,
}

/// POST /schedules - Create a chain, or a whole series when `recurrence` is set
async fn create_schedule(
    State(state): State<AppState>,
    Json(spec): Json<AnchorSpec>,
) -> ApiResult<CreateOutcome> {
    Ok(Json(state.service.insert_schedule(spec).await?))
}

/// GET /schedules/all/:owner/:date - One user's items for a day
async fn list_day(
    State(state): State<AppState>,
    Path((owner, date)): Path<(String, String)>,
) -> ApiResult<Vec<ScheduleItem>> {
    let date = parse_date(&date)?;
    Ok(Json(state.service.items_for_day(&owner, date).await?))
}

async fn get_schedule(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<ScheduleItem> {
    Ok(Json(state.service.get_item(id).await?))
}

/// PATCH /schedules/:id - Edit one item and cascade the change through its chain
async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(edit): Json<ItemEdit>,
) -> ApiResult<ScheduleItem> {
    Ok(Json(state.service.update_schedule(id, edit).await?))
}

/// PATCH /schedules/recurrence/:recurrence_id - Edit a series from a date on
async fn update_recurrence(
    State(state): State<AppState>,
    Path(recurrence_id): Path<i64>,
    Query(query): Query<FromQuery>,
    Json(edit): Json<ItemEdit>,
) -> ApiResult<SeriesEdit> {
    let from = query.date()?;
    Ok(Json(
        state.service.update_recurrence(recurrence_id, edit, from).await?,
    ))
}

/// DELETE /schedules/:group_id - Remove a day's chain and its log
async fn delete_group(State(state): State<AppState>, Path(group_id): Path<i64>) -> ApiResult<Removed> {
    let removed = state.service.delete_group(group_id).await?;
    Ok(Json(Removed { removed }))
}

async fn delete_recurrence(
    State(state): State<AppState>,
    Path(recurrence_id): Path<i64>,
    Query(query): Query<FromQuery>,
) -> ApiResult<Removed> {
    let from = query.date()?;
    let removed = state.service.delete_recurrence(recurrence_id, from).await?;
    Ok(Json(Removed { removed }))
}
