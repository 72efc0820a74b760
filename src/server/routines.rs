//! Routine, tag and bedtime endpoints

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{check_routine, Bedtime, NewRoutine, NewTag, RoutineEdit, RoutineSpec, Tag, TagEdit};

use super::schedules::Removed;
use super::{ApiResult, AppState};

// GET takes an owner and DELETE a numeric id on the same path segment.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/routines", post(create_routine))
        .route("/routines/{key}", get(list_routines).delete(delete_routine))
        .route("/routines/edit/{id}", patch(update_routine))
        .route("/tags", post(create_tag))
        .route(
            "/tags/{key}",
            get(list_tags).patch(update_tag).delete(delete_tag),
        )
        .route("/tags/{key}/routines", get(tag_routines))
        .route("/bedtimes/{owner}", get(get_bedtime).put(put_bedtime))
}

async fn create_routine(
    State(state): State<AppState>,
    Json(routine): Json<NewRoutine>,
) -> ApiResult<RoutineSpec> {
    check_routine(&routine.name, routine.duration_minutes)?;
    Ok(Json(state.service.repository().insert_routine(routine).await?))
}

/// GET /routines/:owner
async fn list_routines(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> ApiResult<Vec<RoutineSpec>> {
    Ok(Json(state.service.repository().routines_for_owner(&owner).await?))
}

/// PATCH /routines/edit/:id - Chains already laid out keep their old durations
async fn update_routine(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(edit): Json<RoutineEdit>,
) -> ApiResult<RoutineSpec> {
    check_routine(&edit.name, edit.duration_minutes)?;
    let routine = state
        .service
        .repository()
        .update_routine(id, edit)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("routine {id}")))?;
    Ok(Json(routine))
}

/// DELETE /routines/:id - Also drops the routine from every tag
async fn delete_routine(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Removed> {
    if !state.service.repository().delete_routine(id).await? {
        return Err(AppError::NotFound(format!("routine {id}")).into());
    }
    tracing::info!("Deleted routine {}", id);
    Ok(Json(Removed { removed: 1 }))
}

async fn ensure_routines_exist(repo: &Repository, ids: &[i64]) -> Result<()> {
    for id in ids {
        if repo.get_routine(*id).await?.is_none() {
            return Err(AppError::InvalidInput(format!("unknown routine {id}")));
        }
    }
    Ok(())
}

/// POST /tags - Every routine the tag names must already exist
async fn create_tag(State(state): State<AppState>, Json(tag): Json<NewTag>) -> ApiResult<Tag> {
    if tag.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name is required".to_string()).into());
    }
    let repo = state.service.repository();
    ensure_routines_exist(repo, &tag.routine_ids).await?;
    Ok(Json(repo.insert_tag(tag).await?))
}

/// GET /tags/:owner
async fn list_tags(State(state): State<AppState>, Path(owner): Path<String>) -> ApiResult<Vec<Tag>> {
    Ok(Json(state.service.repository().tags_for_owner(&owner).await?))
}

/// PATCH /tags/:id - Replaces the name and the whole routine list
async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(edit): Json<TagEdit>,
) -> ApiResult<Tag> {
    if edit.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name is required".to_string()).into());
    }
    let repo = state.service.repository();
    ensure_routines_exist(repo, &edit.routine_ids).await?;
    let tag = repo
        .update_tag(id, edit)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tag {id}")))?;
    Ok(Json(tag))
}

async fn delete_tag(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Removed> {
    if !state.service.repository().delete_tag(id).await? {
        return Err(AppError::NotFound(format!("tag {id}")).into());
    }
    Ok(Json(Removed { removed: 1 }))
}

/// GET /tags/:id/routines - The tag's routines in chain order
async fn tag_routines(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<RoutineSpec>> {
    Ok(Json(state.service.routines_for_tag(id).await?))
}

async fn put_bedtime(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(mut bedtime): Json<Bedtime>,
) -> ApiResult<Bedtime> {
    bedtime.owner = owner;
    state.service.repository().upsert_bedtime(bedtime.clone()).await?;
    Ok(Json(bedtime))
}

async fn get_bedtime(State(state): State<AppState>, Path(owner): Path<String>) -> ApiResult<Bedtime> {
    let bedtime = state
        .service
        .repository()
        .get_bedtime(&owner)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("bedtime for {owner}")))?;
    Ok(Json(bedtime))
}
