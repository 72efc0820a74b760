//! Chain construction and maintenance for one user's day.
//!
//! Every chain hangs backwards off a single anchor item: travel legs,
//! routines and the wake-up item each end exactly where the next one
//! starts. The submodules extend [`ScheduleService`] with the chain
//! builder, the cascade updater, the recurrence expander and the sweeper.

mod cascade;
mod chain;
mod locks;
mod recurrence;
mod sweeper;

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{wire_date, wire_time, wire_time_opt};
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{LocationPair, Recurrence, RoutineSpec, ScheduleItem};
use crate::notify::Notifier;
use crate::travel::{Departure, DurationEstimator};

pub use cascade::SeriesEdit;
pub use chain::{plan_day_chain, ChainIds, ChainPlan};
pub use sweeper::{SweepReport, Sweeper};

use locks::GroupLocks;

/// Everything needed to lay out one day's chain around an anchor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorSpec {
    pub owner: String,
    pub name: String,
    #[serde(with = "wire_date")]
    pub date: NaiveDate,
    #[serde(with = "wire_time")]
    pub start_time: NaiveTime,
    #[serde(default, with = "wire_time_opt")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub has_end_time: bool,
    #[serde(default)]
    pub location: Option<LocationPair>,
    #[serde(default)]
    pub transportation: Option<String>,
    #[serde(default)]
    pub depart_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_first_schedule: bool,
    #[serde(default)]
    pub tag_id: Option<i64>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
}

impl AnchorSpec {
    /// Rejects input that would otherwise fail halfway through a write.
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(AppError::InvalidInput("owner is required".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidInput("name is required".to_string()));
        }
        if self.has_end_time && self.end_time.is_none() {
            return Err(AppError::InvalidInput(
                "hasEndTime is set but endTime is missing".to_string(),
            ));
        }
        if let Some(location) = &self.location {
            for place in [&location.origin, &location.destination] {
                let c = place.coordinates;
                if !(-90.0..=90.0).contains(&c.latitude) || !(-180.0..=180.0).contains(&c.longitude) {
                    return Err(AppError::InvalidInput(format!(
                        "coordinates out of range for {:?}",
                        place.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn departure(&self) -> Departure {
        self.depart_at.map_or(Departure::Now, Departure::At)
    }
}

/// Result of creating a single chain or a whole series.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    pub group_ids: Vec<i64>,
    pub recurrence_id: i64,
    pub item_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ChainSettings {
    /// Duration assumed for items that have no recorded end.
    pub fallback_duration: Duration,
    pub batch_size: usize,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            fallback_duration: Duration::minutes(5),
            batch_size: 100,
        }
    }
}

pub struct ScheduleService {
    repo: Repository,
    estimator: Arc<dyn DurationEstimator>,
    notifier: Arc<Notifier>,
    locks: GroupLocks,
    settings: ChainSettings,
}

impl ScheduleService {
    pub fn new(
        repo: Repository,
        estimator: Arc<dyn DurationEstimator>,
        notifier: Arc<Notifier>,
        settings: ChainSettings,
    ) -> Self {
        Self {
            repo,
            estimator,
            notifier,
            locks: GroupLocks::default(),
            settings,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub async fn get_item(&self, id: i64) -> Result<ScheduleItem> {
        self.repo
            .get_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("schedule {id}")))
    }

    pub async fn items_for_day(&self, owner: &str, date: NaiveDate) -> Result<Vec<ScheduleItem>> {
        self.repo.items_for_day(owner, date).await
    }

    pub async fn delete_group(&self, group_id: i64) -> Result<usize> {
        let _guard = self.locks.lock(group_id).await;
        let removed = self.repo.delete_group(group_id).await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("group {group_id}")));
        }
        tracing::info!("Deleted group {} ({} items)", group_id, removed);
        Ok(removed)
    }

    pub async fn delete_recurrence(&self, recurrence_id: i64, from: Option<NaiveDate>) -> Result<usize> {
        let removed = self.repo.delete_recurrence(recurrence_id, from).await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("recurrence {recurrence_id}")));
        }
        tracing::info!("Deleted recurrence {} ({} items)", recurrence_id, removed);
        Ok(removed)
    }

    /// Routines named by a tag, in the tag's order.
    pub async fn routines_for_tag(&self, tag_id: i64) -> Result<Vec<RoutineSpec>> {
        let tag = self
            .repo
            .get_tag(tag_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tag {tag_id}")))?;

        let mut routines = Vec::with_capacity(tag.routine_ids.len());
        for routine_id in tag.routine_ids {
            let routine = self
                .repo
                .get_routine(routine_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("routine {routine_id}")))?;
            routines.push(routine);
        }
        Ok(routines)
    }

    /// Persists a time-only change and tells the owner's clients about it.
    async fn write_time(&self, item: &ScheduleItem) -> Result<()> {
        self.repo.update_item_time(item).await?;
        self.notifier.publish(&item.owner, &item.time_update()).await;
        Ok(())
    }
}
