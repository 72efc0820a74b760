use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::clock;
use crate::db::{ChainOrder, Counter};
use crate::error::{AppError, Result};
use crate::models::{ItemEdit, ScheduleItem};
use crate::travel::{Departure, Route};

use super::ScheduleService;

/// Result of editing every remaining occurrence of a series.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesEdit {
    /// Series id the edited occurrences now carry.
    pub recurrence_id: i64,
    pub occurrences: usize,
}

fn validate_edit(edit: &ItemEdit) -> Result<()> {
    if edit.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name is required".to_string()));
    }
    if edit.has_end_time && edit.end_time.is_none() {
        return Err(AppError::InvalidInput(
            "hasEndTime is set but endTime is missing".to_string(),
        ));
    }
    Ok(())
}

impl ScheduleService {
    /// Applies a user edit to one item. When the start moves, every earlier
    /// item of the chain is moved with it before the edited item is written.
    pub async fn update_schedule(&self, id: i64, edit: ItemEdit) -> Result<ScheduleItem> {
        validate_edit(&edit)?;
        let group_id = self.get_item(id).await?.group_id;
        let _guard = self.locks.lock(group_id).await;

        let mut item = self.get_item(id).await?;
        if edit.matches(&item) {
            tracing::debug!("Edit of item {} changes nothing", id);
            return Ok(item);
        }

        let old_start = item.starts_at();
        edit.apply_to(&mut item);
        if item.starts_at() != old_start {
            let moved = self.cascade_group(&item).await?;
            tracing::info!("Moved {} items ahead of item {} in group {}", moved, id, group_id);
        }

        self.repo.update_item(&item).await?;
        self.notifier.publish(&item.owner, &item).await;
        Ok(item)
    }

    /// Applies `edit` to every occurrence of a series dated on or after
    /// `from`. The first matched occurrence takes the edit's date and each
    /// later one is one period further. The edited occurrences move to a
    /// fresh series id so they no longer share one with the untouched past.
    pub async fn update_recurrence(
        &self,
        recurrence_id: i64,
        edit: ItemEdit,
        from: Option<NaiveDate>,
    ) -> Result<SeriesEdit> {
        validate_edit(&edit)?;
        let anchors = self.repo.anchors_in_recurrence(recurrence_id, from).await?;
        let Some(first) = anchors.first() else {
            return Err(AppError::NotFound(format!("recurrence {recurrence_id}")));
        };
        let rule = first.recurrence.ok_or_else(|| {
            AppError::InvalidInput(format!("recurrence {recurrence_id} has no rule"))
        })?;

        let new_id = self.repo.next_id(Counter::Recurrence).await?;
        let occurrences = anchors.len();

        for (n, mut anchor) in anchors.into_iter().enumerate() {
            let target = u32::try_from(n)
                .ok()
                .and_then(|n| rule.nth(edit.date, n))
                .ok_or_else(|| AppError::InvalidInput("series runs past the calendar".to_string()))?;

            let _guard = self.locks.lock(anchor.group_id).await;
            let old_start = anchor.starts_at();
            edit.apply_to(&mut anchor);
            anchor.date = target;
            if anchor.starts_at() != old_start {
                self.cascade_group(&anchor).await?;
            }

            self.repo.set_group_recurrence_id(anchor.group_id, new_id).await?;
            anchor.recurrence_id = new_id;
            self.repo.update_item(&anchor).await?;
            self.notifier.publish(&anchor.owner, &anchor).await;
        }

        tracing::info!(
            "Moved {} occurrences of recurrence {} to {}",
            occurrences,
            recurrence_id,
            new_id
        );
        Ok(SeriesEdit {
            recurrence_id: new_id,
            occurrences,
        })
    }

    /// Re-lays every item earlier than `edited` so the chain ends at its new
    /// start. The stored copy of `edited` is not written here. Returns the
    /// number of items moved.
    async fn cascade_group(&self, edited: &ScheduleItem) -> Result<usize> {
        let chain = self
            .repo
            .items_in_group(edited.group_id, ChainOrder::AnchorFirst)
            .await?;
        let Some(pos) = chain.iter().position(|i| i.id == edited.id) else {
            return Ok(0);
        };

        let mut cursor = edited.starts_at();
        let mut neighbor = edited.clone();
        let mut moved = 0;

        for stored in &chain[pos + 1..] {
            let mut item = stored.clone();
            let duration = if item.is_travel_leg() {
                match self.fresh_leg_duration(&item, &neighbor).await {
                    Ok(duration) => duration,
                    Err(e) => {
                        tracing::warn!(
                            "Keeping recorded duration for leg {} in group {}: {}",
                            item.id,
                            item.group_id,
                            e
                        );
                        item.recorded_duration(self.settings.fallback_duration)
                    }
                }
            } else {
                item.recorded_duration(self.settings.fallback_duration)
            };

            let start = item.place_ending_at(cursor, duration)?;
            if item.is_travel_leg() {
                self.reschedule_check(&item, duration).await?;
            }
            item.is_updated = false;
            self.write_time(&item).await?;

            cursor = start;
            neighbor = item;
            moved += 1;
        }
        Ok(moved)
    }

    /// Live duration for `leg`, routed between the places carried by the
    /// item it leads into (falling back to the leg's own places).
    pub(super) async fn fresh_leg_duration(
        &self,
        leg: &ScheduleItem,
        neighbor: &ScheduleItem,
    ) -> Result<Duration> {
        let (location, mode) = match (&neighbor.location, &leg.location) {
            (Some(location), _) => (location, neighbor.transportation),
            (None, Some(location)) => (location, leg.transportation),
            (None, None) => {
                return Err(AppError::Estimator(format!("leg {} has no route", leg.id)));
            }
        };
        self.estimator
            .estimate(Route::from(location), mode, Departure::Now)
            .await
    }

    /// Moves the group's check time to one leg-length before departure.
    pub(super) async fn reschedule_check(&self, leg: &ScheduleItem, duration: Duration) -> Result<()> {
        let check_at = clock::back_from(leg.starts_at(), duration)?;
        self.repo
            .reschedule_log(leg.group_id, check_at.date(), check_at.time())
            .await
    }
}
