use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, FixedOffset, NaiveDateTime, NaiveTime, Timelike, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db::ChainOrder;
use crate::error::{AppError, Result};

use super::ScheduleService;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub groups_due: usize,
    pub items_refreshed: usize,
    pub failures: usize,
}

/// Background task that re-checks travel legs whose departure is coming up.
pub struct Sweeper {
    service: Arc<ScheduleService>,
    interval: StdDuration,
    offset: FixedOffset,
}

impl Sweeper {
    pub fn new(service: Arc<ScheduleService>, interval: StdDuration, utc_offset_hours: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600).ok_or_else(|| {
            AppError::Config(format!("utc offset out of range: {utc_offset_hours}"))
        })?;
        Ok(Self {
            service,
            interval,
            offset,
        })
    }

    /// Wall-clock time in the schedule's local offset.
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!("Sweeper running every {}s", self.interval.as_secs());

            loop {
                ticker.tick().await;
                self.run_once(self.now()).await;
            }
        })
    }

    /// One tick of the loop. A sweep that errors or panics is logged and
    /// yields `None`; the next tick runs as usual.
    pub async fn run_once(&self, now: NaiveDateTime) -> Option<SweepReport> {
        match AssertUnwindSafe(self.service.sweep(now)).catch_unwind().await {
            Ok(Ok(report)) => {
                if report.groups_due > 0 {
                    tracing::info!(
                        "Sweep refreshed {} items across {} groups ({} failed)",
                        report.items_refreshed,
                        report.groups_due,
                        report.failures
                    );
                } else {
                    tracing::debug!("Sweep found nothing due");
                }
                Some(report)
            }
            Ok(Err(e)) => {
                tracing::error!("Sweep failed: {}", e);
                None
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("Sweep at {} panicked: {}", now, reason);
                None
            }
        }
    }
}

impl ScheduleService {
    /// Refreshes every group whose check time falls in the minute containing
    /// `now`. One group failing does not stop the others.
    pub async fn sweep(&self, now: NaiveDateTime) -> Result<SweepReport> {
        let minute = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now.time());
        let window_start = now.date().and_time(minute);
        let window_end = window_start + Duration::minutes(1);
        let until = (window_end.date() == window_start.date()).then(|| window_end.time());

        let groups = self.repo.due_group_ids(now.date(), minute, until).await?;
        let mut report = SweepReport {
            groups_due: groups.len(),
            ..SweepReport::default()
        };

        for group_id in groups {
            match self.refresh_group(group_id).await {
                Ok(refreshed) => report.items_refreshed += refreshed,
                Err(e) => {
                    tracing::warn!("Failed to refresh group {}: {}", group_id, e);
                    report.failures += 1;
                }
            }
        }
        Ok(report)
    }

    /// Re-lays the chain behind the anchor with a live leg duration. Items
    /// already refreshed end the walk, so a group is written at most once
    /// until a cascade clears the flags again.
    async fn refresh_group(&self, group_id: i64) -> Result<usize> {
        let _guard = self.locks.lock(group_id).await;
        let chain = self
            .repo
            .items_in_group(group_id, ChainOrder::AnchorFirst)
            .await?;
        let Some((anchor, rest)) = chain.split_first() else {
            return Ok(0);
        };

        let mut cursor = anchor.starts_at();
        let mut neighbor = anchor.clone();
        let mut refreshed = 0;

        for stored in rest {
            if stored.is_updated {
                break;
            }
            let mut item = stored.clone();
            let duration = if item.is_travel_leg() {
                self.fresh_leg_duration(&item, &neighbor).await?
            } else {
                item.recorded_duration(self.settings.fallback_duration)
            };

            let start = item.place_ending_at(cursor, duration)?;
            item.is_updated = true;
            self.write_time(&item).await?;

            cursor = start;
            neighbor = item;
            refreshed += 1;
        }

        tracing::debug!("Refreshed {} items in group {}", refreshed, group_id);
        Ok(refreshed)
    }
}
