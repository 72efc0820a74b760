use crate::db::Counter;
use crate::error::{AppError, Result};
use crate::models::{ScheduleItem, ScheduleLog};

use super::chain::{plan_day_chain, ChainIds};
use super::{AnchorSpec, CreateOutcome, ScheduleService};

impl ScheduleService {
    /// Materializes a whole series up front: one chain per date over the
    /// rule's horizon, all sharing one travel estimate and one routine
    /// lookup. Writes are batched and not rolled back on failure.
    pub async fn insert_recurring(&self, spec: AnchorSpec) -> Result<CreateOutcome> {
        spec.validate()?;
        let rule = spec
            .recurrence
            .ok_or_else(|| AppError::InvalidInput("recurrence is required".to_string()))?;

        let dates = rule.dates_from(spec.date);
        let recurrence_id = self.repo.next_id(Counter::Recurrence).await?;
        let travel = self.estimate_leg(&spec).await;
        let routines = self.routines_for(&spec).await;
        let first_group = self.repo.reserve_ids(Counter::Group, dates.len()).await?;

        let mut items = Vec::new();
        let mut logs = Vec::with_capacity(dates.len());
        let mut group_ids = Vec::with_capacity(dates.len());
        let mut advisory = None;

        for (offset, date) in (0i64..).zip(dates) {
            let ids = ChainIds {
                group_id: first_group + offset,
                recurrence_id,
            };
            let plan = plan_day_chain(&spec, ids, date, travel, routines.as_deref())?;
            if offset == 0 {
                advisory = self.wake_advisory(&spec, &plan).await;
            }
            group_ids.push(ids.group_id);
            items.extend(plan.items);
            logs.extend(plan.log);
        }

        let item_count = items.len();
        self.flush_batches(items, logs).await?;
        tracing::info!(
            "Created {} recurrence {} for {}: {} groups, {} items",
            rule,
            recurrence_id,
            spec.owner,
            group_ids.len(),
            item_count
        );

        Ok(CreateOutcome {
            group_ids,
            recurrence_id,
            item_count,
            advisory,
        })
    }

    /// Writes items and logs from two concurrent tasks, each in batches.
    /// Reports the first failure; batches already written stay written.
    async fn flush_batches(&self, items: Vec<ScheduleItem>, logs: Vec<ScheduleLog>) -> Result<()> {
        let batch_size = self.settings.batch_size.max(1);

        let repo = self.repo.clone();
        let item_task = tokio::spawn(async move {
            for batch in items.chunks(batch_size) {
                repo.insert_items_batch(batch.to_vec()).await?;
            }
            Ok::<_, AppError>(items.len())
        });

        let repo = self.repo.clone();
        let log_task = tokio::spawn(async move {
            for batch in logs.chunks(batch_size) {
                repo.insert_logs_batch(batch.to_vec()).await?;
            }
            Ok::<_, AppError>(logs.len())
        });

        let (item_result, log_result) = tokio::join!(item_task, log_task);
        let written_items = item_result.map_err(|e| AppError::Other(anyhow::Error::new(e)))??;
        let written_logs = log_result.map_err(|e| AppError::Other(anyhow::Error::new(e)))??;
        tracing::debug!("Flushed {} items and {} logs", written_items, written_logs);
        Ok(())
    }
}
