use chrono::{NaiveDate, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, Statement};
use tokio_rusqlite::Connection;

use crate::clock::{format_time, STORE_DATE_FORMAT, TIME_FORMAT};
use crate::error::Result;
use crate::models::{
    Bedtime, Coordinates, ItemRole, LocationPair, NewRoutine, NewTag, Place, Recurrence,
    RoutineEdit, RoutineSpec, ScheduleItem, ScheduleLog, Tag, TagEdit, TravelMode,
};

use super::schema::SCHEMA;

const ITEM_COLUMNS: &str = "id, owner, group_id, recurrence_id, recurrence, name, date, start_time, \
     end_time, has_end_time, role, origin_name, origin_lat, origin_lng, dest_name, dest_lat, \
     dest_lng, transportation, is_updated, priority, tag_id, routine_id";

const INSERT_ITEM: &str = r#"INSERT INTO schedule_items
    (owner, group_id, recurrence_id, recurrence, name, date, start_time, end_time, has_end_time,
     role, origin_name, origin_lat, origin_lng, dest_name, dest_lat, dest_lng, transportation,
     is_updated, priority, tag_id, routine_id)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"#;

const LOG_COLUMNS: &str =
    "id, group_id, recurrence_id, origin_lat, origin_lng, dest_lat, dest_lng, date, check_time";

const INSERT_LOG: &str = r#"INSERT INTO schedule_logs
    (group_id, recurrence_id, origin_lat, origin_lng, dest_lat, dest_lng, date, check_time)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#;

/// Named sequences handed out by [`Repository::reserve_ids`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Group,
    Recurrence,
}

impl Counter {
    fn as_str(self) -> &'static str {
        match self {
            Counter::Group => "group_id",
            Counter::Recurrence => "recurrence_id",
        }
    }
}

/// Direction a group's chain is read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOrder {
    /// Earliest item first.
    Chronological,
    /// Latest item (normally the anchor) first.
    AnchorFirst,
}

#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Counters

    /// Atomically reserves `count` consecutive ids and returns the first.
    /// The counter row is created on first use.
    pub async fn reserve_ids(&self, counter: Counter, count: usize) -> Result<i64> {
        let count = count.max(1) as i64;
        let last = self
            .conn
            .call(move |conn| {
                let seq: i64 = conn.query_row(
                    r#"INSERT INTO counters (name, seq) VALUES (?1, ?2)
                       ON CONFLICT(name) DO UPDATE SET seq = seq + excluded.seq
                       RETURNING seq"#,
                    params![counter.as_str(), count],
                    |row| row.get(0),
                )?;
                Ok(seq)
            })
            .await?;
        Ok(last - count + 1)
    }

    pub async fn next_id(&self, counter: Counter) -> Result<i64> {
        self.reserve_ids(counter, 1).await
    }

    // Schedule item operations

    pub async fn insert_item(&self, item: ScheduleItem) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(INSERT_ITEM)?;
                Ok(insert_item_row(&mut stmt, &item)?)
            })
            .await?;
        Ok(id)
    }

    /// Inserts one batch inside a single transaction. Earlier batches are
    /// never touched by a failure here.
    pub async fn insert_items_batch(&self, items: Vec<ScheduleItem>) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached(INSERT_ITEM)?;
                    for item in &items {
                        insert_item_row(&mut stmt, item)?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_item(&self, id: i64) -> Result<Option<ScheduleItem>> {
        let item = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM schedule_items WHERE id = ?1"
                ))?;
                let item = stmt.query_row(params![id], item_from_row).optional()?;
                Ok(item)
            })
            .await?;
        Ok(item)
    }

    pub async fn items_for_day(&self, owner: &str, date: NaiveDate) -> Result<Vec<ScheduleItem>> {
        let owner = owner.to_string();
        let items = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM schedule_items \
                     WHERE owner = ?1 AND date = ?2 ORDER BY start_time"
                ))?;
                let items = stmt
                    .query_map(params![owner, store_date(date)], item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    pub async fn items_in_group(&self, group_id: i64, order: ChainOrder) -> Result<Vec<ScheduleItem>> {
        let direction = match order {
            ChainOrder::Chronological => "ASC",
            ChainOrder::AnchorFirst => "DESC",
        };
        let items = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM schedule_items WHERE group_id = ?1 \
                     ORDER BY date {direction}, start_time {direction}, \
                     role = 'anchor' {direction}, id {direction}"
                ))?;
                let items = stmt
                    .query_map(params![group_id], item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    /// All items of a series, optionally only those dated on or after `from`.
    pub async fn items_in_recurrence(
        &self,
        recurrence_id: i64,
        from: Option<NaiveDate>,
    ) -> Result<Vec<ScheduleItem>> {
        self.recurrence_query(recurrence_id, from, None).await
    }

    /// Anchors of a series in date order, one per occurrence.
    pub async fn anchors_in_recurrence(
        &self,
        recurrence_id: i64,
        from: Option<NaiveDate>,
    ) -> Result<Vec<ScheduleItem>> {
        self.recurrence_query(recurrence_id, from, Some(ItemRole::Anchor))
            .await
    }

    async fn recurrence_query(
        &self,
        recurrence_id: i64,
        from: Option<NaiveDate>,
        role: Option<ItemRole>,
    ) -> Result<Vec<ScheduleItem>> {
        let from = from.map(store_date).unwrap_or_default();
        let role = role.map(|r| r.as_str().to_string());
        let items = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM schedule_items \
                     WHERE recurrence_id = ?1 AND date >= ?2 AND (?3 IS NULL OR role = ?3) \
                     ORDER BY date, start_time"
                ))?;
                let items = stmt
                    .query_map(params![recurrence_id, from, role], item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    /// Writes the user-editable fields plus the series id and refresh flag.
    pub async fn update_item(&self, item: &ScheduleItem) -> Result<()> {
        let id = item.id;
        let name = item.name.clone();
        let date = store_date(item.date);
        let start = format_time(item.start_time);
        let end = item.end_time.map(format_time);
        let has_end_time = item.has_end_time;
        let recurrence_id = item.recurrence_id;
        let is_updated = item.is_updated;
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE schedule_items
                       SET name = ?1, date = ?2, start_time = ?3, end_time = ?4,
                           has_end_time = ?5, recurrence_id = ?6, is_updated = ?7
                       WHERE id = ?8"#,
                    params![name, date, start, end, has_end_time, recurrence_id, is_updated, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Time-only write used by cascades and the sweeper.
    pub async fn update_item_time(&self, item: &ScheduleItem) -> Result<()> {
        let id = item.id;
        let date = store_date(item.date);
        let start = format_time(item.start_time);
        let end = item.end_time.map(format_time);
        let is_updated = item.is_updated;
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE schedule_items
                       SET date = ?1, start_time = ?2, end_time = ?3, has_end_time = ?3 IS NOT NULL,
                           is_updated = ?4
                       WHERE id = ?5"#,
                    params![date, start, end, is_updated, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Moves every item and the log of one group onto another series id.
    pub async fn set_group_recurrence_id(&self, group_id: i64, recurrence_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE schedule_items SET recurrence_id = ?1 WHERE group_id = ?2",
                    params![recurrence_id, group_id],
                )?;
                conn.execute(
                    "UPDATE schedule_logs SET recurrence_id = ?1 WHERE group_id = ?2",
                    params![recurrence_id, group_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Deletes a group's items together with its schedule log.
    pub async fn delete_group(&self, group_id: i64) -> Result<usize> {
        let removed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let removed =
                    tx.execute("DELETE FROM schedule_items WHERE group_id = ?1", params![group_id])?;
                tx.execute("DELETE FROM schedule_logs WHERE group_id = ?1", params![group_id])?;
                tx.commit()?;
                Ok(removed)
            })
            .await?;
        Ok(removed)
    }

    pub async fn delete_recurrence(&self, recurrence_id: i64, from: Option<NaiveDate>) -> Result<usize> {
        let from = from.map(store_date).unwrap_or_default();
        let removed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                // Whole groups go, keyed on the anchor's date, so a leg rolled
                // back past midnight leaves with its anchor.
                let removed = tx.execute(
                    r#"DELETE FROM schedule_items WHERE group_id IN (
                           SELECT group_id FROM schedule_items
                           WHERE recurrence_id = ?1 AND role = 'anchor' AND date >= ?2)"#,
                    params![recurrence_id, from],
                )?;
                tx.execute(
                    r#"DELETE FROM schedule_logs WHERE recurrence_id = ?1
                       AND group_id NOT IN (SELECT group_id FROM schedule_items)"#,
                    params![recurrence_id],
                )?;
                tx.commit()?;
                Ok(removed)
            })
            .await?;
        Ok(removed)
    }

    // Schedule log operations

    pub async fn insert_schedule_log(&self, log: ScheduleLog) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(INSERT_LOG)?;
                Ok(insert_log_row(&mut stmt, &log)?)
            })
            .await?;
        Ok(id)
    }

    pub async fn insert_logs_batch(&self, logs: Vec<ScheduleLog>) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached(INSERT_LOG)?;
                    for log in &logs {
                        insert_log_row(&mut stmt, log)?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn log_for_group(&self, group_id: i64) -> Result<Option<ScheduleLog>> {
        let log = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {LOG_COLUMNS} FROM schedule_logs WHERE group_id = ?1"
                ))?;
                let log = stmt.query_row(params![group_id], log_from_row).optional()?;
                Ok(log)
            })
            .await?;
        Ok(log)
    }

    pub async fn logs_in_recurrence(&self, recurrence_id: i64) -> Result<Vec<ScheduleLog>> {
        let logs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {LOG_COLUMNS} FROM schedule_logs WHERE recurrence_id = ?1 ORDER BY date"
                ))?;
                let logs = stmt
                    .query_map(params![recurrence_id], log_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(logs)
            })
            .await?;
        Ok(logs)
    }

    pub async fn reschedule_log(
        &self,
        group_id: i64,
        date: NaiveDate,
        check_time: NaiveTime,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE schedule_logs SET date = ?1, check_time = ?2 WHERE group_id = ?3",
                    params![store_date(date), format_time(check_time), group_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Groups whose check time falls in `[from, until)` on `date`. An `until`
    /// of `None` means the window runs to the end of the day.
    pub async fn due_group_ids(
        &self,
        date: NaiveDate,
        from: NaiveTime,
        until: Option<NaiveTime>,
    ) -> Result<Vec<i64>> {
        let until = until.map(format_time);
        let ids = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT group_id FROM schedule_logs
                       WHERE date = ?1 AND check_time >= ?2 AND (?3 IS NULL OR check_time < ?3)
                       GROUP BY group_id
                       ORDER BY MIN(check_time), group_id"#,
                )?;
                let ids = stmt
                    .query_map(params![store_date(date), format_time(from), until], |row| {
                        row.get::<_, i64>(0)
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    // Routine operations

    pub async fn insert_routine(&self, routine: NewRoutine) -> Result<RoutineSpec> {
        let routine = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let highest: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(sort_order), 0) FROM routines WHERE owner = ?1",
                    params![routine.owner],
                    |row| row.get(0),
                )?;
                tx.execute(
                    "INSERT INTO routines (owner, name, duration_minutes, sort_order) VALUES (?1, ?2, ?3, ?4)",
                    params![routine.owner, routine.name, routine.duration_minutes, highest + 1],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(RoutineSpec {
                    id,
                    owner: routine.owner,
                    name: routine.name,
                    duration_minutes: routine.duration_minutes,
                    order: highest + 1,
                })
            })
            .await?;
        Ok(routine)
    }

    pub async fn routines_for_owner(&self, owner: &str) -> Result<Vec<RoutineSpec>> {
        let owner = owner.to_string();
        let routines = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, owner, name, duration_minutes, sort_order FROM routines \
                     WHERE owner = ?1 ORDER BY sort_order",
                )?;
                let routines = stmt
                    .query_map(params![owner], routine_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(routines)
            })
            .await?;
        Ok(routines)
    }

    pub async fn get_routine(&self, id: i64) -> Result<Option<RoutineSpec>> {
        let routine = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, owner, name, duration_minutes, sort_order FROM routines WHERE id = ?1",
                )?;
                let routine = stmt.query_row(params![id], routine_from_row).optional()?;
                Ok(routine)
            })
            .await?;
        Ok(routine)
    }

    /// Returns `None` when no routine has that id.
    pub async fn update_routine(&self, id: i64, edit: RoutineEdit) -> Result<Option<RoutineSpec>> {
        let routine = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE routines SET name = ?1, duration_minutes = ?2, \
                     sort_order = COALESCE(?3, sort_order) WHERE id = ?4",
                    params![edit.name, edit.duration_minutes, edit.order, id],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                let routine = conn
                    .query_row(
                        "SELECT id, owner, name, duration_minutes, sort_order FROM routines WHERE id = ?1",
                        params![id],
                        routine_from_row,
                    )
                    .optional()?;
                Ok(routine)
            })
            .await?;
        Ok(routine)
    }

    /// Removes the routine and drops it from every tag that lists it.
    pub async fn delete_routine(&self, id: i64) -> Result<bool> {
        let removed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM tag_routines WHERE routine_id = ?1", params![id])?;
                let removed = tx.execute("DELETE FROM routines WHERE id = ?1", params![id])?;
                tx.commit()?;
                Ok(removed > 0)
            })
            .await?;
        Ok(removed)
    }

    // Tag operations

    pub async fn insert_tag(&self, tag: NewTag) -> Result<Tag> {
        let tag = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO tags (owner, name) VALUES (?1, ?2)",
                    params![tag.owner, tag.name],
                )?;
                let id = tx.last_insert_rowid();
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO tag_routines (tag_id, position, routine_id) VALUES (?1, ?2, ?3)",
                    )?;
                    for (position, routine_id) in tag.routine_ids.iter().enumerate() {
                        stmt.execute(params![id, position as i64, routine_id])?;
                    }
                }
                tx.commit()?;
                Ok(Tag {
                    id,
                    owner: tag.owner,
                    name: tag.name,
                    routine_ids: tag.routine_ids,
                })
            })
            .await?;
        Ok(tag)
    }

    pub async fn get_tag(&self, id: i64) -> Result<Option<Tag>> {
        let tag = self
            .conn
            .call(move |conn| {
                let header = conn
                    .query_row(
                        "SELECT id, owner, name FROM tags WHERE id = ?1",
                        params![id],
                        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
                    )
                    .optional()?;
                let Some((id, owner, name)) = header else {
                    return Ok(None);
                };
                let routine_ids = tag_routine_ids(conn, id)?;
                Ok(Some(Tag {
                    id,
                    owner,
                    name,
                    routine_ids,
                }))
            })
            .await?;
        Ok(tag)
    }

    pub async fn tags_for_owner(&self, owner: &str) -> Result<Vec<Tag>> {
        let owner = owner.to_string();
        let tags = self
            .conn
            .call(move |conn| {
                let headers = {
                    let mut stmt =
                        conn.prepare("SELECT id, owner, name FROM tags WHERE owner = ?1 ORDER BY id")?;
                    let rows = stmt.query_map(params![owner], |row| {
                        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                    })?;
                    rows.collect::<std::result::Result<Vec<_>, _>>()?
                };
                let mut tags = Vec::with_capacity(headers.len());
                for (id, owner, name) in headers {
                    let routine_ids = tag_routine_ids(conn, id)?;
                    tags.push(Tag {
                        id,
                        owner,
                        name,
                        routine_ids,
                    });
                }
                Ok(tags)
            })
            .await?;
        Ok(tags)
    }

    /// Renames the tag and replaces its routine list. `None` when the tag
    /// does not exist.
    pub async fn update_tag(&self, id: i64, edit: TagEdit) -> Result<Option<Tag>> {
        let tag = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let owner = tx
                    .query_row("SELECT owner FROM tags WHERE id = ?1", params![id], |row| {
                        row.get::<_, String>(0)
                    })
                    .optional()?;
                let Some(owner) = owner else {
                    return Ok(None);
                };

                tx.execute("UPDATE tags SET name = ?1 WHERE id = ?2", params![edit.name, id])?;
                tx.execute("DELETE FROM tag_routines WHERE tag_id = ?1", params![id])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO tag_routines (tag_id, position, routine_id) VALUES (?1, ?2, ?3)",
                    )?;
                    for (position, routine_id) in edit.routine_ids.iter().enumerate() {
                        stmt.execute(params![id, position as i64, routine_id])?;
                    }
                }
                tx.commit()?;
                Ok(Some(Tag {
                    id,
                    owner,
                    name: edit.name,
                    routine_ids: edit.routine_ids,
                }))
            })
            .await?;
        Ok(tag)
    }

    pub async fn delete_tag(&self, id: i64) -> Result<bool> {
        let removed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM tag_routines WHERE tag_id = ?1", params![id])?;
                let removed = tx.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
                tx.commit()?;
                Ok(removed > 0)
            })
            .await?;
        Ok(removed)
    }

    // Bedtime operations

    pub async fn upsert_bedtime(&self, bedtime: Bedtime) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO bedtimes (owner, sleep_time, wake_time) VALUES (?1, ?2, ?3)
                       ON CONFLICT(owner) DO UPDATE SET
                           sleep_time = excluded.sleep_time,
                           wake_time = excluded.wake_time"#,
                    params![
                        bedtime.owner,
                        format_time(bedtime.sleep_time),
                        format_time(bedtime.wake_time)
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_bedtime(&self, owner: &str) -> Result<Option<Bedtime>> {
        let owner = owner.to_string();
        let bedtime = self
            .conn
            .call(move |conn| {
                let bedtime = conn
                    .query_row(
                        "SELECT owner, sleep_time, wake_time FROM bedtimes WHERE owner = ?1",
                        params![owner],
                        |row| {
                            Ok(Bedtime {
                                owner: row.get(0)?,
                                sleep_time: time_col(row, 1)?,
                                wake_time: time_col(row, 2)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(bedtime)
            })
            .await?;
        Ok(bedtime)
    }
}

fn store_date(date: NaiveDate) -> String {
    date.format(STORE_DATE_FORMAT).to_string()
}

fn conversion_error(idx: usize, err: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.to_string().into())
}

fn date_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, STORE_DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn time_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveTime> {
    let raw: String = row.get(idx)?;
    NaiveTime::parse_from_str(&raw, TIME_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn opt_time_col(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) if !raw.is_empty() => NaiveTime::parse_from_str(&raw, TIME_FORMAT)
            .map(Some)
            .map_err(|e| conversion_error(idx, e)),
        _ => Ok(None),
    }
}

fn insert_item_row(stmt: &mut Statement<'_>, item: &ScheduleItem) -> rusqlite::Result<i64> {
    let origin = item.location.as_ref().map(|l| &l.origin);
    let dest = item.location.as_ref().map(|l| &l.destination);
    stmt.insert(params![
        item.owner,
        item.group_id,
        item.recurrence_id,
        item.recurrence.map(|r| r.as_str()),
        item.name,
        store_date(item.date),
        format_time(item.start_time),
        item.end_time.map(format_time),
        item.has_end_time,
        item.role.as_str(),
        origin.map(|p| p.name.as_str()),
        origin.map(|p| p.coordinates.latitude),
        origin.map(|p| p.coordinates.longitude),
        dest.map(|p| p.name.as_str()),
        dest.map(|p| p.coordinates.latitude),
        dest.map(|p| p.coordinates.longitude),
        item.transportation.as_str(),
        item.is_updated,
        item.priority,
        item.tag_id,
        item.routine_id,
    ])
}

fn insert_log_row(stmt: &mut Statement<'_>, log: &ScheduleLog) -> rusqlite::Result<i64> {
    stmt.insert(params![
        log.group_id,
        log.recurrence_id,
        log.origin.latitude,
        log.origin.longitude,
        log.destination.latitude,
        log.destination.longitude,
        store_date(log.date),
        format_time(log.check_time),
    ])
}

fn place_cols(row: &Row, name: usize) -> rusqlite::Result<Option<Place>> {
    let name_value: Option<String> = row.get(name)?;
    let lat: Option<f64> = row.get(name + 1)?;
    let lng: Option<f64> = row.get(name + 2)?;
    Ok(match (lat, lng) {
        (Some(latitude), Some(longitude)) => Some(Place {
            name: name_value.unwrap_or_default(),
            coordinates: Coordinates::new(latitude, longitude),
        }),
        _ => None,
    })
}

fn item_from_row(row: &Row) -> rusqlite::Result<ScheduleItem> {
    let recurrence = row
        .get::<_, Option<String>>(4)?
        .map(|s| s.parse::<Recurrence>().map_err(|e| conversion_error(4, e)))
        .transpose()?;
    let role_raw: String = row.get(10)?;
    let role = ItemRole::parse(&role_raw)
        .ok_or_else(|| conversion_error(10, format!("unknown role {role_raw:?}")))?;
    let location = match (place_cols(row, 11)?, place_cols(row, 14)?) {
        (Some(origin), Some(destination)) => Some(LocationPair {
            origin,
            destination,
        }),
        _ => None,
    };
    let transportation: String = row.get(17)?;

    Ok(ScheduleItem {
        id: row.get(0)?,
        owner: row.get(1)?,
        group_id: row.get(2)?,
        recurrence_id: row.get(3)?,
        recurrence,
        name: row.get(5)?,
        date: date_col(row, 6)?,
        start_time: time_col(row, 7)?,
        end_time: opt_time_col(row, 8)?,
        has_end_time: row.get::<_, i64>(9)? != 0,
        role,
        location,
        transportation: TravelMode::resolve(Some(&transportation)),
        is_updated: row.get::<_, i64>(18)? != 0,
        priority: row.get(19)?,
        tag_id: row.get(20)?,
        routine_id: row.get(21)?,
    })
}

fn log_from_row(row: &Row) -> rusqlite::Result<ScheduleLog> {
    Ok(ScheduleLog {
        id: row.get(0)?,
        group_id: row.get(1)?,
        recurrence_id: row.get(2)?,
        origin: Coordinates::new(row.get(3)?, row.get(4)?),
        destination: Coordinates::new(row.get(5)?, row.get(6)?),
        date: date_col(row, 7)?,
        check_time: time_col(row, 8)?,
    })
}

fn routine_from_row(row: &Row) -> rusqlite::Result<RoutineSpec> {
    Ok(RoutineSpec {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        duration_minutes: row.get(3)?,
        order: row.get(4)?,
    })
}

fn tag_routine_ids(conn: &rusqlite::Connection, tag_id: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT routine_id FROM tag_routines WHERE tag_id = ?1 ORDER BY position")?;
    let ids = stmt
        .query_map(params![tag_id], |row| row.get::<_, i64>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}
