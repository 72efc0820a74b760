use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::clock::{self, format_date, format_time};
use crate::error::Result;
use crate::models::{ItemRole, RoutineSpec, ScheduleItem, ScheduleLog, TravelMode};
use crate::travel::Route;

use super::{AnchorSpec, CreateOutcome, ScheduleService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainIds {
    pub group_id: i64,
    /// Zero when the chain is not part of a series.
    pub recurrence_id: i64,
}

/// A day's chain laid out in memory, earliest item first and the anchor
/// last.
#[derive(Debug, Clone)]
pub struct ChainPlan {
    pub items: Vec<ScheduleItem>,
    pub log: Option<ScheduleLog>,
    /// Start of the wake-up item, when the chain has one.
    pub wake_at: Option<NaiveDateTime>,
}

impl ChainPlan {
    pub fn anchor(&self) -> &ScheduleItem {
        // plan_day_chain always pushes the anchor last
        &self.items[self.items.len() - 1]
    }
}

/// Builds the chain for one date.
///
/// `travel` is the leg duration, or `None` when no leg should be laid out
/// (no location or no estimate). `routines` is only consulted when the anchor is
/// the first schedule of the day; `None` there means the
/// routines could not be resolved and that whole step is skipped.
///
/// Fails without side effects when an item would start outside the
/// calendar or a routine carries an impossible duration.
pub fn plan_day_chain(
    spec: &AnchorSpec,
    ids: ChainIds,
    date: NaiveDate,
    travel: Option<Duration>,
    routines: Option<&[RoutineSpec]>,
) -> Result<ChainPlan> {
    let mode = TravelMode::resolve(spec.transportation.as_deref());
    let anchor = ScheduleItem {
        id: 0,
        owner: spec.owner.clone(),
        group_id: ids.group_id,
        recurrence_id: ids.recurrence_id,
        recurrence: spec.recurrence,
        name: spec.name.clone(),
        date,
        start_time: spec.start_time,
        end_time: spec.end_time,
        has_end_time: spec.has_end_time,
        role: ItemRole::Anchor,
        location: spec.location.clone(),
        transportation: mode,
        is_updated: false,
        priority: spec.priority,
        tag_id: spec.tag_id,
        routine_id: None,
    };

    let derived = |name: String, role: ItemRole| ScheduleItem {
        id: 0,
        owner: spec.owner.clone(),
        group_id: ids.group_id,
        recurrence_id: ids.recurrence_id,
        recurrence: None,
        name,
        date,
        start_time: spec.start_time,
        end_time: None,
        has_end_time: true,
        role,
        location: None,
        transportation: mode,
        is_updated: false,
        priority: 0,
        tag_id: None,
        routine_id: None,
    };

    let mut cursor = anchor.starts_at();
    let mut reversed = vec![anchor.clone()];
    let mut log = None;

    if let (Some(location), Some(duration)) = (&spec.location, travel) {
        let mut leg = derived(format!("Leave From {}", location.origin.name), ItemRole::TravelLeg);
        leg.location = Some(location.clone());
        cursor = leg.place_ending_at(cursor, duration)?;

        let check_at = clock::back_from(cursor, duration)?;
        log = Some(ScheduleLog {
            id: 0,
            group_id: ids.group_id,
            recurrence_id: ids.recurrence_id,
            origin: location.origin.coordinates,
            destination: location.destination.coordinates,
            date: check_at.date(),
            check_time: check_at.time(),
        });
        reversed.push(leg);
    }

    let mut wake_at = None;
    if spec.is_first_schedule {
        if let Some(routines) = routines {
            for routine in routines.iter().rev() {
                let mut item = derived(routine.name.clone(), ItemRole::Routine);
                item.routine_id = Some(routine.id);
                cursor = item.place_ending_at(cursor, routine.duration()?)?;
                reversed.push(item);
            }

            let mut wake = derived("Wake Up".to_string(), ItemRole::WakeUp);
            cursor = wake.place_ending_at(cursor, Duration::zero())?;
            wake_at = Some(cursor);
            reversed.push(wake);
        }
    }

    reversed.reverse();
    Ok(ChainPlan {
        items: reversed,
        log,
        wake_at,
    })
}

impl ScheduleService {
    /// Creates a one-off chain. A failed travel estimate or routine lookup
    /// leaves the anchor on its own; a chain that cannot be laid out at all
    /// is rejected before anything is written.
    pub async fn insert_schedule(&self, spec: AnchorSpec) -> Result<CreateOutcome> {
        spec.validate()?;
        if spec.recurrence.is_some() {
            return self.insert_recurring(spec).await;
        }

        let ids = ChainIds {
            group_id: self.repo.next_id(crate::db::Counter::Group).await?,
            recurrence_id: 0,
        };

        let travel = self.estimate_leg(&spec).await;
        let routines = self.routines_for(&spec).await;
        let plan = plan_day_chain(&spec, ids, spec.date, travel, routines.as_deref())?;

        let anchor_id = self.repo.insert_item(plan.anchor().clone()).await?;
        tracing::info!("Created anchor {} in group {} for {}", anchor_id, ids.group_id, spec.owner);

        let derived: Vec<ScheduleItem> = plan.items[..plan.items.len() - 1].to_vec();
        let item_count = derived.len() + 1;
        if !derived.is_empty() {
            self.repo.insert_items_batch(derived).await?;
        }
        if let Some(log) = plan.log.clone() {
            self.repo.insert_schedule_log(log).await?;
        }

        let advisory = self.wake_advisory(&spec, &plan).await;
        Ok(CreateOutcome {
            group_ids: vec![ids.group_id],
            recurrence_id: 0,
            item_count,
            advisory,
        })
    }

    /// Leg duration for a new chain, or `None` (logged) when the estimator
    /// cannot answer.
    pub(super) async fn estimate_leg(&self, spec: &AnchorSpec) -> Option<Duration> {
        let location = spec.location.as_ref()?;
        let mode = TravelMode::resolve(spec.transportation.as_deref());
        match self
            .estimator
            .estimate(Route::from(location), mode, spec.departure())
            .await
        {
            Ok(duration) => Some(duration),
            Err(e) => {
                tracing::warn!(
                    "Failed to estimate travel from {} for {}: {}",
                    location.origin.name,
                    spec.owner,
                    e
                );
                None
            }
        }
    }

    pub(super) async fn routines_for(&self, spec: &AnchorSpec) -> Option<Vec<RoutineSpec>> {
        if !spec.is_first_schedule {
            return None;
        }
        let Some(tag_id) = spec.tag_id else {
            return Some(Vec::new());
        };
        match self.routines_for_tag(tag_id).await {
            Ok(routines) => Some(routines),
            Err(e) => {
                tracing::warn!("Failed to resolve routines for {}: {}", spec.owner, e);
                None
            }
        }
    }

    /// Advisory when the computed wake-up lands before the owner's usual
    /// wake time. Never an error.
    pub(super) async fn wake_advisory(&self, spec: &AnchorSpec, plan: &ChainPlan) -> Option<String> {
        let wake_at = plan.wake_at?;
        let bedtime = match self.repo.get_bedtime(&spec.owner).await {
            Ok(bedtime) => bedtime?,
            Err(e) => {
                tracing::warn!("Failed to load bedtime for {}: {}", spec.owner, e);
                return None;
            }
        };

        let usual = spec.date.and_time(bedtime.wake_time);
        (wake_at < usual).then(|| {
            format!(
                "Wake-up at {} on {} is earlier than your usual wake time {}",
                format_time(wake_at.time()),
                format_date(wake_at.date()),
                format_time(bedtime.wake_time)
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{parse_date, parse_time};
    use crate::models::{Coordinates, LocationPair, Place};

    fn spec(start: &str) -> AnchorSpec {
        AnchorSpec {
            owner: "u1".to_string(),
            name: "Work".to_string(),
            date: parse_date("10-02-2025").unwrap(),
            start_time: parse_time(start).unwrap(),
            end_time: None,
            has_end_time: false,
            location: Some(LocationPair {
                origin: Place {
                    name: "Home".to_string(),
                    coordinates: Coordinates::new(13.7, 100.5),
                },
                destination: Place {
                    name: "Office".to_string(),
                    coordinates: Coordinates::new(13.8, 100.6),
                },
            }),
            transportation: Some("scooter".to_string()),
            depart_at: None,
            is_first_schedule: false,
            tag_id: None,
            priority: 1,
            recurrence: None,
        }
    }

    fn routine(id: i64, name: &str, minutes: i64) -> RoutineSpec {
        RoutineSpec {
            id,
            owner: "u1".to_string(),
            name: name.to_string(),
            duration_minutes: minutes,
            order: id,
        }
    }

    const IDS: ChainIds = ChainIds {
        group_id: 9,
        recurrence_id: 0,
    };

    #[test]
    fn leg_ends_at_anchor_start() {
        let s = spec("09:00");
        let plan = plan_day_chain(&s, IDS, s.date, Some(Duration::minutes(45)), None).unwrap();

        assert_eq!(plan.items.len(), 2);
        let leg = &plan.items[0];
        assert_eq!(leg.name, "Leave From Home");
        assert_eq!(leg.role, ItemRole::TravelLeg);
        assert_eq!(leg.start_time, parse_time("08:15").unwrap());
        assert_eq!(leg.end_time, Some(parse_time("09:00").unwrap()));
        assert_eq!(leg.transportation, TravelMode::Driving);
        assert_eq!(plan.anchor().role, ItemRole::Anchor);

        let log = plan.log.unwrap();
        assert_eq!(log.check_time, parse_time("07:30").unwrap());
        assert_eq!(log.group_id, 9);
    }

    #[test]
    fn leg_before_midnight_moves_to_previous_day() {
        let s = spec("00:10");
        let plan = plan_day_chain(&s, IDS, s.date, Some(Duration::minutes(30)), None).unwrap();

        let leg = &plan.items[0];
        assert_eq!(leg.start_time, parse_time("23:40").unwrap());
        assert_eq!(leg.date, parse_date("09-02-2025").unwrap());
        assert_eq!(plan.anchor().date, parse_date("10-02-2025").unwrap());
    }

    #[test]
    fn routines_are_laid_back_to_back() {
        let mut s = spec("09:00");
        s.is_first_schedule = true;
        let routines = [routine(1, "Shower", 15), routine(2, "Breakfast", 20)];
        let travel = Duration::minutes(45);

        let plan = plan_day_chain(&s, IDS, s.date, Some(travel), Some(&routines)).unwrap();

        let names: Vec<_> = plan.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Wake Up", "Shower", "Breakfast", "Leave From Home", "Work"]);

        for pair in plan.items.windows(2) {
            assert_eq!(pair[0].end_time, Some(pair[1].start_time));
        }
        let total = Duration::minutes(15 + 20) + travel;
        let earliest = plan.items[0].starts_at();
        assert_eq!(earliest, plan.anchor().starts_at() - total);
        assert_eq!(plan.wake_at, Some(earliest));
        assert!(plan.items.iter().all(|i| i.group_id == 9 && !i.is_updated));
    }

    #[test]
    fn unresolved_routines_skip_the_whole_step() {
        let mut s = spec("09:00");
        s.is_first_schedule = true;
        s.location = None;

        let plan = plan_day_chain(&s, IDS, s.date, None, None).unwrap();

        assert_eq!(plan.items.len(), 1);
        assert!(plan.wake_at.is_none());
        assert!(plan.log.is_none());
    }

    #[test]
    fn oversized_routine_is_rejected_instead_of_laid_out() {
        let mut s = spec("08:00");
        s.is_first_schedule = true;
        let routines = [routine(1, "Hibernate", 1_000_000_000_000)];

        let err = plan_day_chain(&s, IDS, s.date, Some(Duration::minutes(45)), Some(&routines))
            .unwrap_err();

        assert!(matches!(err, crate::error::AppError::InvalidInput(_)));
    }

    #[test]
    fn missing_estimate_leaves_anchor_alone() {
        let s = spec("09:00");
        let plan = plan_day_chain(&s, IDS, s.date, None, None).unwrap();

        assert_eq!(plan.items.len(), 1);
        assert!(plan.log.is_none());
    }
}
