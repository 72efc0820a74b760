use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::clock::wire_time;
use crate::error::{AppError, Result};

/// Longest routine accepted, one full day.
pub const MAX_ROUTINE_MINUTES: i64 = 24 * 60;

/// Rejects routine fields that could not be laid out in a day's chain.
pub fn check_routine(name: &str, duration_minutes: i64) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidInput("name is required".to_string()));
    }
    if !(1..=MAX_ROUTINE_MINUTES).contains(&duration_minutes) {
        return Err(AppError::InvalidInput(format!(
            "durationMinutes must be between 1 and {MAX_ROUTINE_MINUTES}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineSpec {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub duration_minutes: i64,
    pub order: i64,
}

impl RoutineSpec {
    /// Stored rows written before the day cap existed may hold anything, so
    /// the range is checked again here.
    pub fn duration(&self) -> Result<Duration> {
        if !(0..=MAX_ROUTINE_MINUTES).contains(&self.duration_minutes) {
            return Err(AppError::InvalidInput(format!(
                "routine {} lasts {} minutes",
                self.id, self.duration_minutes
            )));
        }
        Ok(Duration::minutes(self.duration_minutes))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoutine {
    pub owner: String,
    pub name: String,
    pub duration_minutes: i64,
}

/// Replacement fields for an existing routine. `order` keeps its value when
/// omitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineEdit {
    pub name: String,
    pub duration_minutes: i64,
    #[serde(default)]
    pub order: Option<i64>,
}

/// Ordered list of routines that precede a day's first schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub routine_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTag {
    pub owner: String,
    pub name: String,
    pub routine_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEdit {
    pub name: String,
    pub routine_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bedtime {
    #[serde(default)]
    pub owner: String,
    #[serde(with = "wire_time")]
    pub sleep_time: NaiveTime,
    #[serde(with = "wire_time")]
    pub wake_time: NaiveTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routine_durations_are_capped_at_a_day() {
        assert!(check_routine("Shower", 15).is_ok());
        assert!(check_routine("Sleep in", MAX_ROUTINE_MINUTES).is_ok());
        assert!(check_routine("Shower", 0).is_err());
        assert!(check_routine("Shower", MAX_ROUTINE_MINUTES + 1).is_err());
        assert!(check_routine("Shower", 1_000_000_000_000).is_err());
        assert!(check_routine("  ", 15).is_err());
    }

    #[test]
    fn stored_duration_out_of_range_is_an_error() {
        let mut routine = RoutineSpec {
            id: 4,
            owner: "u1".to_string(),
            name: "Shower".to_string(),
            duration_minutes: 15,
            order: 1,
        };
        assert_eq!(routine.duration().unwrap(), Duration::minutes(15));

        routine.duration_minutes = 1_000_000_000_000;
        assert!(matches!(routine.duration(), Err(AppError::InvalidInput(_))));
    }
}
