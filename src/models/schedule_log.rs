use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::clock::{wire_date, wire_time};
use crate::models::Coordinates;

/// Tells the sweeper when to re-check the travel leg of one day's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleLog {
    pub id: i64,
    pub group_id: i64,
    pub recurrence_id: i64,
    pub origin: Coordinates,
    pub destination: Coordinates,
    #[serde(with = "wire_date")]
    pub date: NaiveDate,
    #[serde(with = "wire_time")]
    pub check_time: NaiveTime,
}
