use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::clock::{self, wire_date, wire_time, wire_time_opt};
use crate::error::Result;
use crate::models::Recurrence;

/// Position an item plays in its day's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemRole {
    Anchor,
    TravelLeg,
    Routine,
    WakeUp,
    Plain,
}

impl ItemRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemRole::Anchor => "anchor",
            ItemRole::TravelLeg => "travel-leg",
            ItemRole::Routine => "routine",
            ItemRole::WakeUp => "wake-up",
            ItemRole::Plain => "plain",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "anchor" => Some(ItemRole::Anchor),
            "travel-leg" => Some(ItemRole::TravelLeg),
            "routine" => Some(ItemRole::Routine),
            "wake-up" => Some(ItemRole::WakeUp),
            "plain" => Some(ItemRole::Plain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Transit,
}

impl TravelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Walking => "walking",
            TravelMode::Transit => "transit",
        }
    }

    /// Unknown or missing modes fall back to driving.
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("walking") => TravelMode::Walking,
            Some("transit") => TravelMode::Transit,
            _ => TravelMode::Driving,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn query_value(&self) -> String {
        format!("{:.6},{:.6}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPair {
    pub origin: Place,
    pub destination: Place,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    /// Zero until the store assigns one.
    pub id: i64,
    pub owner: String,
    pub group_id: i64,
    /// Zero for items that are not part of a series.
    pub recurrence_id: i64,
    pub recurrence: Option<Recurrence>,
    pub name: String,
    #[serde(with = "wire_date")]
    pub date: NaiveDate,
    #[serde(with = "wire_time")]
    pub start_time: NaiveTime,
    #[serde(with = "wire_time_opt")]
    pub end_time: Option<NaiveTime>,
    pub has_end_time: bool,
    pub role: ItemRole,
    pub location: Option<LocationPair>,
    pub transportation: TravelMode,
    pub is_updated: bool,
    pub priority: i32,
    pub tag_id: Option<i64>,
    pub routine_id: Option<i64>,
}

impl ScheduleItem {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn is_travel_leg(&self) -> bool {
        self.role == ItemRole::TravelLeg
    }

    /// Span between the recorded start and end, or `fallback` when the item
    /// has no end of its own.
    pub fn recorded_duration(&self, fallback: Duration) -> Duration {
        match (self.has_end_time, self.end_time) {
            (true, Some(end)) => clock::span(self.start_time, end),
            _ => fallback,
        }
    }

    /// Places the item so that it ends at `end` and lasts `duration`.
    /// Leaves the item untouched when the start would fall off the calendar.
    pub fn place_ending_at(&mut self, end: NaiveDateTime, duration: Duration) -> Result<NaiveDateTime> {
        let start = clock::back_from(end, duration)?;
        self.date = start.date();
        self.start_time = start.time();
        self.end_time = Some(end.time());
        self.has_end_time = true;
        Ok(start)
    }

    pub fn time_update(&self) -> ItemTimeUpdate {
        ItemTimeUpdate {
            id: self.id,
            name: self.name.clone(),
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            has_end_time: self.has_end_time,
        }
    }
}

/// Fields a user may change on an existing item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEdit {
    pub name: String,
    #[serde(with = "wire_date")]
    pub date: NaiveDate,
    #[serde(with = "wire_time")]
    pub start_time: NaiveTime,
    #[serde(default, with = "wire_time_opt")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub has_end_time: bool,
}

impl ItemEdit {
    pub fn apply_to(&self, item: &mut ScheduleItem) {
        item.name = self.name.clone();
        item.date = self.date;
        item.start_time = self.start_time;
        item.end_time = self.end_time;
        item.has_end_time = self.has_end_time;
    }

    pub fn matches(&self, item: &ScheduleItem) -> bool {
        self.name == item.name
            && self.date == item.date
            && self.start_time == item.start_time
            && self.end_time == item.end_time
            && self.has_end_time == item.has_end_time
    }
}

/// Payload pushed to clients when cascade logic moves an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTimeUpdate {
    pub id: i64,
    pub name: String,
    #[serde(with = "wire_date")]
    pub date: NaiveDate,
    #[serde(with = "wire_time")]
    pub start_time: NaiveTime,
    #[serde(with = "wire_time_opt")]
    pub end_time: Option<NaiveTime>,
    pub has_end_time: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{parse_date, parse_time};

    fn item(start: &str, end: Option<&str>) -> ScheduleItem {
        ScheduleItem {
            id: 1,
            owner: "u1".to_string(),
            group_id: 1,
            recurrence_id: 0,
            recurrence: None,
            name: "Stretch".to_string(),
            date: parse_date("10-02-2025").unwrap(),
            start_time: parse_time(start).unwrap(),
            end_time: end.map(|e| parse_time(e).unwrap()),
            has_end_time: end.is_some(),
            role: ItemRole::Routine,
            location: None,
            transportation: TravelMode::Driving,
            is_updated: false,
            priority: 0,
            tag_id: None,
            routine_id: None,
        }
    }

    #[test]
    fn mode_resolution_defaults_to_driving() {
        assert_eq!(TravelMode::resolve(Some("transit")), TravelMode::Transit);
        assert_eq!(TravelMode::resolve(Some("Walking")), TravelMode::Walking);
        assert_eq!(TravelMode::resolve(Some("bicycling")), TravelMode::Driving);
        assert_eq!(TravelMode::resolve(None), TravelMode::Driving);
    }

    #[test]
    fn recorded_duration_uses_fallback_without_end() {
        let fallback = Duration::minutes(5);
        assert_eq!(item("07:00", Some("07:20")).recorded_duration(fallback), Duration::minutes(20));
        assert_eq!(item("07:00", None).recorded_duration(fallback), fallback);
    }

    #[test]
    fn place_ending_at_rolls_date_back() {
        let mut routine = item("07:00", Some("07:20"));
        let end = parse_date("10-02-2025").unwrap().and_time(parse_time("00:10").unwrap());

        let start = routine.place_ending_at(end, Duration::minutes(20)).unwrap();

        assert_eq!(routine.date, parse_date("09-02-2025").unwrap());
        assert_eq!(routine.start_time, parse_time("23:50").unwrap());
        assert_eq!(routine.end_time, Some(parse_time("00:10").unwrap()));
        assert_eq!(start, routine.starts_at());
    }

    #[test]
    fn update_payload_uses_wire_formats() {
        let payload = serde_json::to_value(item("07:00", Some("07:20")).time_update()).unwrap();
        assert_eq!(payload["date"], "10-02-2025");
        assert_eq!(payload["startTime"], "07:00");
        assert_eq!(payload["endTime"], "07:20");
        assert_eq!(payload["hasEndTime"], true);
    }
}
