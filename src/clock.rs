//! Wall-clock helpers shared by the store, the HTTP layer and the chain math.
//!
//! Dates travel over the wire as `DD-MM-YYYY` and times as `HH:MM`. The
//! store keeps ISO dates so `(date, start_time)` sorts chronologically.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{AppError, Result};

pub const WIRE_DATE_FORMAT: &str = "%d-%m-%Y";
pub const STORE_DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), WIRE_DATE_FORMAT)
        .map_err(|e| AppError::InvalidInput(format!("bad date {s:?}: {e}")))
}

pub fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
        .map_err(|e| AppError::InvalidInput(format!("bad time {s:?}: {e}")))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(WIRE_DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Length of a same-day or overnight span given only clock times.
pub fn span(start: NaiveTime, end: NaiveTime) -> Duration {
    let d = end - start;
    if d < Duration::zero() {
        d + Duration::days(1)
    } else {
        d
    }
}

/// Moves `end` back by `duration`. The date of the returned instant is the
/// calendar day the earlier item belongs to, so crossing midnight lands on
/// the previous day without any special casing by callers.
pub fn back_from(end: NaiveDateTime, duration: Duration) -> Result<NaiveDateTime> {
    end.checked_sub_signed(duration).ok_or_else(|| {
        AppError::InvalidInput(format!(
            "{} minutes before {end} is outside the calendar",
            duration.num_minutes()
        ))
    })
}

pub(crate) mod wire_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_date(&raw).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod wire_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod wire_time_opt {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_str(&super::format_time(*t)),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => super::parse_time(s).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        parse_date(date).unwrap().and_time(parse_time(time).unwrap())
    }

    #[test]
    fn back_from_same_day() {
        let leave = back_from(at("15-03-2025", "09:00"), Duration::minutes(45)).unwrap();
        assert_eq!(leave, at("15-03-2025", "08:15"));
    }

    #[test]
    fn back_from_crosses_midnight() {
        let anchor = at("15-03-2025", "00:10");
        let leave = back_from(anchor, Duration::minutes(30)).unwrap();
        assert_eq!(leave, at("14-03-2025", "23:40"));
    }

    #[test]
    fn back_from_crosses_year_boundary() {
        let leave = back_from(at("01-01-2025", "00:05"), Duration::minutes(20)).unwrap();
        assert_eq!(leave, at("31-12-2024", "23:45"));
    }

    #[test]
    fn back_from_out_of_range_is_an_error() {
        let huge = Duration::minutes(1_000_000_000_000);
        let err = back_from(at("10-02-2025", "08:00"), huge).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn span_handles_overnight_items() {
        let start = parse_time("23:40").unwrap();
        let end = parse_time("00:10").unwrap();
        assert_eq!(span(start, end), Duration::minutes(30));
        assert_eq!(span(end, end), Duration::zero());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(parse_time("9am"), Err(AppError::InvalidInput(_))));
        assert!(matches!(parse_date("2025-03-15"), Err(AppError::InvalidInput(_))));
        assert!(parse_time("24:00").is_err());
    }
}
