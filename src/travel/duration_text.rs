use std::sync::OnceLock;

use chrono::Duration;
use regex::Regex;

use crate::error::{AppError, Result};

use super::estimator::travel_duration;

fn hours_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\s*(?:hour|hr)").expect("valid hours pattern"))
}

fn minutes_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\s*min").expect("valid minutes pattern"))
}

/// Parses free-form durations such as `"1 hour 5 mins"` or `"45 mins"`.
///
/// Only used when the upstream answer carries no numeric duration.
pub fn parse_duration_text(text: &str) -> Result<Duration> {
    let capture = |re: &Regex| -> Result<Option<i64>> {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| {
                m.as_str()
                    .parse::<i64>()
                    .map_err(|e| AppError::Estimator(format!("bad number in {text:?}: {e}")))
            })
            .transpose()
    };

    let hours = capture(hours_pattern())?;
    let minutes = capture(minutes_pattern())?;

    if hours.is_none() && minutes.is_none() {
        return Err(AppError::Estimator(format!("unrecognised duration {text:?}")));
    }

    let total = hours
        .unwrap_or(0)
        .checked_mul(60)
        .and_then(|h| h.checked_add(minutes.unwrap_or(0)))
        .ok_or_else(|| AppError::Estimator(format!("duration {text:?} is too long")))?;
    travel_duration(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hours_and_minutes() {
        assert_eq!(parse_duration_text("1 hour 5 mins").unwrap(), Duration::minutes(65));
        assert_eq!(parse_duration_text("2 hours").unwrap(), Duration::minutes(120));
        assert_eq!(parse_duration_text("45 mins").unwrap(), Duration::minutes(45));
        assert_eq!(parse_duration_text("1 min").unwrap(), Duration::minutes(1));
    }

    #[test]
    fn rejects_text_without_units() {
        assert!(matches!(parse_duration_text("soon"), Err(AppError::Estimator(_))));
    }

    #[test]
    fn rejects_absurd_lengths() {
        let text = "9223372036854775807 hours";
        assert!(matches!(parse_duration_text(text), Err(AppError::Estimator(_))));
        assert!(matches!(parse_duration_text("200 hours"), Err(AppError::Estimator(_))));
    }
}
