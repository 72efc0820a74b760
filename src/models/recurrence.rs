use std::fmt;
use std::str::FromStr;

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn as_str(self) -> &'static str {
        match self {
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
            Recurrence::Yearly => "yearly",
        }
    }

    /// How many occurrences a new series materializes up front.
    pub fn occurrences(self) -> usize {
        match self {
            Recurrence::Daily => 365,
            Recurrence::Weekly => 52,
            Recurrence::Monthly => 12,
            Recurrence::Yearly => 5,
        }
    }

    /// The `n`th occurrence counted from `start` (which is occurrence 0).
    /// Month arithmetic clamps to the last day of shorter months and is
    /// always taken from `start`, so a series on the 31st keeps returning to
    /// the 31st whenever the month has one.
    pub fn nth(self, start: NaiveDate, n: u32) -> Option<NaiveDate> {
        match self {
            Recurrence::Daily => start.checked_add_days(Days::new(u64::from(n))),
            Recurrence::Weekly => start.checked_add_days(Days::new(7 * u64::from(n))),
            Recurrence::Monthly => start.checked_add_months(Months::new(n)),
            Recurrence::Yearly => start.checked_add_months(Months::new(12 * n)),
        }
    }

    pub fn dates_from(self, start: NaiveDate) -> Vec<NaiveDate> {
        (0..self.occurrences() as u32)
            .map_while(|n| self.nth(start, n))
            .collect()
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            "yearly" => Ok(Recurrence::Yearly),
            other => Err(AppError::InvalidInput(format!(
                "invalid recurrence type: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekly_series_is_fifty_two_dates_a_week_apart() {
        let dates = Recurrence::Weekly.dates_from(date(2025, 1, 6));

        assert_eq!(dates.len(), 52);
        assert_eq!(dates[0], date(2025, 1, 6));
        for pair in dates.windows(2) {
            assert_eq!((pair[1] - pair[0]).num_days(), 7);
        }
    }

    #[test]
    fn horizon_per_rule() {
        let start = date(2025, 1, 1);
        assert_eq!(Recurrence::Daily.dates_from(start).len(), 365);
        assert_eq!(Recurrence::Monthly.dates_from(start).len(), 12);
        assert_eq!(Recurrence::Yearly.dates_from(start).len(), 5);
    }

    #[test]
    fn monthly_clamps_without_drifting() {
        let dates = Recurrence::Monthly.dates_from(date(2025, 1, 31));
        assert_eq!(dates[1], date(2025, 2, 28));
        assert_eq!(dates[2], date(2025, 3, 31));
    }

    #[test]
    fn unknown_rule_is_invalid_input() {
        assert!(matches!(
            "fortnightly".parse::<Recurrence>(),
            Err(AppError::InvalidInput(_))
        ));
        assert_eq!("Weekly".parse::<Recurrence>().unwrap(), Recurrence::Weekly);
    }
}
