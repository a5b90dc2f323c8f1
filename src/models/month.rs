//! The `YYYY-MM` month key used by budgets and transaction filters.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use time::Date;

use crate::Error;

/// A calendar month, keyed as `YYYY-MM`.
///
/// Budgets are stored per month, and transaction queries can be restricted to
/// one month via its inclusive [first_day](Month::first_day) and
/// [last_day](Month::last_day) bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Month {
    year: i32,
    month: time::Month,
}

impl Month {
    /// Create a month from its parts.
    pub fn new(year: i32, month: time::Month) -> Self {
        Self { year, month }
    }

    /// The month that `date` falls in.
    pub fn containing(date: Date) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The first day of the month.
    pub fn first_day(&self) -> Date {
        Date::from_calendar_date(self.year, self.month, 1)
            .expect("the first of a month is always a valid date")
    }

    /// The last day of the month.
    pub fn last_day(&self) -> Date {
        let last = time::util::days_in_month(self.month, self.year);

        Date::from_calendar_date(self.year, self.month, last)
            .expect("the last day of a month is always a valid date")
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month as u8)
    }
}

impl FromStr for Month {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidMonth(s.to_owned());

        let (year, month) = s.split_once('-').ok_or_else(invalid)?;

        // Reject keys like "2024-6" so that string ordering and equality on
        // stored month keys stay consistent.
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u8 = month.parse().map_err(|_| invalid())?;
        let month = time::Month::try_from(month).map_err(|_| invalid())?;

        Ok(Self { year, month })
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;

        key.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::Error;

    use super::Month;

    #[test]
    fn parses_and_displays_month_key() {
        let month: Month = "2024-06".parse().unwrap();

        assert_eq!(month, Month::new(2024, time::Month::June));
        assert_eq!(month.to_string(), "2024-06");
    }

    #[test]
    fn rejects_malformed_keys() {
        for key in ["2024", "2024-13", "2024-00", "24-06", "2024-6", "junk"] {
            let result: Result<Month, _> = key.parse();

            assert_eq!(result, Err(Error::InvalidMonth(key.to_owned())), "{key}");
        }
    }

    #[test]
    fn day_bounds_are_inclusive() {
        let june: Month = "2024-06".parse().unwrap();

        assert_eq!(june.first_day(), date!(2024 - 06 - 01));
        assert_eq!(june.last_day(), date!(2024 - 06 - 30));
    }

    #[test]
    fn february_bounds_respect_leap_years() {
        let leap: Month = "2024-02".parse().unwrap();
        let common: Month = "2023-02".parse().unwrap();

        assert_eq!(leap.last_day(), date!(2024 - 02 - 29));
        assert_eq!(common.last_day(), date!(2023 - 02 - 28));
    }

    #[test]
    fn containing_uses_the_date_month() {
        let month = Month::containing(date!(2024 - 06 - 15));

        assert_eq!(month.to_string(), "2024-06");
    }
}
