use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// Window of statement timestamps a ranking covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum YearScope {
    #[default]
    AllTime,
    /// Inclusive on both ends.
    Years { from: i32, to: i32 },
}

impl YearScope {
    pub fn year(year: i32) -> Result<Self, DomainError> {
        Self::range(year, year)
    }

    pub fn range(from: i32, to: i32) -> Result<Self, DomainError> {
        for year in [from, to] {
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Err(DomainError::InvalidYear(year.to_string()));
            }
        }
        if from > to {
            return Err(DomainError::InvalidYear(format!("{from}-{to}")));
        }
        Ok(Self::Years { from, to })
    }

    /// Reads the optional year argument of a slash command.
    ///
    /// Anything that is not a number (including nothing) means all time.
    pub fn parse(arg: &str) -> Result<Self, DomainError> {
        let arg = arg.trim();
        let is_number =
            |value: &str| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit());

        if is_number(arg) {
            let year = arg.parse::<i32>().map_err(|_| DomainError::InvalidYear(arg.to_owned()))?;
            return Self::year(year).map_err(|_| DomainError::InvalidYear(arg.to_owned()));
        }

        if let Some((from, to)) = arg.split_once('-') {
            if is_number(from) && is_number(to) {
                let invalid = || DomainError::InvalidYear(arg.to_owned());
                let from = from.parse::<i32>().map_err(|_| invalid())?;
                let to = to.parse::<i32>().map_err(|_| invalid())?;
                return Self::range(from, to).map_err(|_| invalid());
            }
        }

        Ok(Self::AllTime)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        match self {
            Self::AllTime => true,
            Self::Years { from, to } => (*from..=*to).contains(&timestamp.year()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::AllTime => "All Time".to_owned(),
            Self::Years { from, to } if from == to => from.to_string(),
            Self::Years { from, to } => format!("{from}-{to}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::YearScope;
    use crate::errors::DomainError;

    #[test]
    fn non_numeric_arguments_mean_all_time() {
        assert_eq!(YearScope::parse(""), Ok(YearScope::AllTime));
        assert_eq!(YearScope::parse("  "), Ok(YearScope::AllTime));
        assert_eq!(YearScope::parse("last year"), Ok(YearScope::AllTime));
        assert_eq!(YearScope::parse("-2019"), Ok(YearScope::AllTime));
        assert_eq!(YearScope::AllTime.label(), "All Time");
    }

    #[test]
    fn parses_single_years_and_ranges() {
        let single = YearScope::parse("2019").expect("single year");
        assert_eq!(single, YearScope::Years { from: 2019, to: 2019 });
        assert_eq!(single.label(), "2019");

        let range = YearScope::parse("2018-2020").expect("year range");
        assert_eq!(range, YearScope::Years { from: 2018, to: 2020 });
        assert_eq!(range.label(), "2018-2020");
    }

    #[test]
    fn rejects_numbers_that_are_not_usable_years() {
        assert_eq!(
            YearScope::parse("99999999999"),
            Err(DomainError::InvalidYear("99999999999".to_owned()))
        );
        assert_eq!(YearScope::parse("0"), Err(DomainError::InvalidYear("0".to_owned())));
        assert_eq!(
            YearScope::parse("2020-2018"),
            Err(DomainError::InvalidYear("2020-2018".to_owned()))
        );
        assert_eq!(
            YearScope::parse("12345").map_err(|error| error.to_string()),
            Err("12345 doesn't seem like a valid year to me!".to_owned())
        );
    }

    #[test]
    fn year_boundaries_are_half_open() {
        let scope = YearScope::year(2019).expect("valid year");
        let first_instant = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).single().expect("date");
        let last_instant = Utc.with_ymd_and_hms(2019, 12, 31, 23, 59, 59).single().expect("date");
        let next_year = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single().expect("date");

        assert!(scope.contains(first_instant));
        assert!(scope.contains(last_instant));
        assert!(!scope.contains(next_year));
        assert!(YearScope::AllTime.contains(next_year));
    }
}
