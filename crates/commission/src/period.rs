use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use courier_core::{DomainError, DomainResult};

/// An inclusive range of calendar days, interpreted in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ReportPeriod {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> DomainResult<Self> {
        if start_date > end_date {
            return Err(DomainError::validation(
                "period start date must be on or before the end date",
            ));
        }
        Ok(Self { start_date, end_date })
    }

    /// Parse two `YYYY-MM-DD` dates.
    pub fn parse(start: &str, end: &str) -> DomainResult<Self> {
        Self::new(parse_date(start, "period_start_date")?, parse_date(end, "period_end_date")?)
    }

    /// First instant of the period: `start_date 00:00:00.000`.
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.start_date.and_time(NaiveTime::MIN).and_utc()
    }

    /// Exclusive upper bound: midnight after `end_date`.
    pub fn ends_before(&self) -> DateTime<Utc> {
        (self.end_date.and_time(NaiveTime::MIN) + Duration::days(1)).and_utc()
    }

    /// Half-open `[starts_at, ends_before)`, so adjacent periods share no gap.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.starts_at() && at < self.ends_before()
    }
}

fn parse_date(value: &str, field: &str) -> DomainResult<NaiveDate> {
    let value = value.trim();
    let shape_ok = value.len() == 10
        && value
            .char_indices()
            .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });
    if !shape_ok {
        return Err(DomainError::validation(format!("{field} must use YYYY-MM-DD")));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| DomainError::validation(format!("{field} is not a valid date")))
}
