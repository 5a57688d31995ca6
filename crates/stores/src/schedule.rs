use chrono::NaiveTime;

use courier_core::{DomainError, DomainResult};

/// Parse a store schedule time (`HH:MM` or `HH:MM:SS`, 24h clock).
pub fn parse_time_of_day(s: &str) -> DomainResult<NaiveTime> {
    let s = s.trim();
    let format = match s.len() {
        5 => "%H:%M",
        8 => "%H:%M:%S",
        _ => return Err(invalid(s)),
    };
    NaiveTime::parse_from_str(s, format).map_err(|_| invalid(s))
}

/// Parse an optional schedule time where `None` or an empty string clears it.
pub fn parse_optional_time_of_day(s: Option<&str>) -> DomainResult<Option<NaiveTime>> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_time_of_day(v).map(Some),
    }
}

fn invalid(s: &str) -> DomainError {
    DomainError::validation(format!("time must be HH:MM or HH:MM:SS, got {s:?}"))
}
