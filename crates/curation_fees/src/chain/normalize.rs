//! Normalization of date ranges and on-chain identifiers for deterministic requests.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("invalid time: {0}")]
    InvalidTime(String),
    #[error("empty range: from {from} is after to {to}")]
    EmptyRange { from: i64, to: i64 },
}

/// Which end of a window a date-only input describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Inclusive `[from, to]` window in Unix seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: i64,
    pub to: i64,
}

impl TimeWindow {
    pub fn new(from: i64, to: i64) -> Result<Self, NormalizeError> {
        if from > to {
            return Err(NormalizeError::EmptyRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// Parse both ends; a bare `YYYY-MM-DD` covers the whole UTC day.
    pub fn parse(from: &str, to: &str) -> Result<Self, NormalizeError> {
        Self::new(parse_bound(from, Bound::Start)?, parse_bound(to, Bound::End)?)
    }

    pub fn contains(&self, ts: i64) -> bool {
        self.from <= ts && ts <= self.to
    }
}

/// Parse a window bound: epoch seconds, `YYYY-MM-DD` (UTC) or RFC3339.
pub fn parse_bound(s: &str, bound: Bound) -> Result<i64, NormalizeError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(NormalizeError::InvalidTime("empty".to_string()));
    }
    if let Ok(ts) = s.parse::<i64>() {
        return Ok(ts);
    }
    if let Ok(date) = Date::parse(s, format_description!("[year]-[month]-[day]")) {
        let dt = match bound {
            Bound::Start => date.midnight(),
            Bound::End => date
                .with_hms(23, 59, 59)
                .map_err(|e| NormalizeError::InvalidTime(e.to_string()))?,
        };
        return Ok(dt.assume_utc().unix_timestamp());
    }
    let dt = OffsetDateTime::parse(s, &Rfc3339)
        .map_err(|e| NormalizeError::InvalidTime(format!("{s}: {e}")))?;
    Ok(dt.unix_timestamp())
}

/// Addresses and hashes are compared lowercase everywhere.
pub fn normalize_id(s: &str) -> String {
    s.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_epoch_seconds() {
        assert_eq!(parse_bound("1700000000", Bound::Start).unwrap(), 1_700_000_000);
    }

    #[test]
    fn date_only_covers_whole_day() {
        let w = TimeWindow::parse("2023-01-01", "2023-01-01").unwrap();
        assert_eq!(w.from, 1_672_531_200);
        assert_eq!(w.to, 1_672_531_200 + 86_399);
        assert!(w.contains(1_672_531_200 + 3600));
        assert!(!w.contains(1_672_531_200 + 86_400));
    }

    #[test]
    fn parse_rfc3339() {
        let ts = parse_bound("2023-01-01T00:00:10Z", Bound::End).unwrap();
        assert_eq!(ts, 1_672_531_210);
    }

    #[test]
    fn reversed_range_rejected() {
        assert!(matches!(
            TimeWindow::new(10, 5),
            Err(NormalizeError::EmptyRange { from: 10, to: 5 })
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(parse_bound("yesterday", Bound::Start).is_err());
        assert!(parse_bound("  ", Bound::Start).is_err());
    }

    #[test]
    fn ids_lowercased() {
        assert_eq!(normalize_id(" 0xAbC "), "0xabc");
    }
}
