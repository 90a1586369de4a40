//! Timestamp and language filters over fetched posts.

use crate::post;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Format accepted for time window bounds, interpreted as UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Inclusive UTC time range; a missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Parse bounds in [`TIMESTAMP_FORMAT`]. Blank strings leave the bound open.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            start: parse_bound(start).context("Invalid start timestamp")?,
            end: parse_bound(end).context("Invalid end timestamp")?,
        })
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| t >= s) && self.end.map_or(true, |e| t <= e)
    }

    /// True when `t` is before the window starts.
    pub fn is_before(&self, t: DateTime<Utc>) -> bool {
        self.start.is_some_and(|s| t < s)
    }
}

fn parse_bound(raw: &str) -> Result<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let naive = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .with_context(|| format!("expected YYYY-MM-DD HH:MM:SS, got '{}'", raw))?;
    Ok(Some(naive.and_utc()))
}

/// Inclusive calendar-date range compared against the date part of `createdAt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    /// Parse `YYYY-MM-DD` bounds. Blank strings leave the bound open.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |raw: &str| -> Result<Option<NaiveDate>> {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(None);
            }
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Some)
                .with_context(|| format!("expected YYYY-MM-DD, got '{}'", raw))
        };
        Ok(Self {
            start: parse(start)?,
            end: parse(end)?,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Keep items whose `createdAt` falls inside the window. Items without a
/// parseable timestamp are dropped.
pub fn by_time(items: Vec<Value>, window: &TimeWindow) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| post::created_at(item).is_some_and(|t| window.contains(t)))
        .collect()
}

pub fn by_date(items: Vec<Value>, window: &DateWindow) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| post::created_at(item).is_some_and(|t| window.contains(t.date_naive())))
        .collect()
}

/// Keep items whose `record.langs` contains `code` (case-insensitive).
pub fn by_language(items: Vec<Value>, code: &str) -> Vec<Value> {
    let code = code.trim().to_lowercase();
    items
        .into_iter()
        .filter(|item| post::langs(item).iter().any(|l| l.to_lowercase() == code))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn feed_item(created_at: &str) -> Value {
        json!({"post": {"record": {"createdAt": created_at}}, "comments": []})
    }

    #[test]
    fn test_time_window_parse() {
        let window = TimeWindow::parse("2024-01-01 00:00:00", "").unwrap();
        assert_eq!(window.start, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(window.end, None);
        assert!(TimeWindow::parse("", "").unwrap().is_open());
        assert!(TimeWindow::parse("2024-01-01", "").is_err());
        assert!(TimeWindow::parse("", "01/02/2024 10:00:00").is_err());
    }

    #[test]
    fn test_time_window_bounds_are_inclusive() {
        let window = TimeWindow::parse("2024-01-01 00:00:00", "2024-01-31 23:59:59").unwrap();
        assert!(window.contains(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert!(window.contains(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()));
        assert!(window.is_before(Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()));
    }

    #[test]
    fn test_by_time_drops_missing_timestamps() {
        let items = vec![
            feed_item("2024-01-10T08:00:00.000Z"),
            feed_item("2023-12-10T08:00:00.000Z"),
            json!({"post": {"record": {}}}),
        ];
        let window = TimeWindow::parse("2024-01-01 00:00:00", "").unwrap();
        let kept = by_time(items, &window);
        assert_eq!(kept, vec![feed_item("2024-01-10T08:00:00.000Z")]);
    }

    #[test]
    fn test_by_date_compares_calendar_days() {
        let items = vec![
            json!({"record": {"createdAt": "2024-05-01T23:59:00Z"}}),
            json!({"record": {"createdAt": "2024-05-02T00:00:01Z"}}),
        ];
        let window = DateWindow::parse("", "2024-05-01").unwrap();
        let kept = by_date(items, &window);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["record"]["createdAt"], "2024-05-01T23:59:00Z");
        assert!(DateWindow::parse("May 1", "").is_err());
    }

    #[test]
    fn test_by_language() {
        let items = vec![
            json!({"record": {"langs": ["en"]}}),
            json!({"record": {"langs": ["es", "en"]}}),
            json!({"record": {"langs": []}}),
            json!({"record": {}}),
        ];
        let kept = by_language(items, "ES");
        assert_eq!(kept, vec![json!({"record": {"langs": ["es", "en"]}})]);
    }
}
