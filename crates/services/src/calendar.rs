//! Calendar-day handling for event dates and range queries.

use bson::{Document, doc};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use unical_db::models::day_start;

/// Local date-time shapes sent by HTML `datetime-local` inputs.
const LOCAL_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Parses `YYYY-MM-DD`, a local `YYYY-MM-DDTHH:MM[:SS]` or an RFC 3339
/// timestamp into its calendar day.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some(dt) = LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    {
        return Some(dt.date());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Inclusive range of calendar days; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// True when an event spanning `[event_start, event_end]` shares at
    /// least one day with the range.
    pub fn overlaps(&self, event_start: NaiveDate, event_end: NaiveDate) -> bool {
        let before_end = self.end.is_none_or(|end| event_start <= end);
        let after_start = self.start.is_none_or(|start| event_end >= start);
        before_end && after_start
    }

    /// The same predicate as `overlaps`, as a MongoDB filter on
    /// `start_date`/`end_date`.
    pub fn to_filter(&self) -> Document {
        let mut filter = Document::new();
        if let Some(end) = self.end {
            filter.insert("start_date", doc! { "$lte": day_start(end) });
        }
        if let Some(start) = self.start {
            filter.insert("end_date", doc! { "$gte": day_start(start) });
        }
        filter
    }
}
