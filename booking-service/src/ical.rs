//! Minimal iCalendar decoding for external availability feeds. Feeds
//! come from uncontrolled sources, so malformed events are dropped
//! rather than escalated; only the fields the sync pipeline consults
//! are read.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub uid: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub description: Option<String>,
}

/// Decode VEVENT blocks out of a raw feed. Events missing a start or
/// end, or with start >= end, are silently skipped. Duplicate UIDs are
/// kept as-is; a missing UID gets a synthesized one so events stay
/// distinguishable downstream.
pub fn parse_calendar(raw: &str) -> Vec<FeedEvent> {
    let mut events = Vec::new();
    let mut current: Option<EventBuilder> = None;

    for line in unfold_lines(raw) {
        if line.eq_ignore_ascii_case("BEGIN:VEVENT") {
            current = Some(EventBuilder::default());
            continue;
        }
        if line.eq_ignore_ascii_case("END:VEVENT") {
            if let Some(builder) = current.take() {
                if let Some(event) = builder.build() {
                    events.push(event);
                }
            }
            continue;
        }
        let Some(builder) = current.as_mut() else {
            continue;
        };
        let Some((name, value)) = split_property(&line) else {
            continue;
        };
        match name.to_ascii_uppercase().as_str() {
            "UID" => builder.uid = Some(value.to_string()),
            "SUMMARY" => builder.summary = Some(value.to_string()),
            "DTSTART" => builder.start = parse_instant(value),
            "DTEND" => builder.end = parse_instant(value),
            "DESCRIPTION" => builder.description = Some(value.to_string()),
            _ => {}
        }
    }

    events
}

#[derive(Default)]
struct EventBuilder {
    uid: Option<String>,
    summary: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    description: Option<String>,
}

impl EventBuilder {
    fn build(self) -> Option<FeedEvent> {
        let start = self.start?;
        let end = self.end?;
        if start >= end {
            return None;
        }
        let uid = self.uid.unwrap_or_else(|| {
            format!(
                "generated-{}-{}",
                Utc::now().timestamp_millis(),
                Uuid::new_v4().simple()
            )
        });
        Some(FeedEvent {
            uid,
            summary: self.summary.unwrap_or_default(),
            start,
            end,
            description: self.description,
        })
    }
}

/// Undo RFC 5545 line folding: a line starting with a space or tab
/// continues the previous line.
fn unfold_lines(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix(' ').or_else(|| line.strip_prefix('\t')) {
            if let Some(last) = out.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        out.push(line.to_string());
    }
    out
}

/// Split `NAME;PARAM=V:value` into (NAME, value), discarding property
/// parameters like `VALUE=DATE` or `TZID`.
fn split_property(line: &str) -> Option<(&str, &str)> {
    let (head, value) = line.split_once(':')?;
    let name = head.split(';').next().unwrap_or(head);
    Some((name.trim(), value.trim()))
}

/// Accepts `YYYYMMDD` (all-day), `YYYYMMDDTHHMMSSZ` (UTC) and floating
/// `YYYYMMDDTHHMMSS` values; everything is normalized to UTC, all-day
/// values landing on midnight.
fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    if value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    let trimmed = value.strip_suffix('Z').unwrap_or(value);
    let dt = NaiveDateTime::parse_from_str(trimmed, "%Y%m%dT%H%M%S").ok()?;
    Some(dt.and_utc())
}
