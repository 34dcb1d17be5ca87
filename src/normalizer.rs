//! Event normalization
//!
//! Converts raw presence records from the backing stores into the ordered
//! `PresenceEvent` sequence the classifier expects.
//! - Tag code resolution (explicit code, source kind, then location keywords)
//! - Timestamp ordering
//! - Same-tag de-duplication within 60 seconds
//! - Night-shift windowing (prior day 18:00 to day 12:00)

use crate::types::{EmployeeId, PresenceEvent, SourceKind, TagCode};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Consecutive events with the same tag inside this window collapse into one
pub const DEDUP_WINDOW_SECONDS: i64 = 60;

/// Night-shift window opens at this hour of the previous day
pub const NIGHT_WINDOW_START_HOUR: u32 = 18;

/// Night-shift window closes at this hour of the requested day
pub const NIGHT_WINDOW_END_HOUR: u32 = 12;

/// Location keywords checked in order; first match wins
const LOCATION_KEYWORDS: &[(&[&str], TagCode)] = &[
    (&["회의", "meeting"], TagCode::G3),
    (&["교육", "강의", "univ", "training"], TagCode::G4),
    (&["locker", "가우닝", "gowning", "탈의"], TagCode::G2),
    (&["휴게", "모성", "대기", "수면", "lounge"], TagCode::N1),
    (&["메디컬", "약국", "휘트니스", "medical", "fitness"], TagCode::N2),
    (&["복도", "브릿지", "계단", "연결통로", "corridor", "bridge", "stairs"], TagCode::T1),
    (&["입문", "정문입", "스피드게이트입", "gate in"], TagCode::T2),
    (&["출문", "정문출", "gate out"], TagCode::T3),
];

const TAKEOUT_KEYWORDS: &[&str] = &["테이크아웃", "takeout", "take-out"];

/// Raw presence record as loaded from a backing store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDayEvent {
    pub timestamp: NaiveDateTime,
    /// Explicit tag code, when the store already classified the location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_code: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_source")]
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
}

fn default_source() -> SourceKind {
    SourceKind::Tag
}

/// Normalizer for raw presence records
pub struct EventNormalizer;

impl EventNormalizer {
    /// Resolve the tag code for one raw record
    pub fn resolve_tag(raw: &RawDayEvent) -> TagCode {
        if let Some(code) = raw.tag_code.as_deref().and_then(|c| c.parse().ok()) {
            return code;
        }

        let location = raw.location.to_lowercase();
        match raw.source {
            SourceKind::Meal => {
                if contains_any(&location, TAKEOUT_KEYWORDS) {
                    TagCode::M2
                } else {
                    TagCode::M1
                }
            }
            SourceKind::Calendar => TagCode::G3,
            SourceKind::Equipment => TagCode::O,
            SourceKind::Tag => tag_from_location(&location),
        }
    }

    /// Resolve, order and de-duplicate one batch of raw records
    pub fn normalize(employee_id: EmployeeId, raw: &[RawDayEvent]) -> Vec<PresenceEvent> {
        let mut events: Vec<PresenceEvent> = raw
            .iter()
            .map(|r| PresenceEvent {
                timestamp: r.timestamp,
                employee_id,
                tag_code: Self::resolve_tag(r),
                location: r.location.clone(),
                source: r.source,
                duration_minutes: r.duration_minutes,
            })
            .collect();

        // stable: same-timestamp records keep their load order
        events.sort_by_key(|e| e.timestamp);
        dedup_repeated_tags(events)
    }

    /// Normalize the events belonging to `date`. Night shifts pull in the
    /// previous day's evening records and drop anything after noon.
    pub fn normalize_day(
        employee_id: EmployeeId,
        date: NaiveDate,
        day_events: &[RawDayEvent],
        previous_day_events: Option<&[RawDayEvent]>,
    ) -> Vec<PresenceEvent> {
        let events = Self::normalize(employee_id, day_events);
        if !Self::is_night_shift(&events) {
            return events;
        }

        let (start, end) = Self::night_shift_window(date);
        let merged: Vec<RawDayEvent> = previous_day_events
            .unwrap_or_default()
            .iter()
            .chain(day_events)
            .filter(|e| e.timestamp >= start && e.timestamp < end)
            .cloned()
            .collect();

        Self::normalize(employee_id, &merged)
    }

    /// A day whose first event lands in the evening or before dawn is a
    /// night shift.
    pub fn is_night_shift(events: &[PresenceEvent]) -> bool {
        events.first().is_some_and(|first| {
            let hour = first.timestamp.hour();
            hour >= NIGHT_WINDOW_START_HOUR || hour < 6
        })
    }

    /// `[previous day 18:00, date 12:00)`
    pub fn night_shift_window(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let start_time = NaiveTime::from_hms_opt(NIGHT_WINDOW_START_HOUR, 0, 0).unwrap_or_default();
        let end_time = NaiveTime::from_hms_opt(NIGHT_WINDOW_END_HOUR, 0, 0).unwrap_or_default();
        let previous = date - Duration::days(1);
        (previous.and_time(start_time), date.and_time(end_time))
    }
}

fn tag_from_location(location: &str) -> TagCode {
    LOCATION_KEYWORDS
        .iter()
        .find(|(keywords, _)| contains_any(location, keywords))
        .map(|(_, code)| *code)
        .unwrap_or(TagCode::G1)
}

fn dedup_repeated_tags(events: Vec<PresenceEvent>) -> Vec<PresenceEvent> {
    let mut kept: Vec<PresenceEvent> = Vec::with_capacity(events.len());
    for event in events {
        let duplicate = kept.last().is_some_and(|last| {
            last.tag_code == event.tag_code
                && (event.timestamp - last.timestamp).num_seconds() < DEDUP_WINDOW_SECONDS
        });
        if !duplicate {
            kept.push(event);
        }
    }
    kept
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
