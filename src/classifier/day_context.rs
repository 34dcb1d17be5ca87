//! Day-level lookahead flags, computed once per employee-day
//!
//! The state machine classifies one event at a time; facts that depend on the
//! whole day (which transit event is the first or last, whether a corridor
//! pair leads back into the work area) are precomputed here.

use crate::types::{PresenceEvent, TagCode};

/// Maximum gap between the second corridor tag and the work-area tag for the
/// corridor → corridor → work pattern
pub const TRIPLE_PATTERN_WINDOW_MINUTES: i64 = 30;

/// Per-event flags handed to the state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFlags {
    /// First transit-type event of the day (clock-in)
    pub is_first_transit: bool,
    /// Last transit-type event of the day (clock-out)
    pub is_last_transit: bool,
    /// Corridor → corridor → primary work area within the window
    pub is_triple_transit_to_work: bool,
}

/// Precomputed boundary indices and lookahead for one day
#[derive(Debug, Clone, Default)]
pub struct DayContext {
    first_transit: Option<usize>,
    last_transit: Option<usize>,
    triple_pattern: Vec<bool>,
}

impl DayContext {
    pub fn build(events: &[PresenceEvent]) -> Self {
        let first_transit = events.iter().position(|e| e.tag_code.is_transit());
        let last_transit = events.iter().rposition(|e| e.tag_code.is_transit());

        let triple_pattern = (0..events.len())
            .map(|i| is_triple_transit_to_work(events, i))
            .collect();

        Self {
            first_transit,
            last_transit,
            triple_pattern,
        }
    }

    pub fn first_transit(&self) -> Option<usize> {
        self.first_transit
    }

    pub fn last_transit(&self) -> Option<usize> {
        self.last_transit
    }

    /// Flags for the event at `index`. A lone transit event is both first
    /// and last; the state machine gives Entry priority.
    pub fn flags(&self, index: usize) -> EventFlags {
        EventFlags {
            is_first_transit: self.first_transit == Some(index),
            is_last_transit: self.last_transit == Some(index),
            is_triple_transit_to_work: self.triple_pattern.get(index).copied().unwrap_or(false),
        }
    }
}

fn is_triple_transit_to_work(events: &[PresenceEvent], i: usize) -> bool {
    let (Some(current), Some(next), Some(after)) = (events.get(i), events.get(i + 1), events.get(i + 2))
    else {
        return false;
    };
    current.tag_code == TagCode::T1
        && next.tag_code == TagCode::T1
        && after.tag_code == TagCode::G1
        && (after.timestamp - next.timestamp).num_minutes() <= TRIPLE_PATTERN_WINDOW_MINUTES
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;
    use chrono::NaiveDate;

    fn event(hour: u32, minute: u32, tag_code: TagCode) -> PresenceEvent {
        PresenceEvent {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(hour, minute, 0)
                .unwrap(),
            employee_id: 1,
            tag_code,
            location: String::new(),
            source: SourceKind::Tag,
            duration_minutes: None,
        }
    }

    #[test]
    fn test_boundary_indices() {
        let events = vec![
            event(8, 0, TagCode::G2),
            event(8, 5, TagCode::T2),
            event(9, 0, TagCode::G1),
            event(12, 0, TagCode::T1),
            event(18, 0, TagCode::T3),
            event(18, 5, TagCode::O),
        ];
        let ctx = DayContext::build(&events);
        assert_eq!(ctx.first_transit(), Some(1));
        assert_eq!(ctx.last_transit(), Some(4));
        assert!(ctx.flags(1).is_first_transit);
        assert!(ctx.flags(4).is_last_transit);
        assert_eq!(ctx.flags(3), EventFlags::default());
    }

    #[test]
    fn test_triple_pattern_window() {
        let events = vec![
            event(10, 0, TagCode::T1),
            event(10, 20, TagCode::T1),
            event(10, 50, TagCode::G1),
            event(11, 0, TagCode::T1),
            event(11, 5, TagCode::T1),
            event(11, 40, TagCode::G1),
        ];
        let ctx = DayContext::build(&events);
        assert!(ctx.flags(0).is_triple_transit_to_work);
        assert!(!ctx.flags(1).is_triple_transit_to_work);
        // 35 minutes between second corridor tag and work area
        assert!(!ctx.flags(3).is_triple_transit_to_work);
    }

    #[test]
    fn test_empty_day() {
        let ctx = DayContext::build(&[]);
        assert_eq!(ctx.first_transit(), None);
        assert_eq!(ctx.flags(0), EventFlags::default());
    }
}
