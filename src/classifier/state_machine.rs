//! Tag classification state machine
//!
//! Turns one employee-day's ordered presence events into a timeline with one
//! entry per event. Tag-specific handlers run first; tags without one fall
//! through to the generic transition table.
//!
//! Classification is total: every (event, neighbours, job group, flags)
//! combination yields exactly one entry.

use crate::classifier::day_context::{DayContext, EventFlags};
use crate::classifier::transitions::TransitionTable;
use crate::types::{
    ActivityState, Assumption, JobGroup, PresenceEvent, SourceKind, TagCode, TimelineEntry,
};
use chrono::NaiveDateTime;

/// Stays in the rest area longer than this become non-work
const LONG_REST_MINUTES: i64 = 120;

/// Corridor stays up to this long are judged by their neighbours
const SHORT_CORRIDOR_MINUTES: i64 = 30;

/// Return-probability threshold above which a long corridor stay counts as work
const WORK_RETURN_THRESHOLD: f64 = 0.5;

/// Deterministic per-event classifier
#[derive(Debug, Clone, Default)]
pub struct ActivityStateMachine {
    transitions: TransitionTable,
}

impl ActivityStateMachine {
    pub fn new() -> Self {
        Self {
            transitions: TransitionTable::new(),
        }
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    /// Classify a whole day. Boundary and lookahead flags are computed once
    /// up front; events must already be ordered by timestamp.
    pub fn classify_day(&self, events: &[PresenceEvent], job_group: JobGroup) -> Vec<TimelineEntry> {
        let context = DayContext::build(events);

        events
            .iter()
            .enumerate()
            .map(|(i, current)| {
                let prev = i.checked_sub(1).and_then(|p| events.get(p));
                let next = events.get(i + 1);
                self.classify_event(current, prev, next, job_group, context.flags(i))
            })
            .collect()
    }

    /// Classify a single event given its neighbours
    pub fn classify_event(
        &self,
        current: &PresenceEvent,
        prev: Option<&PresenceEvent>,
        next: Option<&PresenceEvent>,
        job_group: JobGroup,
        flags: EventFlags,
    ) -> TimelineEntry {
        let gap = next
            .map(|n| minutes_between(current.timestamp, n.timestamp))
            .unwrap_or(0);

        match current.tag_code {
            TagCode::M1 | TagCode::M2 => {
                let minutes = current.tag_code.fixed_meal_minutes().unwrap_or(gap);
                build_entry(current, minutes, ActivityState::Meal, 1.0, None)
            }
            TagCode::O => build_entry(current, gap, ActivityState::Work, 0.98, None),
            TagCode::G2 => build_entry(current, gap, ActivityState::Preparation, 0.90, None),
            TagCode::G3 => {
                let minutes = capped_external_duration(current, gap);
                build_entry(current, minutes, ActivityState::Meeting, 0.95, None)
            }
            TagCode::G4 => {
                let minutes = capped_external_duration(current, gap);
                build_entry(current, minutes, ActivityState::Education, 0.95, None)
            }
            TagCode::G1 => classify_primary_work(current, prev, next, gap),
            TagCode::N2 => {
                if prev.is_some_and(|p| p.tag_code == TagCode::N2) {
                    // second welfare tag in a row: leaving the area
                    build_entry(current, gap, ActivityState::Transit, 0.95, None)
                } else {
                    build_entry(current, gap, ActivityState::Rest, 0.95, None)
                }
            }
            TagCode::T2 | TagCode::T3 => classify_boundary(current, gap, flags)
                .unwrap_or_else(|| build_entry(current, gap, ActivityState::NonWork, 1.0, None)),
            TagCode::T1 => classify_boundary(current, gap, flags).unwrap_or_else(|| {
                classify_ambiguous_transit(current, next, gap, job_group, flags)
            }),
            TagCode::N1 => {
                let transition = self
                    .transitions
                    .resolve(prev.map(|p| p.tag_code), current.tag_code);
                if gap > LONG_REST_MINUTES {
                    build_entry(current, gap, ActivityState::NonWork, 0.90, None)
                } else {
                    build_entry(current, gap, transition.state, transition.probability, None)
                }
            }
        }
    }
}

/// First and last transit events of the day are clock-in and clock-out,
/// whatever their sub-type.
fn classify_boundary(current: &PresenceEvent, gap: i64, flags: EventFlags) -> Option<TimelineEntry> {
    if flags.is_first_transit {
        Some(build_entry(current, gap, ActivityState::Entry, 1.0, None))
    } else if flags.is_last_transit {
        Some(build_entry(current, gap, ActivityState::Exit, 1.0, None))
    } else {
        None
    }
}

fn classify_primary_work(
    current: &PresenceEvent,
    prev: Option<&PresenceEvent>,
    next: Option<&PresenceEvent>,
    gap: i64,
) -> TimelineEntry {
    let mut confidence = match gap {
        g if g < 5 => 0.75,
        g if g < 15 => 0.85,
        _ => 0.95,
    };

    if prev.is_some_and(|p| matches!(p.tag_code, TagCode::T1 | TagCode::T2)) {
        confidence = f64::max(confidence, 0.85);
    }
    if next.is_some_and(|n| n.tag_code == TagCode::G1) {
        confidence = f64::max(confidence, 0.90);
    }

    build_entry(current, gap, ActivityState::Work, confidence, None)
}

fn classify_ambiguous_transit(
    current: &PresenceEvent,
    next: Option<&PresenceEvent>,
    gap: i64,
    job_group: JobGroup,
    flags: EventFlags,
) -> TimelineEntry {
    let next_code = next.map(|n| n.tag_code);

    match next_code {
        Some(TagCode::O) => build_entry(
            current,
            gap,
            ActivityState::Work,
            0.85,
            Some(Assumption::WorkReturn),
        ),
        Some(TagCode::G1) => {
            let (confidence, assumption) = match gap {
                g if g <= 30 => (0.90, Assumption::WorkReturn),
                g if g <= 90 => (0.75, Assumption::Tailgating),
                _ => (0.60, Assumption::LongWait),
            };
            build_entry(current, gap, ActivityState::Work, confidence, Some(assumption))
        }
        Some(TagCode::T1) => {
            if flags.is_triple_transit_to_work {
                return build_entry(
                    current,
                    gap,
                    ActivityState::Work,
                    0.85,
                    Some(Assumption::WorkReturn),
                );
            }
            match gap {
                g if g < 10 => build_entry(current, gap, ActivityState::Transit, 0.90, None),
                g if g <= 30 => build_entry(
                    current,
                    gap,
                    ActivityState::Work,
                    0.85,
                    Some(Assumption::WorkReturn),
                ),
                _ => build_entry(
                    current,
                    gap,
                    ActivityState::Work,
                    0.90,
                    Some(Assumption::WorkReturn),
                ),
            }
        }
        None => classify_by_return_probability(current, gap, job_group),
        Some(_) if gap > SHORT_CORRIDOR_MINUTES => {
            classify_by_return_probability(current, gap, job_group)
        }
        Some(_) => build_entry(current, gap, ActivityState::Transit, 0.90, None),
    }
}

fn classify_by_return_probability(current: &PresenceEvent, gap: i64, job_group: JobGroup) -> TimelineEntry {
    let probability = job_group.return_probability(gap);
    let is_work = probability > WORK_RETURN_THRESHOLD;

    let assumption = if gap > 120 {
        Assumption::LongWait
    } else if gap > 60 {
        Assumption::Tailgating
    } else if is_work {
        Assumption::WorkReturn
    } else {
        Assumption::Uncertain
    };

    let state = if is_work {
        ActivityState::Work
    } else {
        ActivityState::Transit
    };

    build_entry(current, gap, state, probability, Some(assumption))
}

/// Calendar-sourced meetings carry their own length; an early departure
/// truncates them to the gap before the next event.
fn capped_external_duration(current: &PresenceEvent, gap: i64) -> i64 {
    match (current.source, current.duration_minutes) {
        (SourceKind::Calendar, Some(reported)) => reported.max(0).min(gap),
        _ => gap,
    }
}

fn build_entry(
    current: &PresenceEvent,
    duration_minutes: i64,
    state: ActivityState,
    confidence: f64,
    assumption: Option<Assumption>,
) -> TimelineEntry {
    TimelineEntry {
        timestamp: current.timestamp,
        tag_code: current.tag_code,
        location: current.location.clone(),
        source: current.source,
        duration_minutes: duration_minutes.max(0),
        state,
        judgment: state.judgment(),
        confidence: confidence.clamp(0.0, 1.0),
        assumption,
    }
}

/// Whole minutes from `from` to `to`, never negative
pub fn minutes_between(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    (to - from).num_minutes().max(0)
}
