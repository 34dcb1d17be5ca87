//! Core types for the workflux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: normalized presence events, classified timeline entries, and the
//! per-day metric records produced by the aggregator.
//!
//! Timestamps are site-local wall-clock times (`NaiveDateTime`); hour-of-day
//! semantics (lunch, commute, night shift) are defined against local time.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Employee identifier as issued by the HR system
pub type EmployeeId = u64;

/// Closed set of presence tag codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagCode {
    /// Primary work area
    G1,
    /// Preparation area (locker, gowning)
    G2,
    /// Meeting space
    G3,
    /// Education space
    G4,
    /// Rest area
    N1,
    /// Welfare facility (secondary rest area)
    N2,
    /// Corridor / stairs / bridge: the ambiguous transit code
    T1,
    /// Gate, inbound
    T2,
    /// Gate, outbound
    T3,
    /// Cafeteria dine-in
    M1,
    /// Cafeteria takeout
    M2,
    /// Equipment or system usage
    O,
}

impl TagCode {
    pub const ALL: [TagCode; 12] = [
        TagCode::G1,
        TagCode::G2,
        TagCode::G3,
        TagCode::G4,
        TagCode::N1,
        TagCode::N2,
        TagCode::T1,
        TagCode::T2,
        TagCode::T3,
        TagCode::M1,
        TagCode::M2,
        TagCode::O,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagCode::G1 => "G1",
            TagCode::G2 => "G2",
            TagCode::G3 => "G3",
            TagCode::G4 => "G4",
            TagCode::N1 => "N1",
            TagCode::N2 => "N2",
            TagCode::T1 => "T1",
            TagCode::T2 => "T2",
            TagCode::T3 => "T3",
            TagCode::M1 => "M1",
            TagCode::M2 => "M2",
            TagCode::O => "O",
        }
    }

    /// Any of the three transit codes (corridor or either gate)
    pub fn is_transit(&self) -> bool {
        matches!(self, TagCode::T1 | TagCode::T2 | TagCode::T3)
    }

    /// The ambiguous corridor code whose purpose must be inferred
    pub fn is_ambiguous_transit(&self) -> bool {
        matches!(self, TagCode::T1)
    }

    pub fn is_meal(&self) -> bool {
        matches!(self, TagCode::M1 | TagCode::M2)
    }

    /// Equipment/system usage: the strongest direct work signal
    pub fn is_work_signal(&self) -> bool {
        matches!(self, TagCode::O)
    }

    /// Fixed meal duration in minutes, if this is a meal code
    pub fn fixed_meal_minutes(&self) -> Option<i64> {
        match self {
            TagCode::M1 => Some(30),
            TagCode::M2 => Some(10),
            _ => None,
        }
    }
}

impl fmt::Display for TagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        TagCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown tag code '{s}'"))
    }
}

/// Where a presence event was collected from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Badge reader / location tag
    Tag,
    /// Cafeteria meal log
    Meal,
    /// Meeting-calendar entry
    Calendar,
    /// Equipment, mail or approval system login
    Equipment,
}

/// Inferred activity for one timeline entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    Work,
    Preparation,
    Meeting,
    Education,
    Meal,
    Rest,
    Transit,
    Entry,
    Exit,
    NonWork,
}

impl ActivityState {
    /// Coarse judgment category derived from the state
    pub fn judgment(&self) -> WorkJudgment {
        match self {
            ActivityState::Work
            | ActivityState::Preparation
            | ActivityState::Meeting
            | ActivityState::Education => WorkJudgment::Work,
            ActivityState::Meal => WorkJudgment::Meal,
            ActivityState::Rest | ActivityState::NonWork => WorkJudgment::NonWork,
            ActivityState::Transit => WorkJudgment::Movement,
            ActivityState::Entry => WorkJudgment::ClockIn,
            ActivityState::Exit => WorkJudgment::ClockOut,
        }
    }
}

/// Coarse judgment category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkJudgment {
    Work,
    NonWork,
    Movement,
    Meal,
    ClockIn,
    ClockOut,
}

/// Why an ambiguous transit event was scored the way it was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assumption {
    WorkReturn,
    Tailgating,
    LongWait,
    Uncertain,
}

/// Job group, each with its own ambiguous-transit return probability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobGroup {
    Production,
    Research,
    #[default]
    Office,
    Management,
}

/// Data-completeness era of a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataRegime {
    /// Badge, meal, calendar and equipment sources all present
    Full,
    /// Only badge and claim data present
    Reduced,
}

/// One normalized presence event. Immutable once produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub timestamp: NaiveDateTime,
    pub employee_id: EmployeeId,
    pub tag_code: TagCode,
    pub location: String,
    pub source: SourceKind,
    /// Duration reported by the source (calendar entries), in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
}

/// One classified timeline entry; exactly one per input event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: NaiveDateTime,
    pub tag_code: TagCode,
    pub location: String,
    pub source: SourceKind,
    /// Resolved duration in minutes (gap to next event, or fixed/capped)
    pub duration_minutes: i64,
    pub state: ActivityState,
    pub judgment: WorkJudgment,
    /// Classification confidence in [0, 1]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assumption: Option<Assumption>,
}

/// Ground Rules summary for one employee-day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundRulesMetrics {
    /// Work minutes attributed to the ambiguous-transit slice
    pub ground_rules_work_minutes: i64,
    /// Mean ambiguous-transit confidence (0-100)
    pub ground_rules_confidence: u32,
    /// Ambiguous-transit minutes scored as work movement
    pub work_movement_minutes: i64,
    /// Ambiguous-transit minutes scored as incidental movement
    pub non_work_movement_minutes: i64,
    /// Team baseline applied (0-100)
    pub team_baseline_used: u32,
    /// Share of scored events flagged anomalous (0-100)
    pub anomaly_score: u32,
    /// Total special rules applied across the day
    pub applied_rules_count: u32,
    /// Ambiguous-transit minutes the state machine already counted as work
    pub classified_ambiguous_work_minutes: i64,
}

/// Per-day summary metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayMetrics {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub regime: DataRegime,
    pub total_minutes: i64,
    pub work_minutes: i64,
    pub estimated_work_minutes: f64,
    /// Work share of total stay (0-100)
    pub work_ratio: u32,
    pub focus_minutes: i64,
    pub meeting_minutes: i64,
    pub meal_minutes: i64,
    pub transit_minutes: i64,
    pub rest_minutes: i64,
    /// Confidence in the data itself (0-100)
    pub reliability_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_rules: Option<GroundRulesMetrics>,
}

impl DayMetrics {
    /// All-zero record used when a day cannot be computed
    pub fn empty(employee_id: EmployeeId, date: NaiveDate, regime: DataRegime) -> Self {
        Self {
            employee_id,
            date,
            regime,
            total_minutes: 0,
            work_minutes: 0,
            estimated_work_minutes: 0.0,
            work_ratio: 0,
            focus_minutes: 0,
            meeting_minutes: 0,
            meal_minutes: 0,
            transit_minutes: 0,
            rest_minutes: 0,
            reliability_score: 0,
            ground_rules: None,
        }
    }

    /// Sum of the mutually exclusive buckets (meeting is a subset of work)
    pub fn bucketed_minutes(&self) -> i64 {
        self.work_minutes + self.meal_minutes + self.transit_minutes + self.rest_minutes
    }
}
