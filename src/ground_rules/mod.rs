//! Ground Rules: team-level movement baselines learned from history, used to
//! score ambiguous transit events.

pub mod engine;
pub mod profile;
pub mod rules;

pub use engine::{
    is_anomalous, sequence_multiplier, ConfidenceContext, ConfidenceResult, GroundRulesEngine,
};
pub use profile::{
    baseline_confidence, HistoricalEvent, MobilityLevel, ScheduleKind, TeamKey, TeamProfile,
    TeamStatistics, TeamType, TimeWeights,
};
pub use rules::{rules_for_team, RuleAction, SpecialRule};
