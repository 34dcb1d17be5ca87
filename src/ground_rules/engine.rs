//! Ground Rules confidence scoring
//!
//! `GroundRulesEngine` owns the learned team profiles and scores ambiguous
//! transit events against them. Profiles are built once in the constructor
//! and never change afterwards, so `calculate_confidence` can be called from
//! any number of worker threads without synchronization.

use crate::ground_rules::profile::{
    HistoricalEvent, ScheduleKind, TeamKey, TeamProfile, TeamStatistics,
};
use crate::ground_rules::rules::RuleAction;
use crate::types::{EmployeeId, TagCode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Inputs for scoring one ambiguous transit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceContext {
    pub team: String,
    pub schedule_type: String,
    pub hour: u32,
    pub prev_tag: Option<TagCode>,
    pub next_tag: Option<TagCode>,
    pub duration_minutes: i64,
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
}

/// Score breakdown for one ambiguous transit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    /// In [0.05, 0.95]
    pub final_confidence: f64,
    pub team_baseline: f64,
    pub sequence_multiplier: f64,
    pub time_weight: f64,
    pub rules_adjustment: f64,
    pub applied_rule_ids: Vec<String>,
    pub anomaly_flag: bool,
}

/// Statistical confidence engine
#[derive(Debug, Clone, Default)]
pub struct GroundRulesEngine {
    profiles: HashMap<TeamKey, TeamProfile>,
}

impl GroundRulesEngine {
    /// Baseline for teams without a learned profile
    pub const DEFAULT_BASELINE: f64 = 0.35;
    /// Groups need strictly more events than this to be learned
    pub const DEFAULT_MIN_SAMPLE_SIZE: u64 = 500;
    pub const MIN_CONFIDENCE: f64 = 0.05;
    pub const MAX_CONFIDENCE: f64 = 0.95;

    /// Learn profiles from precomputed team statistics
    pub fn new(statistics: &[TeamStatistics], min_sample_size: u64) -> Self {
        let mut profiles = HashMap::new();
        let mut skipped = 0usize;

        for stats in statistics {
            if stats.total_events <= min_sample_size {
                debug!(
                    team = %stats.team,
                    schedule_type = %stats.schedule_type,
                    total_events = stats.total_events,
                    "Skipping team below minimum sample size"
                );
                skipped += 1;
                continue;
            }
            let profile = TeamProfile::learn(stats);
            profiles.insert(profile.key.clone(), profile);
        }

        info!(
            learned = profiles.len(),
            skipped, min_sample_size, "Learned Ground Rules team profiles"
        );

        Self { profiles }
    }

    /// Aggregate raw historical events, then learn
    pub fn from_history(events: &[HistoricalEvent], min_sample_size: u64) -> Self {
        Self::new(&TeamStatistics::aggregate(events), min_sample_size)
    }

    pub fn profile(&self, team: &str, schedule_type: &str) -> Option<&TeamProfile> {
        self.profiles.get(&TeamKey::new(team, schedule_type))
    }

    /// All learned profiles, ordered by key
    pub fn profiles(&self) -> Vec<&TeamProfile> {
        let mut profiles: Vec<&TeamProfile> = self.profiles.values().collect();
        profiles.sort_by(|a, b| a.key.cmp(&b.key));
        profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Score one ambiguous transit event. Pure: the same context always
    /// yields the same result.
    pub fn calculate_confidence(&self, context: &ConfidenceContext) -> ConfidenceResult {
        let profile = self.profile(&context.team, &context.schedule_type);

        let team_baseline = profile
            .map(|p| p.baseline_confidence)
            .unwrap_or(Self::DEFAULT_BASELINE);
        let sequence_multiplier = sequence_multiplier(context.prev_tag, context.next_tag);
        let time_weight = match profile {
            Some(p) => p.time_weights.weight_for_hour(context.hour),
            None => ScheduleKind::from_schedule_type(&context.schedule_type)
                .time_weights()
                .weight_for_hour(context.hour),
        };

        let mut rules_adjustment = 0.0;
        let mut applied_rule_ids = Vec::new();
        let mut flagged_by_rule = false;
        for rule in profile.map(|p| p.special_rules.as_slice()).unwrap_or_default() {
            if rule.applies_at(context.hour) {
                rules_adjustment += rule.score_adjustment();
                flagged_by_rule |= rule.action == RuleAction::FlagAnomaly;
                applied_rule_ids.push(rule.rule_id.clone());
            }
        }

        let raw = team_baseline * sequence_multiplier * time_weight + rules_adjustment;
        let anomaly_flag = flagged_by_rule || is_anomalous(raw, team_baseline);

        ConfidenceResult {
            final_confidence: clamp_confidence(raw),
            team_baseline,
            sequence_multiplier,
            time_weight,
            rules_adjustment,
            applied_rule_ids,
            anomaly_flag,
        }
    }
}

/// Equipment usage on both sides of the transit is the strongest signal
pub fn sequence_multiplier(prev: Option<TagCode>, next: Option<TagCode>) -> f64 {
    let prev_is_work = prev.is_some_and(|t| t.is_work_signal());
    let next_is_work = next.is_some_and(|t| t.is_work_signal());
    match (prev_is_work, next_is_work) {
        (true, true) => 2.5,
        (true, false) | (false, true) => 2.2,
        (false, false) => 1.0,
    }
}

/// Checked on the unclamped score
pub fn is_anomalous(raw_confidence: f64, team_baseline: f64) -> bool {
    raw_confidence < f64::max(team_baseline * 0.2, GroundRulesEngine::MIN_CONFIDENCE)
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return GroundRulesEngine::MIN_CONFIDENCE;
    }
    value.clamp(GroundRulesEngine::MIN_CONFIDENCE, GroundRulesEngine::MAX_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stats(team: &str, schedule_type: &str, transit: u64, equipment: u64) -> TeamStatistics {
        TeamStatistics {
            team: team.to_string(),
            schedule_type: schedule_type.to_string(),
            total_events: 5_000,
            transit_events: transit,
            equipment_events: equipment,
            team_size: 20,
            morning_transit_rate: 10.0,
            lunch_transit_rate: 30.0,
            evening_transit_rate: 15.0,
        }
    }

    fn context(team: &str, hour: u32, prev: Option<TagCode>, next: Option<TagCode>) -> ConfidenceContext {
        ConfidenceContext {
            team: team.to_string(),
            schedule_type: "고정근무제".to_string(),
            hour,
            prev_tag: prev,
            next_tag: next,
            duration_minutes: 5,
            employee_id: 42,
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        }
    }

    fn engine() -> GroundRulesEngine {
        GroundRulesEngine::new(
            &[
                stats("Finance팀", "고정근무제", 40, 10),
                stats("인프라복지팀", "고정근무제", 2_400, 2),
                TeamStatistics {
                    total_events: 500,
                    ..stats("Tiny팀", "고정근무제", 10, 10)
                },
            ],
            GroundRulesEngine::DEFAULT_MIN_SAMPLE_SIZE,
        )
    }

    #[test]
    fn test_minimum_sample_size_is_exclusive() {
        let engine = engine();
        assert_eq!(engine.len(), 2);
        assert!(engine.profile("Tiny팀", "고정근무제").is_none());
        assert!(engine.profile("Finance팀", "선택근무제").is_none());
    }

    #[test]
    fn test_known_team_scoring() {
        // Finance: ratio 4.0, unknown type -> Medium, baseline 0.35
        let result = engine().calculate_confidence(&context("Finance팀", 10, Some(TagCode::G1), None));
        assert!((result.team_baseline - 0.35).abs() < 1e-9);
        assert_eq!(result.sequence_multiplier, 1.0);
        assert_eq!(result.time_weight, 1.0);
        assert!((result.final_confidence - 0.35).abs() < 1e-9);
        assert!(result.applied_rule_ids.is_empty());
        assert!(!result.anomaly_flag);
    }

    #[test]
    fn test_sequence_multiplier_and_clamp() {
        let engine = engine();
        let both = engine.calculate_confidence(&context("Finance팀", 12, Some(TagCode::O), Some(TagCode::O)));
        assert_eq!(both.sequence_multiplier, 2.5);
        assert_eq!(both.final_confidence, 0.95);

        let one = engine.calculate_confidence(&context("Finance팀", 10, None, Some(TagCode::O)));
        assert_eq!(one.sequence_multiplier, 2.2);
        assert!((one.final_confidence - 0.77).abs() < 1e-9);
    }

    #[test]
    fn test_special_rule_applies_in_hour_range() {
        let engine = engine();
        let inside = engine.calculate_confidence(&context("인프라복지팀", 10, None, None));
        assert_eq!(inside.applied_rule_ids, vec!["INFRASTRUCTURE_FACILITY".to_string()]);
        assert!((inside.rules_adjustment - 0.20).abs() < 1e-9);
        assert!((inside.final_confidence - 0.85).abs() < 1e-9);

        let outside = engine.calculate_confidence(&context("인프라복지팀", 22, None, None));
        assert!(outside.applied_rule_ids.is_empty());
    }

    #[test]
    fn test_unknown_team_uses_default_baseline() {
        let result = engine().calculate_confidence(&context("Nowhere팀", 12, None, None));
        assert_eq!(result.team_baseline, GroundRulesEngine::DEFAULT_BASELINE);
        assert_eq!(result.time_weight, 1.5);
        assert!((result.final_confidence - 0.525).abs() < 1e-9);
        assert!(result.applied_rule_ids.is_empty());
    }

    #[test]
    fn test_calculate_confidence_is_idempotent() {
        let engine = engine();
        let ctx = context("인프라복지팀", 18, Some(TagCode::O), Some(TagCode::G1));
        let first = engine.calculate_confidence(&ctx);
        let second = engine.calculate_confidence(&ctx);
        assert_eq!(first, second);
        assert_eq!(first.final_confidence.to_bits(), second.final_confidence.to_bits());
    }

    #[test]
    fn test_anomaly_threshold() {
        assert!(is_anomalous(0.04, 0.20));
        assert!(!is_anomalous(0.06, 0.20));
        assert!(is_anomalous(0.12, 0.65));
        assert!(!is_anomalous(0.14, 0.65));
    }
}
