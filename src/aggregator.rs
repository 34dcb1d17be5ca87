//! Metrics aggregation
//!
//! Reduces a classified timeline into one `DayMetrics` record. Two modes:
//! - Full: every event source is present
//! - Reduced: badge and claim data only; relaxed focus threshold, softer
//!   reliability scoring and tag-frequency back-fill for empty buckets
//!
//! Each entry is accounted for at most the gap to the following entry (the
//! last entry accounts for nothing), so bucket sums never exceed the stay.
//! The optional Ground Rules extension rescores the ambiguous-transit slice
//! and keeps a per-event audit trail.

use crate::classifier::minutes_between;
use crate::ground_rules::{ConfidenceContext, ConfidenceResult, GroundRulesEngine};
use crate::types::{
    ActivityState, Assumption, DataRegime, DayMetrics, EmployeeId, GroundRulesMetrics, TagCode,
    TimelineEntry,
};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ground Rules scores at or above this count as work movement
pub const WORK_MOVEMENT_THRESHOLD: f64 = 0.5;

/// Deviation band, in hours, treated as matching the claim
pub const CLAIM_MATCH_TOLERANCE_HOURS: f64 = 0.5;

/// Reduced-mode work minutes assumed per unexplained equipment tag
pub const BACKFILL_MINUTES_PER_EQUIPMENT_TAG: f64 = 22.5;

/// Reduced-mode meeting minutes assumed per meeting or education tag
pub const BACKFILL_MINUTES_PER_MEETING_TAG: i64 = 60;

/// Scoring constants for one regime
#[derive(Debug, Clone, Copy, PartialEq)]
struct RegimeConstants {
    base_score: f64,
    coverage_cap: f64,
    /// (events per hour strictly above, points), highest first
    density_tiers: [(f64, f64); 3],
    density_floor: f64,
    uncertain_penalty: f64,
    gap_penalty: f64,
    gap_threshold_minutes: i64,
    /// Per meeting and per education signal present
    signal_bonus: f64,
    focus_min_equipment_tags: usize,
}

const FULL_CONSTANTS: RegimeConstants = RegimeConstants {
    base_score: 50.0,
    coverage_cap: 30.0,
    density_tiers: [(5.0, 20.0), (3.0, 15.0), (1.0, 10.0)],
    density_floor: 5.0,
    uncertain_penalty: 20.0,
    gap_penalty: 10.0,
    gap_threshold_minutes: 120,
    signal_bonus: 0.0,
    focus_min_equipment_tags: 2,
};

const REDUCED_CONSTANTS: RegimeConstants = RegimeConstants {
    base_score: 40.0,
    coverage_cap: 25.0,
    density_tiers: [(3.0, 15.0), (2.0, 11.0), (1.0, 8.0)],
    density_floor: 4.0,
    uncertain_penalty: 15.0,
    gap_penalty: 8.0,
    gap_threshold_minutes: 180,
    signal_bonus: 5.0,
    focus_min_equipment_tags: 1,
};

/// Organizational scope for Ground Rules scoring
#[derive(Debug, Clone, Copy)]
pub struct TeamScope<'a> {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub team: &'a str,
    pub schedule_type: &'a str,
}

/// Audit record for one scored ambiguous transit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTransit {
    pub timestamp: NaiveDateTime,
    pub duration_minutes: i64,
    /// State assigned by the classifier
    pub state: ActivityState,
    pub work_movement: bool,
    pub context: ConfidenceContext,
    pub result: ConfidenceResult,
}

/// Timeline reducer for one data regime
#[derive(Debug, Clone, Copy)]
pub struct MetricsAggregator {
    regime: DataRegime,
    constants: RegimeConstants,
}

impl MetricsAggregator {
    pub fn new(regime: DataRegime) -> Self {
        let constants = match regime {
            DataRegime::Full => FULL_CONSTANTS,
            DataRegime::Reduced => REDUCED_CONSTANTS,
        };
        Self { regime, constants }
    }

    pub fn full() -> Self {
        Self::new(DataRegime::Full)
    }

    pub fn reduced() -> Self {
        Self::new(DataRegime::Reduced)
    }

    pub fn regime(&self) -> DataRegime {
        self.regime
    }

    /// Reduce a timeline (ordered by timestamp) into day metrics
    pub fn calculate_metrics(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
        timeline: &[TimelineEntry],
    ) -> DayMetrics {
        let mut metrics = DayMetrics::empty(employee_id, date, self.regime);
        let (Some(first), Some(last)) = (timeline.first(), timeline.last()) else {
            return metrics;
        };

        metrics.total_minutes = minutes_between(first.timestamp, last.timestamp);
        let accounted = accounted_minutes(timeline);

        for (entry, &minutes) in timeline.iter().zip(&accounted) {
            match entry.state {
                ActivityState::Work | ActivityState::Preparation | ActivityState::Education => {
                    metrics.work_minutes += minutes;
                }
                ActivityState::Meeting => {
                    metrics.meeting_minutes += minutes;
                    metrics.work_minutes += minutes;
                }
                ActivityState::Meal => metrics.meal_minutes += minutes,
                ActivityState::Rest | ActivityState::NonWork => metrics.rest_minutes += minutes,
                ActivityState::Transit | ActivityState::Entry | ActivityState::Exit => {
                    metrics.transit_minutes += minutes;
                }
            }

            if entry.assumption == Some(Assumption::WorkReturn) {
                metrics.estimated_work_minutes += minutes as f64 * entry.confidence;
            }
        }

        if self.regime == DataRegime::Reduced {
            self.backfill(&mut metrics, timeline, &accounted);
        }

        metrics.focus_minutes = self.focus_minutes(timeline, &accounted);
        metrics.work_ratio = percent(metrics.work_minutes, metrics.total_minutes);
        metrics.reliability_score = self.reliability_score(timeline);
        metrics
    }

    /// Day metrics plus the Ground Rules extension and its audit trail
    pub fn calculate_with_ground_rules(
        &self,
        timeline: &[TimelineEntry],
        engine: &GroundRulesEngine,
        scope: &TeamScope<'_>,
    ) -> (DayMetrics, Vec<ScoredTransit>) {
        let mut metrics = self.calculate_metrics(scope.employee_id, scope.date, timeline);
        let (ground_rules, audit) = score_ambiguous_transits(timeline, engine, scope);
        metrics.ground_rules = Some(ground_rules);
        (metrics, audit)
    }

    /// Tag-frequency estimates for tags whose entries accounted no time.
    /// Each estimate is capped by the minutes no bucket has claimed yet.
    fn backfill(&self, metrics: &mut DayMetrics, timeline: &[TimelineEntry], accounted: &[i64]) {
        let unaccounted = |codes: &[TagCode]| {
            timeline
                .iter()
                .zip(accounted)
                .filter(|(e, &minutes)| minutes == 0 && codes.contains(&e.tag_code))
                .map(|(e, _)| e.tag_code)
                .collect::<Vec<_>>()
        };
        let unassigned = |m: &DayMetrics| (m.total_minutes - m.bucketed_minutes()).max(0);

        let equipment_tags = unaccounted(&[TagCode::O]).len();
        let estimate = (equipment_tags as f64 * BACKFILL_MINUTES_PER_EQUIPMENT_TAG).round() as i64;
        let granted = estimate.min(unassigned(metrics));
        metrics.work_minutes += granted;

        let meeting_tags = unaccounted(&[TagCode::G3, TagCode::G4]).len() as i64;
        let granted = (meeting_tags * BACKFILL_MINUTES_PER_MEETING_TAG).min(unassigned(metrics));
        metrics.meeting_minutes += granted;
        metrics.work_minutes += granted;

        let estimate: i64 = unaccounted(&[TagCode::M1, TagCode::M2])
            .iter()
            .filter_map(|code| code.fixed_meal_minutes())
            .sum();
        let granted = estimate.min(unassigned(metrics));
        metrics.meal_minutes += granted;
    }

    /// Hour windows: meeting and education time always counts; work and
    /// preparation time counts when the window has enough equipment tags.
    fn focus_minutes(&self, timeline: &[TimelineEntry], accounted: &[i64]) -> i64 {
        let mut windows: BTreeMap<(NaiveDate, u32), Vec<(&TimelineEntry, i64)>> = BTreeMap::new();
        for (entry, &minutes) in timeline.iter().zip(accounted) {
            windows
                .entry((entry.timestamp.date(), entry.timestamp.hour()))
                .or_default()
                .push((entry, minutes));
        }

        windows
            .values()
            .map(|window| {
                let equipment_tags = window.iter().filter(|(e, _)| e.tag_code == TagCode::O).count();
                let dense = equipment_tags >= self.constants.focus_min_equipment_tags;
                window
                    .iter()
                    .filter(|(e, _)| match e.state {
                        ActivityState::Meeting | ActivityState::Education => true,
                        ActivityState::Work | ActivityState::Preparation => dense,
                        _ => false,
                    })
                    .map(|(_, minutes)| minutes)
                    .sum::<i64>()
            })
            .sum()
    }

    fn reliability_score(&self, timeline: &[TimelineEntry]) -> u32 {
        let c = &self.constants;
        let (Some(first), Some(last)) = (timeline.first(), timeline.last()) else {
            return 0;
        };
        let total = timeline.len() as f64;
        let mut score = c.base_score;

        let equipment = timeline.iter().filter(|e| e.tag_code == TagCode::O).count() as f64;
        score += f64::min(equipment / total * 100.0, c.coverage_cap);

        let span_hours = (last.timestamp - first.timestamp).num_seconds() as f64 / 3600.0;
        score += if span_hours > 0.0 {
            let per_hour = total / span_hours;
            c.density_tiers
                .iter()
                .find(|(above, _)| per_hour > *above)
                .map(|(_, points)| *points)
                .unwrap_or(c.density_floor)
        } else {
            // events/hour is undefined here; a single-instant day earns the
            // floor rather than the top tier an infinite rate would reach
            c.density_floor
        };

        let uncertain = timeline
            .iter()
            .filter(|e| e.assumption == Some(Assumption::Uncertain))
            .count() as f64;
        score -= uncertain / total * c.uncertain_penalty;

        let long_gap = timeline.windows(2).any(|pair| {
            (pair[1].timestamp - pair[0].timestamp).num_seconds() > c.gap_threshold_minutes * 60
        });
        if long_gap {
            score -= c.gap_penalty;
        }

        if self.regime == DataRegime::Reduced {
            if timeline.iter().any(|e| e.tag_code == TagCode::G3) {
                score += c.signal_bonus;
            }
            if timeline.iter().any(|e| e.tag_code == TagCode::G4) {
                score += c.signal_bonus;
            }
        }

        score.round().clamp(0.0, 100.0) as u32
    }
}

/// Minutes each entry contributes to the buckets
pub fn accounted_minutes(timeline: &[TimelineEntry]) -> Vec<i64> {
    timeline
        .iter()
        .enumerate()
        .map(|(i, entry)| match timeline.get(i + 1) {
            Some(next) => entry
                .duration_minutes
                .min(minutes_between(entry.timestamp, next.timestamp))
                .max(0),
            None => 0,
        })
        .collect()
}

/// Score the ambiguous-transit slice (corridor entries that are not the
/// day's clock-in or clock-out) against the team's Ground Rules profile.
pub fn score_ambiguous_transits(
    timeline: &[TimelineEntry],
    engine: &GroundRulesEngine,
    scope: &TeamScope<'_>,
) -> (GroundRulesMetrics, Vec<ScoredTransit>) {
    let accounted = accounted_minutes(timeline);
    let mut metrics = GroundRulesMetrics::default();
    let mut audit = Vec::new();
    let mut total_confidence = 0.0;
    let mut anomalies = 0usize;

    for (i, entry) in timeline.iter().enumerate() {
        if !entry.tag_code.is_ambiguous_transit()
            || matches!(entry.state, ActivityState::Entry | ActivityState::Exit)
        {
            continue;
        }

        let minutes = accounted[i];
        let context = ConfidenceContext {
            team: scope.team.to_string(),
            schedule_type: scope.schedule_type.to_string(),
            hour: entry.timestamp.hour(),
            prev_tag: i.checked_sub(1).and_then(|p| timeline.get(p)).map(|e| e.tag_code),
            next_tag: timeline.get(i + 1).map(|e| e.tag_code),
            duration_minutes: minutes,
            employee_id: scope.employee_id,
            date: scope.date,
        };
        let result = engine.calculate_confidence(&context);

        if audit.is_empty() {
            metrics.team_baseline_used = to_percent(result.team_baseline);
        }
        total_confidence += result.final_confidence;
        anomalies += usize::from(result.anomaly_flag);
        metrics.applied_rules_count += result.applied_rule_ids.len() as u32;

        let work_movement = result.final_confidence >= WORK_MOVEMENT_THRESHOLD;
        if work_movement {
            metrics.work_movement_minutes += minutes;
        } else {
            metrics.non_work_movement_minutes += minutes;
        }
        if entry.state == ActivityState::Work {
            metrics.classified_ambiguous_work_minutes += minutes;
        }

        audit.push(ScoredTransit {
            timestamp: entry.timestamp,
            duration_minutes: minutes,
            state: entry.state,
            work_movement,
            context,
            result,
        });
    }

    if !audit.is_empty() {
        let n = audit.len() as f64;
        metrics.ground_rules_confidence = to_percent(total_confidence / n);
        metrics.anomaly_score = to_percent(anomalies as f64 / n);
    }
    metrics.ground_rules_work_minutes = metrics.work_movement_minutes;

    (metrics, audit)
}

/// Direction of a deviation from the claimed hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Under,
    Over,
    Match,
}

/// Calculated versus claimed hours
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaimDeviation {
    pub calculated_hours: f64,
    pub difference_hours: f64,
    /// Rounded percent of the claim; 0 when nothing was claimed
    pub percentage: i64,
    pub status: ClaimStatus,
}

/// Raw and Ground-Rules-adjusted deviations from one claim
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaimComparison {
    pub claimed_hours: f64,
    pub traditional: ClaimDeviation,
    pub ground_rules: ClaimDeviation,
    /// Relative reduction of the absolute percentage error
    pub improvement: i64,
}

pub fn compare_with_claim(work_minutes: i64, claimed_hours: f64) -> ClaimDeviation {
    let claimed = if claimed_hours.is_finite() { claimed_hours } else { 0.0 };
    let calculated_hours = work_minutes as f64 / 60.0;
    let difference_hours = calculated_hours - claimed;
    let percentage = if claimed > 0.0 {
        (difference_hours / claimed * 100.0).round() as i64
    } else {
        0
    };
    let status = if difference_hours.abs() < CLAIM_MATCH_TOLERANCE_HOURS {
        ClaimStatus::Match
    } else if difference_hours < 0.0 {
        ClaimStatus::Under
    } else {
        ClaimStatus::Over
    };

    ClaimDeviation {
        calculated_hours,
        difference_hours,
        percentage,
        status,
    }
}

/// The adjusted figure swaps the classifier's view of the ambiguous slice
/// for the Ground Rules view, so corridor time is never counted twice.
pub fn compare_with_ground_rules(metrics: &DayMetrics, claimed_hours: f64) -> ClaimComparison {
    let traditional = compare_with_claim(metrics.work_minutes, claimed_hours);
    let adjusted_minutes = metrics
        .ground_rules
        .as_ref()
        .map(|gr| metrics.work_minutes - gr.classified_ambiguous_work_minutes + gr.work_movement_minutes)
        .unwrap_or(metrics.work_minutes);
    let ground_rules = compare_with_claim(adjusted_minutes, claimed_hours);

    let traditional_error = traditional.percentage.abs() as f64;
    let ground_rules_error = ground_rules.percentage.abs() as f64;
    let improvement = if traditional_error > 0.0 {
        ((traditional_error - ground_rules_error) / traditional_error * 100.0).round() as i64
    } else {
        0
    };

    ClaimComparison {
        claimed_hours,
        traditional,
        ground_rules,
        improvement,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyLevel {
    None,
    Low,
    Medium,
    High,
}

/// Human-readable summary of how a day's movement compares to the team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub has_anomalies: bool,
    pub level: AnomalyLevel,
    pub summary: String,
    pub recommendations: Vec<String>,
}

impl AnomalyReport {
    pub fn from_metrics(metrics: &GroundRulesMetrics) -> Self {
        let score = metrics.anomaly_score;
        let mut recommendations = Vec::new();

        let (level, summary) = match score {
            0 => (
                AnomalyLevel::None,
                "Movement pattern is consistent with the team baseline.".to_string(),
            ),
            1..=20 => {
                recommendations.push("Check for special assignments or schedule changes.".to_string());
                (
                    AnomalyLevel::Low,
                    format!("Some movement differs from the team baseline ({score}%)."),
                )
            }
            21..=50 => {
                recommendations.push("Review recent changes to the work schedule or work type.".to_string());
                recommendations.push("Check for special projects or off-site work.".to_string());
                (
                    AnomalyLevel::Medium,
                    format!("Movement differs considerably from the team average ({score}%)."),
                )
            }
            _ => {
                recommendations.push("A detailed review of working conditions is needed.".to_string());
                recommendations.push("Go over the work pattern with the employee's manager.".to_string());
                recommendations.push("Rule out data collection errors or system faults.".to_string());
                (
                    AnomalyLevel::High,
                    format!("Movement differs strongly from the team baseline ({score}%)."),
                )
            }
        };

        let scored_minutes = metrics.work_movement_minutes + metrics.non_work_movement_minutes;
        if metrics.ground_rules_confidence < 50 && scored_minutes > 0 {
            recommendations.push(format!(
                "Confidence is low ({}%); more tag data may be needed.",
                metrics.ground_rules_confidence
            ));
        }

        Self {
            has_anomalies: score > 0,
            level,
            summary,
            recommendations,
        }
    }
}

fn percent(part: i64, whole: i64) -> u32 {
    if whole <= 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round().clamp(0.0, 100.0) as u32
}

fn to_percent(fraction: f64) -> u32 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction * 100.0).round().clamp(0.0, 100.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ActivityStateMachine;
    use crate::ground_rules::TeamStatistics;
    use crate::types::{JobGroup, PresenceEvent, SourceKind};
    use pretty_assertions::assert_eq;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn event(hour: u32, minute: u32, tag_code: TagCode) -> PresenceEvent {
        PresenceEvent {
            timestamp: date().and_hms_opt(hour, minute, 0).unwrap(),
            employee_id: 11,
            tag_code,
            location: String::new(),
            source: SourceKind::Tag,
            duration_minutes: None,
        }
    }

    fn timeline(events: &[PresenceEvent]) -> Vec<TimelineEntry> {
        ActivityStateMachine::new().classify_day(events, JobGroup::Office)
    }

    fn office_day() -> Vec<TimelineEntry> {
        timeline(&[
            event(8, 0, TagCode::T2),
            event(8, 10, TagCode::G1),
            event(9, 0, TagCode::O),
            event(9, 20, TagCode::O),
            event(9, 40, TagCode::O),
            event(10, 0, TagCode::T1),
            event(10, 5, TagCode::G3),
            event(11, 0, TagCode::G1),
            event(12, 0, TagCode::M1),
            event(12, 20, TagCode::G1),
            event(15, 0, TagCode::N1),
            event(15, 20, TagCode::G1),
            event(18, 0, TagCode::T3),
        ])
    }

    #[test]
    fn test_empty_timeline() {
        let metrics = MetricsAggregator::full().calculate_metrics(11, date(), &[]);
        assert_eq!(metrics, DayMetrics::empty(11, date(), DataRegime::Full));
    }

    #[test]
    fn test_full_mode_buckets() {
        let metrics = MetricsAggregator::full().calculate_metrics(11, date(), &office_day());
        assert_eq!(metrics.total_minutes, 600);
        // entry gate plus the short corridor hop before the meeting
        assert_eq!(metrics.transit_minutes, 15);
        assert_eq!(metrics.meeting_minutes, 55);
        // meal entry accounts for the 20 minutes before the next tag
        assert_eq!(metrics.meal_minutes, 20);
        assert_eq!(metrics.rest_minutes, 20);
        assert_eq!(metrics.work_minutes, 545);
        assert_eq!(metrics.bucketed_minutes(), metrics.total_minutes);
        assert_eq!(metrics.work_ratio, 91);
        assert_eq!(metrics.estimated_work_minutes, 0.0);
    }

    #[test]
    fn test_full_mode_focus() {
        let metrics = MetricsAggregator::full().calculate_metrics(11, date(), &office_day());
        // 09:00 window has three equipment tags (60 min of work) plus the
        // 55 minute meeting in the 10:00 window
        assert_eq!(metrics.focus_minutes, 115);
    }

    #[test]
    fn test_reliability_full() {
        let metrics = MetricsAggregator::full().calculate_metrics(11, date(), &office_day());
        // 50 + min(3/13*100, 30)=23.08 + density 1.3/h -> 10, gap 2h40 -> -10
        assert_eq!(metrics.reliability_score, 73);
    }

    #[test]
    fn test_estimated_work_uses_work_return_entries() {
        let entries = timeline(&[
            event(8, 0, TagCode::T2),
            event(9, 0, TagCode::T1),
            event(9, 20, TagCode::G1),
            event(10, 0, TagCode::T3),
        ]);
        let metrics = MetricsAggregator::full().calculate_metrics(11, date(), &entries);
        assert!((metrics.estimated_work_minutes - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_span_day() {
        let entries = timeline(&[event(9, 0, TagCode::T2), event(9, 0, TagCode::G1)]);
        let metrics = MetricsAggregator::full().calculate_metrics(11, date(), &entries);
        assert_eq!(metrics.total_minutes, 0);
        assert_eq!(metrics.work_ratio, 0);
        assert_eq!(metrics.reliability_score, 55);
    }

    #[test]
    fn test_reduced_mode_backfill() {
        // same-instant tags leave work and meeting buckets empty
        let entries = timeline(&[
            event(8, 0, TagCode::T2),
            event(8, 0, TagCode::O),
            event(8, 0, TagCode::O),
            event(8, 0, TagCode::G3),
            event(8, 0, TagCode::M2),
            event(12, 0, TagCode::T3),
        ]);
        let metrics = MetricsAggregator::reduced().calculate_metrics(11, date(), &entries);
        assert_eq!(metrics.regime, DataRegime::Reduced);
        assert_eq!(metrics.total_minutes, 240);
        assert_eq!(metrics.meal_minutes, 10);
        assert_eq!(metrics.meeting_minutes, 60);
        // 2 * 22.5 from equipment tags plus the back-filled meeting
        assert_eq!(metrics.work_minutes, 105);
        assert!(metrics.bucketed_minutes() <= metrics.total_minutes);

        let full = MetricsAggregator::full().calculate_metrics(11, date(), &entries);
        assert_eq!(full.work_minutes, 0);
        assert_eq!(full.meeting_minutes, 0);
    }

    #[test]
    fn test_reduced_backfill_is_capped() {
        let entries = timeline(&[
            event(8, 0, TagCode::T2),
            event(8, 0, TagCode::O),
            event(8, 0, TagCode::O),
            event(8, 0, TagCode::O),
            event(8, 0, TagCode::M2),
            event(8, 30, TagCode::T3),
        ]);
        let metrics = MetricsAggregator::reduced().calculate_metrics(11, date(), &entries);
        assert_eq!(metrics.total_minutes, 30);
        assert_eq!(metrics.meal_minutes, 10);
        // 68 estimated, only 20 unassigned
        assert_eq!(metrics.work_minutes, 20);
        assert_eq!(metrics.bucketed_minutes(), metrics.total_minutes);
    }

    #[test]
    fn test_reduced_backfill_skips_accounted_education() {
        let entries = timeline(&[
            event(8, 0, TagCode::T2),
            event(8, 10, TagCode::G1),
            event(9, 0, TagCode::G4),
            event(10, 0, TagCode::G1),
            event(12, 0, TagCode::M1),
            event(13, 0, TagCode::G1),
            event(17, 0, TagCode::T3),
        ]);
        let metrics = MetricsAggregator::reduced().calculate_metrics(11, date(), &entries);
        // G1 50 + G4 60 + G1 120 + G1 240, all explicit
        assert_eq!(metrics.work_minutes, 470);
        assert_eq!(metrics.meeting_minutes, 0);
        assert_eq!(metrics.meal_minutes, 30);
        assert_eq!(
            metrics,
            DayMetrics {
                regime: DataRegime::Reduced,
                reliability_score: metrics.reliability_score,
                ..MetricsAggregator::full().calculate_metrics(11, date(), &entries)
            }
        );
    }

    #[test]
    fn test_reduced_backfill_only_counts_unaccounted_tags() {
        // the first meeting tag is explicit; the second shares its instant
        // with the exit and accounts nothing
        let entries = timeline(&[
            event(8, 0, TagCode::T2),
            event(8, 0, TagCode::G3),
            event(9, 0, TagCode::M1),
            event(10, 0, TagCode::G3),
            event(10, 0, TagCode::T3),
        ]);
        let metrics = MetricsAggregator::reduced().calculate_metrics(11, date(), &entries);
        assert_eq!(metrics.total_minutes, 120);
        assert_eq!(metrics.meal_minutes, 30);
        // 60 explicit plus the second tag's 60, capped at the 30 unclaimed
        assert_eq!(metrics.meeting_minutes, 90);
        assert_eq!(metrics.work_minutes, 90);
        assert_eq!(metrics.bucketed_minutes(), metrics.total_minutes);
    }

    #[test]
    fn test_gap_threshold_differs_by_regime() {
        // single 150 minute gap between 09:00 and 11:30
        let entries = timeline(&[
            event(8, 0, TagCode::G1),
            event(8, 30, TagCode::O),
            event(9, 0, TagCode::O),
            event(11, 30, TagCode::G1),
            event(12, 0, TagCode::O),
        ]);
        let full = MetricsAggregator::full().calculate_metrics(11, date(), &entries);
        let reduced = MetricsAggregator::reduced().calculate_metrics(11, date(), &entries);
        // 5 events over 4h: 1.25/h. Coverage 60% hits both caps.
        // full: 50 + 30 + 10 - 10
        assert_eq!(full.reliability_score, 80);
        // reduced: 40 + 25 + 8, no penalty below 3h
        assert_eq!(reduced.reliability_score, 73);

        let entries = timeline(&[
            event(8, 0, TagCode::G1),
            event(8, 30, TagCode::O),
            event(9, 0, TagCode::O),
            event(12, 10, TagCode::O),
            event(12, 20, TagCode::G1),
        ]);
        let reduced = MetricsAggregator::reduced().calculate_metrics(11, date(), &entries);
        // 190 minute gap: 40 + 25 + 8 - 8
        assert_eq!(reduced.reliability_score, 65);
    }

    #[test]
    fn test_reduced_density_tiers() {
        let score = |minutes: &[u32]| {
            let events: Vec<PresenceEvent> = minutes
                .iter()
                .map(|m| event(9 + m / 60, m % 60, TagCode::G1))
                .collect();
            MetricsAggregator::reduced()
                .calculate_metrics(11, date(), &timeline(&events))
                .reliability_score
        };
        // all spans are 2h; base 40, no coverage, no penalties
        assert_eq!(score(&[0, 20, 40, 60, 80, 100, 120]), 55);
        assert_eq!(score(&[0, 30, 60, 90, 120]), 51);
        assert_eq!(score(&[0, 60, 120]), 48);
        assert_eq!(score(&[0, 120]), 44);
    }

    #[test]
    fn test_reduced_reliability_bonus() {
        let entries = timeline(&[
            event(8, 0, TagCode::T2),
            event(9, 0, TagCode::G3),
            event(10, 0, TagCode::G4),
            event(11, 0, TagCode::T3),
        ]);
        let full = MetricsAggregator::full().calculate_metrics(11, date(), &entries);
        let reduced = MetricsAggregator::reduced().calculate_metrics(11, date(), &entries);
        // 4 events over 3h: 1.33/h
        assert_eq!(full.reliability_score, 60);
        assert_eq!(reduced.reliability_score, 58);
    }

    #[test]
    fn test_reduced_focus_threshold_is_relaxed() {
        let entries = timeline(&[
            event(9, 0, TagCode::G1),
            event(9, 10, TagCode::O),
            event(9, 50, TagCode::G1),
            event(10, 30, TagCode::N1),
        ]);
        let full = MetricsAggregator::full().calculate_metrics(11, date(), &entries);
        let reduced = MetricsAggregator::reduced().calculate_metrics(11, date(), &entries);
        assert_eq!(full.focus_minutes, 0);
        assert_eq!(reduced.focus_minutes, 90);
    }

    #[test]
    fn test_ground_rules_extension() {
        let engine = GroundRulesEngine::new(
            &[TeamStatistics {
                team: "Finance팀".to_string(),
                schedule_type: "고정근무제".to_string(),
                total_events: 1_000,
                transit_events: 40,
                equipment_events: 10,
                team_size: 20,
                morning_transit_rate: 0.0,
                lunch_transit_rate: 0.0,
                evening_transit_rate: 0.0,
            }],
            500,
        );
        let entries = timeline(&[
            event(8, 0, TagCode::T1),
            event(9, 0, TagCode::O),
            event(10, 0, TagCode::T1),
            event(10, 10, TagCode::O),
            event(11, 0, TagCode::T1),
            event(11, 20, TagCode::N1),
            event(17, 0, TagCode::T1),
        ]);
        let scope = TeamScope {
            employee_id: 11,
            date: date(),
            team: "Finance팀",
            schedule_type: "고정근무제",
        };

        let (metrics, audit) = MetricsAggregator::full().calculate_with_ground_rules(&entries, &engine, &scope);
        let gr = metrics.ground_rules.unwrap();

        // the first and last corridor tags are clock-in and clock-out
        assert_eq!(audit.len(), 2);
        // O-T1-O at 10h: 0.35 * 2.5 * 1.0
        assert!((audit[0].result.final_confidence - 0.875).abs() < 1e-9);
        assert!(audit[0].work_movement);
        // O-T1-N1 at 11h: 0.35 * 2.2
        assert!((audit[1].result.final_confidence - 0.77).abs() < 1e-9);

        assert_eq!(gr.work_movement_minutes, 30);
        assert_eq!(gr.non_work_movement_minutes, 0);
        assert_eq!(gr.ground_rules_work_minutes, 30);
        assert_eq!(gr.team_baseline_used, 35);
        assert_eq!(gr.ground_rules_confidence, 82);
        assert_eq!(gr.anomaly_score, 0);
        assert_eq!(gr.classified_ambiguous_work_minutes, 10);
    }

    #[test]
    fn test_compare_with_claim() {
        let under = compare_with_claim(420, 8.0);
        assert_eq!(under.status, ClaimStatus::Under);
        assert_eq!(under.percentage, -13);

        let matched = compare_with_claim(470, 8.0);
        assert_eq!(matched.status, ClaimStatus::Match);

        let unclaimed = compare_with_claim(60, 0.0);
        assert_eq!(unclaimed.percentage, 0);
        assert_eq!(unclaimed.status, ClaimStatus::Over);
    }

    #[test]
    fn test_compare_with_ground_rules_improvement() {
        let mut metrics = DayMetrics::empty(1, date(), DataRegime::Full);
        metrics.work_minutes = 420;
        metrics.ground_rules = Some(GroundRulesMetrics {
            work_movement_minutes: 40,
            classified_ambiguous_work_minutes: 10,
            ..Default::default()
        });

        let comparison = compare_with_ground_rules(&metrics, 8.0);
        assert_eq!(comparison.traditional.percentage, -13);
        assert_eq!(comparison.ground_rules.percentage, -6);
        assert_eq!(comparison.improvement, 54);
    }

    #[test]
    fn test_anomaly_report_levels() {
        let report = AnomalyReport::from_metrics(&GroundRulesMetrics::default());
        assert_eq!(report.level, AnomalyLevel::None);
        assert!(!report.has_anomalies);
        assert!(report.recommendations.is_empty());

        let report = AnomalyReport::from_metrics(&GroundRulesMetrics {
            anomaly_score: 35,
            ground_rules_confidence: 40,
            work_movement_minutes: 10,
            ..Default::default()
        });
        assert_eq!(report.level, AnomalyLevel::Medium);
        assert_eq!(report.recommendations.len(), 3);

        let report = AnomalyReport::from_metrics(&GroundRulesMetrics {
            anomaly_score: 80,
            ground_rules_confidence: 90,
            ..Default::default()
        });
        assert_eq!(report.level, AnomalyLevel::High);
        assert_eq!(report.recommendations.len(), 3);
    }
}
