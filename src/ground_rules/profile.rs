//! Learning phase: team statistics and team profiles
//!
//! Historical events are grouped by (team, schedule type) and reduced to
//! counts and hourly ambiguous-transit rates. Each group with enough samples
//! becomes a `TeamProfile`: a mobility level, a baseline confidence, an
//! hour-of-day weight table and the team's special rules.

use crate::ground_rules::rules::{rules_for_team, SpecialRule};
use crate::types::{EmployeeId, TagCode};
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Field-type team name keywords (mobility floor)
const FIELD_KEYWORDS: &[&str] = &[
    "plant", "제조", "생산", "qc", "qa", "품질", "안전", "환경", "시설", "maintenance",
    "operations",
];

/// Office-type team name keywords (mobility ceiling)
const OFFICE_KEYWORDS: &[&str] = &[
    "hr", "인사", "전략", "기획", "재무", "회계", "법무", "감사", "개발", "연구", "r&d", "dev",
    "lab", "strategy",
];

/// One historical event used for learning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEvent {
    pub employee_id: EmployeeId,
    pub team: String,
    pub schedule_type: String,
    pub timestamp: NaiveDateTime,
    pub tag_code: TagCode,
}

/// (team, schedule type) grouping key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamKey {
    pub team: String,
    pub schedule_type: String,
}

impl TeamKey {
    pub fn new(team: impl Into<String>, schedule_type: impl Into<String>) -> Self {
        Self {
            team: team.into(),
            schedule_type: schedule_type.into(),
        }
    }
}

/// Aggregate counts for one team and schedule type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStatistics {
    pub team: String,
    pub schedule_type: String,
    pub total_events: u64,
    pub transit_events: u64,
    pub equipment_events: u64,
    pub team_size: u32,
    /// Ambiguous-transit share of events between 06 and 08 (percent)
    pub morning_transit_rate: f64,
    /// Same, 12 to 13
    pub lunch_transit_rate: f64,
    /// Same, 17 to 19
    pub evening_transit_rate: f64,
}

impl TeamStatistics {
    pub fn key(&self) -> TeamKey {
        TeamKey::new(self.team.clone(), self.schedule_type.clone())
    }

    /// Ambiguous-transit to equipment ratio; 0 when there is no equipment usage
    pub fn transit_to_equipment_ratio(&self) -> f64 {
        if self.equipment_events == 0 {
            0.0
        } else {
            self.transit_events as f64 / self.equipment_events as f64
        }
    }

    pub fn transit_percentage(&self) -> f64 {
        if self.total_events == 0 {
            0.0
        } else {
            self.transit_events as f64 / self.total_events as f64 * 100.0
        }
    }

    /// Group historical events by team and schedule type. Events with an
    /// empty team or schedule type are skipped. Output is ordered by key.
    pub fn aggregate(events: &[HistoricalEvent]) -> Vec<TeamStatistics> {
        let mut groups: BTreeMap<TeamKey, GroupAccumulator> = BTreeMap::new();

        for event in events {
            if event.team.trim().is_empty() || event.schedule_type.trim().is_empty() {
                continue;
            }
            groups
                .entry(TeamKey::new(event.team.clone(), event.schedule_type.clone()))
                .or_default()
                .add(event);
        }

        groups
            .into_iter()
            .map(|(key, acc)| acc.finish(key))
            .collect()
    }
}

#[derive(Default)]
struct GroupAccumulator {
    total: u64,
    transit: u64,
    equipment: u64,
    employees: HashSet<EmployeeId>,
    // (ambiguous-transit events, all events) per hour window
    morning: (u64, u64),
    lunch: (u64, u64),
    evening: (u64, u64),
}

impl GroupAccumulator {
    fn add(&mut self, event: &HistoricalEvent) {
        let is_transit = event.tag_code == TagCode::T1;
        self.total += 1;
        self.transit += u64::from(is_transit);
        self.equipment += u64::from(event.tag_code == TagCode::O);
        self.employees.insert(event.employee_id);

        let window = match event.timestamp.hour() {
            6..=8 => Some(&mut self.morning),
            12..=13 => Some(&mut self.lunch),
            17..=19 => Some(&mut self.evening),
            _ => None,
        };
        if let Some((transit, all)) = window {
            *transit += u64::from(is_transit);
            *all += 1;
        }
    }

    fn finish(self, key: TeamKey) -> TeamStatistics {
        TeamStatistics {
            team: key.team,
            schedule_type: key.schedule_type,
            total_events: self.total,
            transit_events: self.transit,
            equipment_events: self.equipment,
            team_size: u32::try_from(self.employees.len()).unwrap_or(u32::MAX),
            morning_transit_rate: rate(self.morning),
            lunch_transit_rate: rate(self.lunch),
            evening_transit_rate: rate(self.evening),
        }
    }
}

fn rate((part, all): (u64, u64)) -> f64 {
    if all == 0 {
        0.0
    } else {
        part as f64 / all as f64 * 100.0
    }
}

/// Five-tier movement intensity of a team's normal work pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MobilityLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl MobilityLevel {
    /// Ratio thresholds, adjusted by team type: office teams are capped at
    /// High, field teams never drop below Medium.
    pub fn classify(ratio: f64, team_type: TeamType) -> Self {
        use MobilityLevel::*;

        if ratio >= 200.0 {
            return VeryHigh;
        }
        match team_type {
            TeamType::Office => match ratio {
                r if r >= 50.0 => High,
                r if r >= 10.0 => Medium,
                r if r >= 2.0 => Low,
                _ => VeryLow,
            },
            TeamType::Field => match ratio {
                r if r >= 50.0 => VeryHigh,
                r if r >= 5.0 => High,
                _ => Medium,
            },
            // the 5.0 band sits above 30.0 in the original calibration
            TeamType::Unknown => match ratio {
                r if r >= 100.0 => VeryHigh,
                r if r >= 50.0 => High,
                r if r >= 30.0 => Medium,
                r if r >= 5.0 => High,
                r if r >= 2.0 => Medium,
                r if r >= 0.5 => Low,
                _ => VeryLow,
            },
        }
    }

    pub fn base_confidence(&self) -> f64 {
        match self {
            MobilityLevel::VeryHigh => 0.65,
            MobilityLevel::High => 0.50,
            MobilityLevel::Medium => 0.35,
            MobilityLevel::Low => 0.25,
            MobilityLevel::VeryLow => 0.20,
        }
    }
}

/// Team type inferred from the team name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamType {
    Office,
    Field,
    Unknown,
}

impl TeamType {
    /// Field keywords are checked before office keywords
    pub fn from_team_name(team_name: &str) -> Self {
        let name = team_name.to_lowercase();
        if FIELD_KEYWORDS.iter().any(|k| name.contains(k)) {
            TeamType::Field
        } else if OFFICE_KEYWORDS.iter().any(|k| name.contains(k)) {
            TeamType::Office
        } else {
            TeamType::Unknown
        }
    }
}

/// Work schedule family, which selects the hour-of-day weight table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// 선택근무제
    Selective,
    /// 탄력근무제
    Flexible,
    /// Fixed hours and everything else
    Standard,
}

impl ScheduleKind {
    pub fn from_schedule_type(schedule_type: &str) -> Self {
        let s = schedule_type.to_lowercase();
        if s.contains("선택") || s.contains("selective") {
            ScheduleKind::Selective
        } else if s.contains("탄력") || s.contains("flexible") {
            ScheduleKind::Flexible
        } else {
            ScheduleKind::Standard
        }
    }

    pub fn time_weights(&self) -> TimeWeights {
        match self {
            ScheduleKind::Selective => TimeWeights {
                early_morning: 1.3,
                morning: 1.0,
                lunch: 1.7,
                afternoon: 1.0,
                evening: 1.4,
                night: 1.1,
            },
            ScheduleKind::Flexible => TimeWeights {
                early_morning: 1.4,
                morning: 0.8,
                lunch: 1.6,
                afternoon: 0.9,
                evening: 1.3,
                night: 1.2,
            },
            ScheduleKind::Standard => TimeWeights {
                early_morning: 1.2,
                morning: 1.0,
                lunch: 1.5,
                afternoon: 1.0,
                evening: 1.3,
                night: 1.0,
            },
        }
    }
}

/// Six hour-of-day buckets; hours outside them weigh 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWeights {
    /// 06-08
    pub early_morning: f64,
    /// 09-11
    pub morning: f64,
    /// 12-13
    pub lunch: f64,
    /// 14-16
    pub afternoon: f64,
    /// 17-19
    pub evening: f64,
    /// 20-22
    pub night: f64,
}

impl TimeWeights {
    pub fn weight_for_hour(&self, hour: u32) -> f64 {
        match hour {
            6..=8 => self.early_morning,
            9..=11 => self.morning,
            12..=13 => self.lunch,
            14..=16 => self.afternoon,
            17..=19 => self.evening,
            20..=22 => self.night,
            _ => 1.0,
        }
    }
}

/// Learned, read-only profile for one team and schedule type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProfile {
    pub key: TeamKey,
    pub team_type: TeamType,
    pub mobility_level: MobilityLevel,
    /// In [0.15, 0.70]
    pub baseline_confidence: f64,
    pub time_weights: TimeWeights,
    pub special_rules: Vec<SpecialRule>,
    pub statistics: TeamStatistics,
}

impl TeamProfile {
    pub const MIN_BASELINE: f64 = 0.15;
    pub const MAX_BASELINE: f64 = 0.70;

    pub fn learn(stats: &TeamStatistics) -> Self {
        let team_type = TeamType::from_team_name(&stats.team);
        let mobility_level = MobilityLevel::classify(stats.transit_to_equipment_ratio(), team_type);

        Self {
            key: stats.key(),
            team_type,
            mobility_level,
            baseline_confidence: baseline_confidence(mobility_level, stats.team_size),
            time_weights: ScheduleKind::from_schedule_type(&stats.schedule_type).time_weights(),
            special_rules: rules_for_team(&stats.team),
            statistics: stats.clone(),
        }
    }
}

/// Mobility lookup with a ±5% team-size nudge
pub fn baseline_confidence(level: MobilityLevel, team_size: u32) -> f64 {
    let mut confidence = level.base_confidence();
    if team_size < 5 {
        confidence *= 0.95;
    } else if team_size > 50 {
        confidence *= 1.05;
    }
    confidence.clamp(TeamProfile::MIN_BASELINE, TeamProfile::MAX_BASELINE)
}
