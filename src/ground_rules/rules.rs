//! Static per-team special rules
//!
//! A rule is attached to a team when the team name contains one of its
//! keywords. During scoring, rules whose hour range contains the event hour
//! (inclusive on both ends) contribute their adjustment.

use serde::{Deserialize, Serialize};

/// What a matching rule does to the confidence score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
    BoostConfidence,
    ReduceConfidence,
    /// Marks the event anomalous without changing the score
    FlagAnomaly,
}

/// Hour-gated confidence adjustment for one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialRule {
    pub rule_id: String,
    pub start_hour: u32,
    pub end_hour: u32,
    pub action: RuleAction,
    /// Additive adjustment; negative for reductions
    pub adjustment: f64,
    pub reason: String,
}

impl SpecialRule {
    pub fn applies_at(&self, hour: u32) -> bool {
        (self.start_hour..=self.end_hour).contains(&hour)
    }

    /// Contribution to the raw score when this rule applies
    pub fn score_adjustment(&self) -> f64 {
        match self.action {
            RuleAction::BoostConfidence | RuleAction::ReduceConfidence => self.adjustment,
            RuleAction::FlagAnomaly => 0.0,
        }
    }
}

struct RuleTemplate {
    keywords: &'static [&'static str],
    rule_id: &'static str,
    start_hour: u32,
    end_hour: u32,
    adjustment: f64,
    reason: &'static str,
}

const RULE_TEMPLATES: &[RuleTemplate] = &[
    RuleTemplate {
        keywords: &["인프라", "infrastructure"],
        rule_id: "INFRASTRUCTURE_FACILITY",
        start_hour: 6,
        end_hour: 20,
        adjustment: 0.20,
        reason: "facility management moves across the site all day",
    },
    RuleTemplate {
        keywords: &["sales&operation", "sales & operation", "영업"],
        rule_id: "SALES_OPERATION",
        start_hour: 17,
        end_hour: 20,
        adjustment: 0.15,
        reason: "customer meetings and operations run into the evening",
    },
    RuleTemplate {
        keywords: &["hr strategy", "talent management", "인사전략"],
        rule_id: "HR_CONSULTING",
        start_hour: 8,
        end_hour: 18,
        adjustment: 0.10,
        reason: "HR consulting involves regular visits to other teams",
    },
    RuleTemplate {
        keywords: &["대외협력", "external cooperation", "external affairs"],
        rule_id: "EXTERNAL_COOPERATION",
        start_hour: 9,
        end_hour: 18,
        adjustment: 0.12,
        reason: "external cooperation work is movement heavy",
    },
    RuleTemplate {
        keywords: &["정보보호", "security"],
        rule_id: "SECURITY_PATROL",
        start_hour: 0,
        end_hour: 23,
        adjustment: 0.08,
        reason: "round-the-clock security inspection and patrol",
    },
];

/// Special rules whose keywords appear in `team_name`
pub fn rules_for_team(team_name: &str) -> Vec<SpecialRule> {
    let name = team_name.to_lowercase();
    RULE_TEMPLATES
        .iter()
        .filter(|t| t.keywords.iter().any(|k| name.contains(k)))
        .map(|t| SpecialRule {
            rule_id: t.rule_id.to_string(),
            start_hour: t.start_hour,
            end_hour: t.end_hour,
            action: RuleAction::BoostConfidence,
            adjustment: t.adjustment,
            reason: t.reason.to_string(),
        })
        .collect()
}
