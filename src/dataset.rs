//! In-memory cohort dataset
//!
//! Everything a batch needs is loaded once, before any worker starts:
//! employee metadata, raw day events, team statistics for the Ground Rules
//! engine and claimed hours. The batch only ever reads from it.

use crate::classifier::JobGroupClassifier;
use crate::error::ComputeError;
use crate::ground_rules::TeamStatistics;
use crate::normalizer::RawDayEvent;
use crate::types::{EmployeeId, JobGroup};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Employee metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub employee_id: EmployeeId,
    pub name: String,
    #[serde(default)]
    pub center: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub group: String,
    /// Work schedule type, e.g. 선택근무제
    #[serde(default)]
    pub schedule_type: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub shift_type: String,
}

impl EmployeeRecord {
    pub fn org_info(&self) -> OrgInfo {
        OrgInfo {
            center: self.center.clone(),
            team: self.team.clone(),
            group: self.group.clone(),
        }
    }

    /// Department falls back to the group name when absent
    pub fn job_group(&self, fallback: JobGroup) -> JobGroup {
        let department = if self.department.is_empty() {
            &self.group
        } else {
            &self.department
        };
        if department.is_empty() && self.position.is_empty() && self.shift_type.is_empty() {
            return fallback;
        }
        JobGroupClassifier::classify(department, &self.position, &self.shift_type)
    }
}

/// Organizational placement carried on every result, including failed ones
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgInfo {
    pub center: String,
    pub team: String,
    pub group: String,
}

/// Claimed (reported) hours for one employee-day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub claimed_hours: f64,
}

/// Raw event row as stored in a dataset file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub employee_id: EmployeeId,
    #[serde(flatten)]
    pub event: RawDayEvent,
}

/// On-disk dataset layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetFile {
    pub employees: Vec<EmployeeRecord>,
    pub events: Vec<EventRow>,
    pub team_statistics: Vec<TeamStatistics>,
    pub claims: Vec<ClaimRecord>,
}

/// Read-only dataset shared by all batch workers
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    employees: HashMap<EmployeeId, EmployeeRecord>,
    events: HashMap<EmployeeId, BTreeMap<NaiveDate, Vec<RawDayEvent>>>,
    team_statistics: Vec<TeamStatistics>,
    claims: HashMap<EmployeeId, BTreeMap<NaiveDate, f64>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let file: DatasetFile = serde_json::from_str(json)?;
        Self::from_file_contents(file)
    }

    /// Build from a parsed file. Duplicate employees and invalid claims are
    /// malformed input.
    pub fn from_file_contents(file: DatasetFile) -> Result<Self, ComputeError> {
        let mut dataset = Self::new();

        for employee in file.employees {
            let id = employee.employee_id;
            if dataset.employees.insert(id, employee).is_some() {
                return Err(ComputeError::ParseError(format!(
                    "duplicate employee record {id}"
                )));
            }
        }
        for row in file.events {
            dataset.insert_event(row.employee_id, row.event);
        }
        for claim in file.claims {
            if !claim.claimed_hours.is_finite() || claim.claimed_hours < 0.0 {
                return Err(ComputeError::ParseError(format!(
                    "invalid claimed hours {} for employee {} on {}",
                    claim.claimed_hours, claim.employee_id, claim.date
                )));
            }
            dataset.insert_claim(claim.employee_id, claim.date, claim.claimed_hours);
        }
        dataset.team_statistics = file.team_statistics;

        Ok(dataset)
    }

    pub fn insert_employee(&mut self, employee: EmployeeRecord) {
        self.employees.insert(employee.employee_id, employee);
    }

    /// Events are filed under the calendar date of their timestamp
    pub fn insert_event(&mut self, employee_id: EmployeeId, event: RawDayEvent) {
        self.events
            .entry(employee_id)
            .or_default()
            .entry(event.timestamp.date())
            .or_default()
            .push(event);
    }

    pub fn insert_claim(&mut self, employee_id: EmployeeId, date: NaiveDate, claimed_hours: f64) {
        self.claims
            .entry(employee_id)
            .or_default()
            .insert(date, claimed_hours);
    }

    pub fn with_team_statistics(mut self, statistics: Vec<TeamStatistics>) -> Self {
        self.team_statistics = statistics;
        self
    }

    pub fn employee(&self, employee_id: EmployeeId) -> Option<&EmployeeRecord> {
        self.employees.get(&employee_id)
    }

    pub fn day_events(&self, employee_id: EmployeeId, date: NaiveDate) -> Option<&[RawDayEvent]> {
        self.events
            .get(&employee_id)
            .and_then(|days| days.get(&date))
            .map(Vec::as_slice)
    }

    pub fn claimed_hours(&self, employee_id: EmployeeId, date: NaiveDate) -> Option<f64> {
        self.claims
            .get(&employee_id)
            .and_then(|days| days.get(&date))
            .copied()
    }

    pub fn team_statistics(&self) -> &[TeamStatistics] {
        &self.team_statistics
    }

    /// Sorted ids of every employee with metadata
    pub fn employee_ids(&self) -> Vec<EmployeeId> {
        let mut ids: Vec<EmployeeId> = self.employees.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Every date that has at least one event, ascending
    pub fn event_dates(&self) -> Vec<NaiveDate> {
        self.events
            .values()
            .flat_map(|days| days.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn employee_count(&self) -> usize {
        self.employees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;
    use pretty_assertions::assert_eq;

    const DATASET: &str = r#"{
        "employees": [
            {"employee_id": 1, "name": "Kim", "team": "Plant 1팀", "schedule_type": "탄력근무제",
             "department": "생산1팀"},
            {"employee_id": 2, "name": "Lee", "team": "Finance팀"}
        ],
        "events": [
            {"employee_id": 1, "timestamp": "2024-03-04T08:00:00", "location": "정문입"},
            {"employee_id": 1, "timestamp": "2024-03-04T09:00:00", "location": "MES", "source": "equipment"},
            {"employee_id": 1, "timestamp": "2024-03-05T08:00:00", "tag_code": "T2"}
        ],
        "claims": [
            {"employee_id": 1, "date": "2024-03-04", "claimed_hours": 8.0}
        ]
    }"#;

    #[test]
    fn test_load_dataset() {
        let dataset = Dataset::from_json(DATASET).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        assert_eq!(dataset.employee_ids(), vec![1, 2]);
        let events = dataset.day_events(1, date).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].source, SourceKind::Equipment);
        assert_eq!(dataset.claimed_hours(1, date), Some(8.0));
        assert_eq!(dataset.claimed_hours(2, date), None);
        assert_eq!(dataset.event_dates().len(), 2);
        assert!(dataset.day_events(2, date).is_none());
    }

    #[test]
    fn test_duplicate_employee_is_malformed() {
        let json = r#"{"employees": [
            {"employee_id": 1, "name": "A"},
            {"employee_id": 1, "name": "B"}
        ]}"#;
        assert!(matches!(
            Dataset::from_json(json),
            Err(ComputeError::ParseError(_))
        ));
    }

    #[test]
    fn test_bad_timestamp_is_json_error() {
        let json = r#"{"events": [{"employee_id": 1, "timestamp": "yesterday"}]}"#;
        assert!(matches!(Dataset::from_json(json), Err(ComputeError::JsonError(_))));
    }

    #[test]
    fn test_job_group_from_metadata() {
        let dataset = Dataset::from_json(DATASET).unwrap();
        let kim = dataset.employee(1).unwrap();
        assert_eq!(kim.job_group(JobGroup::Office), JobGroup::Production);
        let lee = dataset.employee(2).unwrap();
        assert_eq!(lee.job_group(JobGroup::Research), JobGroup::Research);
        assert_eq!(kim.org_info().team, "Plant 1팀");
    }
}
