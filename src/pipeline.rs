//! Pipeline orchestration
//!
//! This module provides the batch API for workflux. Each employee-day runs
//! through the full pipeline:
//! 1. EventNormalizer - resolve tags, order, de-duplicate, night-shift window
//! 2. ActivityStateMachine - classify every event into a timeline entry
//! 3. MetricsAggregator - reduce the timeline, score ambiguous transits
//! 4. Claim comparison and anomaly report
//!
//! Batches fan out over a bounded rayon pool and join on completion. All
//! shared state (dataset, Ground Rules profiles, transition table) is built
//! before the first task starts and only read afterwards.

use crate::aggregator::{
    compare_with_ground_rules, AnomalyReport, ClaimComparison, MetricsAggregator, ScoredTransit,
    TeamScope,
};
use crate::classifier::ActivityStateMachine;
use crate::config::EngineConfig;
use crate::dataset::{Dataset, OrgInfo};
use crate::error::{ComputeError, TaskError};
use crate::ground_rules::GroundRulesEngine;
use crate::normalizer::EventNormalizer;
use crate::types::{
    ActivityState, DataRegime, DayMetrics, EmployeeId, TagCode, TimelineEntry,
};
use chrono::{NaiveDate, Timelike};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Name reported for employees missing from the dataset
pub const UNKNOWN_EMPLOYEE_NAME: &str = "Unknown";

/// Upper bound of the legacy movement nudge, as a fraction of work time
pub const MOVEMENT_ADJUSTMENT_BOUND: f64 = 0.05;

/// Outcome of one employee-day task. Failed tasks keep their metadata and
/// carry an all-zero metrics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeDayResult {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub org: OrgInfo,
    pub metrics: DayMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ClaimComparison>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_report: Option<AnomalyReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confidence_audit: Vec<ScoredTransit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_adjustment: Option<MovementAdjustment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl EmployeeDayResult {
    fn failed(
        employee_id: EmployeeId,
        employee_name: String,
        date: NaiveDate,
        org: OrgInfo,
        error: TaskError,
    ) -> Self {
        Self {
            employee_id,
            employee_name,
            date,
            org,
            metrics: DayMetrics::empty(employee_id, date, DataRegime::Reduced),
            claimed_hours: None,
            comparison: None,
            anomaly_report: None,
            confidence_audit: Vec::new(),
            movement_adjustment: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Legacy movement-score nudge. Reported next to the metrics, never folded
/// into them; the Ground Rules figures are the canonical adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementAdjustment {
    /// In [-1, 1]
    pub score: f64,
    /// In [0.95, 1.05]
    pub factor: f64,
    pub adjusted_work_minutes: i64,
}

impl MovementAdjustment {
    /// Corridor tags between two work signals count for the score; those
    /// in commute (06-08, 17-19) or lunch (12-13) hours count against it.
    pub fn from_timeline(timeline: &[TimelineEntry], work_minutes: i64) -> Self {
        let is_work_signal = |i: Option<usize>| {
            i.and_then(|i| timeline.get(i))
                .is_some_and(|e| matches!(e.tag_code, TagCode::O | TagCode::G1))
        };

        let mut corridor = 0usize;
        let mut office_to_office = 0usize;
        let mut commute = 0usize;
        let mut lunch = 0usize;

        for (i, entry) in timeline.iter().enumerate() {
            if !entry.tag_code.is_ambiguous_transit()
                || matches!(entry.state, ActivityState::Entry | ActivityState::Exit)
            {
                continue;
            }
            corridor += 1;
            if is_work_signal(i.checked_sub(1)) && is_work_signal(Some(i + 1)) {
                office_to_office += 1;
            }
            match entry.timestamp.hour() {
                6..=8 | 17..=19 => commute += 1,
                12..=13 => lunch += 1,
                _ => {}
            }
        }

        let score = if corridor == 0 {
            0.0
        } else {
            ((office_to_office as f64 - commute as f64 - lunch as f64) / corridor as f64)
                .clamp(-1.0, 1.0)
        };
        let factor = 1.0 + MOVEMENT_ADJUSTMENT_BOUND * score;

        Self {
            score,
            factor,
            adjusted_work_minutes: (work_minutes as f64 * factor).round() as i64,
        }
    }
}

/// Every date from `from` to `to`, inclusive; empty when `to < from`
pub fn date_range(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().take_while(|d| *d <= to).collect()
}

/// Runs the per-day pipeline over a loaded dataset
pub struct BatchProcessor<'a> {
    dataset: &'a Dataset,
    config: EngineConfig,
    state_machine: ActivityStateMachine,
    engine: GroundRulesEngine,
}

impl<'a> BatchProcessor<'a> {
    /// Learns Ground Rules profiles from the dataset's team statistics
    pub fn new(dataset: &'a Dataset, config: EngineConfig) -> Result<Self, ComputeError> {
        let engine = GroundRulesEngine::new(dataset.team_statistics(), config.min_team_sample_size);
        Self::with_engine(dataset, config, engine)
    }

    pub fn with_engine(
        dataset: &'a Dataset,
        config: EngineConfig,
        engine: GroundRulesEngine,
    ) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            dataset,
            config,
            state_machine: ActivityStateMachine::new(),
            engine,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engine(&self) -> &GroundRulesEngine {
        &self.engine
    }

    /// Run the pipeline for one employee-day. Missing employees and empty
    /// days produce an error-tagged result instead of an `Err`.
    pub fn calculate_employee_day(&self, employee_id: EmployeeId, date: NaiveDate) -> EmployeeDayResult {
        let Some(employee) = self.dataset.employee(employee_id) else {
            warn!(employee_id, %date, "Employee not found in dataset");
            return EmployeeDayResult::failed(
                employee_id,
                UNKNOWN_EMPLOYEE_NAME.to_string(),
                date,
                OrgInfo::default(),
                TaskError::EmployeeNotFound,
            );
        };

        let raw = self.dataset.day_events(employee_id, date).unwrap_or_default();
        let previous = date
            .pred_opt()
            .and_then(|d| self.dataset.day_events(employee_id, d));
        let events = if raw.is_empty() {
            Vec::new()
        } else {
            EventNormalizer::normalize_day(employee_id, date, raw, previous)
        };

        if events.is_empty() {
            debug!(employee_id, %date, "No events for date");
            return EmployeeDayResult::failed(
                employee_id,
                employee.name.clone(),
                date,
                employee.org_info(),
                TaskError::NoEvents,
            );
        }

        let regime = self.config.regime.resolve(date, &events);
        let job_group = employee.job_group(self.config.default_job_group);
        let timeline = self.state_machine.classify_day(&events, job_group);

        let scope = TeamScope {
            employee_id,
            date,
            team: &employee.team,
            schedule_type: &employee.schedule_type,
        };
        let (metrics, confidence_audit) =
            MetricsAggregator::new(regime).calculate_with_ground_rules(&timeline, &self.engine, &scope);

        let claimed_hours = self.dataset.claimed_hours(employee_id, date);
        let comparison = claimed_hours.map(|claimed| compare_with_ground_rules(&metrics, claimed));
        let anomaly_report = metrics.ground_rules.as_ref().map(AnomalyReport::from_metrics);
        let movement_adjustment = self
            .config
            .legacy_movement_adjustment
            .then(|| MovementAdjustment::from_timeline(&timeline, metrics.work_minutes));

        debug!(
            employee_id,
            %date,
            ?regime,
            ?job_group,
            events = events.len(),
            work_minutes = metrics.work_minutes,
            "Computed employee day"
        );

        EmployeeDayResult {
            employee_id,
            employee_name: employee.name.clone(),
            date,
            org: employee.org_info(),
            metrics,
            claimed_hours,
            comparison,
            anomaly_report,
            confidence_audit,
            movement_adjustment,
            error: None,
        }
    }

    /// Run every employee × date task on the worker pool. Results come back
    /// in task order (employee-major); per-task failures are embedded.
    pub fn calculate_batch(
        &self,
        employee_ids: &[EmployeeId],
        dates: &[NaiveDate],
    ) -> Result<Vec<EmployeeDayResult>, ComputeError> {
        let tasks: Vec<(EmployeeId, NaiveDate)> = employee_ids
            .iter()
            .flat_map(|&id| dates.iter().map(move |&date| (id, date)))
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .thread_name(|i| format!("workflux-worker-{i}"))
            .build()
            .map_err(|e| ComputeError::WorkerPool(e.to_string()))?;

        info!(
            tasks = tasks.len(),
            employees = employee_ids.len(),
            dates = dates.len(),
            workers = self.config.max_workers,
            "Starting batch"
        );
        let started = Instant::now();

        let results: Vec<EmployeeDayResult> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(id, date)| self.calculate_employee_day(id, date))
                .collect()
        });

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        info!(
            tasks = results.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch complete"
        );

        Ok(results)
    }

    /// Every employee in the dataset over an inclusive date range
    pub fn calculate_all(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<EmployeeDayResult>, ComputeError> {
        self.calculate_batch(&self.dataset.employee_ids(), &date_range(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::EmployeeRecord;
    use crate::normalizer::RawDayEvent;
    use crate::types::SourceKind;
    use pretty_assertions::assert_eq;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn raw(day: u32, hour: u32, minute: u32, tag_code: &str, source: SourceKind) -> RawDayEvent {
        RawDayEvent {
            timestamp: date(day).and_hms_opt(hour, minute, 0).unwrap(),
            tag_code: Some(tag_code.to_string()),
            location: String::new(),
            source,
            duration_minutes: None,
        }
    }

    fn dataset() -> Dataset {
        let mut dataset = Dataset::new();
        dataset.insert_employee(EmployeeRecord {
            employee_id: 7,
            name: "Park".to_string(),
            center: "Operations".to_string(),
            team: "Plant 2팀".to_string(),
            group: "Line B".to_string(),
            schedule_type: "탄력근무제".to_string(),
            department: "생산2팀".to_string(),
            position: String::new(),
            shift_type: String::new(),
        });
        for (hour, minute, code, source) in [
            (8, 0, "T2", SourceKind::Tag),
            (8, 10, "G1", SourceKind::Tag),
            (9, 0, "O", SourceKind::Equipment),
            (10, 0, "T1", SourceKind::Tag),
            (10, 5, "O", SourceKind::Equipment),
            (12, 0, "M1", SourceKind::Meal),
            (12, 40, "G1", SourceKind::Tag),
            (17, 0, "T3", SourceKind::Tag),
        ] {
            dataset.insert_event(7, raw(4, hour, minute, code, source));
        }
        dataset.insert_claim(7, date(4), 8.0);
        dataset
    }

    #[test]
    fn test_employee_day_success() {
        let dataset = dataset();
        let processor = BatchProcessor::new(&dataset, EngineConfig::default().with_max_workers(2)).unwrap();
        let result = processor.calculate_employee_day(7, date(4));

        assert!(result.is_ok());
        assert_eq!(result.employee_name, "Park");
        assert_eq!(result.org.team, "Plant 2팀");
        assert_eq!(result.metrics.regime, DataRegime::Full);
        assert_eq!(result.metrics.total_minutes, 540);
        assert!(result.metrics.bucketed_minutes() <= result.metrics.total_minutes);
        assert_eq!(result.confidence_audit.len(), 1);
        assert_eq!(result.claimed_hours, Some(8.0));
        assert!(result.comparison.is_some());
        assert!(result.anomaly_report.is_some());
        assert!(result.movement_adjustment.is_none());
    }

    #[test]
    fn test_unknown_employee_is_error_tagged() {
        let dataset = dataset();
        let processor = BatchProcessor::new(&dataset, EngineConfig::default()).unwrap();
        let result = processor.calculate_employee_day(999, date(4));
        assert_eq!(result.error, Some(TaskError::EmployeeNotFound));
        assert_eq!(result.employee_name, UNKNOWN_EMPLOYEE_NAME);
        assert_eq!(result.metrics.total_minutes, 0);
    }

    #[test]
    fn test_day_without_events_keeps_metadata() {
        let dataset = dataset();
        let processor = BatchProcessor::new(&dataset, EngineConfig::default()).unwrap();
        let result = processor.calculate_employee_day(7, date(5));
        assert_eq!(result.error, Some(TaskError::NoEvents));
        assert_eq!(result.org.group, "Line B");
        assert_eq!(result.employee_name, "Park");
    }

    #[test]
    fn test_batch_is_ordered_and_isolated() {
        let dataset = dataset();
        let processor = BatchProcessor::new(&dataset, EngineConfig::default().with_max_workers(3)).unwrap();
        let results = processor
            .calculate_batch(&[7, 999], &date_range(date(3), date(5)))
            .unwrap();

        assert_eq!(results.len(), 6);
        let order: Vec<(EmployeeId, NaiveDate)> = results.iter().map(|r| (r.employee_id, r.date)).collect();
        assert_eq!(
            order,
            vec![
                (7, date(3)),
                (7, date(4)),
                (7, date(5)),
                (999, date(3)),
                (999, date(4)),
                (999, date(5)),
            ]
        );
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[test]
    fn test_legacy_movement_adjustment_is_bounded() {
        let dataset = dataset();
        let config = EngineConfig::default().with_legacy_movement_adjustment(true);
        let processor = BatchProcessor::new(&dataset, config).unwrap();
        let result = processor.calculate_employee_day(7, date(4));
        let adjustment = result.movement_adjustment.unwrap();

        // one corridor tag, between O and O at 10h
        assert_eq!(adjustment.score, 1.0);
        assert!((adjustment.factor - 1.05).abs() < 1e-9);
        assert!(adjustment.adjusted_work_minutes >= result.metrics.work_minutes);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let dataset = dataset();
        let config = EngineConfig::default().with_max_workers(0);
        assert!(matches!(
            BatchProcessor::new(&dataset, config),
            Err(ComputeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_date_range() {
        assert_eq!(date_range(date(1), date(3)).len(), 3);
        assert!(date_range(date(3), date(1)).is_empty());
    }
}
