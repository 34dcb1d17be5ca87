//! Workflux - Work-hour inference engine for badge and presence data
//!
//! Workflux turns per-employee presence events (badge taps, meal logs,
//! calendar entries, equipment logins) into daily work-time metrics through a
//! deterministic pipeline: normalization → tag classification → metrics
//! aggregation → Ground Rules confidence scoring → claim comparison.
//!
//! ## Modules
//!
//! - **Classifier**: Per-event activity state machine with job-group aware
//!   transit handling
//! - **Ground Rules**: Team movement profiles learned from history, used to
//!   score ambiguous corridor tags
//! - **Aggregator**: Full and reduced-data metrics, claim comparison
//! - **Pipeline**: Parallel batch processing over a loaded dataset

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod ground_rules;
pub mod normalizer;
pub mod pipeline;
pub mod report;
pub mod types;

pub use aggregator::{AnomalyReport, ClaimComparison, MetricsAggregator};
pub use classifier::ActivityStateMachine;
pub use config::{EngineConfig, RegimeSelection};
pub use dataset::Dataset;
pub use error::{ComputeError, TaskError};
pub use ground_rules::GroundRulesEngine;
pub use normalizer::EventNormalizer;
pub use pipeline::{date_range, BatchProcessor, EmployeeDayResult};
pub use report::{BatchReport, ReportEncoder};

// Type exports
pub use types::{
    ActivityState, DataRegime, DayMetrics, EmployeeId, JobGroup, PresenceEvent, TagCode,
    TimelineEntry,
};

/// Workflux version embedded in all reports
pub const WORKFLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "workflux";
