//! Batch report encoding
//!
//! Wraps batch results with producer metadata and a task summary, and writes
//! them as a single JSON document or as NDJSON (one result per line).

use crate::error::ComputeError;
use crate::pipeline::EmployeeDayResult;
use crate::{PRODUCER_NAME, WORKFLUX_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which engine produced a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[EmployeeDayResult]) -> Self {
        let failed = results.iter().filter(|r| !r.is_ok()).count();
        Self {
            tasks: results.len(),
            succeeded: results.len() - failed,
            failed,
        }
    }
}

/// Full batch output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub summary: BatchSummary,
    pub results: Vec<EmployeeDayResult>,
}

/// Report encoder with a stable per-process instance id
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn producer(&self) -> ReportProducer {
        ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: WORKFLUX_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        }
    }

    pub fn build(&self, results: Vec<EmployeeDayResult>) -> BatchReport {
        BatchReport {
            producer: self.producer(),
            computed_at_utc: Utc::now().to_rfc3339(),
            summary: BatchSummary::from_results(&results),
            results,
        }
    }

    pub fn encode(&self, results: Vec<EmployeeDayResult>) -> Result<String, ComputeError> {
        serde_json::to_string(&self.build(results)).map_err(ComputeError::JsonError)
    }

    pub fn encode_pretty(&self, results: Vec<EmployeeDayResult>) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(&self.build(results)).map_err(ComputeError::JsonError)
    }

    /// One compact result object per line, no envelope
    pub fn encode_ndjson(&self, results: &[EmployeeDayResult]) -> Result<String, ComputeError> {
        let mut out = String::new();
        for result in results {
            out.push_str(&serde_json::to_string(result)?);
            out.push('\n');
        }
        Ok(out)
    }
}
