//! Engine configuration
//!
//! Serializable settings for a batch run. Every field has a default, so a
//! partial JSON document is a valid configuration.

use crate::error::ComputeError;
use crate::ground_rules::GroundRulesEngine;
use crate::types::{DataRegime, JobGroup, PresenceEvent, SourceKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::thread;

/// How the aggregator mode is chosen for each day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RegimeSelection {
    /// Full when the day has any calendar or equipment-sourced event
    #[default]
    Auto,
    Full,
    Reduced,
    /// Full from `date` onwards, reduced before
    FullSince { date: NaiveDate },
}

impl RegimeSelection {
    pub fn resolve(&self, date: NaiveDate, events: &[PresenceEvent]) -> DataRegime {
        match self {
            RegimeSelection::Auto => {
                let enriched = events
                    .iter()
                    .any(|e| matches!(e.source, SourceKind::Calendar | SourceKind::Equipment));
                if enriched {
                    DataRegime::Full
                } else {
                    DataRegime::Reduced
                }
            }
            RegimeSelection::Full => DataRegime::Full,
            RegimeSelection::Reduced => DataRegime::Reduced,
            RegimeSelection::FullSince { date: since } => {
                if date >= *since {
                    DataRegime::Full
                } else {
                    DataRegime::Reduced
                }
            }
        }
    }
}

/// Settings for one engine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads in the batch pool
    pub max_workers: usize,
    pub regime: RegimeSelection,
    /// Attach the legacy ±5% movement-score figure to each result
    pub legacy_movement_adjustment: bool,
    /// Team groups need more historical events than this to be learned
    pub min_team_sample_size: u64,
    /// Job group for employees with no department, position or shift data
    pub default_job_group: JobGroup,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: default_workers(),
            regime: RegimeSelection::Auto,
            legacy_movement_adjustment: false,
            min_team_sample_size: GroundRulesEngine::DEFAULT_MIN_SAMPLE_SIZE,
            default_job_group: JobGroup::Office,
        }
    }
}

impl EngineConfig {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_regime(mut self, regime: RegimeSelection) -> Self {
        self.regime = regime;
        self
    }

    pub fn with_legacy_movement_adjustment(mut self, enabled: bool) -> Self {
        self.legacy_movement_adjustment = enabled;
        self
    }

    pub fn with_min_team_sample_size(mut self, min_team_sample_size: u64) -> Self {
        self.min_team_sample_size = min_team_sample_size;
        self
    }

    pub fn with_default_job_group(mut self, job_group: JobGroup) -> Self {
        self.default_job_group = job_group;
        self
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.max_workers == 0 {
            return Err(ComputeError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn default_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
