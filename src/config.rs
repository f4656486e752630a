//! Pipeline configuration.
//!
//! Every tuning constant the engine consumes is supplied here by the caller:
//! window capacity, dispatch cadence, classification timeout and the
//! per-exercise threshold table. The defaults carry the production values the
//! engine ships with; deployments override them through a TOML file.

use crate::core_modules::exercise::{ExerciseThresholds, ExerciseType};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

/// Frames per classification window. Matches the sequence classifier's
/// trained input length; changing it requires a retrained model.
pub const DEFAULT_WINDOW_CAPACITY: usize = 45;

/// Minimum spacing between classification dispatches. Keeps the feedback
/// cadence near 3 Hz regardless of camera frame rate.
pub const DEFAULT_DISPATCH_INTERVAL_MS: u64 = 300;

/// How long a classification call may run before it counts as failed.
pub const DEFAULT_CLASSIFICATION_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub window_capacity: usize,
    pub dispatch_interval_ms: u64,
    pub classification_timeout_ms: u64,
    /// Per-exercise tuning consumed by the generic state machine, keyed by
    /// the exercise's canonical name. A session cannot start for an exercise
    /// type missing from this table.
    pub thresholds: HashMap<String, ExerciseThresholds>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut thresholds = HashMap::new();
        thresholds.insert(
            ExerciseType::Squat.as_str().to_string(),
            ExerciseThresholds {
                upper_angle: 160.0,
                lower_angle: 100.0,
                asymmetry_tolerance: 20.0,
                visibility_floor: 0.7,
            },
        );
        thresholds.insert(
            ExerciseType::Pushup.as_str().to_string(),
            ExerciseThresholds {
                upper_angle: 160.0,
                lower_angle: 100.0,
                asymmetry_tolerance: 20.0,
                visibility_floor: 0.7,
            },
        );

        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            dispatch_interval_ms: DEFAULT_DISPATCH_INTERVAL_MS,
            classification_timeout_ms: DEFAULT_CLASSIFICATION_TIMEOUT_MS,
            thresholds,
        }
    }
}

impl PipelineConfig {
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    pub fn classification_timeout(&self) -> Duration {
        Duration::from_millis(self.classification_timeout_ms)
    }

    pub fn thresholds_for(&self, exercise: ExerciseType) -> Option<ExerciseThresholds> {
        self.thresholds.get(exercise.as_str()).copied()
    }

    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
