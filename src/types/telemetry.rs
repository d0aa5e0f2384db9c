//! End-of-game telemetry reported by the rig.

use serde::{Deserialize, Serialize};

use super::unix_timestamp;

/// Outcome of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    /// The player reached the goal.
    Victory,
    /// Anything else the device reports.
    Defeat,
}

impl GameResult {
    /// Normalizes a device or client result label.
    ///
    /// `"win"` and `"victory"` (any case) map to [`GameResult::Victory`];
    /// every other label is a defeat.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("win") || label.eq_ignore_ascii_case("victory") {
            Self::Victory
        } else {
            Self::Defeat
        }
    }
}

/// A single telemetry report. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    /// Obstacles the player avoided.
    pub obstacles_avoided: u32,
    /// Seconds the player survived.
    pub survival_time: u32,
    /// Game outcome.
    pub result: GameResult,
    /// Unix timestamp (seconds) when the record was created.
    pub observed_at: u64,
}

impl TelemetryRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(obstacles_avoided: u32, survival_time: u32, result: GameResult) -> Self {
        Self {
            obstacles_avoided,
            survival_time,
            result,
            observed_at: unix_timestamp(),
        }
    }
}

/// Telemetry posted directly by a client instead of read from the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySubmission {
    /// Obstacles avoided.
    pub obstacles: u32,
    /// Survival time in seconds.
    pub time: u32,
    /// One of `win`, `victory`, `lose`, `defeat`.
    pub result: String,
}

impl From<TelemetrySubmission> for TelemetryRecord {
    fn from(submission: TelemetrySubmission) -> Self {
        Self::new(
            submission.obstacles,
            submission.time,
            GameResult::from_label(&submission.result),
        )
    }
}
