//! Data types shared across the bridge.
//!
//! This module contains:
//! - Telemetry records reported by the rig
//! - Link state and connection statistics
//! - Result shapes returned to the HTTP collaborator

pub mod stats;
pub mod status;
pub mod telemetry;

pub use stats::{ConnectionStats, LinkState};
pub use status::{
    ConnectionStatus, DataStatus, ReconnectResponse, SubmitResponse, SuccessResponse,
    SupervisorStatus, TelemetryStatus,
};
pub use telemetry::{GameResult, TelemetryRecord, TelemetrySubmission};

/// Gets the current Unix timestamp in seconds.
pub(crate) fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
