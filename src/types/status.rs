//! Result shapes handed to the HTTP collaborator.
//!
//! Every type here serializes with camelCase keys so the route layer can
//! return it verbatim.

use serde::Serialize;

use crate::protocol::GameConfig;

use super::{ConnectionStats, TelemetryRecord};

/// Outcome of submitting a configuration to the rig.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// True if the device acknowledged the configuration.
    pub success: bool,
    /// Human-readable outcome or failure reason.
    pub message: String,
    /// The configuration as submitted.
    pub echoed_input: GameConfig,
    /// Raw acknowledgment frame, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_acknowledgment: Option<String>,
    /// Whatever the device said before the timeout, present on partial failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_response: Option<String>,
    /// Number of send attempts made.
    pub attempts: u32,
}

/// Current link status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// True if the link passed the health probe.
    pub connected: bool,
    /// Port path, present while connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Baud rate, present while connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baud_rate: Option<u32>,
}

/// Outcome of an operator-triggered reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconnectResponse {
    /// True if the link reopened.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
}

/// State of the background tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorStatus {
    /// True while the watchdog loop runs.
    pub watchdog_active: bool,
    /// True while the telemetry listener runs.
    pub listener_active: bool,
    /// Watchdog counters.
    pub stats: ConnectionStats,
}

/// Whether telemetry is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataStatus {
    /// A record is stored.
    Ok,
    /// Nothing received since start or the last clear.
    NoData,
}

/// Latest telemetry query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryStatus {
    /// Whether `record` is present.
    pub status: DataStatus,
    /// The latest record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<TelemetryRecord>,
}

impl From<Option<TelemetryRecord>> for TelemetryStatus {
    fn from(record: Option<TelemetryRecord>) -> Self {
        let status = if record.is_some() {
            DataStatus::Ok
        } else {
            DataStatus::NoData
        };
        Self { status, record }
    }
}

/// Bare acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuccessResponse {
    /// Always true; the operation cannot fail.
    pub success: bool,
}
