//! Link state and supervision counters.

use serde::Serialize;

/// Lifecycle state of the physical link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// No handle is open.
    #[default]
    Disconnected,
    /// The port is open and settling.
    Connecting,
    /// The handle is open and ready.
    Connected,
}

/// Counters maintained by the watchdog for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    /// Unix timestamp of the last health check.
    pub last_health_check: Option<u64>,
    /// Healthy-to-unhealthy transitions observed.
    pub disconnections: u64,
    /// Reopen attempts made while unhealthy.
    pub reconnect_attempts: u64,
    /// Unix timestamp of the last successful reopen.
    pub last_reconnect: Option<u64>,
}
