//! Tunables for the bridge.
//!
//! Every delay, retry count, and interval here was found empirically against
//! the rig's firmware. They are data, not constants, so they can be adjusted
//! per device without a rebuild.

use std::time::Duration;

use serde::Deserialize;

use crate::protocol::DEFAULT_BUFFER_CAPACITY;
use crate::transport::SerialConfig;

/// Time the device needs to boot after the port opens.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Acknowledgment wait per send attempt.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends attempted before a configuration submit gives up.
pub const DEFAULT_SEND_ATTEMPTS: u32 = 3;

/// Pause between telemetry listener cycles.
pub const DEFAULT_LISTENER_INTERVAL: Duration = Duration::from_millis(100);

/// Pause between watchdog health checks.
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);

/// A repeated buffer-clear: `passes` times, reset then wait `pause` then drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ClearRitual {
    /// Number of reset-wait-drain rounds.
    pub passes: u32,
    /// Wait between the reset and the drain of each round.
    #[serde(with = "duration_ms", rename = "pause_ms")]
    pub pause: Duration,
}

impl ClearRitual {
    /// Creates a ritual.
    #[must_use]
    pub const fn new(passes: u32, pause: Duration) -> Self {
        Self { passes, pause }
    }
}

/// Configuration for the whole bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Port parameters.
    pub serial: SerialConfig,
    /// Wait after opening before the link is usable.
    #[serde(with = "duration_ms", rename = "settle_delay_ms")]
    pub settle_delay: Duration,
    /// Buffer clearing after opening.
    pub open_clear: ClearRitual,
    /// Buffer clearing before each configuration write.
    pub send_clear: ClearRitual,
    /// How long to wait for an acknowledgment per attempt.
    #[serde(with = "duration_ms", rename = "ack_timeout_ms")]
    pub ack_timeout: Duration,
    /// Poll interval while waiting for an acknowledgment.
    #[serde(with = "duration_ms", rename = "response_poll_ms")]
    pub response_poll: Duration,
    /// Send attempts per configuration submit.
    pub send_attempts: u32,
    /// Pause between listener cycles.
    #[serde(with = "duration_ms", rename = "listener_interval_ms")]
    pub listener_interval: Duration,
    /// Pause between watchdog checks.
    #[serde(with = "duration_ms", rename = "watchdog_interval_ms")]
    pub watchdog_interval: Duration,
    /// Cap on buffered inbound bytes.
    pub buffer_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new(SerialConfig::default())
    }
}

impl BridgeConfig {
    /// Creates a configuration with default tunables for the given port.
    #[must_use]
    pub fn new(serial: SerialConfig) -> Self {
        Self {
            serial,
            settle_delay: DEFAULT_SETTLE_DELAY,
            open_clear: ClearRitual::new(2, Duration::from_millis(500)),
            send_clear: ClearRitual::new(3, Duration::from_millis(50)),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            response_poll: Duration::from_millis(100),
            send_attempts: DEFAULT_SEND_ATTEMPTS,
            listener_interval: DEFAULT_LISTENER_INTERVAL,
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Sets the post-open settle delay.
    #[must_use]
    pub const fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the post-open clear ritual.
    #[must_use]
    pub const fn open_clear(mut self, ritual: ClearRitual) -> Self {
        self.open_clear = ritual;
        self
    }

    /// Sets the pre-send clear ritual.
    #[must_use]
    pub const fn send_clear(mut self, ritual: ClearRitual) -> Self {
        self.send_clear = ritual;
        self
    }

    /// Sets the acknowledgment timeout.
    #[must_use]
    pub const fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Sets the acknowledgment poll interval.
    #[must_use]
    pub const fn response_poll(mut self, interval: Duration) -> Self {
        self.response_poll = interval;
        self
    }

    /// Sets the number of send attempts. Zero is treated as one.
    #[must_use]
    pub const fn send_attempts(mut self, attempts: u32) -> Self {
        self.send_attempts = attempts;
        self
    }

    /// Sets the listener cycle interval.
    #[must_use]
    pub const fn listener_interval(mut self, interval: Duration) -> Self {
        self.listener_interval = interval;
        self
    }

    /// Sets the watchdog check interval.
    #[must_use]
    pub const fn watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    /// Sets the inbound buffer cap.
    #[must_use]
    pub const fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }
}

/// Serde adapter for durations given as whole milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    /// Reads a whole number of milliseconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.settle_delay, Duration::from_secs(2));
        assert_eq!(config.ack_timeout, Duration::from_secs(5));
        assert_eq!(config.send_attempts, 3);
        assert_eq!(config.send_clear.passes, 3);
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::new(SerialConfig::new("COM3"))
            .settle_delay(Duration::ZERO)
            .send_attempts(5)
            .watchdog_interval(Duration::from_secs(1));
        assert_eq!(config.serial.port, "COM3");
        assert_eq!(config.settle_delay, Duration::ZERO);
        assert_eq!(config.send_attempts, 5);
        assert_eq!(config.watchdog_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{
            "serial": {"port": "COM5", "baud_rate": 19200},
            "ack_timeout_ms": 2500,
            "send_clear": {"passes": 1, "pause_ms": 10}
        }"#;
        let config: BridgeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.serial.port, "COM5");
        assert_eq!(config.serial.baud_rate, 19200);
        assert_eq!(config.ack_timeout, Duration::from_millis(2500));
        assert_eq!(config.send_clear, ClearRitual::new(1, Duration::from_millis(10)));
        assert_eq!(config.settle_delay, DEFAULT_SETTLE_DELAY);
    }
}
