//! # rigbridge
//!
//! Bridges a request/response web API to a microcontroller game rig over a
//! single serial link.
//!
//! The rig accepts a game configuration (two 8-row sprites and a goal) and
//! acknowledges it, and at the end of each game pushes an unsolicited
//! telemetry report. Both travel as compact JSON with no framing.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Frame recovery from an undelimited byte stream
//! - Exclusive link access for sends, with the telemetry listener yielding
//! - Watchdog that detects a dead link and reopens it
//! - Bounded retry with reopen for configuration sends
//!
//! ## Quick Start
//!
//! ```no_run
//! use rigbridge::{Bridge, BridgeConfig, GameConfig, GoalType, SerialConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bridge = Bridge::serial(BridgeConfig::new(SerialConfig::new("/dev/ttyUSB0")));
//!     bridge.start().await;
//!
//!     let response = bridge
//!         .submit_configuration(GameConfig {
//!             character: [4, 14, 4, 14, 21, 4, 10, 17],
//!             obstacle: [31, 17, 17, 17, 17, 17, 17, 31],
//!             goal_type: GoalType::Time,
//!             goal_value: 30,
//!         })
//!         .await;
//!     println!("acknowledged: {}", response.success);
//!
//!     let telemetry = bridge.latest_telemetry().await;
//!     println!("latest: {:?}", telemetry.record);
//!
//!     bridge.shutdown().await;
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Frame extraction and payload encoding
//! - [`transport`] - Link abstraction and the USB/Serial implementation
//! - [`connection`] - Link lifecycle and the access permit
//! - [`listener`] - Background telemetry reader
//! - [`commands`] - Send-and-acknowledge with retry
//! - [`watchdog`] - Health checks and automatic reconnect
//! - [`store`] - Latest telemetry record
//! - [`event`] - Push notifications for link and telemetry changes
//! - [`client`] - The [`Bridge`] context object

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod listener;
pub mod protocol;
pub mod store;
pub mod transport;
pub mod types;
pub mod watchdog;

#[cfg(test)]
mod test_utils;

// Re-exports for convenience
pub use client::Bridge;
pub use commands::{CommandSender, Delivery, SendOutcome};
pub use config::{BridgeConfig, ClearRitual};
pub use connection::{ConnectionManager, LinkSlot};
pub use error::{Error, FrameError, Result};
pub use event::{Event, EventDispatcher, Subscription};
pub use listener::TelemetryListener;
pub use protocol::{Extraction, GameConfig, GoalType, InboundBuffer, extract};
pub use store::TelemetryStore;
pub use transport::{Connector, Link, SerialConfig, SerialConnector, serial::list_ports};
pub use types::{
    ConnectionStats, ConnectionStatus, DataStatus, GameResult, LinkState, ReconnectResponse,
    SubmitResponse, SuccessResponse, SupervisorStatus, TelemetryRecord, TelemetryStatus,
    TelemetrySubmission,
};
pub use watchdog::Watchdog;
