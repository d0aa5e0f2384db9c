//! Main [`Bridge`] implementation.
//!
//! The bridge is the one context object the process builds at startup. It
//! owns the connection manager, telemetry listener, command sender, watchdog,
//! and telemetry store, and exposes the operations the HTTP layer calls.
//! Every operation returns a plain result value; failures are reported in
//! the result, never as an `Err`.

use std::sync::Arc;

use crate::commands::{CommandSender, Delivery};
use crate::config::BridgeConfig;
use crate::connection::ConnectionManager;
use crate::event::{Event, EventDispatcher, Subscription};
use crate::listener::TelemetryListener;
use crate::protocol::GameConfig;
use crate::store::TelemetryStore;
use crate::transport::{Connector, SerialConnector};
use crate::types::{
    ConnectionStatus, ReconnectResponse, SubmitResponse, SuccessResponse, SupervisorStatus,
    TelemetryRecord, TelemetryStatus, TelemetrySubmission,
};
use crate::watchdog::Watchdog;

/// Serial bridge to the game rig.
pub struct Bridge {
    config: BridgeConfig,
    manager: Arc<ConnectionManager>,
    listener: Arc<TelemetryListener>,
    sender: CommandSender,
    watchdog: Watchdog,
    store: TelemetryStore,
    dispatcher: EventDispatcher,
}

impl Bridge {
    /// Creates a bridge over a real serial port. Nothing is opened yet.
    #[must_use]
    pub fn serial(config: BridgeConfig) -> Self {
        Self::new(config, Arc::new(SerialConnector))
    }

    /// Creates a bridge that opens links through `connector`.
    #[must_use]
    pub fn new(config: BridgeConfig, connector: Arc<dyn Connector>) -> Self {
        let dispatcher = EventDispatcher::default();
        let store = TelemetryStore::new();

        let manager = Arc::new(ConnectionManager::new(
            config.clone(),
            connector,
            dispatcher.clone(),
        ));
        let listener = Arc::new(TelemetryListener::new(
            manager.slot(),
            store.clone(),
            dispatcher.clone(),
            config.listener_interval,
            config.buffer_capacity,
        ));
        let sender = CommandSender::new(
            &config,
            Arc::clone(&manager),
            Arc::clone(&listener),
            store.clone(),
            dispatcher.clone(),
        );
        let watchdog = Watchdog::new(
            Arc::clone(&manager),
            Arc::clone(&listener),
            config.watchdog_interval,
        );

        Self {
            config,
            manager,
            listener,
            sender,
            watchdog,
            store,
            dispatcher,
        }
    }

    /// Opens the link and starts the listener and the watchdog.
    ///
    /// A failed first open is not fatal; the watchdog keeps retrying.
    pub async fn start(&self) {
        if let Err(e) = self.manager.open().await {
            tracing::warn!("initial connection failed, watchdog will retry: {}", e);
        }
        self.listener.start().await;
        self.watchdog.start().await;
    }

    /// Stops background tasks and closes the link.
    pub async fn shutdown(&self) {
        self.watchdog.stop().await;
        self.listener.stop().await;
        self.manager.close().await;
    }

    /// Sends a game configuration and waits for the rig to acknowledge it.
    pub async fn submit_configuration(&self, config: GameConfig) -> SubmitResponse {
        match self.sender.deliver(&config).await {
            Delivery::Confirmed {
                acknowledgment,
                attempts,
            } => SubmitResponse {
                success: true,
                message: "configuration acknowledged by device".into(),
                echoed_input: config,
                device_acknowledgment: Some(acknowledgment),
                partial_response: None,
                attempts,
            },
            Delivery::Failed {
                reason,
                partial,
                attempts,
            } => SubmitResponse {
                success: false,
                message: reason,
                echoed_input: config,
                device_acknowledgment: None,
                partial_response: partial,
                attempts,
            },
        }
    }

    /// Reports whether the link is up, and where.
    pub async fn connection_status(&self) -> ConnectionStatus {
        if self.manager.is_healthy().await {
            ConnectionStatus {
                connected: true,
                port: Some(self.config.serial.port.clone()),
                baud_rate: Some(self.config.serial.baud_rate),
            }
        } else {
            ConnectionStatus {
                connected: false,
                port: None,
                baud_rate: None,
            }
        }
    }

    /// Closes and reopens the link on operator request.
    pub async fn reconnect(&self) -> ReconnectResponse {
        match self.manager.reopen(&self.listener).await {
            Ok(()) => ReconnectResponse {
                success: true,
                message: format!("reconnected to {}", self.config.serial.port),
            },
            Err(e) => ReconnectResponse {
                success: false,
                message: format!("reconnect to {} failed: {e}", self.config.serial.port),
            },
        }
    }

    /// Reports the background tasks and watchdog counters.
    pub async fn supervisor_status(&self) -> SupervisorStatus {
        SupervisorStatus {
            watchdog_active: self.watchdog.is_active().await,
            listener_active: self.listener.is_active(),
            stats: self.watchdog.stats().await,
        }
    }

    /// Returns the most recent telemetry record, if any.
    pub async fn latest_telemetry(&self) -> TelemetryStatus {
        self.store.latest().await.into()
    }

    /// Records telemetry supplied by a client rather than the rig.
    pub async fn submit_telemetry(&self, submission: TelemetrySubmission) -> SuccessResponse {
        let record = TelemetryRecord::from(submission);
        self.store.publish(record.clone()).await;
        self.dispatcher.dispatch(Event::Telemetry(record));
        SuccessResponse { success: true }
    }

    /// Forgets the stored telemetry record.
    pub async fn clear_telemetry(&self) -> SuccessResponse {
        self.store.clear().await;
        SuccessResponse { success: true }
    }

    /// Subscribes to link and telemetry events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }

    /// Returns the bridge configuration.
    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }
}
