//! Lifecycle of the single physical link.
//!
//! The [`ConnectionManager`] owns the link slot: a mutex around the optional
//! open handle. Holding that mutex is the permit to touch the wire. The
//! telemetry listener only ever `try_lock`s it; the command sender waits.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::config::{BridgeConfig, ClearRitual};
use crate::error::Result;
use crate::event::{Event, EventDispatcher};
use crate::listener::TelemetryListener;
use crate::transport::{Connector, Link};
use crate::types::LinkState;

/// The open handle, guarded by the access permit.
pub type LinkSlot = Arc<Mutex<Option<Box<dyn Link>>>>;

/// Resets the driver buffers and drains whatever arrives in between.
///
/// Returns the number of bytes discarded.
pub(crate) async fn clear_buffers(link: &mut dyn Link, ritual: ClearRitual) -> Result<usize> {
    let mut drained = 0usize;

    for _ in 0..ritual.passes {
        link.reset_buffers()?;
        tokio::time::sleep(ritual.pause).await;
        drained += link.read_available().await?.len();
    }

    if drained > 0 {
        tracing::debug!("drained {} stale bytes from buffer", drained);
    }
    Ok(drained)
}

/// Opens, closes, and probes the link.
pub struct ConnectionManager {
    config: BridgeConfig,
    connector: Arc<dyn Connector>,
    slot: LinkSlot,
    state: RwLock<LinkState>,
    dispatcher: EventDispatcher,
}

impl ConnectionManager {
    /// Creates a manager with no open link.
    #[must_use]
    pub fn new(
        config: BridgeConfig,
        connector: Arc<dyn Connector>,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            config,
            connector,
            slot: Arc::new(Mutex::new(None)),
            state: RwLock::new(LinkState::Disconnected),
            dispatcher,
        }
    }

    /// Returns the shared link slot.
    #[must_use]
    pub fn slot(&self) -> LinkSlot {
        Arc::clone(&self.slot)
    }

    /// Returns the configuration the manager opens links with.
    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    pub async fn state(&self) -> LinkState {
        *self.state.read().await
    }

    async fn set_state(&self, state: LinkState) {
        *self.state.write().await = state;
    }

    /// Opens the link, replacing any handle already held.
    ///
    /// Waits out the device's boot time and clears boot noise before the
    /// link is marked connected. A failure leaves the manager disconnected.
    pub async fn open(&self) -> Result<()> {
        self.close().await;
        self.set_state(LinkState::Connecting).await;

        match self.connect().await {
            Ok(link) => {
                *self.slot.lock().await = Some(link);
                self.set_state(LinkState::Connected).await;
                tracing::info!("connected to {}", self.config.serial.port);
                self.dispatcher.dispatch(Event::Connected);
                Ok(())
            }
            Err(e) => {
                self.set_state(LinkState::Disconnected).await;
                tracing::warn!("failed to open {}: {}", self.config.serial.port, e);
                Err(e)
            }
        }
    }

    async fn connect(&self) -> Result<Box<dyn Link>> {
        let mut link = self.connector.open(&self.config.serial).await?;

        tokio::time::sleep(self.config.settle_delay).await;

        if let Err(e) = clear_buffers(link.as_mut(), self.config.open_clear).await {
            link.close();
            return Err(e);
        }
        Ok(link)
    }

    /// Releases the link if open. Idempotent.
    pub async fn close(&self) {
        let link = self.slot.lock().await.take();
        if let Some(mut link) = link {
            link.close();
            tracing::info!("disconnected from {}", self.config.serial.port);
            self.dispatcher.dispatch(Event::Disconnected);
        }
        self.set_state(LinkState::Disconnected).await;
    }

    /// Closes and reopens the link with the listener held off the wire.
    ///
    /// The listener is resumed afterwards if it was running, even if the
    /// reopen fails.
    pub async fn reopen(&self, listener: &Arc<TelemetryListener>) -> Result<()> {
        listener
            .suspended(async {
                self.close().await;
                self.open().await
            })
            .await
    }

    /// Liveness hint: a handle is held and reports itself open.
    ///
    /// If the link stays busy for longer than the port timeout, the last
    /// known state is reported instead.
    pub async fn is_healthy(&self) -> bool {
        match tokio::time::timeout(self.config.serial.timeout, self.slot.lock()).await {
            Ok(guard) => guard.as_ref().is_some_and(|link| link.is_open()),
            Err(_) => {
                tracing::debug!("link busy, using last known state for health check");
                self.state().await == LinkState::Connected
            }
        }
    }
}
