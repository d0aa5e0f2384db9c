//! Configuration delivery to the rig.
//!
//! A send takes the link permit outright, so the telemetry listener is kept
//! off the wire until the acknowledgment arrives or the wait times out.
//! [`CommandSender::deliver`] wraps single sends in a bounded retry that
//! reopens the link between attempts.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use crate::config::{BridgeConfig, ClearRitual};
use crate::connection::{ConnectionManager, clear_buffers};
use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher};
use crate::listener::TelemetryListener;
use crate::protocol::{Extraction, GameConfig, InboundBuffer, encode_config};
use crate::store::TelemetryStore;

/// Result of a single send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The device acknowledged the write.
    Confirmed { acknowledgment: String },
    /// The device said something, but not a complete acknowledgment.
    Partial { received: String },
    /// The device said nothing before the timeout.
    NoResponse,
}

/// Result of a send with retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Acknowledged on attempt `attempts`.
    Confirmed {
        acknowledgment: String,
        attempts: u32,
    },
    /// Every attempt failed. `reason` and `partial` describe the last one.
    Failed {
        reason: String,
        partial: Option<String>,
        attempts: u32,
    },
}

#[derive(Debug, Clone, Copy)]
struct SendSettings {
    clear: ClearRitual,
    ack_timeout: Duration,
    poll: Duration,
    attempts: u32,
    capacity: usize,
}

/// Sends configurations and waits for the device to acknowledge them.
pub struct CommandSender {
    manager: Arc<ConnectionManager>,
    listener: Arc<TelemetryListener>,
    store: TelemetryStore,
    dispatcher: EventDispatcher,
    settings: SendSettings,
}

impl CommandSender {
    /// Creates a sender over the manager's link.
    #[must_use]
    pub fn new(
        config: &BridgeConfig,
        manager: Arc<ConnectionManager>,
        listener: Arc<TelemetryListener>,
        store: TelemetryStore,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            manager,
            listener,
            store,
            dispatcher,
            settings: SendSettings {
                clear: config.send_clear,
                ack_timeout: config.ack_timeout,
                poll: config.response_poll,
                attempts: config.send_attempts.max(1),
                capacity: config.buffer_capacity,
            },
        }
    }

    /// Sends `config` up to the configured number of attempts.
    ///
    /// The link is closed and reopened before every retry.
    pub async fn deliver(&self, config: &GameConfig) -> Delivery {
        let mut reason = String::new();
        let mut partial = None;

        for attempt in 1..=self.settings.attempts {
            if attempt > 1 {
                tracing::debug!("reopening link before attempt {}", attempt);
                if let Err(e) = self.manager.reopen(&self.listener).await {
                    tracing::warn!("reopen before attempt {} failed: {}", attempt, e);
                    reason = format!("reconnect failed: {e}");
                    partial = None;
                    continue;
                }
            }

            match self.send_and_confirm(config).await {
                Ok(SendOutcome::Confirmed { acknowledgment }) => {
                    tracing::info!("configuration acknowledged on attempt {}", attempt);
                    return Delivery::Confirmed {
                        acknowledgment,
                        attempts: attempt,
                    };
                }
                Ok(SendOutcome::Partial { received }) => {
                    tracing::warn!("attempt {}: incomplete acknowledgment: {}", attempt, received);
                    reason = "incomplete acknowledgment from device".into();
                    partial = Some(received);
                }
                Ok(SendOutcome::NoResponse) => {
                    tracing::warn!("attempt {}: no response from device", attempt);
                    reason = "no response from device".into();
                    partial = None;
                }
                Err(e) => {
                    tracing::warn!("attempt {}: send failed: {}", attempt, e);
                    reason = format!("send failed: {e}");
                    partial = None;
                }
            }
        }

        Delivery::Failed {
            reason,
            partial,
            attempts: self.settings.attempts,
        }
    }

    /// Writes `config` once and waits for the acknowledgment.
    ///
    /// The listener is stopped for the duration and restarted afterwards if
    /// it had been running, whatever the outcome.
    pub async fn send_and_confirm(&self, config: &GameConfig) -> Result<SendOutcome> {
        let payload = encode_config(config)?;
        self.listener.suspended(self.exchange(payload)).await
    }

    async fn exchange(&self, payload: Bytes) -> Result<SendOutcome> {
        let slot = self.manager.slot();
        let mut guard = slot.lock().await;
        let link = guard.as_mut().ok_or(Error::NotConnected)?;

        let stale = link.read_available().await?;
        if !stale.is_empty() {
            tracing::debug!("discarding {} residual bytes before send", stale.len());
        }
        clear_buffers(&mut **link, self.settings.clear).await?;

        tracing::debug!("sending configuration: {}", String::from_utf8_lossy(&payload));
        link.write(payload).await?;

        let mut response = InboundBuffer::new(self.settings.capacity);
        let mut received = Vec::new();
        let deadline = Instant::now() + self.settings.ack_timeout;

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.settings.poll.min(deadline - now)).await;

            let bytes = link.read_available().await?;
            if bytes.is_empty() {
                continue;
            }
            received.extend_from_slice(&bytes);
            response.feed(&bytes);

            if let Some(acknowledgment) = self.scan(&mut response).await {
                self.dispatcher
                    .dispatch(Event::Acknowledged(acknowledgment.clone()));
                return Ok(SendOutcome::Confirmed { acknowledgment });
            }
        }

        if received.is_empty() {
            Ok(SendOutcome::NoResponse)
        } else {
            Ok(SendOutcome::Partial {
                received: String::from_utf8_lossy(&received).into_owned(),
            })
        }
    }

    /// Looks for the acknowledgment, keeping any telemetry that shows up first.
    async fn scan(&self, response: &mut InboundBuffer) -> Option<String> {
        loop {
            match response.next_frame() {
                Extraction::Acknowledgment { text, .. } => return Some(text),
                Extraction::Telemetry { record, .. } => {
                    tracing::info!("telemetry received during send: {:?}", record);
                    self.store.publish(record.clone()).await;
                    self.dispatcher.dispatch(Event::Telemetry(record));
                }
                Extraction::Malformed { error, .. } => {
                    tracing::warn!("dropping malformed frame during send: {}", error);
                }
                Extraction::Incomplete | Extraction::Empty => return None,
            }
        }
    }
}
