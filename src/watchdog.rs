//! Periodic link supervision.
//!
//! The watchdog probes the link on a fixed interval and reopens it when the
//! probe fails. A disconnection is counted once per episode, on the
//! healthy-to-unhealthy edge; every reopen attempt is counted separately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::connection::ConnectionManager;
use crate::listener::TelemetryListener;
use crate::types::{ConnectionStats, LinkState, unix_timestamp};

struct Supervisor {
    manager: Arc<ConnectionManager>,
    listener: Arc<TelemetryListener>,
    stats: RwLock<ConnectionStats>,
    healthy: AtomicBool,
    running: AtomicBool,
    wake: Notify,
}

/// Health-check and auto-reconnect task.
pub struct Watchdog {
    supervisor: Arc<Supervisor>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Watchdog {
    /// Creates a stopped watchdog.
    #[must_use]
    pub fn new(
        manager: Arc<ConnectionManager>,
        listener: Arc<TelemetryListener>,
        interval: Duration,
    ) -> Self {
        Self {
            supervisor: Arc::new(Supervisor {
                manager,
                listener,
                stats: RwLock::new(ConnectionStats::default()),
                healthy: AtomicBool::new(false),
                running: AtomicBool::new(false),
                wake: Notify::new(),
            }),
            interval,
            task: Mutex::new(None),
        }
    }

    /// Starts periodic checks. Returns false if already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let connected = self.supervisor.manager.state().await == LinkState::Connected;
        self.supervisor.healthy.store(connected, Ordering::SeqCst);
        self.supervisor.running.store(true, Ordering::SeqCst);

        let supervisor = Arc::clone(&self.supervisor);
        let interval = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            while supervisor.running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = ticker.tick() => {}
                    () = supervisor.wake.notified() => {}
                }
                if !supervisor.running.load(Ordering::SeqCst) {
                    break;
                }
                supervisor.check().await;
            }
        }));

        tracing::info!("watchdog started, checking every {:?}", self.interval);
        true
    }

    /// Stops periodic checks. Returns false if not running.
    ///
    /// A check already in progress runs to completion first, so the link and
    /// the listener are never left half way through a reconnect.
    pub async fn stop(&self) -> bool {
        let mut task = self.task.lock().await;
        self.supervisor.running.store(false, Ordering::SeqCst);

        let Some(handle) = task.take() else {
            return false;
        };

        self.supervisor.wake.notify_one();
        if let Err(e) = handle.await {
            tracing::error!("watchdog task failed: {}", e);
        }
        tracing::info!("watchdog stopped");
        true
    }

    /// Returns true while the check loop is running.
    pub async fn is_active(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Runs one health check now. Returns the resulting health.
    pub async fn check(&self) -> bool {
        self.supervisor.check().await
    }

    /// Returns a snapshot of the counters.
    pub async fn stats(&self) -> ConnectionStats {
        *self.supervisor.stats.read().await
    }

    /// Returns the health recorded by the last check.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.supervisor.healthy.load(Ordering::SeqCst)
    }
}

impl Supervisor {
    async fn check(&self) -> bool {
        let alive = self.manager.is_healthy().await;
        self.stats.write().await.last_health_check = Some(unix_timestamp());

        if alive {
            self.healthy.store(true, Ordering::SeqCst);
            return true;
        }

        if self.healthy.swap(false, Ordering::SeqCst) {
            self.stats.write().await.disconnections += 1;
            tracing::warn!("link to {} lost", self.manager.config().serial.port);
        }

        let attempt = {
            let mut stats = self.stats.write().await;
            stats.reconnect_attempts += 1;
            stats.reconnect_attempts
        };
        tracing::debug!("reconnect attempt {}", attempt);

        // Nothing may read the link while it is being replaced.
        self.listener.stop().await;

        match self.manager.open().await {
            Ok(()) => {
                self.healthy.store(true, Ordering::SeqCst);
                self.stats.write().await.last_reconnect = Some(unix_timestamp());
                self.listener.start().await;
                tracing::info!("link restored after {} attempts", attempt);
                true
            }
            Err(e) => {
                tracing::warn!("reconnect attempt {} failed: {}", attempt, e);
                false
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
