//! Background reader for unsolicited telemetry.
//!
//! The listener never waits for the link: each cycle it tries the permit
//! once and skips the cycle if a send holds it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::connection::LinkSlot;
use crate::event::{Event, EventDispatcher};
use crate::protocol::InboundBuffer;
use crate::store::TelemetryStore;
use crate::types::TelemetryRecord;

struct ListenerShared {
    slot: LinkSlot,
    store: TelemetryStore,
    dispatcher: EventDispatcher,
    interval: Duration,
    capacity: usize,
    enabled: AtomicBool,
    wake: Notify,
}

/// Drains the link and publishes completed telemetry records.
pub struct TelemetryListener {
    shared: Arc<ListenerShared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryListener {
    /// Creates a stopped listener.
    #[must_use]
    pub fn new(
        slot: LinkSlot,
        store: TelemetryStore,
        dispatcher: EventDispatcher,
        interval: Duration,
        capacity: usize,
    ) -> Self {
        Self {
            shared: Arc::new(ListenerShared {
                slot,
                store,
                dispatcher,
                interval,
                capacity,
                enabled: AtomicBool::new(false),
                wake: Notify::new(),
            }),
            task: Mutex::new(None),
        }
    }

    /// Returns true while the loop is enabled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    /// Starts the loop. Returns false if it was already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        self.shared.enabled.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(async move { shared.run().await }));
        tracing::debug!("telemetry listener started");
        true
    }

    /// Stops the loop and waits for its current cycle to finish.
    ///
    /// Returns true if the loop was running.
    pub async fn stop(&self) -> bool {
        let mut task = self.task.lock().await;
        self.shared.enabled.store(false, Ordering::SeqCst);

        let Some(handle) = task.take() else {
            return false;
        };

        self.shared.wake.notify_one();
        if let Err(e) = handle.await {
            tracing::error!("telemetry listener task failed: {}", e);
        }
        tracing::debug!("telemetry listener stopped");
        true
    }

    /// Runs `operation` with the listener stopped, then restarts it if it
    /// had been running.
    ///
    /// The restart also happens if `operation` panics or the returned future
    /// is dropped before it completes.
    pub async fn suspended<F: Future>(self: &Arc<Self>, operation: F) -> F::Output {
        let resume = Resume {
            listener: self.is_active().then(|| Arc::clone(self)),
        };
        self.stop().await;
        let output = operation.await;
        resume.finish().await;
        output
    }
}

/// Restarts a suspended listener when dropped.
struct Resume {
    listener: Option<Arc<TelemetryListener>>,
}

impl Resume {
    async fn finish(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.start().await;
        }
    }
}

impl Drop for Resume {
    fn drop(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::debug!("suspended operation abandoned, resuming listener");
                runtime.spawn(async move {
                    listener.start().await;
                });
            }
            Err(_) => tracing::warn!("no runtime to resume telemetry listener"),
        }
    }
}

impl ListenerShared {
    async fn run(&self) {
        let mut buffer = InboundBuffer::new(self.capacity);

        while self.enabled.load(Ordering::SeqCst) {
            for record in self.read_cycle(&mut buffer).await {
                tracing::info!(
                    "telemetry: {} obstacles, {}s, {:?}",
                    record.obstacles_avoided,
                    record.survival_time,
                    record.result
                );
                self.store.publish(record.clone()).await;
                self.dispatcher.dispatch(Event::Telemetry(record));
            }

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                () = self.wake.notified() => {}
            }
        }
    }

    async fn read_cycle(&self, buffer: &mut InboundBuffer) -> Vec<TelemetryRecord> {
        let Ok(mut guard) = self.slot.try_lock() else {
            tracing::trace!("link busy, skipping listener cycle");
            return Vec::new();
        };
        let Some(link) = guard.as_mut() else {
            return Vec::new();
        };

        let read = link.read_available().await;
        drop(guard);

        match read {
            Ok(bytes) if !bytes.is_empty() => {
                buffer.feed(&bytes);
                buffer.drain_records()
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!("telemetry read failed: {}", e);
                Vec::new()
            }
        }
    }
}

impl Drop for TelemetryListener {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionManager;
    use crate::test_utils::{Op, SimDevice, test_config};
    use crate::types::GameResult;

    async fn setup(
        device: &SimDevice,
    ) -> (ConnectionManager, Arc<TelemetryListener>, TelemetryStore) {
        let config = test_config();
        let dispatcher = EventDispatcher::default();
        let manager =
            ConnectionManager::new(config.clone(), Arc::new(device.connector()), dispatcher.clone());
        manager.open().await.unwrap();

        let store = TelemetryStore::new();
        let listener = Arc::new(TelemetryListener::new(
            manager.slot(),
            store.clone(),
            dispatcher,
            config.listener_interval,
            config.buffer_capacity,
        ));
        (manager, listener, store)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_telemetry() {
        let device = SimDevice::new();
        let (_manager, listener, store) = setup(&device).await;
        assert!(listener.start().await);

        device.emit(br#"{"obstacles":3,"time":12,"result":"win"}"#);
        settle().await;

        let record = store.latest().await.unwrap();
        assert_eq!(record.obstacles_avoided, 3);
        assert_eq!(record.survival_time, 12);
        assert_eq!(record.result, GameResult::Victory);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_split_across_cycles() {
        let device = SimDevice::new();
        let (_manager, listener, store) = setup(&device).await;
        listener.start().await;

        device.emit(br#"noise{"obstacles":5,"ti"#);
        settle().await;
        assert!(store.latest().await.is_none());

        device.emit(br#"me":40,"result":"lose"}"#);
        settle().await;
        let record = store.latest().await.unwrap();
        assert_eq!(record.obstacles_avoided, 5);
        assert_eq!(record.result, GameResult::Defeat);
    }

    #[tokio::test(start_paused = true)]
    async fn test_yields_to_permit_holder() {
        let device = SimDevice::new();
        let (manager, listener, store) = setup(&device).await;
        listener.start().await;

        let slot = manager.slot();
        let guard = slot.lock().await;
        let frame = br#"{"obstacles":1,"time":1,"result":"win"}"#;
        device.emit(frame);
        settle().await;
        assert!(store.latest().await.is_none());
        assert_eq!(device.pending(), frame.len());

        drop(guard);
        settle().await;
        assert_eq!(store.latest().await.unwrap().obstacles_avoided, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_idempotent() {
        let device = SimDevice::new();
        let (_manager, listener, _store) = setup(&device).await;

        assert!(!listener.stop().await);
        assert!(listener.start().await);
        assert!(!listener.start().await);
        assert!(listener.is_active());

        assert!(listener.stop().await);
        assert!(!listener.is_active());
        assert!(!listener.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_listener_leaves_link_alone() {
        let device = SimDevice::new();
        let (_manager, listener, store) = setup(&device).await;
        listener.start().await;
        listener.stop().await;

        let reads = device.count(Op::Read);
        device.emit(br#"{"obstacles":1,"time":1,"result":"win"}"#);
        settle().await;

        assert_eq!(device.count(Op::Read), reads);
        assert!(store.latest().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspended_restores_previous_state() {
        let device = SimDevice::new();
        let (_manager, listener, _store) = setup(&device).await;

        listener.suspended(async {}).await;
        assert!(!listener.is_active());

        listener.start().await;
        let was_active = listener.suspended(async { listener.is_active() }).await;
        assert!(!was_active);
        assert!(listener.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_suspension_resumes() {
        let device = SimDevice::new();
        let (_manager, listener, store) = setup(&device).await;
        listener.start().await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            listener.suspended(std::future::pending::<()>()),
        )
        .await;
        assert!(abandoned.is_err());

        device.emit(br#"{"obstacles":9,"time":4,"result":"win"}"#);
        settle().await;
        assert!(listener.is_active());
        assert_eq!(store.latest().await.unwrap().obstacles_avoided, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_suspension_resumes() {
        let device = SimDevice::new();
        let (_manager, listener, _store) = setup(&device).await;
        listener.start().await;

        fn explode() {
            panic!("operation failed");
        }

        let task = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.suspended(async { explode() }).await })
        };
        assert!(task.await.unwrap_err().is_panic());

        settle().await;
        assert!(listener.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_survives_read_errors() {
        let device = SimDevice::new();
        let (manager, listener, store) = setup(&device).await;
        listener.start().await;

        device.unplug();
        settle().await;
        assert!(listener.is_active());

        device.replug();
        manager.open().await.unwrap();
        device.emit(br#"{"obstacles":2,"time":3,"result":"victory"}"#);
        settle().await;
        assert_eq!(store.latest().await.unwrap().obstacles_avoided, 2);
    }
}
