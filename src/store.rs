//! Single-slot holder for the latest telemetry record.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::TelemetryRecord;

/// Holds at most one record, replaced wholesale on each publish.
#[derive(Debug, Clone, Default)]
pub struct TelemetryStore {
    latest: Arc<RwLock<Option<TelemetryRecord>>>,
}

impl TelemetryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the held record.
    pub async fn publish(&self, record: TelemetryRecord) {
        *self.latest.write().await = Some(record);
    }

    /// Returns the held record, if any.
    pub async fn latest(&self) -> Option<TelemetryRecord> {
        self.latest.read().await.clone()
    }

    /// Forgets the held record.
    pub async fn clear(&self) {
        *self.latest.write().await = None;
    }
}
