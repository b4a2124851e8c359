//! Bootstrap and sync progress events.
//!
//! Hosts embedding the core observe key-generation and sync milestones
//! through a pluggable sink; the default sink drops everything.

use serde::{Deserialize, Serialize};

/// Events emitted while bootstrapping and synchronizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Event {
    /// Master-secret generation started
    CreatingKeys {
        /// User the keys belong to
        uuid: String,
    },
    /// Master-secret generation finished
    DoneCreatingKeys {
        /// User the keys belong to
        uuid: String,
    },
    /// Fetching wrapped secrets from the shared recovery database
    DownloadingKeys {
        /// User the keys belong to
        uuid: String,
    },
    /// Finished fetching wrapped secrets
    DoneDownloadingKeys {
        /// User the keys belong to
        uuid: String,
    },
    /// Uploading wrapped secrets to the shared recovery database
    UploadingKeys {
        /// User the keys belong to
        uuid: String,
    },
    /// Finished uploading wrapped secrets
    DoneUploadingKeys {
        /// User the keys belong to
        uuid: String,
    },
    /// The local replica differs from the remote replica
    NewDataToSync {
        /// User the replica belongs to
        uuid: String,
    },
    /// A replica synchronization completed
    DoneDataSync {
        /// User the replica belongs to
        uuid: String,
    },
}

/// Event sink (trait for pluggable observers)
pub trait EventSink: Send + Sync {
    /// Deliver one event
    fn emit(&self, event: Event);
}

/// No-op sink (default when no observer is attached)
#[derive(Debug, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: Event) {}
}

/// In-memory event sink (for testing)
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: std::sync::Mutex<Vec<Event>>,
}

impl MemoryEventSink {
    /// Create new in-memory sink
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all recorded events
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Clear recorded events (testing only)
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
