//! Observer notifications for watch activity.
//!
//! A broadcast channel shared between the dispatcher and any number of
//! subscribers (the console, tests, embedders).

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::integration::Integration;
use crate::types::ConfigId;

#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A file appeared in a watched folder. Sent once per file, before any integration runs.
    FileAdded { path: PathBuf },
    /// An integration finished successfully for `path`.
    IntegrationExecuted {
        configuration_id: ConfigId,
        path: PathBuf,
        integration: Arc<dyn Integration>,
    },
    /// An integration failed for `path`; dispatch continued with the next one.
    IntegrationFailed {
        configuration_id: ConfigId,
        path: PathBuf,
        integration: Arc<dyn Integration>,
        error: String,
    },
}

/// Fans watch events out to every subscriber
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<WatchEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn send(&self, event: WatchEvent) {
        match self.sender.send(event) {
            Ok(count) => {
                crate::debug_event!("broadcast", "sent", "to {count} subscribers");
            }
            Err(_) => {
                // No receivers, this is fine
                crate::debug_event!("broadcast", "dropped", "no subscribers");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
