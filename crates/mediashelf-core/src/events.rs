//! Typed notification channels.
//!
//! Each channel keeps its own subscriber list. Subscribers receive an unbounded
//! `tokio` receiver, usable from async code (`recv().await`) or from plain
//! threads (`try_recv`, `blocking_recv`). Closed subscribers are pruned on the
//! next emit.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

use crate::media::MediaItemId;
use crate::playback::PlayButtonState;

/// Fan-out channel with an internal subscriber list.
#[derive(Debug)]
pub struct EventChannel<T> {
    name: &'static str,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone + Send + 'static> EventChannel<T> {
    /// Create an empty channel. `name` is used in trace logs only.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber.
    pub fn emit(&self, event: &T) {
        let mut subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subs.retain(|tx| tx.send(event.clone()).is_ok());
        trace!(channel = self.name, subscribers = subs.len(), "event emitted");
    }

    /// Number of live subscribers as of the last emit.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Changes to the observable item collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LibraryEvent {
    /// An item was appended at `index`.
    ItemAdded {
        /// New item id.
        id: MediaItemId,
        /// Position in display order.
        index: usize,
    },
    /// An item was removed.
    ItemRemoved {
        /// Removed item id.
        id: MediaItemId,
    },
    /// A thumbnail was attached to an item.
    ThumbnailUpdated {
        /// Item id.
        id: MediaItemId,
    },
    /// Every thumbnail was cleared by a purge.
    ThumbnailsCleared,
    /// Playback flags of an item changed.
    ItemStateChanged {
        /// Item id.
        id: MediaItemId,
        /// Media is active.
        is_active: bool,
        /// A transition is in flight.
        is_changing: bool,
    },
    /// Play-button enablement was recomputed.
    PlayEnablementChanged(Vec<PlayButtonState>),
}

/// Phase of a single file copy during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStatus {
    /// A file copy is about to start.
    StartingCopy,
    /// A file copy (or the whole operation) finished.
    FinishedCopy,
}

/// Ingestion progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyProgress {
    /// Phase.
    pub status: CopyStatus,
    /// Destination file, absent on the terminal notification.
    pub file_path: Option<PathBuf>,
}

impl CopyProgress {
    /// A per-file starting notification.
    pub fn starting(path: impl Into<PathBuf>) -> Self {
        Self {
            status: CopyStatus::StartingCopy,
            file_path: Some(path.into()),
        }
    }

    /// A per-file finished notification.
    pub fn finished(path: impl Into<PathBuf>) -> Self {
        Self {
            status: CopyStatus::FinishedCopy,
            file_path: Some(path.into()),
        }
    }

    /// The terminal notification for a whole drop operation.
    #[must_use]
    pub const fn operation_finished() -> Self {
        Self {
            status: CopyStatus::FinishedCopy,
            file_path: None,
        }
    }

    /// Whether this is the terminal notification.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.status, CopyStatus::FinishedCopy) && self.file_path.is_none()
    }
}

/// Option changes relevant to the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OptionsEvent {
    /// The managed media folder moved.
    MediaFolderChanged(PathBuf),
    /// The display target (media monitor) was assigned or cleared.
    DisplayTargetChanged {
        /// Whether a display target is now configured.
        configured: bool,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let channel = EventChannel::<LibraryEvent>::new("library");
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();

        channel.emit(&LibraryEvent::ThumbnailsCleared);

        assert_eq!(a.try_recv().unwrap(), LibraryEvent::ThumbnailsCleared);
        assert_eq!(b.try_recv().unwrap(), LibraryEvent::ThumbnailsCleared);
    }

    #[test]
    fn test_closed_subscribers_are_pruned() {
        let channel = EventChannel::<CopyProgress>::new("progress");
        let keep = channel.subscribe();
        let dropped = channel.subscribe();
        drop(dropped);

        channel.emit(&CopyProgress::operation_finished());
        assert_eq!(channel.subscriber_count(), 1);
        drop(keep);
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let channel = EventChannel::<OptionsEvent>::new("options");
        channel.emit(&OptionsEvent::DisplayTargetChanged { configured: true });
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_copy_progress_terminal() {
        assert!(CopyProgress::operation_finished().is_terminal());
        assert!(!CopyProgress::finished("/m/a.jpg").is_terminal());
        assert!(!CopyProgress::starting("/m/a.jpg").is_terminal());
    }

    #[test]
    fn test_library_event_serialization() {
        let event = LibraryEvent::ItemRemoved {
            id: MediaItemId::from_raw(3),
        };
        let json = serde_json::to_string(&event).expect("serialize failed");
        assert!(json.contains("ItemRemoved"));
        let back: LibraryEvent = serde_json::from_str(&json).expect("deserialize failed");
        assert_eq!(back, event);
    }
}
