//! Library reconciliation: turning scan results into store deltas.
//!
//! [`plan`] is a pure diff over case-insensitive path keys. [`Reconciler`]
//! applies a plan to the store under one write section, then announces the
//! changes and queues each new item for thumbnailing exactly once.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::events::{EventChannel, LibraryEvent};
use crate::media::{MediaFile, MediaItem, MediaItemId, path_key};
use crate::store::SharedStore;
use crate::thumbnail::ThumbnailPipeline;

/// Minimal changes that make the store's path set equal the discovered set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Items whose paths disappeared.
    pub removals: Vec<MediaItemId>,
    /// Newly seen files, in scan order.
    pub additions: Vec<MediaFile>,
}

impl ReconcilePlan {
    /// Whether the plan changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.additions.is_empty()
    }
}

/// Compute the add/remove delta between `existing` and `discovered`.
///
/// A path listed twice in `discovered` is added once.
#[must_use]
pub fn plan(existing: &[MediaItem], discovered: &[MediaFile]) -> ReconcilePlan {
    let discovered_keys: HashSet<String> = discovered.iter().map(|f| path_key(&f.path)).collect();

    let removals = existing
        .iter()
        .filter(|item| !discovered_keys.contains(&item.path_key()))
        .map(|item| item.id)
        .collect();

    let mut seen: HashSet<String> = existing.iter().map(MediaItem::path_key).collect();
    let additions = discovered
        .iter()
        .filter(|file| seen.insert(path_key(&file.path)))
        .cloned()
        .collect();

    ReconcilePlan {
        removals,
        additions,
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileDelta {
    /// Ids of items created, in display order.
    pub added: Vec<MediaItemId>,
    /// Ids of items removed.
    pub removed: Vec<MediaItemId>,
}

impl ReconcileDelta {
    /// Whether membership changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Applies scan results to the store.
#[derive(Debug, Clone)]
pub struct Reconciler {
    store: SharedStore,
    events: Arc<EventChannel<LibraryEvent>>,
}

impl Reconciler {
    /// Create a reconciler over `store`.
    pub fn new(store: SharedStore, events: Arc<EventChannel<LibraryEvent>>) -> Self {
        Self { store, events }
    }

    /// Bring the store in line with `discovered`.
    ///
    /// Removals are applied before additions; additions keep scan order. Each
    /// added item is queued on `pipeline` once. Running again with the same
    /// input is a no-op.
    pub fn reconcile(
        &self,
        discovered: &[MediaFile],
        pipeline: &ThumbnailPipeline,
    ) -> ReconcileDelta {
        let mut delta = ReconcileDelta::default();
        let mut added_items: Vec<(MediaItem, usize)> = Vec::new();

        {
            let mut store = self.store.write();
            let plan = plan(store.items(), discovered);
            if plan.is_empty() {
                debug!(items = store.len(), "Library already up to date");
                return delta;
            }

            for id in plan.removals {
                if store.remove(id).is_some() {
                    delta.removed.push(id);
                }
            }

            for file in &plan.additions {
                if let Some((id, index)) = store.insert(file)
                    && let Some(item) = store.get(id)
                {
                    added_items.push((item.clone(), index));
                    delta.added.push(id);
                }
            }
        }

        for id in &delta.removed {
            self.events.emit(&LibraryEvent::ItemRemoved { id: *id });
        }
        for (item, index) in &added_items {
            self.events.emit(&LibraryEvent::ItemAdded {
                id: item.id,
                index: *index,
            });
            pipeline.enqueue(item);
        }

        info!(
            added = delta.added.len(),
            removed = delta.removed.len(),
            "Library reconciled"
        );
        delta
    }
}
