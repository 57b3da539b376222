//! The canonical in-memory media item collection.
//!
//! [`MediaStore`] keeps items in display order and guarantees one item per
//! case-insensitive path. It is mutated by the reconciler (membership), the
//! playback controller (activity flags) and the thumbnail worker (thumbnail
//! field). Everyone else reads through [`SharedStore::snapshot`].

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::media::{MediaClassification, MediaFile, MediaItem, MediaItemId, path_key};
use crate::thumbnail::Thumbnail;

/// Ordered media item collection.
#[derive(Debug)]
pub struct MediaStore {
    items: Vec<MediaItem>,
    next_id: u64,
}

impl Default for MediaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaStore {
    /// Create an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
        }
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in display order.
    #[must_use]
    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    /// Look up an item by id.
    #[must_use]
    pub fn get(&self, id: MediaItemId) -> Option<&MediaItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Look up an item by id (mutable).
    pub fn get_mut(&mut self, id: MediaItemId) -> Option<&mut MediaItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Display position of an item.
    #[must_use]
    pub fn position(&self, id: MediaItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Find the item whose path matches `key` (see [`path_key`]).
    #[must_use]
    pub fn find_by_key(&self, key: &str) -> Option<&MediaItem> {
        self.items.iter().find(|item| item.path_key() == key)
    }

    fn allocate_id(&mut self) -> MediaItemId {
        let id = MediaItemId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a new item for `file` with a fresh id.
    ///
    /// Returns `None` if an item with the same path (ignoring case) already
    /// exists; the store never holds two items for one path.
    pub fn insert(&mut self, file: &MediaFile) -> Option<(MediaItemId, usize)> {
        let key = path_key(&file.path);
        if self.find_by_key(&key).is_some() {
            return None;
        }
        let id = self.allocate_id();
        self.items.push(MediaItem::from_file(id, file));
        Some((id, self.items.len() - 1))
    }

    /// Remove an item by id.
    pub fn remove(&mut self, id: MediaItemId) -> Option<MediaItem> {
        let pos = self.position(id)?;
        Some(self.items.remove(pos))
    }

    /// Attach a thumbnail. Returns `false` if the item is gone.
    pub fn set_thumbnail(&mut self, id: MediaItemId, thumbnail: Thumbnail) -> bool {
        match self.get_mut(id) {
            Some(item) => {
                item.thumbnail = Some(thumbnail);
                true
            }
            None => false,
        }
    }

    /// Whether any item has a transition in flight.
    #[must_use]
    pub fn any_changing(&self) -> bool {
        self.items.iter().any(|item| item.is_changing)
    }

    /// Whether a video or audio item is currently active.
    #[must_use]
    pub fn video_or_audio_active(&self) -> bool {
        self.items.iter().any(MediaItem::is_active_video_or_audio)
    }

    /// The first image item after `id` in display order, without wrapping.
    #[must_use]
    pub fn next_image_after(&self, id: MediaItemId) -> Option<&MediaItem> {
        let pos = self.position(id)?;
        self.items[pos + 1..]
            .iter()
            .find(|item| item.classification == MediaClassification::Image)
    }
}

/// Shared, lock-protected handle to a [`MediaStore`].
///
/// Lock poisoning is recovered from: the store holds plain data, and a panic
/// in one reader must not take the whole library down.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<RwLock<MediaStore>>,
}

impl SharedStore {
    /// Wrap a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MediaStore::new())),
        }
    }

    /// Acquire a read guard.
    pub fn read(&self) -> RwLockReadGuard<'_, MediaStore> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire a write guard.
    pub fn write(&self) -> RwLockWriteGuard<'_, MediaStore> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current membership, taken under a short read section.
    pub fn snapshot(&self) -> Vec<MediaItem> {
        self.read().items().to_vec()
    }

    /// Copy of a single item.
    pub fn item(&self, id: MediaItemId) -> Option<MediaItem> {
        self.read().get(id).cloned()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
