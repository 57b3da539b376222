//! Background thumbnail generation.
//!
//! This module provides:
//! - [`ThumbnailRenderer`], the rendering collaborator
//! - [`ThumbnailQueue`], a FIFO with blocking dequeue and per-item pending counts
//! - [`ThumbnailPipeline`], a single dedicated worker thread draining the queue
//!
//! The pipeline is single-use: `Idle -> Running -> Cancelling -> Stopped`.
//! Cancellation is cooperative and observed between items; an in-progress
//! render is never interrupted.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{Result, ThumbnailError};
use crate::events::{EventChannel, LibraryEvent};
use crate::media::{MediaItem, MediaItemId};
use crate::store::SharedStore;

/// Rendered preview image handle.
///
/// Cloning is cheap; the encoded bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct Thumbnail {
    data: Arc<[u8]>,
}

impl Thumbnail {
    /// Wrap encoded image bytes.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }

    /// Encoded image bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("len", &self.data.len())
            .finish()
    }
}

/// Thumbnail rendering collaborator.
///
/// Implementations may cache on disk; `clear_cache` drops that cache.
#[cfg_attr(test, mockall::automock)]
pub trait ThumbnailRenderer: Send + Sync {
    /// Render a thumbnail for `item`.
    fn generate(&self, item: &MediaItem) -> Result<Thumbnail>;

    /// Drop any cached thumbnails.
    fn clear_cache(&self) -> Result<()>;
}

/// An item reference waiting for a thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    /// Item id.
    pub id: MediaItemId,
    /// Item path at enqueue time, for logging.
    pub file_path: PathBuf,
}

impl ThumbnailRequest {
    /// Build a request for `item`.
    #[must_use]
    pub fn for_item(item: &MediaItem) -> Self {
        Self {
            id: item.id,
            file_path: item.file_path.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    requests: VecDeque<ThumbnailRequest>,
    pending: HashMap<MediaItemId, usize>,
    closed: bool,
}

/// Thread-safe FIFO of thumbnail requests with blocking dequeue.
///
/// `push` performs no deduplication. `push_if_not_pending` skips items that
/// already have a queued request, which keeps purges from growing the queue
/// beyond one request per item.
#[derive(Debug, Default)]
pub struct ThumbnailQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl ThumbnailQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a request. Returns `false` if the queue is closed.
    pub fn push(&self, request: ThumbnailRequest) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        *state.pending.entry(request.id).or_insert(0) += 1;
        state.requests.push_back(request);
        self.available.notify_one();
        true
    }

    /// Append a request unless one for the same item is already queued.
    pub fn push_if_not_pending(&self, request: ThumbnailRequest) -> bool {
        let mut state = self.lock();
        if state.closed || state.pending.contains_key(&request.id) {
            return false;
        }
        state.pending.insert(request.id, 1);
        state.requests.push_back(request);
        self.available.notify_one();
        true
    }

    /// Remove the oldest request without waiting.
    pub fn try_pop(&self) -> Option<ThumbnailRequest> {
        let mut state = self.lock();
        Self::take_front(&mut state)
    }

    /// Wait for the next request.
    ///
    /// Returns `None` once `cancelled` is set or the queue is closed; a
    /// cancelled queue hands out no further requests even if some remain.
    pub fn pop_blocking(&self, cancelled: &AtomicBool) -> Option<ThumbnailRequest> {
        let mut state = self.lock();
        loop {
            if cancelled.load(Ordering::SeqCst) || state.closed {
                return None;
            }
            if let Some(request) = Self::take_front(&mut state) {
                return Some(request);
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn take_front(state: &mut QueueState) -> Option<ThumbnailRequest> {
        let request = state.requests.pop_front()?;
        if let Some(count) = state.pending.get_mut(&request.id) {
            *count -= 1;
            if *count == 0 {
                state.pending.remove(&request.id);
            }
        }
        Some(request)
    }

    /// Close the queue and wake every waiter.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.available.notify_all();
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.lock().requests.len()
    }

    /// Whether no requests are queued.
    pub fn is_empty(&self) -> bool {
        self.lock().requests.is_empty()
    }

    /// Number of queued requests for `id`.
    pub fn pending_for(&self, id: MediaItemId) -> usize {
        self.lock().pending.get(&id).copied().unwrap_or(0)
    }
}

/// Lifecycle of a [`ThumbnailPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Created, worker not launched.
    Idle,
    /// Worker is draining the queue.
    Running,
    /// Cancellation signalled, worker finishing its current item.
    Cancelling,
    /// Worker has exited. Terminal.
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Cancelling => write!(f, "Cancelling"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Everything the worker thread needs, shared with the pipeline handle.
struct WorkerContext {
    queue: Arc<ThumbnailQueue>,
    store: SharedStore,
    renderer: Arc<dyn ThumbnailRenderer>,
    events: Arc<EventChannel<LibraryEvent>>,
    cancelled: Arc<AtomicBool>,
    state: Arc<Mutex<PipelineState>>,
}

/// Single-consumer background thumbnail pipeline.
pub struct ThumbnailPipeline {
    queue: Arc<ThumbnailQueue>,
    store: SharedStore,
    renderer: Arc<dyn ThumbnailRenderer>,
    events: Arc<EventChannel<LibraryEvent>>,
    cancelled: Arc<AtomicBool>,
    state: Arc<Mutex<PipelineState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThumbnailPipeline {
    /// Create an idle pipeline writing results into `store`.
    pub fn new(
        store: SharedStore,
        renderer: Arc<dyn ThumbnailRenderer>,
        events: Arc<EventChannel<LibraryEvent>>,
    ) -> Self {
        Self {
            queue: Arc::new(ThumbnailQueue::new()),
            store,
            renderer,
            events,
            cancelled: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(PipelineState::Idle)),
            worker: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of requests waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// The underlying queue.
    #[must_use]
    pub fn queue(&self) -> &ThumbnailQueue {
        &self.queue
    }

    /// Launch the worker thread. Only valid from `Idle`.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != PipelineState::Idle {
            return Err(ThumbnailError::AlreadyStarted.into());
        }

        let ctx = WorkerContext {
            queue: Arc::clone(&self.queue),
            store: self.store.clone(),
            renderer: Arc::clone(&self.renderer),
            events: Arc::clone(&self.events),
            cancelled: Arc::clone(&self.cancelled),
            state: Arc::clone(&self.state),
        };

        let handle = thread::Builder::new()
            .name("thumbnail-worker".to_string())
            .spawn(move || run_worker(&ctx))
            .map_err(|e| ThumbnailError::SpawnFailed(e.to_string()))?;

        *state = PipelineState::Running;
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!("Thumbnail pipeline started");
        Ok(())
    }

    /// Signal the worker to stop. Irreversible.
    pub fn cancel(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                PipelineState::Idle => *state = PipelineState::Stopped,
                PipelineState::Running => *state = PipelineState::Cancelling,
                PipelineState::Cancelling | PipelineState::Stopped => return,
            }
        }
        self.cancelled.store(true, Ordering::SeqCst);
        self.queue.close();
        info!("Thumbnail pipeline cancellation requested");
    }

    /// Wait for the worker thread to exit. Returns immediately if never started.
    pub fn join(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!("Thumbnail worker thread panicked");
        }
    }

    /// Queue a thumbnail request for `item`. No deduplication.
    pub fn enqueue(&self, item: &MediaItem) {
        if !self.queue.push(ThumbnailRequest::for_item(item)) {
            debug!(item_id = %item.id, "Thumbnail queue closed; request dropped");
        }
    }

    /// Clear every thumbnail and queue each surviving item again.
    ///
    /// Membership is copied under a short lock and the copy is iterated, so
    /// concurrent reconciliation never invalidates the iteration. Items that
    /// already have a queued request are not queued twice. Returns the number
    /// of requests added.
    pub fn purge(&self) -> usize {
        let items = self.store.snapshot();

        {
            let mut store = self.store.write();
            for item in &items {
                if let Some(live) = store.get_mut(item.id) {
                    live.thumbnail = None;
                }
            }
        }
        self.events.emit(&LibraryEvent::ThumbnailsCleared);

        let requeued = items
            .iter()
            .filter(|item| {
                self.queue
                    .push_if_not_pending(ThumbnailRequest::for_item(item))
            })
            .count();
        info!(
            items = items.len(),
            requeued, "Thumbnails purged and re-queued"
        );
        requeued
    }
}

impl Drop for ThumbnailPipeline {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for ThumbnailPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailPipeline")
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

fn run_worker(ctx: &WorkerContext) {
    debug!("Thumbnail worker running");

    while let Some(request) = ctx.queue.pop_blocking(&ctx.cancelled) {
        let Some(item) = ctx.store.item(request.id) else {
            debug!(item_id = %request.id, "Item removed before thumbnailing; skipping");
            continue;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| ctx.renderer.generate(&item)));
        match outcome {
            Ok(Ok(thumbnail)) => {
                if ctx.store.write().set_thumbnail(item.id, thumbnail) {
                    ctx.events
                        .emit(&LibraryEvent::ThumbnailUpdated { id: item.id });
                }
            }
            Ok(Err(e)) => {
                warn!(
                    item_id = %item.id,
                    path = %item.file_path.display(),
                    "Thumbnail generation failed: {e}"
                );
            }
            Err(_) => {
                error!(
                    item_id = %item.id,
                    path = %item.file_path.display(),
                    "Thumbnail renderer panicked"
                );
            }
        }
    }

    *ctx.state.lock().unwrap_or_else(PoisonError::into_inner) = PipelineState::Stopped;
    info!("Thumbnail worker stopped");
}
