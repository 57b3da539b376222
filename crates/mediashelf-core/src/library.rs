//! The media library facade.
//!
//! [`MediaLibrary`] owns the store and wires the scanner, reconciler,
//! thumbnail pipeline and playback controller together. External
//! notifications arrive as [`LibraryTrigger`]s, either by direct call or
//! through a listener task fed by a channel.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::OptionsProvider;
use crate::error::Result;
use crate::events::{EventChannel, LibraryEvent, OptionsEvent};
use crate::media::{MediaItem, MediaItemId};
use crate::playback::{MediaChange, MediaPlayer, PlayButtonState, PlaybackController, ToggleOutcome};
use crate::reconcile::{ReconcileDelta, Reconciler};
use crate::scan::MediaSource;
use crate::store::SharedStore;
use crate::thumbnail::{PipelineState, ThumbnailPipeline, ThumbnailRenderer};

/// External notification the library reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryTrigger {
    /// Contents of the media folder changed.
    FolderChanged,
    /// The media folder itself moved.
    MediaFolderChanged(PathBuf),
    /// The display target was assigned or cleared.
    DisplayTargetChanged,
    /// The renderer dropped its thumbnail cache.
    ThumbnailsPurged,
}

impl From<OptionsEvent> for LibraryTrigger {
    fn from(event: OptionsEvent) -> Self {
        match event {
            OptionsEvent::MediaFolderChanged(path) => Self::MediaFolderChanged(path),
            OptionsEvent::DisplayTargetChanged { .. } => Self::DisplayTargetChanged,
        }
    }
}

/// Live, reconciled media library.
pub struct MediaLibrary<P> {
    store: SharedStore,
    source: Arc<dyn MediaSource>,
    renderer: Arc<dyn ThumbnailRenderer>,
    reconciler: Reconciler,
    pipeline: ThumbnailPipeline,
    playback: PlaybackController<P>,
    events: Arc<EventChannel<LibraryEvent>>,
}

impl<P: MediaPlayer> MediaLibrary<P> {
    /// Assemble a library. Nothing runs until [`MediaLibrary::start`].
    pub fn new(
        source: Arc<dyn MediaSource>,
        renderer: Arc<dyn ThumbnailRenderer>,
        player: P,
        options: Arc<dyn OptionsProvider>,
    ) -> Self {
        let store = SharedStore::new();
        let events = Arc::new(EventChannel::new("library"));
        Self {
            reconciler: Reconciler::new(store.clone(), Arc::clone(&events)),
            pipeline: ThumbnailPipeline::new(
                store.clone(),
                Arc::clone(&renderer),
                Arc::clone(&events),
            ),
            playback: PlaybackController::new(
                store.clone(),
                player,
                options,
                Arc::clone(&events),
            ),
            store,
            source,
            renderer,
            events,
        }
    }

    /// Start the thumbnail worker and load the folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker cannot be started.
    pub fn start(&self) -> Result<ReconcileDelta> {
        self.pipeline.start()?;
        Ok(self.reload())
    }

    /// Rescan the media source and reconcile.
    ///
    /// A failed scan is logged and treated as an empty folder.
    pub fn reload(&self) -> ReconcileDelta {
        let files = self.source.list_media_files().unwrap_or_else(|e| {
            warn!("Media scan failed, treating folder as empty: {e}");
            Vec::new()
        });
        let delta = self.reconciler.reconcile(&files, &self.pipeline);
        if !delta.is_empty() {
            self.playback.recompute();
        }
        delta
    }

    /// React to an external notification.
    pub fn handle_trigger(&self, trigger: &LibraryTrigger) {
        debug!(?trigger, "Library trigger");
        match trigger {
            LibraryTrigger::FolderChanged => self.on_folder_changed(),
            LibraryTrigger::MediaFolderChanged(folder) => self.on_media_folder_changed(folder),
            LibraryTrigger::DisplayTargetChanged => self.on_display_target_changed(),
            LibraryTrigger::ThumbnailsPurged => {
                self.on_thumbnails_purged();
            }
        }
    }

    /// The watched folder's contents changed.
    pub fn on_folder_changed(&self) {
        self.reload();
    }

    /// The media folder moved; items from the old folder are dropped.
    pub fn on_media_folder_changed(&self, folder: &std::path::Path) {
        info!(folder = %folder.display(), "Media folder changed");
        self.reload();
    }

    /// The display target changed; only enablement depends on it.
    pub fn on_display_target_changed(&self) {
        self.playback.recompute();
    }

    /// The renderer's cache was purged; clear and requeue every thumbnail.
    pub fn on_thumbnails_purged(&self) -> usize {
        self.pipeline.purge()
    }

    /// Drop the renderer's cache, then regenerate every thumbnail.
    ///
    /// # Errors
    ///
    /// Returns an error if the renderer cannot clear its cache; thumbnails
    /// are left untouched in that case.
    pub fn purge_thumbnail_cache(&self) -> Result<usize> {
        self.renderer.clear_cache()?;
        Ok(self.pipeline.purge())
    }

    /// Start or stop an item, subject to the transition gate.
    ///
    /// # Errors
    ///
    /// Returns an error if the media player fails.
    pub async fn toggle(&self, id: MediaItemId) -> Result<ToggleOutcome> {
        self.playback.toggle(id).await
    }

    /// Apply a transition reported by the media output.
    pub fn handle_media_change(&self, id: MediaItemId, change: MediaChange) -> bool {
        self.playback.handle_media_change(id, change)
    }

    /// Play-button state of every item.
    pub fn enablement(&self) -> Vec<PlayButtonState> {
        self.playback.enablement()
    }

    /// Items in display order.
    pub fn items(&self) -> Vec<MediaItem> {
        self.store.snapshot()
    }

    /// A single item.
    pub fn item(&self, id: MediaItemId) -> Option<MediaItem> {
        self.store.item(id)
    }

    /// Subscribe to collection, thumbnail and playback changes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LibraryEvent> {
        self.events.subscribe()
    }

    /// Thumbnail pipeline lifecycle state.
    pub fn pipeline_state(&self) -> PipelineState {
        self.pipeline.state()
    }

    /// Requests waiting for the thumbnail worker.
    pub fn pending_thumbnails(&self) -> usize {
        self.pipeline.pending()
    }

    /// The playback controller.
    pub const fn playback(&self) -> &PlaybackController<P> {
        &self.playback
    }

    /// Stop the thumbnail worker and wait for it.
    pub fn shutdown(&self) {
        self.pipeline.cancel();
        self.pipeline.join();
        info!("Media library shut down");
    }
}

impl<P: MediaPlayer + 'static> MediaLibrary<P> {
    /// Handle triggers from `rx` until the sender side closes.
    ///
    /// Each trigger runs on the blocking pool since rescans hit the disk.
    pub fn listen<T>(self: &Arc<Self>, mut rx: mpsc::UnboundedReceiver<T>) -> JoinHandle<()>
    where
        T: Into<LibraryTrigger> + Send + 'static,
    {
        let library = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(trigger) = rx.recv().await {
                let trigger = trigger.into();
                let library = Arc::clone(&library);
                if let Err(e) =
                    tokio::task::spawn_blocking(move || library.handle_trigger(&trigger)).await
                {
                    warn!("Library trigger handler failed: {e}");
                }
            }
            debug!("Library trigger channel closed");
        })
    }
}

impl<P> std::fmt::Debug for MediaLibrary<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaLibrary")
            .field("store", &self.store)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::future::Future;
    use std::time::{Duration, Instant, SystemTime};

    use super::*;
    use crate::config::MockOptionsProvider;
    use crate::error::Error;
    use crate::media::{MediaClassification, MediaFile};
    use crate::scan::MockMediaSource;
    use crate::thumbnail::{MockThumbnailRenderer, Thumbnail};

    struct NullPlayer;

    impl MediaPlayer for NullPlayer {
        fn start_media(&self, _item: &MediaItem, _current: Option<&MediaItem>) -> Result<()> {
            Ok(())
        }

        fn stop_media(&self, _item: &MediaItem) -> impl Future<Output = Result<()>> + Send {
            async { Ok(()) }
        }

        fn cache_upcoming_image(&self, _item: &MediaItem) {}

        fn current_active_item_id(&self) -> Option<MediaItemId> {
            None
        }
    }

    fn file(path: &str, classification: MediaClassification) -> MediaFile {
        MediaFile::new(path, classification, SystemTime::UNIX_EPOCH)
    }

    fn options(configured: bool) -> Arc<dyn OptionsProvider> {
        let mut options = MockOptionsProvider::new();
        options
            .expect_is_display_target_configured()
            .return_const(configured);
        options.expect_cache_images().return_const(true);
        Arc::new(options)
    }

    fn idle_renderer() -> Arc<dyn ThumbnailRenderer> {
        Arc::new(MockThumbnailRenderer::new())
    }

    #[test]
    fn test_reload_treats_scan_failure_as_empty() {
        let mut source = MockMediaSource::new();
        let mut seq = mockall::Sequence::new();
        source
            .expect_list_media_files()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![file("/m/a.jpg", MediaClassification::Image)]));
        source
            .expect_list_media_files()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(Error::not_found("/m")));

        let library = MediaLibrary::new(Arc::new(source), idle_renderer(), NullPlayer, options(true));
        assert_eq!(library.reload().added.len(), 1);
        assert_eq!(library.reload().removed.len(), 1);
        assert!(library.items().is_empty());
    }

    #[test]
    fn test_membership_change_republishes_enablement() {
        let mut source = MockMediaSource::new();
        source
            .expect_list_media_files()
            .returning(|| Ok(vec![file("/m/a.mp3", MediaClassification::Audio)]));
        let library = MediaLibrary::new(Arc::new(source), idle_renderer(), NullPlayer, options(false));
        let mut rx = library.subscribe();

        library.handle_trigger(&LibraryTrigger::FolderChanged);

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(matches!(events[0], LibraryEvent::ItemAdded { index: 0, .. }));
        assert!(matches!(
            events.last().unwrap(),
            LibraryEvent::PlayEnablementChanged(states) if states.len() == 1 && states[0].can_play
        ));

        // Unchanged folder: nothing to announce.
        library.reload();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_purge_thumbnail_cache_clears_renderer_first() {
        let mut source = MockMediaSource::new();
        source
            .expect_list_media_files()
            .returning(|| Ok(vec![file("/m/a.jpg", MediaClassification::Image)]));
        let mut renderer = MockThumbnailRenderer::new();
        renderer.expect_clear_cache().times(1).returning(|| Ok(()));

        let library = MediaLibrary::new(Arc::new(source), Arc::new(renderer), NullPlayer, options(true));
        library.reload();
        let id = library.items()[0].id;
        library.store.write().set_thumbnail(id, Thumbnail::new(vec![1]));

        // The add already queued one request, so the purge adds none.
        assert_eq!(library.purge_thumbnail_cache().unwrap(), 0);
        assert!(library.item(id).unwrap().thumbnail.is_none());
        assert_eq!(library.pending_thumbnails(), 1);
    }

    #[test]
    fn test_purge_aborts_when_cache_clear_fails() {
        let mut source = MockMediaSource::new();
        source
            .expect_list_media_files()
            .returning(|| Ok(vec![file("/m/a.jpg", MediaClassification::Image)]));
        let mut renderer = MockThumbnailRenderer::new();
        renderer
            .expect_clear_cache()
            .returning(|| Err(Error::Configuration("cache locked".to_string())));

        let library = MediaLibrary::new(Arc::new(source), Arc::new(renderer), NullPlayer, options(true));
        library.reload();
        let id = library.items()[0].id;
        library.store.write().set_thumbnail(id, Thumbnail::new(vec![1]));

        assert!(library.purge_thumbnail_cache().is_err());
        assert!(library.item(id).unwrap().thumbnail.is_some());
    }

    #[test]
    fn test_options_event_conversion() {
        assert_eq!(
            LibraryTrigger::from(OptionsEvent::MediaFolderChanged(PathBuf::from("/new"))),
            LibraryTrigger::MediaFolderChanged(PathBuf::from("/new"))
        );
        assert_eq!(
            LibraryTrigger::from(OptionsEvent::DisplayTargetChanged { configured: false }),
            LibraryTrigger::DisplayTargetChanged
        );
    }

    #[tokio::test]
    async fn test_listener_applies_triggers() {
        let mut source = MockMediaSource::new();
        source
            .expect_list_media_files()
            .returning(|| Ok(vec![file("/m/a.jpg", MediaClassification::Image)]));
        let library = Arc::new(MediaLibrary::new(
            Arc::new(source),
            idle_renderer(),
            NullPlayer,
            options(true),
        ));

        let (tx, rx) = mpsc::unbounded_channel::<LibraryTrigger>();
        let listener = library.listen(rx);
        tx.send(LibraryTrigger::FolderChanged).unwrap();
        drop(tx);
        listener.await.unwrap();

        assert_eq!(library.items().len(), 1);
    }

    #[test]
    fn test_start_fills_thumbnails_and_shutdown_stops() {
        let mut source = MockMediaSource::new();
        source.expect_list_media_files().returning(|| {
            Ok(vec![
                file("/m/a.jpg", MediaClassification::Image),
                file("/m/b.mp4", MediaClassification::Video),
            ])
        });
        let mut renderer = MockThumbnailRenderer::new();
        renderer
            .expect_generate()
            .times(2)
            .returning(|_| Ok(Thumbnail::new(vec![1, 2, 3])));

        let library = MediaLibrary::new(Arc::new(source), Arc::new(renderer), NullPlayer, options(true));
        assert_eq!(library.start().unwrap().added.len(), 2);

        let deadline = Instant::now() + Duration::from_secs(5);
        while library.items().iter().any(|i| i.thumbnail.is_none()) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(library.items().iter().all(|i| i.thumbnail.is_some()));

        library.shutdown();
        assert_eq!(library.pipeline_state(), PipelineState::Stopped);
    }
}
