//! Playback state machine.
//!
//! Each item carries `is_active`/`is_changing`. Four transitions move them
//! ([`MediaChange`]); play-button enablement is derived from them on demand
//! and never stored. A single global gate rejects any command while some
//! item is mid-transition.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::OptionsProvider;
use crate::error::Result;
use crate::events::{EventChannel, LibraryEvent};
use crate::media::{MediaClassification, MediaItem, MediaItemId};
use crate::store::{MediaStore, SharedStore};

/// Per-item playback transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaChange {
    /// Start requested: active, changing.
    Starting,
    /// Stop requested: inactive, changing.
    Stopping,
    /// Start completed: active, settled.
    Started,
    /// Stop completed: inactive, settled.
    Stopped,
}

impl MediaChange {
    /// `(is_active, is_changing)` after this transition.
    #[must_use]
    pub const fn flags(self) -> (bool, bool) {
        match self {
            Self::Starting => (true, true),
            Self::Stopping => (false, true),
            Self::Started => (true, false),
            Self::Stopped => (false, false),
        }
    }
}

impl fmt::Display for MediaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "Starting"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Started => write!(f, "Started"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Derived play-button state for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayButtonState {
    /// Item id.
    pub id: MediaItemId,
    /// Whether a start command would currently be allowed.
    pub can_play: bool,
}

/// Play-button policy.
///
/// Images and video need a display target; audio does not. Nothing may start
/// while video or audio is active. Slideshows and unclassified media never
/// play from here.
#[must_use]
pub const fn can_play(
    classification: MediaClassification,
    display_target_configured: bool,
    video_or_audio_active: bool,
) -> bool {
    match classification {
        MediaClassification::Image | MediaClassification::Video => {
            display_target_configured && !video_or_audio_active
        }
        MediaClassification::Audio => !video_or_audio_active,
        MediaClassification::Slideshow | MediaClassification::Unknown => false,
    }
}

/// Media output collaborator.
pub trait MediaPlayer: Send + Sync {
    /// Begin showing or playing `item`. `currently_displayed` is the item the
    /// output is showing right now, if any.
    fn start_media(&self, item: &MediaItem, currently_displayed: Option<&MediaItem>)
    -> Result<()>;

    /// Stop `item`, resolving once output has actually stopped.
    fn stop_media(&self, item: &MediaItem) -> impl Future<Output = Result<()>> + Send;

    /// Pre-load an image that is likely to be shown next.
    fn cache_upcoming_image(&self, item: &MediaItem);

    /// Id of the item the output is currently showing.
    fn current_active_item_id(&self) -> Option<MediaItemId>;
}

/// What a [`PlaybackController::toggle`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The item was started.
    Started,
    /// The item was stopped.
    Stopped,
    /// Another transition is in flight; nothing changed.
    Rejected,
    /// Video or audio is active; the start was refused.
    Blocked,
    /// No item has this id; nothing changed.
    UnknownItem,
}

enum Command {
    Start(MediaItem),
    Stop(MediaItem),
}

/// Drives start/stop commands and keeps item flags consistent.
pub struct PlaybackController<P> {
    store: SharedStore,
    player: P,
    options: Arc<dyn OptionsProvider>,
    events: Arc<EventChannel<LibraryEvent>>,
}

impl<P: MediaPlayer> PlaybackController<P> {
    /// Create a controller.
    pub fn new(
        store: SharedStore,
        player: P,
        options: Arc<dyn OptionsProvider>,
        events: Arc<EventChannel<LibraryEvent>>,
    ) -> Self {
        Self {
            store,
            player,
            options,
            events,
        }
    }

    /// The media output collaborator.
    pub const fn player(&self) -> &P {
        &self.player
    }

    /// Start the item if inactive, stop it if active.
    ///
    /// Returns an error only when the player fails; the item's flags are then
    /// rolled back to their settled pre-command values.
    pub async fn toggle(&self, id: MediaItemId) -> Result<ToggleOutcome> {
        let command = {
            let mut store = self.store.write();
            match Self::admit(&mut store, id) {
                Ok(command) => command,
                Err(outcome) => {
                    match outcome {
                        ToggleOutcome::UnknownItem => error!(item_id = %id, "Media item not found"),
                        ToggleOutcome::Rejected => {
                            debug!(item_id = %id, "Toggle rejected; a transition is in flight");
                        }
                        _ => debug!(item_id = %id, "Toggle blocked; video or audio is active"),
                    }
                    return Ok(outcome);
                }
            }
        };

        match command {
            Command::Stop(item) => {
                self.announce(item.id, MediaChange::Stopping);
                if let Err(e) = self.player.stop_media(&item).await {
                    warn!(item_id = %item.id, "Failed to stop media: {e}");
                    self.handle_media_change(item.id, MediaChange::Started);
                    return Err(e);
                }
                self.handle_media_change(item.id, MediaChange::Stopped);
                info!(item_id = %item.id, "Media stopped");
                Ok(ToggleOutcome::Stopped)
            }
            Command::Start(item) => {
                self.announce(item.id, MediaChange::Starting);
                let displayed = self
                    .player
                    .current_active_item_id()
                    .and_then(|current| self.store.item(current));
                if let Err(e) = self.player.start_media(&item, displayed.as_ref()) {
                    warn!(item_id = %item.id, "Failed to start media: {e}");
                    self.handle_media_change(item.id, MediaChange::Stopped);
                    return Err(e);
                }
                self.handle_media_change(item.id, MediaChange::Started);
                info!(item_id = %item.id, classification = %item.classification, "Media started");

                if self.options.cache_images() {
                    let next = self.store.read().next_image_after(item.id).cloned();
                    if let Some(next) = next {
                        self.player.cache_upcoming_image(&next);
                    }
                }
                Ok(ToggleOutcome::Started)
            }
        }
    }

    /// Gate check and first transition, atomically under the store lock.
    fn admit(
        store: &mut MediaStore,
        id: MediaItemId,
    ) -> std::result::Result<Command, ToggleOutcome> {
        if store.get(id).is_none() {
            return Err(ToggleOutcome::UnknownItem);
        }
        if store.any_changing() {
            return Err(ToggleOutcome::Rejected);
        }
        let video_or_audio_active = store.video_or_audio_active();
        let item = store.get_mut(id).ok_or(ToggleOutcome::UnknownItem)?;

        let change = if item.is_active {
            MediaChange::Stopping
        } else if video_or_audio_active {
            return Err(ToggleOutcome::Blocked);
        } else {
            MediaChange::Starting
        };
        (item.is_active, item.is_changing) = change.flags();

        let snapshot = item.clone();
        Ok(match change {
            MediaChange::Stopping => Command::Stop(snapshot),
            _ => Command::Start(snapshot),
        })
    }

    fn announce(&self, id: MediaItemId, change: MediaChange) {
        let (is_active, is_changing) = change.flags();
        self.events.emit(&LibraryEvent::ItemStateChanged {
            id,
            is_active,
            is_changing,
        });
        self.recompute();
    }

    /// Apply a transition reported by the media output (or by `toggle`).
    ///
    /// Returns `false` and changes nothing if the item is unknown.
    pub fn handle_media_change(&self, id: MediaItemId, change: MediaChange) -> bool {
        {
            let mut store = self.store.write();
            let Some(item) = store.get_mut(id) else {
                debug!(item_id = %id, %change, "Media change for unknown item ignored");
                return false;
            };
            (item.is_active, item.is_changing) = change.flags();
        }
        self.announce(id, change);
        true
    }

    /// Current play-button state of every item, in display order.
    pub fn enablement(&self) -> Vec<PlayButtonState> {
        let display_target_configured = self.options.is_display_target_configured();
        let store = self.store.read();
        let video_or_audio_active = store.video_or_audio_active();
        store
            .items()
            .iter()
            .map(|item| PlayButtonState {
                id: item.id,
                can_play: can_play(
                    item.classification,
                    display_target_configured,
                    video_or_audio_active,
                ),
            })
            .collect()
    }

    /// Recompute enablement and publish it.
    pub fn recompute(&self) {
        self.events
            .emit(&LibraryEvent::PlayEnablementChanged(self.enablement()));
    }
}

impl<P> fmt::Debug for PlaybackController<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
