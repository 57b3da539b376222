//! `Mediashelf` Core Library
//!
//! This crate provides the core of the `Mediashelf` media presenter:
//! - A live media library reconciled against a watched folder
//! - Background thumbnail generation with cache purge
//! - The playback state machine (transition gate, video/audio exclusivity)
//! - Drag-and-drop ingestion, as plain copies or a packaged slideshow
//! - Application configuration and logging setup
//!
//! # Error Handling
//!
//! Errors are typed per domain and wrapped by [`Error`]. See the [`error`]
//! module for details.
//!
//! ```rust,ignore
//! use mediashelf_core::{DropPayload, IngestService, Result};
//!
//! async fn drop_files(service: &Arc<IngestService<RealFileSystem>>) -> Result<()> {
//!     let outcome = service
//!         .ingest_in_background(DropPayload::from_paths(["/tmp/a.jpg"]))
//!         .await?;
//!     println!("{}", outcome.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod fs;
pub mod ingest;
pub mod library;
pub mod logging;
pub mod media;
pub mod playback;
pub mod reconcile;
pub mod scan;
pub mod slideshow;
pub mod store;
pub mod thumbnail;

pub use config::{
    AppConfig, ConfigManager, OptionsProvider, StaticOptions, default_media_folder,
    validate_media_folder,
};
pub use error::{
    Error, FileSystemError, IngestError, PlaybackError, Result, ThumbnailError,
};
pub use events::{CopyProgress, CopyStatus, EventChannel, LibraryEvent, OptionsEvent};
pub use fs::{FileSystem, RealFileSystem};
pub use ingest::{
    DropPayload, IngestOutcome, IngestService, IngestSummary, SLIDESHOW_MARKER_PREFIX,
    SlideshowMarker, supported_files,
};
pub use library::{LibraryTrigger, MediaLibrary};
pub use logging::{
    ConsoleOutput, FileOutput, LogProfile, LogRotation, LoggingConfig, LoggingError, LoggingGuard,
};
pub use media::{
    ExtensionFileTypes, FileTypes, MediaClassification, MediaFile, MediaItem, MediaItemId,
};
pub use playback::{
    MediaChange, MediaPlayer, PlayButtonState, PlaybackController, ToggleOutcome, can_play,
};
pub use reconcile::{ReconcileDelta, ReconcilePlan, Reconciler};
pub use scan::{FolderMediaSource, MediaSource};
pub use slideshow::{SLIDESHOW_EXTENSION, Slide, SlideshowBuilder, SlideshowFile};
pub use store::{MediaStore, SharedStore};
pub use thumbnail::{
    PipelineState, Thumbnail, ThumbnailPipeline, ThumbnailQueue, ThumbnailRenderer,
    ThumbnailRequest,
};
