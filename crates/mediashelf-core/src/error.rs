//! Error types for Mediashelf core operations.
//!
//! Errors are grouped by domain. The top-level [`Error`] wraps each domain
//! enum so callers can match coarsely (`Error::Ingest(_)`) or precisely
//! (`Error::FileSystem(FileSystemError::CopyFailed { .. })`).

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// File system failures, always carrying the offending path.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// Path does not exist.
    #[error("Path not found: {path}")]
    NotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// Path exists but is unusable for the requested operation.
    #[error("Invalid path {path}: {reason}")]
    InvalidPath {
        /// Offending path.
        path: PathBuf,
        /// Why the path was rejected.
        reason: String,
    },

    /// Reading a file or directory failed.
    #[error("Failed to read {path}: {reason}")]
    ReadFailed {
        /// Path being read.
        path: PathBuf,
        /// Underlying error message.
        reason: String,
    },

    /// Writing a file failed.
    #[error("Failed to write {path}: {reason}")]
    WriteFailed {
        /// Path being written.
        path: PathBuf,
        /// Underlying error message.
        reason: String,
    },

    /// Creating a directory failed.
    #[error("Failed to create directory {path}: {reason}")]
    CreateDirFailed {
        /// Directory being created.
        path: PathBuf,
        /// Underlying error message.
        reason: String,
    },

    /// Copying a file failed.
    #[error("Failed to copy {source_path} to {destination}: {reason}")]
    CopyFailed {
        /// Source file.
        source_path: PathBuf,
        /// Destination file.
        destination: PathBuf,
        /// Underlying error message.
        reason: String,
    },
}

/// Drag-and-drop ingestion failures.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The managed media folder is missing or not a directory.
    #[error("Media folder unavailable: {path}")]
    MediaFolderUnavailable {
        /// Configured media folder.
        path: PathBuf,
    },

    /// Writing the slideshow artifact failed.
    #[error("Failed to build slideshow {path}: {reason}")]
    SlideshowBuildFailed {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error message.
        reason: String,
    },

    /// A slideshow needs at least one slide.
    #[error("Slideshow has no slides")]
    EmptySlideshow,

    /// The background ingestion task panicked or was aborted.
    #[error("Ingestion task failed: {0}")]
    TaskFailed(String),
}

/// Thumbnail rendering failures.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// The renderer could not produce an image for the item.
    #[error("Thumbnail generation failed for {path}: {reason}")]
    GenerationFailed {
        /// Media file path.
        path: PathBuf,
        /// Renderer message.
        reason: String,
    },

    /// The pipeline was started twice.
    #[error("Thumbnail pipeline already started")]
    AlreadyStarted,

    /// The worker thread could not be spawned.
    #[error("Failed to spawn thumbnail worker: {0}")]
    SpawnFailed(String),
}

/// Playback collaborator failures.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Starting media failed.
    #[error("Failed to start media {path}: {reason}")]
    StartFailed {
        /// Media file path.
        path: PathBuf,
        /// Player message.
        reason: String,
    },

    /// Stopping media failed.
    #[error("Failed to stop media {path}: {reason}")]
    StopFailed {
        /// Media file path.
        path: PathBuf,
        /// Player message.
        reason: String,
    },
}

/// Errors that can occur in Mediashelf core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// File system operation failed.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// Ingestion failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Thumbnail generation failed.
    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),

    /// Playback collaborator failed.
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// Media scan failed.
    #[error("Media scan failed for {path}: {reason}")]
    Scan {
        /// Folder being scanned.
        path: PathBuf,
        /// Underlying error message.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`FileSystemError::NotFound`].
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileSystem(FileSystemError::NotFound { path: path.into() })
    }

    /// Shorthand for a [`ThumbnailError::GenerationFailed`].
    pub fn thumbnail_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Thumbnail(ThumbnailError::GenerationFailed {
            path: path.into(),
            reason: reason.into(),
        })
    }

    /// Whether this error means a path was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::FileSystem(FileSystemError::NotFound { .. }) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
