//! Drag-and-drop ingestion.
//!
//! A drop is filtered down to supported media files (folders are flattened
//! one level), then either packaged as a single slideshow artifact or copied
//! file by file into the managed media folder. The whole operation runs on a
//! blocking background task; progress goes out on an [`EventChannel`] and a
//! terminal notification is emitted exactly once per drop, whatever happened.
//!
//! Ingestion never touches the store: new files are picked up by the next
//! folder scan.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::config::OptionsProvider;
use crate::error::{IngestError, Result};
use crate::events::{CopyProgress, EventChannel};
use crate::fs::FileSystem;
use crate::media::{FileTypes, extension_of};
use crate::slideshow::{SlideshowBuilder, slideshow_file_name};

/// Prefix identifying a drop that originated from a slideshow source.
pub const SLIDESHOW_MARKER_PREFIX: &str = "OnlyV|";

/// A dropped payload: file/folder references plus optional text data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropPayload {
    /// Dropped files and folders.
    pub paths: Vec<PathBuf>,
    /// Accompanying text, possibly a slideshow marker.
    pub text: Option<String>,
}

impl DropPayload {
    /// A payload of plain file references.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            text: None,
        }
    }

    /// Attach text data.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// The slideshow marker carried by this payload, if well-formed.
    #[must_use]
    pub fn slideshow_marker(&self) -> Option<SlideshowMarker> {
        self.text.as_deref().and_then(SlideshowMarker::parse)
    }
}

/// Parsed `OnlyV|<title>|...` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideshowMarker {
    /// Slideshow title; becomes the artifact file name.
    pub title: String,
}

impl SlideshowMarker {
    /// Whether `text` starts with the marker prefix (ignoring ASCII case).
    #[must_use]
    pub fn has_prefix(text: &str) -> bool {
        text.get(..SLIDESHOW_MARKER_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(SLIDESHOW_MARKER_PREFIX))
    }

    /// Parse a marker. The title is trimmed; returns `None` when the prefix is
    /// missing or the title is blank or not usable as a file name.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        if !Self::has_prefix(text) {
            return None;
        }
        let title = text.split('|').nth(1)?.trim();
        if title.is_empty()
            || title == "."
            || title == ".."
            || title.contains(['/', '\\'])
        {
            return None;
        }
        Some(Self {
            title: title.to_string(),
        })
    }
}

/// Result of one drop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Items ingested: 1 for a slideshow, N for N copied files.
    pub count: usize,
    /// Whether any error occurred. `count` then holds the files copied
    /// before the failure.
    pub had_error: bool,
}

impl IngestOutcome {
    /// The user-facing summary of this outcome.
    #[must_use]
    pub const fn summary(&self) -> IngestSummary {
        if self.had_error {
            IngestSummary::CopyError
        } else {
            match self.count {
                0 => IngestSummary::NoSupportedFiles,
                1 => IngestSummary::FileCopied,
                n => IngestSummary::FilesCopied(n),
            }
        }
    }
}

/// User-facing aggregate message for a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestSummary {
    /// Nothing supported was dropped (or everything already existed).
    NoSupportedFiles,
    /// One item was ingested.
    FileCopied,
    /// Several items were ingested.
    FilesCopied(usize),
    /// Something failed; the count is not reported.
    CopyError,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSupportedFiles => write!(f, "No supported files"),
            Self::FileCopied => write!(f, "File copied"),
            Self::FilesCopied(n) => write!(f, "{n} files copied"),
            Self::CopyError => write!(f, "Could not copy media files"),
        }
    }
}

fn is_supported(types: &dyn FileTypes, path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| types.is_extension_supported(&ext))
}

/// Supported files in `paths`, sorted.
///
/// Folders contribute their immediate files only; subfolders are ignored.
///
/// # Errors
///
/// Returns an error if a dropped folder cannot be listed.
pub fn supported_files<F: FileSystem + ?Sized>(
    fs: &F,
    types: &dyn FileTypes,
    paths: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let mut result = Vec::new();
    for path in paths {
        if fs.is_dir(path) {
            for entry in fs.read_dir(path)? {
                if fs.is_file(&entry) && is_supported(types, &entry) {
                    result.push(entry);
                }
            }
        } else if is_supported(types, path) {
            result.push(path.clone());
        }
    }
    result.sort();
    trace!(count = result.len(), "Supported files in drop");
    Ok(result)
}

/// Copies or packages dropped media into the managed folder.
pub struct IngestService<F> {
    fs: Arc<F>,
    file_types: Arc<dyn FileTypes>,
    options: Arc<dyn OptionsProvider>,
    progress: EventChannel<CopyProgress>,
}

impl<F: FileSystem + 'static> IngestService<F> {
    /// Create a service.
    pub fn new(
        fs: Arc<F>,
        file_types: Arc<dyn FileTypes>,
        options: Arc<dyn OptionsProvider>,
    ) -> Self {
        Self {
            fs,
            file_types,
            options,
            progress: EventChannel::new("ingest-progress"),
        }
    }

    /// Subscribe to copy progress.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CopyProgress> {
        self.progress.subscribe()
    }

    /// Whether the payload holds any supported file. Cheap enough for
    /// drag-over feedback; unreadable folders count as nothing.
    pub fn can_accept(&self, payload: &DropPayload) -> bool {
        match supported_files(self.fs.as_ref(), self.file_types.as_ref(), &payload.paths) {
            Ok(files) => !files.is_empty(),
            Err(e) => {
                debug!("Drop evaluation failed: {e}");
                false
            }
        }
    }

    /// Run a drop on the blocking thread pool.
    pub fn spawn(self: &Arc<Self>, payload: DropPayload) -> JoinHandle<IngestOutcome> {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || service.ingest(&payload))
    }

    /// Run a drop in the background and wait for it.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::TaskFailed`] if the background task panicked.
    /// Copy failures are reported through [`IngestOutcome::had_error`].
    pub async fn ingest_in_background(self: &Arc<Self>, payload: DropPayload) -> Result<IngestOutcome> {
        self.spawn(payload)
            .await
            .map_err(|e| IngestError::TaskFailed(e.to_string()).into())
    }

    /// Process a drop synchronously.
    pub fn ingest(&self, payload: &DropPayload) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();
        if let Err(e) = self.run(payload, &mut outcome.count) {
            error!("Could not copy media files: {e}");
            outcome.had_error = true;
        }
        self.progress.emit(&CopyProgress::operation_finished());

        info!(
            count = outcome.count,
            had_error = outcome.had_error,
            "Drop processed"
        );
        outcome
    }

    fn run(&self, payload: &DropPayload, count: &mut usize) -> Result<()> {
        let files = supported_files(self.fs.as_ref(), self.file_types.as_ref(), &payload.paths)?;
        if files.is_empty() {
            return Ok(());
        }

        let media_folder = self.options.media_folder();
        if !self.fs.is_dir(&media_folder) {
            return Err(IngestError::MediaFolderUnavailable { path: media_folder }.into());
        }

        match payload.slideshow_marker() {
            Some(marker) if files.len() > 1 => {
                self.package_slideshow(&media_folder, &marker, &files)?;
                *count = 1;
                Ok(())
            }
            _ => self.copy_files(&media_folder, &files, count),
        }
    }

    fn package_slideshow(
        &self,
        media_folder: &Path,
        marker: &SlideshowMarker,
        files: &[PathBuf],
    ) -> Result<()> {
        let mut builder = SlideshowBuilder::new(false, false);
        let last = files.len() - 1;
        for (n, file) in files.iter().enumerate() {
            builder.add_slide(file, n == 0, n == last, false, false);
        }

        let destination = media_folder.join(slideshow_file_name(&marker.title));
        builder.build(self.fs.as_ref(), &destination, true)?;
        info!(title = %marker.title, slides = files.len(), "Dropped files packaged as slideshow");
        Ok(())
    }

    fn copy_files(&self, media_folder: &Path, files: &[PathBuf], count: &mut usize) -> Result<()> {
        for file in files {
            let Some(file_name) = file.file_name() else {
                continue;
            };
            let destination = media_folder.join(file_name);
            if self.fs.exists(&destination) {
                debug!(path = %destination.display(), "Destination exists; skipping");
                continue;
            }

            self.progress.emit(&CopyProgress::starting(&destination));
            self.fs.copy(file, &destination)?;
            *count += 1;
            self.progress.emit(&CopyProgress::finished(&destination));
        }
        Ok(())
    }
}

impl<F> fmt::Debug for IngestService<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestService").finish_non_exhaustive()
    }
}
