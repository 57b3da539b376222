//! Media folder scanning.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::config::OptionsProvider;
use crate::error::{Error, Result};
use crate::media::{FileTypes, MediaClassification, MediaFile};

/// Source of the media files that make up the library.
#[cfg_attr(test, mockall::automock)]
pub trait MediaSource: Send + Sync {
    /// Every media file currently present, in display order.
    fn list_media_files(&self) -> Result<Vec<MediaFile>>;
}

/// Non-recursive scanner over the configured media folder.
///
/// The folder is read from the options on every scan, so a media-folder
/// change takes effect on the next reload.
pub struct FolderMediaSource {
    options: Arc<dyn OptionsProvider>,
    file_types: Arc<dyn FileTypes>,
}

impl FolderMediaSource {
    /// Create a scanner.
    pub fn new(options: Arc<dyn OptionsProvider>, file_types: Arc<dyn FileTypes>) -> Self {
        Self {
            options,
            file_types,
        }
    }

    /// Scan `folder` directly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Scan`] if the folder is missing or cannot be listed.
    pub fn scan_folder(&self, folder: &Path) -> Result<Vec<MediaFile>> {
        if !folder.is_dir() {
            return Err(Error::Scan {
                path: folder.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|e| Error::Scan {
                path: folder.to_path_buf(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let classification = self.file_types.classify(path);
            if classification == MediaClassification::Unknown {
                trace!(path = %path.display(), "Skipping unsupported file");
                continue;
            }
            let last_changed = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push(MediaFile::new(path, classification, last_changed));
        }

        debug!(folder = %folder.display(), count = files.len(), "Media folder scanned");
        Ok(files)
    }
}

impl MediaSource for FolderMediaSource {
    fn list_media_files(&self) -> Result<Vec<MediaFile>> {
        self.scan_folder(&self.options.media_folder())
    }
}

impl std::fmt::Debug for FolderMediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderMediaSource")
            .field("folder", &self.options.media_folder())
            .finish_non_exhaustive()
    }
}
