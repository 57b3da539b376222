//! Media item model and file-type classification.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::slideshow::SLIDESHOW_EXTENSION;
use crate::thumbnail::Thumbnail;

/// Opaque, never-reused identifier for a [`MediaItem`].
///
/// Identifiers are handed out by the store when a path is first seen. They are
/// not derived from the path, so removing and re-adding a file yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaItemId(u64);

impl MediaItemId {
    /// Wrap a raw identifier value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MediaItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media-{}", self.0)
    }
}

/// Broad media classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaClassification {
    /// Still image.
    Image,
    /// Audio-only media.
    Audio,
    /// Video media.
    Video,
    /// Packaged slideshow artifact.
    Slideshow,
    /// Anything the file-type table does not recognise.
    #[default]
    Unknown,
}

impl MediaClassification {
    /// Video and audio are mutually exclusive on the output side.
    #[must_use]
    pub const fn is_video_or_audio(self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }
}

impl fmt::Display for MediaClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "Image"),
            Self::Audio => write!(f, "Audio"),
            Self::Video => write!(f, "Video"),
            Self::Slideshow => write!(f, "Slideshow"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A file reported by the media source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Classification derived from the extension.
    pub classification: MediaClassification,
    /// Source file modification time.
    pub last_changed: SystemTime,
}

impl MediaFile {
    /// Create a media file entry.
    pub fn new(
        path: impl Into<PathBuf>,
        classification: MediaClassification,
        last_changed: SystemTime,
    ) -> Self {
        Self {
            path: path.into(),
            classification,
            last_changed,
        }
    }
}

/// One playable or displayable asset in the library.
#[derive(Debug, Clone)]
pub struct MediaItem {
    /// Stable identifier.
    pub id: MediaItemId,
    /// Absolute file path; the identity key across scans.
    pub file_path: PathBuf,
    /// Display name (file stem).
    pub name: String,
    /// Classification, fixed at creation.
    pub classification: MediaClassification,
    /// Source modification time, for display only.
    pub last_changed: SystemTime,
    /// Media is currently playing or displayed.
    pub is_active: bool,
    /// A start/stop transition is in flight.
    pub is_changing: bool,
    /// Rendered preview, absent until the pipeline fills it.
    pub thumbnail: Option<Thumbnail>,
}

impl MediaItem {
    /// Build a fresh, inactive item from a scanned file.
    #[must_use]
    pub fn from_file(id: MediaItemId, file: &MediaFile) -> Self {
        Self {
            id,
            name: display_name(&file.path),
            file_path: file.path.clone(),
            classification: file.classification,
            last_changed: file.last_changed,
            is_active: false,
            is_changing: false,
            thumbnail: None,
        }
    }

    /// Case-insensitive identity key of this item's path.
    #[must_use]
    pub fn path_key(&self) -> String {
        path_key(&self.file_path)
    }

    /// Whether this item is an active video or audio item.
    #[must_use]
    pub const fn is_active_video_or_audio(&self) -> bool {
        self.is_active && self.classification.is_video_or_audio()
    }
}

/// Case-insensitive comparison key for a path.
#[must_use]
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// File name without extension, falling back to the full path.
#[must_use]
pub fn display_name(path: &Path) -> String {
    path.file_stem().map_or_else(
        || path.to_string_lossy().into_owned(),
        |s| s.to_string_lossy().into_owned(),
    )
}

/// Lowercased extension of `path`, without the leading dot.
#[must_use]
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(OsStr::to_str)
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
}

/// File-type support predicate.
#[cfg_attr(test, mockall::automock)]
pub trait FileTypes: Send + Sync {
    /// Whether files with this extension (no leading dot, any case) are supported.
    fn is_extension_supported(&self, ext: &str) -> bool;

    /// Classify a file by its extension.
    fn classify(&self, path: &Path) -> MediaClassification;
}

/// Default image extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp"];

/// Default audio extensions.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "wma", "m4a", "aac", "flac", "ogg"];

/// Default video extensions.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "avi", "mkv", "wmv", "mpg", "mpeg"];

/// Extension-table implementation of [`FileTypes`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionFileTypes;

impl ExtensionFileTypes {
    /// Create the default table.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn classify_extension(ext: &str) -> MediaClassification {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaClassification::Image
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaClassification::Audio
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaClassification::Video
        } else if ext == SLIDESHOW_EXTENSION {
            MediaClassification::Slideshow
        } else {
            MediaClassification::Unknown
        }
    }
}

impl FileTypes for ExtensionFileTypes {
    fn is_extension_supported(&self, ext: &str) -> bool {
        Self::classify_extension(ext) != MediaClassification::Unknown
    }

    fn classify(&self, path: &Path) -> MediaClassification {
        extension_of(path).map_or(MediaClassification::Unknown, |ext| {
            Self::classify_extension(&ext)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_path_key_is_case_insensitive() {
        assert_eq!(
            path_key(Path::new("/Media/Clip.MP4")),
            path_key(Path::new("/media/clip.mp4"))
        );
    }

    #[test]
    fn test_display_name_strips_extension() {
        assert_eq!(display_name(Path::new("/media/Sunset.Beach.jpg")), "Sunset.Beach");
        assert_eq!(display_name(Path::new("/media/noext")), "noext");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("a.JPG")), Some("jpg".to_string()));
        assert_eq!(extension_of(Path::new("a")), None);
        assert_eq!(extension_of(Path::new("a.")), None);
    }

    #[test]
    fn test_default_file_types() {
        let types = ExtensionFileTypes::new();
        assert!(types.is_extension_supported("JPG"));
        assert!(types.is_extension_supported(".mp4"));
        assert!(!types.is_extension_supported("txt"));
        assert_eq!(types.classify(Path::new("/m/a.mp3")), MediaClassification::Audio);
        assert_eq!(types.classify(Path::new("/m/a.MOV")), MediaClassification::Video);
        assert_eq!(types.classify(Path::new("/m/a.png")), MediaClassification::Image);
        assert_eq!(types.classify(Path::new("/m/a.doc")), MediaClassification::Unknown);
    }

    #[test]
    fn test_slideshow_artifacts_are_recognised() {
        let types = ExtensionFileTypes::new();
        assert!(types.is_extension_supported("omslide"));
        assert_eq!(
            types.classify(Path::new("/m/Hymns.OMSLIDE")),
            MediaClassification::Slideshow
        );
        assert!(!MediaClassification::Slideshow.is_video_or_audio());
    }

    #[test]
    fn test_item_from_file() {
        let file = MediaFile::new(
            "/media/Intro.mp4",
            MediaClassification::Video,
            SystemTime::UNIX_EPOCH,
        );
        let item = MediaItem::from_file(MediaItemId::from_raw(7), &file);
        assert_eq!(item.name, "Intro");
        assert_eq!(item.id.to_string(), "media-7");
        assert!(!item.is_active);
        assert!(!item.is_changing);
        assert!(item.thumbnail.is_none());
        assert!(!item.is_active_video_or_audio());
    }

    #[test]
    fn test_classification_serde() {
        let json = serde_json::to_string(&MediaClassification::Video).unwrap();
        assert_eq!(json, "\"video\"");
    }
}
