//! Slideshow artifact packaging.
//!
//! A slideshow is a JSON container listing ordered slide entries. Building
//! always replaces the whole file; there is no merge with an existing one.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, FileSystemError, IngestError, Result};
use crate::fs::FileSystem;

/// File extension (without dot) of slideshow artifacts.
pub const SLIDESHOW_EXTENSION: &str = "omslide";

/// Container format version written by [`SlideshowBuilder`].
pub const SLIDESHOW_FORMAT_VERSION: u32 = 1;

/// One entry in a slideshow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    /// Source image path.
    pub file_path: PathBuf,
    /// First slide of the sequence.
    pub is_first: bool,
    /// Last slide of the sequence.
    pub is_last: bool,
    /// Per-slide loop flag.
    pub loop_flag: bool,
    /// Per-slide auto-advance flag.
    pub auto_play_flag: bool,
}

/// Serialized slideshow container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideshowFile {
    /// Container format version.
    pub version: u32,
    /// Advance slides automatically.
    pub auto_play: bool,
    /// Restart after the last slide.
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    /// Slides in presentation order.
    pub slides: Vec<Slide>,
}

impl SlideshowFile {
    /// Read a slideshow artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a slideshow.
    pub fn load<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> Result<Self> {
        let content = fs.read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Accumulates slides and writes the artifact.
#[derive(Debug, Clone, Default)]
pub struct SlideshowBuilder {
    /// Container-level auto-advance.
    pub auto_play: bool,
    /// Container-level loop.
    pub loop_playback: bool,
    slides: Vec<Slide>,
}

impl SlideshowBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new(auto_play: bool, loop_playback: bool) -> Self {
        Self {
            auto_play,
            loop_playback,
            slides: Vec::new(),
        }
    }

    /// Append a slide.
    pub fn add_slide(
        &mut self,
        file_path: impl Into<PathBuf>,
        is_first: bool,
        is_last: bool,
        loop_flag: bool,
        auto_play_flag: bool,
    ) -> &mut Self {
        self.slides.push(Slide {
            file_path: file_path.into(),
            is_first,
            is_last,
            loop_flag,
            auto_play_flag,
        });
        self
    }

    /// Slides added so far.
    #[must_use]
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    /// Write the artifact to `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no slides, if `destination` exists and
    /// `overwrite` is false, or if writing fails.
    pub fn build<F: FileSystem + ?Sized>(
        &self,
        fs: &F,
        destination: &Path,
        overwrite: bool,
    ) -> Result<()> {
        if self.slides.is_empty() {
            return Err(IngestError::EmptySlideshow.into());
        }
        if !overwrite && fs.exists(destination) {
            return Err(Error::FileSystem(FileSystemError::InvalidPath {
                path: destination.to_path_buf(),
                reason: "slideshow already exists".to_string(),
            }));
        }

        let file = SlideshowFile {
            version: SLIDESHOW_FORMAT_VERSION,
            auto_play: self.auto_play,
            loop_playback: self.loop_playback,
            slides: self.slides.clone(),
        };
        let content = serde_json::to_vec_pretty(&file)?;
        fs.write_bytes(destination, &content).map_err(|e| {
            Error::Ingest(IngestError::SlideshowBuildFailed {
                path: destination.to_path_buf(),
                reason: e.to_string(),
            })
        })?;

        info!(
            path = %destination.display(),
            slides = self.slides.len(),
            "Slideshow written"
        );
        Ok(())
    }
}

/// Artifact file name for a slideshow titled `title`.
#[must_use]
pub fn slideshow_file_name(title: &str) -> String {
    format!("{title}.{SLIDESHOW_EXTENSION}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn three_slides() -> SlideshowBuilder {
        let mut builder = SlideshowBuilder::new(false, false);
        builder
            .add_slide("/drop/1.jpg", true, false, false, false)
            .add_slide("/drop/2.jpg", false, false, false, false)
            .add_slide("/drop/3.jpg", false, true, false, false);
        builder
    }

    #[test]
    fn test_build_writes_container() {
        let fs = MockFileSystem::new();
        let dest = Path::new("/media/Show.omslide");

        three_slides().build(&fs, dest, true).unwrap();

        let file = SlideshowFile::load(&fs, dest).unwrap();
        assert_eq!(file.version, SLIDESHOW_FORMAT_VERSION);
        assert!(!file.auto_play);
        assert!(!file.loop_playback);
        assert_eq!(file.slides.len(), 3);
        assert!(file.slides[0].is_first);
        assert!(file.slides[2].is_last);
    }

    #[test]
    fn test_build_overwrites_existing() {
        let fs = MockFileSystem::new();
        fs.add_file("/media/Show.omslide", b"old");
        let dest = Path::new("/media/Show.omslide");

        three_slides().build(&fs, dest, true).unwrap();
        assert_eq!(SlideshowFile::load(&fs, dest).unwrap().slides.len(), 3);
    }

    #[test]
    fn test_build_refuses_existing_without_overwrite() {
        let fs = MockFileSystem::new();
        fs.add_file("/media/Show.omslide", b"old");

        let result = three_slides().build(&fs, Path::new("/media/Show.omslide"), false);
        assert!(matches!(
            result,
            Err(Error::FileSystem(FileSystemError::InvalidPath { .. }))
        ));
        assert_eq!(fs.contents("/media/Show.omslide").unwrap(), b"old");
    }

    #[test]
    fn test_empty_builder_is_rejected() {
        let fs = MockFileSystem::new();
        let result = SlideshowBuilder::default().build(&fs, Path::new("/media/x.omslide"), true);
        assert!(matches!(
            result,
            Err(Error::Ingest(IngestError::EmptySlideshow))
        ));
    }

    #[test]
    fn test_loop_field_name() {
        let json = serde_json::to_string(&SlideshowFile {
            version: 1,
            auto_play: false,
            loop_playback: true,
            slides: Vec::new(),
        })
        .unwrap();
        assert!(json.contains("\"loop\":true"));
        assert_eq!(slideshow_file_name("Hymns"), "Hymns.omslide");
    }
}
