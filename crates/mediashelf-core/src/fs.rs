//! File system abstraction used by ingestion.
//!
//! [`RealFileSystem`] goes to disk; the in-memory `mock::MockFileSystem`
//! (test builds only) lets ingestion be exercised without touching disk and
//! can be told to fail specific copies.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, FileSystemError, Result};

fn read_error(path: &Path, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        return Error::not_found(path);
    }
    Error::FileSystem(FileSystemError::ReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_error(path: &Path, e: io::Error) -> Error {
    Error::FileSystem(FileSystemError::WriteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn create_dir_error(path: &Path, e: io::Error) -> Error {
    Error::FileSystem(FileSystemError::CreateDirFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn copy_error(src: &Path, dst: &Path, e: io::Error) -> Error {
    Error::FileSystem(FileSystemError::CopyFailed {
        source_path: src.to_path_buf(),
        destination: dst.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Abstraction over the file system operations ingestion needs.
pub trait FileSystem: Send + Sync {
    /// Read a file's contents as a string.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write bytes to a file, creating or truncating it.
    fn write_bytes(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Check if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Check if a path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// List the direct entries of a directory.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Copy a file from `src` to `dst`, returning the bytes copied.
    fn copy(&self, src: &Path, dst: &Path) -> Result<u64>;
}

/// Real file system implementation using `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl RealFileSystem {
    /// Create a new real file system instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| read_error(path, e))
    }

    fn write_bytes(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| create_dir_error(parent, e))?;
        }
        fs::write(path, contents).map_err(|e| write_error(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(path).map_err(|e| read_error(path, e))?;
        Ok(entries.flatten().map(|e| e.path()).collect())
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<u64> {
        if let Some(parent) = dst.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| create_dir_error(parent, e))?;
        }
        fs::copy(src, dst).map_err(|e| copy_error(src, dst, e))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
pub mod mock {
    //! In-memory file system for tests.

    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, RwLock};

    use super::*;

    /// In-memory file system with copy fault injection.
    #[derive(Debug, Clone, Default)]
    pub struct MockFileSystem {
        files: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
        dirs: Arc<RwLock<HashSet<PathBuf>>>,
        failing_copies: Arc<RwLock<HashSet<PathBuf>>>,
        copies: Arc<RwLock<Vec<(PathBuf, PathBuf)>>>,
    }

    impl MockFileSystem {
        /// Create an empty file system.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a file with byte contents, creating parent directories.
        pub fn add_file(&self, path: impl AsRef<Path>, contents: &[u8]) {
            let path = path.as_ref().to_path_buf();
            if let Some(parent) = path.parent() {
                self.add_dir(parent);
            }
            self.files
                .write()
                .expect("lock poisoned")
                .insert(path, contents.to_vec());
        }

        /// Add a directory and all its ancestors.
        pub fn add_dir(&self, path: impl AsRef<Path>) {
            let mut dirs = self.dirs.write().expect("lock poisoned");
            let mut current = path.as_ref().to_path_buf();
            while current.parent().is_some() {
                dirs.insert(current.clone());
                match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                }
            }
        }

        /// Make every copy whose source is `src` fail.
        pub fn fail_copy_from(&self, src: impl AsRef<Path>) {
            self.failing_copies
                .write()
                .expect("lock poisoned")
                .insert(src.as_ref().to_path_buf());
        }

        /// `(source, destination)` pairs of successful copies, in order.
        #[must_use]
        pub fn copies(&self) -> Vec<(PathBuf, PathBuf)> {
            self.copies.read().expect("lock poisoned").clone()
        }

        /// Raw contents of a file, if present.
        #[must_use]
        pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
            self.files
                .read()
                .expect("lock poisoned")
                .get(path.as_ref())
                .cloned()
        }
    }

    impl FileSystem for MockFileSystem {
        fn read_to_string(&self, path: &Path) -> Result<String> {
            self.contents(path)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .ok_or_else(|| Error::not_found(path))
        }

        fn write_bytes(&self, path: &Path, contents: &[u8]) -> Result<()> {
            self.add_file(path, contents);
            Ok(())
        }

        fn exists(&self, path: &Path) -> bool {
            self.is_file(path) || self.is_dir(path)
        }

        fn is_file(&self, path: &Path) -> bool {
            self.files.read().expect("lock poisoned").contains_key(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.dirs.read().expect("lock poisoned").contains(path)
        }

        fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
            if !self.is_dir(path) {
                return Err(Error::not_found(path));
            }
            let files = self.files.read().expect("lock poisoned");
            let dirs = self.dirs.read().expect("lock poisoned");

            let mut entries: Vec<PathBuf> = files
                .keys()
                .chain(dirs.iter())
                .filter(|p| p.parent() == Some(path) && p.as_path() != path)
                .cloned()
                .collect();
            // Real directory listings have no defined order either.
            entries.reverse();
            Ok(entries)
        }

        fn copy(&self, src: &Path, dst: &Path) -> Result<u64> {
            if self
                .failing_copies
                .read()
                .expect("lock poisoned")
                .contains(src)
            {
                return Err(copy_error(
                    src,
                    dst,
                    io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
                ));
            }
            let contents = self.contents(src).ok_or_else(|| Error::not_found(src))?;
            self.write_bytes(dst, &contents)?;
            self.copies
                .write()
                .expect("lock poisoned")
                .push((src.to_path_buf(), dst.to_path_buf()));
            Ok(contents.len() as u64)
        }
    }
}
