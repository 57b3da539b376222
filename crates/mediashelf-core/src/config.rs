//! Application configuration management.
//!
//! Handles loading, saving, and managing the settings the library depends on:
//! the managed media folder and the display target (media monitor).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, FileSystemError, Result};
use crate::events::{EventChannel, OptionsEvent};

/// Read-only view of the options the library needs.
#[cfg_attr(test, mockall::automock)]
pub trait OptionsProvider: Send + Sync {
    /// The managed media folder.
    fn media_folder(&self) -> PathBuf;

    /// Whether a display target (media monitor) is assigned.
    fn is_display_target_configured(&self) -> bool;

    /// Whether the media output may pre-cache the next image on start.
    fn cache_images(&self) -> bool;
}

/// Fixed options, for hosts that manage settings themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticOptions {
    /// The managed media folder.
    pub media_folder: PathBuf,
    /// Whether a display target is assigned.
    pub display_target_configured: bool,
    /// Whether upcoming images are pre-cached.
    pub cache_images: bool,
}

impl OptionsProvider for StaticOptions {
    fn media_folder(&self) -> PathBuf {
        self.media_folder.clone()
    }

    fn is_display_target_configured(&self) -> bool {
        self.display_target_configured
    }

    fn cache_images(&self) -> bool {
        self.cache_images
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Folder holding the media library; drops are copied here.
    #[serde(default = "default_media_folder")]
    pub media_folder: PathBuf,
    /// Identifier of the monitor media is shown on, if any.
    #[serde(default)]
    pub media_monitor_id: Option<String>,
    /// Whether the media output may pre-cache upcoming images.
    #[serde(default = "default_true")]
    pub cache_images: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            media_folder: default_media_folder(),
            media_monitor_id: None,
            cache_images: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, or create defaults if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`, writing defaults there if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found, using defaults");
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                warn!("Failed to save default config: {}", e);
            }
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to read config file: {e}"),
            })
        })?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {e}")))?;

        info!("Loaded config from {}", path.display());
        debug!("Media folder: {}", config.media_folder.display());
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                Error::FileSystem(FileSystemError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    reason: format!("Failed to create config directory: {e}"),
                })
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to write config file: {e}"),
            })
        })?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Whether a non-empty monitor id is set.
    #[must_use]
    pub fn is_display_target_configured(&self) -> bool {
        self.media_monitor_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }

    /// Get the path to the config file.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        config_file_path()
    }
}

/// Get the default media folder.
#[must_use]
pub fn default_media_folder() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Mediashelf")
        .join("Media")
}

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("mediashelf")
        .join("config.json")
}

/// Validate that a directory can hold the media library, creating it if needed.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the path is relative, is not a
/// directory, or cannot be written.
pub fn validate_media_folder(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(Error::Configuration(
            "Media folder must be an absolute path".to_string(),
        ));
    }

    if path.exists() {
        if !path.is_dir() {
            return Err(Error::Configuration(format!(
                "Path exists but is not a directory: {}",
                path.display()
            )));
        }

        let probe = path.join(".mediashelf_write_test");
        match fs::write(&probe, "test") {
            Ok(()) => {
                let _ = fs::remove_file(&probe);
            }
            Err(e) => {
                return Err(Error::Configuration(format!(
                    "Directory is not writable: {} ({})",
                    path.display(),
                    e
                )));
            }
        }
    } else {
        fs::create_dir_all(path).map_err(|e| {
            Error::Configuration(format!("Cannot create directory {}: {}", path.display(), e))
        })?;
    }

    Ok(())
}

/// Owns the configuration, persists changes and announces them.
pub struct ConfigManager {
    config: RwLock<AppConfig>,
    path: PathBuf,
    events: EventChannel<OptionsEvent>,
}

impl ConfigManager {
    /// Create a manager backed by the default config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded.
    pub fn new() -> Result<Self> {
        Self::with_path(config_file_path())
    }

    /// Create a manager backed by `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = AppConfig::load_from(&path)?;
        Ok(Self {
            config: RwLock::new(config),
            path,
            events: EventChannel::new("options"),
        })
    }

    /// Copy of the current configuration.
    pub fn config(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribe to option changes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<OptionsEvent> {
        self.events.subscribe()
    }

    /// Move the media folder. Emits `MediaFolderChanged` if it differs.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder is invalid or the config cannot be saved.
    pub fn set_media_folder(&self, path: PathBuf) -> Result<()> {
        validate_media_folder(&path)?;

        let changed = {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            if config.media_folder == path {
                false
            } else {
                config.media_folder.clone_from(&path);
                config.save_to(&self.path)?;
                true
            }
        };

        if changed {
            info!("Updated media folder to: {}", path.display());
            self.events.emit(&OptionsEvent::MediaFolderChanged(path));
        }
        Ok(())
    }

    /// Assign or clear the display target. Emits `DisplayTargetChanged` if it differs.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be saved.
    pub fn set_media_monitor(&self, monitor_id: Option<String>) -> Result<()> {
        let configured = {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            if config.media_monitor_id == monitor_id {
                return Ok(());
            }
            config.media_monitor_id = monitor_id;
            config.save_to(&self.path)?;
            config.is_display_target_configured()
        };

        info!(configured, "Display target changed");
        self.events
            .emit(&OptionsEvent::DisplayTargetChanged { configured });
        Ok(())
    }

    /// Turn pre-caching of upcoming images on or off.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be saved.
    pub fn set_cache_images(&self, enabled: bool) -> Result<()> {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        if config.cache_images != enabled {
            config.cache_images = enabled;
            config.save_to(&self.path)?;
            debug!(enabled, "Image pre-caching changed");
        }
        Ok(())
    }

    /// Reset to default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be saved.
    pub fn reset(&self) -> Result<()> {
        let defaults = AppConfig::default();
        defaults.save_to(&self.path)?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = defaults;
        Ok(())
    }
}

impl OptionsProvider for ConfigManager {
    fn media_folder(&self) -> PathBuf {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .media_folder
            .clone()
    }

    fn is_display_target_configured(&self) -> bool {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_display_target_configured()
    }

    fn cache_images(&self) -> bool {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cache_images
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("path", &self.path)
            .field("config", &self.config())
            .finish_non_exhaustive()
    }
}
