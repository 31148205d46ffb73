//! Per-repository settings persistence

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::RepositorySettings;

/// File name of the settings document inside the common git dir
pub const SETTINGS_FILE_NAME: &str = "reposcope.settings.json";

/// Loads and stores [`RepositorySettings`] for a repository
pub trait SettingsStore: Send + Sync {
    /// Load settings. Missing or unreadable files yield defaults.
    fn load(&self, common_dir: &Path) -> RepositorySettings;

    fn save(&self, common_dir: &Path, settings: &RepositorySettings) -> Result<()>;
}

/// Stores settings as pretty-printed JSON next to the repository's config
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSettingsStore;

impl JsonSettingsStore {
    pub fn settings_path(common_dir: &Path) -> PathBuf {
        common_dir.join(SETTINGS_FILE_NAME)
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self, common_dir: &Path) -> RepositorySettings {
        let path = Self::settings_path(common_dir);
        if !path.exists() {
            return RepositorySettings::default();
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to read settings {}: {}", path.display(), e);
                return RepositorySettings::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse settings {}: {}", path.display(), e);
            RepositorySettings::default()
        })
    }

    fn save(&self, common_dir: &Path, settings: &RepositorySettings) -> Result<()> {
        let path = Self::settings_path(common_dir);
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&path, content)?;
        tracing::debug!("Saved settings to {}", path.display());
        Ok(())
    }
}
