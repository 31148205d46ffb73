//! Process-wide preferences shared by every open repository

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

fn default_max_history_commits() -> usize {
    20_000
}

fn default_auto_fetch_tick_secs() -> u64 {
    5
}

fn default_dirty_poll_millis() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

/// Preferences that apply to all repositories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPreferences {
    /// Upper bound on commits loaded into the history view
    #[serde(default = "default_max_history_commits")]
    pub max_history_commits: usize,
    #[serde(default = "default_auto_fetch_tick_secs")]
    pub auto_fetch_tick_secs: u64,
    /// How often the update loop polls the watcher's dirty flags
    #[serde(default = "default_dirty_poll_millis")]
    pub dirty_poll_millis: u64,
    #[serde(default = "default_true")]
    pub show_worktrees: bool,
    #[serde(default = "default_true")]
    pub show_submodules: bool,
}

impl Default for AppPreferences {
    fn default() -> Self {
        AppPreferences {
            max_history_commits: default_max_history_commits(),
            auto_fetch_tick_secs: default_auto_fetch_tick_secs(),
            dirty_poll_millis: default_dirty_poll_millis(),
            show_worktrees: true,
            show_submodules: true,
        }
    }
}

impl AppPreferences {
    pub fn auto_fetch_tick(&self) -> Duration {
        Duration::from_secs(self.auto_fetch_tick_secs.max(1))
    }

    pub fn dirty_poll_interval(&self) -> Duration {
        Duration::from_millis(self.dirty_poll_millis.max(10))
    }

    /// Load preferences from a JSON file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = AppPreferences::default();
        assert_eq!(prefs.max_history_commits, 20_000);
        assert_eq!(prefs.auto_fetch_tick(), Duration::from_secs(5));
        assert_eq!(prefs.dirty_poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, r#"{"maxHistoryCommits": 100}"#).unwrap();

        let prefs = AppPreferences::load(&path).unwrap();
        assert_eq!(prefs.max_history_commits, 100);
        assert!(prefs.show_worktrees);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let prefs = AppPreferences::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(prefs, AppPreferences::default());
    }
}
