//! Per-repository persisted settings

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{BranchSortMode, Filter, IssueTrackerRule, TagSortMode};

/// Maximum number of remembered commit messages
pub const MAX_COMMIT_MESSAGE_HISTORY: usize = 10;

fn default_true() -> bool {
    true
}

fn default_auto_fetch_interval() -> u32 {
    10
}

/// Settings stored alongside each repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySettings {
    /// Active history filters, in the order they were set
    #[serde(default)]
    pub histories_filters: Vec<Filter>,
    #[serde(default)]
    pub local_branch_sort_mode: BranchSortMode,
    #[serde(default)]
    pub remote_branch_sort_mode: BranchSortMode,
    #[serde(default)]
    pub tag_sort_mode: TagSortMode,
    /// Paths of expanded branch tree folders
    #[serde(default)]
    pub expanded_branch_nodes: BTreeSet<String>,
    /// Recently used commit messages, most recent first
    #[serde(default)]
    pub commit_messages: Vec<String>,
    /// Unfinished commit message
    #[serde(default)]
    pub last_commit_message: String,
    #[serde(default = "default_true")]
    pub include_untracked_in_local_changes: bool,
    #[serde(default)]
    pub enable_auto_fetch: bool,
    /// Minutes between automatic fetches
    #[serde(default = "default_auto_fetch_interval")]
    pub auto_fetch_interval: u32,
    #[serde(default)]
    pub enable_sign_off_for_commit: bool,
    #[serde(default)]
    pub issue_tracker_rules: Vec<IssueTrackerRule>,
    #[serde(default)]
    pub preferred_remote: Option<String>,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        RepositorySettings {
            histories_filters: Vec::new(),
            local_branch_sort_mode: BranchSortMode::default(),
            remote_branch_sort_mode: BranchSortMode::default(),
            tag_sort_mode: TagSortMode::default(),
            expanded_branch_nodes: BTreeSet::new(),
            commit_messages: Vec::new(),
            last_commit_message: String::new(),
            include_untracked_in_local_changes: true,
            enable_auto_fetch: false,
            auto_fetch_interval: default_auto_fetch_interval(),
            enable_sign_off_for_commit: false,
            issue_tracker_rules: Vec::new(),
            preferred_remote: None,
        }
    }
}

impl RepositorySettings {
    /// Remember a used commit message at the front of the history
    pub fn push_commit_message(&mut self, message: &str) {
        let message = message.trim();
        if message.is_empty() {
            return;
        }

        self.commit_messages.retain(|m| m != message);
        self.commit_messages.insert(0, message.to_string());
        self.commit_messages.truncate(MAX_COMMIT_MESSAGE_HISTORY);
    }

    /// Auto-fetch interval in minutes, never below one
    pub fn auto_fetch_minutes(&self) -> u32 {
        self.auto_fetch_interval.max(1)
    }
}
