//! Branch, tag and stash models

use serde::{Deserialize, Serialize};

/// Branch information, local or remote-tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// Full reference path, `refs/heads/...` or `refs/remotes/...`
    pub full_name: String,
    /// Name without the `refs/heads/` or `refs/remotes/<remote>/` prefix
    pub name: String,
    /// Commit the branch points at
    pub head: String,
    /// Full reference path of the upstream branch
    pub upstream: Option<String>,
    pub track_status: Option<AheadBehind>,
    pub is_current: bool,
    pub is_local: bool,
    /// Remote name for remote-tracking branches
    pub remote: Option<String>,
    /// Unix timestamp of the head commit's committer date
    pub committer_date: i64,
}

impl Branch {
    /// Display name, `origin/main` for remote branches
    pub fn friendly_name(&self) -> String {
        match &self.remote {
            Some(remote) if !self.is_local => format!("{}/{}", remote, self.name),
            _ => self.name.clone(),
        }
    }
}

/// Ahead/behind counts relative to upstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AheadBehind {
    pub ahead: usize,
    pub behind: usize,
}

impl AheadBehind {
    pub fn is_synced(&self) -> bool {
        self.ahead == 0 && self.behind == 0
    }
}

/// Tag information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    pub target: String,
    /// Unix timestamp of the tagger date, or the target commit date for lightweight tags
    pub creator_date: i64,
    pub message: Option<String>,
}

/// Stash entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stash {
    pub index: usize,
    /// `stash@{N}`
    pub name: String,
    pub message: String,
    pub oid: String,
    pub time: i64,
}

/// Ordering of branch leaves inside the branch tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchSortMode {
    #[default]
    Name,
    CommitterDate,
}

/// Ordering of the tag list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagSortMode {
    #[default]
    CreatorDate,
    Name,
}
