//! Messages posted by background tasks and the snapshot published to readers

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ErrorResponse, Result};
use crate::models::{
    BisectState, Branch, Change, Commit, CommitDetail, CommitSignInfo, Filter, FilterMode,
    InProgressContext, InlineElement, Stash, Submodule, Tag, Worktree,
};
use crate::services::git_service::BranchData;
use crate::state::change_set::Partition;
use crate::state::filter_tree::BranchTrees;

/// One of the seven independent refresh tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshKind {
    Branches,
    Tags,
    Commits,
    Submodules,
    Worktrees,
    WorkingCopy,
    Stashes,
}

impl RefreshKind {
    pub const ALL: [RefreshKind; 7] = [
        RefreshKind::Branches,
        RefreshKind::Tags,
        RefreshKind::Commits,
        RefreshKind::Submodules,
        RefreshKind::Worktrees,
        RefreshKind::WorkingCopy,
        RefreshKind::Stashes,
    ];

    /// Refreshes made stale by a ref change
    pub const REFS: [RefreshKind; 4] = [
        RefreshKind::Branches,
        RefreshKind::Tags,
        RefreshKind::Commits,
        RefreshKind::Worktrees,
    ];

    /// Refreshes made stale by a working copy change
    pub const LOCAL: [RefreshKind; 2] = [RefreshKind::WorkingCopy, RefreshKind::Stashes];
}

/// Working copy status as read by a background task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingCopyData {
    pub changes: Vec<Change>,
    /// Staged side against HEAD's parent, set when read in amend mode
    pub amend_staged: Option<Vec<Change>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshData {
    Branches(BranchData),
    Tags(Vec<Tag>),
    Commits(Vec<Commit>),
    Submodules(Vec<Submodule>),
    Worktrees(Vec<Worktree>),
    WorkingCopy(WorkingCopyData),
    Stashes(Vec<Stash>),
}

/// One piece of a commit's details
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitDetailPart {
    Message {
        message: String,
        inlines: Vec<InlineElement>,
    },
    SignInfo(CommitSignInfo),
    Children(Vec<String>),
    Changes(Vec<Change>),
}

/// A finished background task, applied by the repository's update queue
#[derive(Debug)]
pub enum StateUpdate {
    Refreshed {
        kind: RefreshKind,
        /// Request sequence number; results older than the newest request
        /// of the same kind are dropped
        generation: u64,
        data: Result<RefreshData>,
    },
    CommitDetail {
        token_id: u64,
        part: Result<CommitDetailPart>,
    },
}

/// One executed git operation as shown in the command log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLogEntry {
    pub command: String,
    pub time: DateTime<Utc>,
    pub success: bool,
    pub error: Option<ErrorResponse>,
}

/// Maximum number of retained command log entries
pub const MAX_COMMAND_LOG: usize = 100;

/// Lifecycle of a repository instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

/// Immutable view of a repository, published after every applied update
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySnapshot {
    pub id: String,
    pub lifecycle: Lifecycle,
    /// Bumped on every publish
    pub version: u64,
    pub branches: Vec<Branch>,
    pub remotes: Vec<String>,
    pub current_branch: Option<Branch>,
    pub trees: BranchTrees,
    pub filters: Vec<Filter>,
    pub active_filter_mode: FilterMode,
    pub tags: Vec<Tag>,
    pub commits: Vec<Commit>,
    pub submodules: Vec<Submodule>,
    pub worktrees: Vec<Worktree>,
    pub stashes: Vec<Stash>,
    pub working_copy: Partition,
    pub visible_unstaged: Vec<Change>,
    pub visible_staged: Vec<Change>,
    pub conflict_count: usize,
    pub is_amend: bool,
    pub pending_selection: Vec<String>,
    pub in_progress: InProgressContext,
    pub bisect: BisectState,
    pub selected_commit: Option<CommitDetail>,
    pub commit_message_draft: String,
    pub commit_messages: Vec<String>,
    pub command_log: Vec<CommandLogEntry>,
}
