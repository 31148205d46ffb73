//! Service layer for reposcope
//!
//! Long-lived collaborators of an open repository: git command execution,
//! file watching, the auto-fetch timer, settings persistence and
//! notifications.

pub mod autofetch_service;
pub mod cancellation;
pub mod git_service;
pub mod notification;
pub mod settings_service;
pub mod signals;
pub mod watcher_service;

pub use autofetch_service::{AutoFetchContext, AutoFetchService, FetchSchedule};
pub use cancellation::CancellationToken;
pub use git_service::{
    BranchData, CommitOptions, CommitOracle, ConflictSide, FetchOptions, GitBackend, GitService,
    RepositoryPaths, EMPTY_TREE_SHA,
};
pub use notification::{ChannelNotifier, Notification, NotificationSink, TracingNotifier};
pub use settings_service::{JsonSettingsStore, SettingsStore};
pub use signals::{DirtyCategory, RepoSignals};
pub use watcher_service::{WatchPause, WatchScope, WatcherService};
