//! File system watcher service
//!
//! Events are never turned into refreshes directly. The notify callback only
//! classifies each path and raises a dirty flag on [`RepoSignals`]; the update
//! queue polls the flags, so a burst of events collapses into one refresh per
//! category.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::Result;
use crate::services::signals::{DirtyCategory, RepoSignals};

/// State consulted by the notify callback
#[derive(Debug)]
pub struct WatchScope {
    enabled: AtomicBool,
    submodules: RwLock<Vec<PathBuf>>,
}

impl Default for WatchScope {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            submodules: RwLock::new(Vec::new()),
        }
    }
}

impl WatchScope {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Replace the submodule paths (relative to the workdir) whose contents are ignored
    pub fn set_submodules(&self, paths: Vec<String>) {
        let paths = paths.into_iter().map(PathBuf::from).collect();
        match self.submodules.write() {
            Ok(mut submodules) => *submodules = paths,
            Err(poisoned) => *poisoned.into_inner() = paths,
        }
    }

    fn is_in_submodule(&self, relative: &Path) -> bool {
        let submodules = match self.submodules.read() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        submodules.iter().any(|s| relative.starts_with(s))
    }

    /// Disable the watcher until the returned guard is dropped
    pub fn pause(self: &Arc<Self>) -> WatchPause {
        self.set_enabled(false);
        WatchPause {
            scope: Arc::clone(self),
        }
    }
}

/// Re-enables the watcher when dropped, whatever the paused operation returned
#[derive(Debug)]
pub struct WatchPause {
    scope: Arc<WatchScope>,
}

impl Drop for WatchPause {
    fn drop(&mut self) {
        self.scope.set_enabled(true);
    }
}

/// Service for watching file system changes in a repository
pub struct WatcherService {
    watcher: Option<RecommendedWatcher>,
    watched: Vec<PathBuf>,
    scope: Arc<WatchScope>,
    signals: Arc<RepoSignals>,
}

impl WatcherService {
    pub fn new(scope: Arc<WatchScope>, signals: Arc<RepoSignals>) -> Self {
        Self {
            watcher: None,
            watched: Vec::new(),
            scope,
            signals,
        }
    }

    /// Start watching a working copy and its (common) git directory
    pub fn watch(&mut self, workdir: &Path, git_dir: &Path) -> Result<()> {
        self.unwatch();

        let scope = Arc::clone(&self.scope);
        let signals = Arc::clone(&self.signals);
        let workdir_owned = workdir.to_path_buf();
        let git_dir_owned = git_dir.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| {
                let event = match result {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!("Watch error: {}", e);
                        return;
                    }
                };
                if !scope.is_enabled() || matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                for path in &event.paths {
                    if let Some(category) =
                        classify_path(path, &workdir_owned, &git_dir_owned, &scope)
                    {
                        signals.mark_dirty(category);
                    }
                }
            },
            Config::default(),
        )?;

        watcher.watch(workdir, RecursiveMode::Recursive)?;
        self.watched.push(workdir.to_path_buf());

        if !git_dir.starts_with(workdir) {
            watcher.watch(git_dir, RecursiveMode::Recursive)?;
            self.watched.push(git_dir.to_path_buf());
        }

        tracing::info!(workdir = %workdir.display(), "File watcher started");
        self.watcher = Some(watcher);
        Ok(())
    }

    /// Stop watching
    pub fn unwatch(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            for path in self.watched.drain(..) {
                if let Err(e) = watcher.unwatch(&path) {
                    tracing::debug!("Failed to unwatch {}: {}", path.display(), e);
                }
            }
        }
        self.watched.clear();
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.scope.set_enabled(enabled);
    }

    pub fn set_submodules(&self, paths: Vec<String>) {
        self.scope.set_submodules(paths);
    }
}

impl Drop for WatcherService {
    fn drop(&mut self) {
        self.unwatch();
    }
}

fn relative_str(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Decide which state an event on `path` makes stale
pub fn classify_path(
    path: &Path,
    workdir: &Path,
    git_dir: &Path,
    scope: &WatchScope,
) -> Option<DirtyCategory> {
    if let Ok(relative) = path.strip_prefix(git_dir) {
        return classify_git_path(&relative_str(relative));
    }

    let relative = path.strip_prefix(workdir).ok()?;
    if relative.as_os_str().is_empty()
        || relative.components().any(|c| c.as_os_str() == ".git")
        || scope.is_in_submodule(relative)
    {
        return None;
    }

    Some(DirtyCategory::WorkingCopy)
}

fn classify_git_path(relative: &str) -> Option<DirtyCategory> {
    // per-worktree files of linked worktrees live in worktrees/<name>/
    let relative = match relative.strip_prefix("worktrees/") {
        Some(rest) => rest.split_once('/').map(|(_, inner)| inner)?,
        None => relative,
    };

    if relative.ends_with(".lock") {
        return None;
    }

    if let Some(module) = relative.strip_prefix("modules/") {
        return module
            .ends_with("/HEAD")
            .then_some(DirtyCategory::WorkingCopy);
    }

    match relative {
        "index" => Some(DirtyCategory::WorkingCopy),
        "HEAD" => Some(DirtyCategory::All),
        "packed-refs" => Some(DirtyCategory::Refs),
        "refs/stash" => Some(DirtyCategory::WorkingCopy),
        "MERGE_HEAD" | "CHERRY_PICK_HEAD" | "REVERT_HEAD" => Some(DirtyCategory::WorkingCopy),
        r if r.starts_with("refs/") => Some(DirtyCategory::Refs),
        r if r.starts_with("rebase-merge") || r.starts_with("rebase-apply") => {
            Some(DirtyCategory::WorkingCopy)
        }
        _ => None,
    }
}
