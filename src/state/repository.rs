//! Live state of one open repository
//!
//! Background work runs on the blocking pool and posts a [`StateUpdate`] to
//! a single channel. Only [`Repository`] consumes that channel, so every
//! piece of published state has exactly one writer. Readers get immutable
//! [`RepositorySnapshot`]s through a `watch` channel.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};

use crate::commands::{bisect, commit, conflict, in_progress, staging};
use crate::commands::{CommitOutcome, CommitRequest, StagedCounts};
use crate::config::AppPreferences;
use crate::error::{ErrorResponse, ReposcopeError, Result};
use crate::models::{
    BisectCommand, BisectState, Branch, BranchSortMode, Change, Commit, CommitDetail, FilterMode,
    InProgressAction, InProgressContext, IssueTrackerRule, RepositorySettings, Stash, Submodule,
    Tag, TagSortMode, Worktree,
};
use crate::services::autofetch_service::{AutoFetchContext, AutoFetchService, FetchSchedule};
use crate::services::cancellation::CancellationToken;
use crate::services::git_service::{ConflictSide, FetchOptions, GitBackend, GitService, RepositoryPaths};
use crate::services::notification::{NotificationSink, TracingNotifier};
use crate::services::settings_service::{JsonSettingsStore, SettingsStore};
use crate::services::signals::{OperationGuard, RepoSignals};
use crate::services::watcher_service::{WatchScope, WatcherService};
use crate::state::annotator::annotate;
use crate::state::change_set::{partition, WorkingCopy};
use crate::state::filter_tree::FilterTree;
use crate::state::update::{
    CommandLogEntry, CommitDetailPart, Lifecycle, RefreshData, RefreshKind, RepositorySnapshot,
    StateUpdate, WorkingCopyData, MAX_COMMAND_LOG,
};

fn read_working_copy(
    backend: &dyn GitBackend,
    include_untracked: bool,
    amend: bool,
) -> Result<WorkingCopyData> {
    let changes = backend.changes(include_untracked)?;
    let amend_staged = if amend {
        Some(partition(&changes, true, backend)?.staged)
    } else {
        None
    };
    Ok(WorkingCopyData {
        changes,
        amend_staged,
    })
}

/// An open repository and everything shown about it
pub struct Repository {
    id: String,
    paths: RepositoryPaths,
    backend: Arc<dyn GitBackend>,
    settings_store: Arc<dyn SettingsStore>,
    notifier: Arc<dyn NotificationSink>,
    preferences: Arc<AppPreferences>,

    lifecycle: Lifecycle,
    settings: RepositorySettings,
    filter_tree: FilterTree,
    working_copy: WorkingCopy,
    branches: Vec<Branch>,
    remotes: Vec<String>,
    tags: Vec<Tag>,
    commits: Vec<Commit>,
    submodules: Vec<Submodule>,
    worktrees: Vec<Worktree>,
    stashes: Vec<Stash>,
    in_progress: InProgressContext,
    bisect: BisectState,
    selected_commit: Option<CommitDetail>,
    selection: Option<CancellationToken>,
    restore_selection: Vec<String>,
    command_log: Vec<CommandLogEntry>,

    generations: HashMap<RefreshKind, u64>,
    signals: Arc<RepoSignals>,
    watch_scope: Arc<WatchScope>,
    watcher: WatcherService,
    watcher_error_reported: bool,
    fetch_schedule: Arc<FetchSchedule>,
    auto_fetch: AutoFetchService,

    updates_tx: mpsc::UnboundedSender<StateUpdate>,
    updates_rx: mpsc::UnboundedReceiver<StateUpdate>,
    snapshot_tx: watch::Sender<Arc<RepositorySnapshot>>,
    version: u64,
}

impl Repository {
    pub fn new(
        paths: RepositoryPaths,
        backend: Arc<dyn GitBackend>,
        settings_store: Arc<dyn SettingsStore>,
        notifier: Arc<dyn NotificationSink>,
        preferences: Arc<AppPreferences>,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(Arc::new(RepositorySnapshot::default()));
        let signals = RepoSignals::new();
        let watch_scope = WatchScope::new();
        let settings = RepositorySettings::default();

        Repository {
            id: uuid::Uuid::new_v4().to_string(),
            paths,
            backend,
            settings_store,
            notifier,
            preferences,
            lifecycle: Lifecycle::Closed,
            filter_tree: FilterTree::from_settings(&settings),
            fetch_schedule: FetchSchedule::new(settings.enable_auto_fetch, settings.auto_fetch_minutes()),
            settings,
            working_copy: WorkingCopy::new(),
            branches: Vec::new(),
            remotes: Vec::new(),
            tags: Vec::new(),
            commits: Vec::new(),
            submodules: Vec::new(),
            worktrees: Vec::new(),
            stashes: Vec::new(),
            in_progress: InProgressContext::None,
            bisect: BisectState::None,
            selected_commit: None,
            selection: None,
            restore_selection: Vec::new(),
            command_log: Vec::new(),
            generations: HashMap::new(),
            watcher: WatcherService::new(Arc::clone(&watch_scope), Arc::clone(&signals)),
            watcher_error_reported: false,
            signals,
            watch_scope,
            auto_fetch: AutoFetchService::new(),
            updates_tx,
            updates_rx,
            snapshot_tx,
            version: 0,
        }
    }

    /// Build a repository for the working copy containing `path`, backed by
    /// the git CLI and JSON settings
    pub fn discover(path: &Path, preferences: Arc<AppPreferences>) -> Result<Self> {
        let paths = RepositoryPaths::discover(path)?;
        let backend = Arc::new(GitService::new(paths.workdir.clone()));
        Ok(Self::new(
            paths,
            backend,
            Arc::new(JsonSettingsStore),
            Arc::new(TracingNotifier),
            preferences,
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn paths(&self) -> &RepositoryPaths {
        &self.paths
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn settings(&self) -> &RepositorySettings {
        &self.settings
    }

    pub fn filter_tree(&self) -> &FilterTree {
        &self.filter_tree
    }

    pub fn working_copy(&self) -> &WorkingCopy {
        &self.working_copy
    }

    pub fn signals(&self) -> &Arc<RepoSignals> {
        &self.signals
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_watching()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<RepositorySnapshot> {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RepositorySnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Open the repository: load settings, start watching and auto-fetch,
    /// and refresh everything. Must be called inside a Tokio runtime.
    pub fn open(&mut self) {
        if self.lifecycle != Lifecycle::Closed {
            return;
        }

        self.lifecycle = Lifecycle::Opening;
        self.publish();

        self.settings = self.settings_store.load(&self.paths.common_dir);
        self.filter_tree = FilterTree::from_settings(&self.settings);
        self.fetch_schedule.set_enabled(self.settings.enable_auto_fetch);
        self.fetch_schedule
            .set_interval_minutes(self.settings.auto_fetch_minutes());
        self.fetch_schedule.mark_fetched(Utc::now().timestamp());

        if let Err(e) = self.watcher.watch(&self.paths.workdir, &self.paths.common_dir) {
            tracing::error!(repo = %self.paths.workdir.display(), "Failed to start watcher: {}", e);
            if !self.watcher_error_reported {
                self.watcher_error_reported = true;
                self.notifier.notify_error(&self.id, &e);
            }
        }

        self.auto_fetch.start(
            AutoFetchContext {
                backend: Arc::clone(&self.backend),
                signals: Arc::clone(&self.signals),
                schedule: Arc::clone(&self.fetch_schedule),
                git_dir: self.paths.git_dir.clone(),
            },
            self.preferences.auto_fetch_tick(),
        );

        self.lifecycle = Lifecycle::Open;
        tracing::info!(repo = %self.paths.workdir.display(), "Opened repository");
        self.refresh_all();
        self.publish();
    }

    /// Flush settings and stop background work
    pub fn close(&mut self) {
        if self.lifecycle != Lifecycle::Open {
            return;
        }

        self.lifecycle = Lifecycle::Closing;
        self.publish();

        if let Some(token) = self.selection.take() {
            token.cancel();
        }
        self.save_settings();
        self.watcher.unwatch();
        self.auto_fetch.stop();

        self.lifecycle = Lifecycle::Closed;
        tracing::info!(repo = %self.paths.workdir.display(), "Closed repository");
        self.publish();
    }

    fn ensure_open(&self) -> Result<()> {
        if self.lifecycle == Lifecycle::Open {
            Ok(())
        } else {
            Err(ReposcopeError::RepositoryNotOpen)
        }
    }

    // ----- update queue -----

    /// Refresh every category
    pub fn refresh_all(&mut self) {
        self.request_refreshes(&RefreshKind::ALL);
    }

    pub fn request_refreshes(&mut self, kinds: &[RefreshKind]) {
        for kind in kinds {
            self.request_refresh(*kind);
        }
    }

    /// Start one refresh task on the blocking pool
    pub fn request_refresh(&mut self, kind: RefreshKind) {
        let generation = {
            let generation = self.generations.entry(kind).or_default();
            *generation += 1;
            *generation
        };

        let backend = Arc::clone(&self.backend);
        let tx = self.updates_tx.clone();
        let include_untracked = self.settings.include_untracked_in_local_changes;
        let amend = self.working_copy.is_amend();
        let query = self
            .filter_tree
            .history_query(self.preferences.max_history_commits);

        tokio::task::spawn_blocking(move || {
            let backend = backend.as_ref();
            let data = match kind {
                RefreshKind::Branches => backend.branches().map(RefreshData::Branches),
                RefreshKind::Tags => backend.tags().map(RefreshData::Tags),
                RefreshKind::Commits => backend.commits(&query).map(RefreshData::Commits),
                RefreshKind::Submodules => backend.submodules().map(RefreshData::Submodules),
                RefreshKind::Worktrees => backend.worktrees().map(RefreshData::Worktrees),
                RefreshKind::WorkingCopy => {
                    read_working_copy(backend, include_untracked, amend).map(RefreshData::WorkingCopy)
                }
                RefreshKind::Stashes => backend.stashes().map(RefreshData::Stashes),
            };

            if tx
                .send(StateUpdate::Refreshed {
                    kind,
                    generation,
                    data,
                })
                .is_err()
            {
                tracing::debug!(?kind, "Repository dropped before refresh finished");
            }
        });
    }

    /// Turn the watcher's dirty flags into refreshes. Returns whether any
    /// refresh was started.
    pub fn check_dirty(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Open {
            return false;
        }

        let mut scheduled = false;
        if self.signals.take_dirty_refs() {
            self.request_refreshes(&RefreshKind::REFS);
            scheduled = true;
        }
        if self.signals.take_dirty_working_copy() {
            self.request_refreshes(&RefreshKind::LOCAL);
            scheduled = true;
        }
        scheduled
    }

    /// Apply every update that is already queued. Returns how many there were.
    pub fn process_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.updates_rx.try_recv() {
            self.apply(update);
            applied += 1;
        }
        applied
    }

    /// Wait for the next update and apply it
    pub async fn next_update(&mut self) -> bool {
        match self.updates_rx.recv().await {
            Some(update) => {
                self.apply(update);
                true
            }
            None => false,
        }
    }

    /// Apply updates and poll dirty flags until `shutdown` completes
    pub async fn run_event_loop<S>(&mut self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut poll = tokio::time::interval(self.preferences.dirty_poll_interval());
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(update) = self.updates_rx.recv() => self.apply(update),
                _ = poll.tick() => {
                    self.check_dirty();
                }
            }
        }
    }

    /// Apply one finished background task and publish
    pub fn apply(&mut self, update: StateUpdate) {
        if !matches!(self.lifecycle, Lifecycle::Open | Lifecycle::Opening) {
            return;
        }

        match update {
            StateUpdate::Refreshed {
                kind,
                generation,
                data,
            } => {
                let latest = self.generations.get(&kind).copied().unwrap_or_default();
                if generation < latest {
                    tracing::debug!(?kind, generation, latest, "Dropping superseded refresh");
                    return;
                }
                match data {
                    Ok(data) => self.apply_refresh(data),
                    Err(e) => {
                        tracing::warn!(?kind, "Refresh failed: {}", e);
                        self.log_command(&format!("refresh {:?}", kind), Some(&e));
                        self.notifier.notify_error(&self.id, &e);
                    }
                }
            }
            StateUpdate::CommitDetail { token_id, part } => {
                let current = self
                    .selection
                    .as_ref()
                    .is_some_and(|token| token.id() == token_id && !token.is_cancelled());
                if !current {
                    tracing::debug!(token_id, "Dropping stale commit detail");
                    return;
                }
                self.apply_commit_detail(part);
            }
        }

        self.publish();
    }

    fn apply_refresh(&mut self, data: RefreshData) {
        match data {
            RefreshData::Branches(data) => {
                self.branches = data.branches;
                self.remotes = data.remotes;
                self.rebuild_trees();
                self.update_bisect_info();
            }
            RefreshData::Tags(tags) => {
                self.filter_tree.set_tags(&tags);
                self.tags = tags;
            }
            RefreshData::Commits(commits) => {
                self.commits = commits;
            }
            RefreshData::Submodules(submodules) => {
                self.watcher
                    .set_submodules(submodules.iter().map(|s| s.path.clone()).collect());
                self.submodules = submodules;
            }
            RefreshData::Worktrees(worktrees) => {
                self.worktrees = worktrees;
            }
            RefreshData::WorkingCopy(data) => {
                if self.working_copy.set_data(data.changes, data.amend_staged) {
                    tracing::debug!(
                        unstaged = self.working_copy.unstaged().len(),
                        staged = self.working_copy.staged().len(),
                        "Working copy changed"
                    );
                }
                self.restore_selection = self.working_copy.take_pending_selection();
                self.in_progress = in_progress::probe(&self.paths.git_dir);
            }
            RefreshData::Stashes(stashes) => {
                self.stashes = stashes;
            }
        }
    }

    fn rebuild_trees(&mut self) {
        let text = self.filter_tree.filter_text().to_string();
        if self.filter_tree.build(&self.branches, &self.tags, &text) {
            self.save_settings();
        }
    }

    fn apply_commit_detail(&mut self, part: Result<CommitDetailPart>) {
        let Some(detail) = self.selected_commit.as_mut() else {
            return;
        };

        match part {
            Ok(CommitDetailPart::Message { message, inlines }) => {
                detail.message = Some(message);
                detail.inlines = inlines;
            }
            Ok(CommitDetailPart::SignInfo(info)) => detail.sign_info = Some(info),
            Ok(CommitDetailPart::Children(children)) => detail.children = Some(children),
            Ok(CommitDetailPart::Changes(changes)) => detail.changes = Some(changes),
            Err(e) => {
                tracing::warn!(sha = %detail.sha, "Failed to load commit detail: {}", e);
            }
        }
    }

    fn publish(&mut self) {
        self.version += 1;
        let snapshot = RepositorySnapshot {
            id: self.id.clone(),
            lifecycle: self.lifecycle,
            version: self.version,
            current_branch: self
                .branches
                .iter()
                .find(|b| b.is_local && b.is_current)
                .cloned(),
            branches: self.branches.clone(),
            remotes: self.remotes.clone(),
            trees: self.filter_tree.trees().clone(),
            filters: self.filter_tree.filters().to_vec(),
            active_filter_mode: self.filter_tree.active_mode(),
            tags: self.tags.clone(),
            commits: self.commits.clone(),
            submodules: if self.preferences.show_submodules {
                self.submodules.clone()
            } else {
                Vec::new()
            },
            worktrees: if self.preferences.show_worktrees {
                self.worktrees.clone()
            } else {
                Vec::new()
            },
            stashes: self.stashes.clone(),
            working_copy: self.working_copy.partition().clone(),
            visible_unstaged: self.working_copy.visible_unstaged(),
            visible_staged: self.working_copy.visible_staged(),
            conflict_count: self.working_copy.conflict_count(),
            is_amend: self.working_copy.is_amend(),
            // handed out once, with the working copy it was meant for
            pending_selection: std::mem::take(&mut self.restore_selection),
            in_progress: self.in_progress.clone(),
            bisect: self.bisect,
            selected_commit: self.selected_commit.clone(),
            commit_message_draft: self.settings.last_commit_message.clone(),
            commit_messages: self.settings.commit_messages.clone(),
            command_log: self.command_log.clone(),
        };
        self.snapshot_tx.send_replace(Arc::new(snapshot));
    }

    // ----- commit details -----

    /// Select a commit and load its details. Work for the previous
    /// selection is cancelled and its late results are dropped.
    pub fn select_commit(&mut self, sha: &str) {
        if let Some(token) = self.selection.take() {
            token.cancel();
        }

        let token = CancellationToken::new();
        self.selected_commit = Some(CommitDetail::pending(sha));
        self.selection = Some(token.clone());

        let rules = self.settings.issue_tracker_rules.clone();
        let message_sha = sha.to_string();
        self.spawn_detail(&token, move |backend| {
            let message = backend.commit_message(&message_sha)?;
            let inlines = annotate(&message, &rules, backend);
            Ok(CommitDetailPart::Message { message, inlines })
        });

        let sign_sha = sha.to_string();
        self.spawn_detail(&token, move |backend| {
            backend.commit_sign_info(&sign_sha).map(CommitDetailPart::SignInfo)
        });

        let children_sha = sha.to_string();
        self.spawn_detail(&token, move |backend| {
            backend.commit_children(&children_sha).map(CommitDetailPart::Children)
        });

        let changes_sha = sha.to_string();
        self.spawn_detail(&token, move |backend| {
            backend.commit_changes(&changes_sha).map(CommitDetailPart::Changes)
        });

        self.publish();
    }

    pub fn clear_selection(&mut self) {
        if let Some(token) = self.selection.take() {
            token.cancel();
        }
        self.selected_commit = None;
        self.publish();
    }

    fn spawn_detail<F>(&self, token: &CancellationToken, load: F)
    where
        F: FnOnce(&dyn GitBackend) -> Result<CommitDetailPart> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let tx = self.updates_tx.clone();
        let token = token.clone();

        tokio::task::spawn_blocking(move || {
            if token.is_cancelled() {
                return;
            }
            let part = load(backend.as_ref());
            if token.is_cancelled() {
                return;
            }
            if tx
                .send(StateUpdate::CommitDetail {
                    token_id: token.id(),
                    part,
                })
                .is_err()
            {
                tracing::debug!("Repository dropped before commit detail finished");
            }
        });
    }

    // ----- operations -----

    /// Whether a dialog may be opened for this repository
    pub fn can_create_popup(&self) -> bool {
        !self.signals.is_auto_fetching() && !self.signals.is_operation_running()
    }

    async fn blocking<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn GitBackend) -> Result<T> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || operation(backend.as_ref()))
            .await
            .map_err(|e| ReposcopeError::OperationFailed(format!("Task join error: {}", e)))?
    }

    fn log_command(&mut self, command: &str, error: Option<&ReposcopeError>) {
        self.command_log.push(CommandLogEntry {
            command: command.to_string(),
            time: Utc::now(),
            success: error.is_none(),
            error: error.map(ErrorResponse::from),
        });
        if self.command_log.len() > MAX_COMMAND_LOG {
            let excess = self.command_log.len() - MAX_COMMAND_LOG;
            self.command_log.drain(..excess);
        }
    }

    /// Log an executed command and report its failure
    fn record<T>(&mut self, command: &str, result: Result<T>) -> Result<T> {
        self.log_command(command, result.as_ref().err());
        if let Err(e) = &result {
            tracing::error!(repo = %self.paths.workdir.display(), "`{}` failed: {}", command, e);
            self.notifier.notify_error(&self.id, e);
        }
        self.publish();
        result
    }

    /// Report an error detected before any git command ran
    fn refuse<T>(&self, error: ReposcopeError) -> Result<T> {
        tracing::info!("Refused operation: {}", error);
        self.notifier.notify_error(&self.id, &error);
        Err(error)
    }

    fn begin_operation(&self) -> Result<OperationGuard> {
        match self.signals.try_begin_operation() {
            Some(guard) => Ok(guard),
            None => self.refuse(ReposcopeError::OperationBusy),
        }
    }

    /// Stage `selection`; `next_selection` is the selection to restore once
    /// the refreshed working copy arrives
    pub async fn stage_selection(&mut self, selection: Vec<Change>, next_selection: Vec<String>) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.begin_operation()?;

        self.working_copy.set_pending_selection(next_selection);
        self.publish();

        let unstaged = self.working_copy.unstaged().to_vec();
        let include_untracked = self.settings.include_untracked_in_local_changes;
        let result = self
            .blocking(move |backend| staging::stage(backend, &selection, &unstaged, include_untracked))
            .await;

        let result = self.record("add", result);
        self.request_refresh(RefreshKind::WorkingCopy);
        result
    }

    /// Unstage `selection`. In amend mode the entries go back to their state
    /// in HEAD's parent.
    pub async fn unstage_selection(&mut self, selection: Vec<Change>, next_selection: Vec<String>) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.begin_operation()?;

        self.working_copy.set_pending_selection(next_selection);
        self.publish();

        let staged = self.working_copy.staged().to_vec();
        let amend = self.working_copy.is_amend();
        let result = self
            .blocking(move |backend| {
                if amend {
                    let parent = backend.head_parent()?;
                    staging::unstage(backend, &selection, &staged, Some(parent.as_deref()))
                } else {
                    staging::unstage(backend, &selection, &staged, None)
                }
            })
            .await;

        let result = self.record("restore --staged", result);
        self.request_refresh(RefreshKind::WorkingCopy);
        result
    }

    async fn resolve(&mut self, changes: Vec<Change>, side: ConflictSide) -> Result<Vec<String>> {
        self.ensure_open()?;
        let _guard = self.begin_operation()?;
        let _pause = self.watch_scope.pause();

        let result = self
            .blocking(move |backend| conflict::use_side(backend, &changes, side))
            .await;

        let command = match side {
            ConflictSide::Theirs => "checkout --theirs",
            ConflictSide::Ours => "checkout --ours",
        };
        let result = self.record(command, result);
        self.request_refreshes(&RefreshKind::LOCAL);
        result
    }

    /// Resolve conflicts by taking the incoming side
    pub async fn use_theirs(&mut self, changes: Vec<Change>) -> Result<Vec<String>> {
        self.resolve(changes, ConflictSide::Theirs).await
    }

    /// Resolve conflicts by keeping the local side
    pub async fn use_mine(&mut self, changes: Vec<Change>) -> Result<Vec<String>> {
        self.resolve(changes, ConflictSide::Ours).await
    }

    pub async fn mark_resolved(&mut self, changes: Vec<Change>) -> Result<Vec<String>> {
        self.ensure_open()?;
        let _guard = self.begin_operation()?;
        let _pause = self.watch_scope.pause();

        let result = self
            .blocking(move |backend| conflict::mark_resolved(backend, &changes))
            .await;

        let result = self.record("add", result);
        self.request_refreshes(&RefreshKind::LOCAL);
        result
    }

    pub async fn discard(&mut self, changes: Vec<Change>) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.begin_operation()?;

        let result = self
            .blocking(move |backend| staging::discard(backend, &changes))
            .await;

        let result = self.record("restore", result);
        self.request_refresh(RefreshKind::WorkingCopy);
        result
    }

    fn has_current_branch(&self) -> bool {
        self.branches.iter().any(|b| b.is_local && b.is_current)
    }

    /// Commit the staged changes.
    ///
    /// Returns an outcome other than `Committed` when the user has to
    /// answer a question first; the request is then re-sent with the answer.
    pub async fn commit(&mut self, request: CommitRequest) -> Result<CommitOutcome> {
        self.ensure_open()?;

        let counts = StagedCounts {
            staged: self.working_copy.staged().len(),
            visible_staged: self.working_copy.visible_staged().len(),
            unstaged: self.working_copy.unstaged().len(),
        };
        match commit::precheck(&request, counts) {
            Ok(Some(outcome)) => return Ok(outcome),
            Ok(None) => {}
            Err(e) => return self.refuse(e),
        }

        if request.auto_push {
            if !self.has_current_branch() {
                return self.refuse(ReposcopeError::NoCurrentBranch);
            }
            if self.remotes.is_empty() {
                return self.refuse(ReposcopeError::NoRemotes);
            }
        }

        let _guard = self.begin_operation()?;
        let include_untracked = self.settings.include_untracked_in_local_changes;
        let run_request = request.clone();
        let result = self
            .blocking(move |backend| commit::run(backend, &run_request, include_untracked))
            .await;
        let command = if request.amend { "commit --amend" } else { "commit" };
        if let Err(e) = self.record(command, result) {
            self.request_refresh(RefreshKind::WorkingCopy);
            return Err(e);
        }

        self.settings.push_commit_message(&request.message);
        self.settings.last_commit_message.clear();
        self.working_copy.set_amend(false);
        self.save_settings();

        let mut pushed = false;
        if request.auto_push {
            let result = self.blocking(|backend| backend.push_current()).await;
            pushed = self.record("push", result).is_ok();
        }

        self.refresh_all();
        self.publish();
        Ok(CommitOutcome::Committed { pushed })
    }

    /// Fetch on user request. `options.remote` of `None` fetches every remote.
    pub async fn fetch(&mut self, options: FetchOptions) -> Result<()> {
        self.ensure_open()?;
        if self.remotes.is_empty() {
            return self.refuse(ReposcopeError::NoRemotes);
        }
        let Some(_fetch) = self.signals.try_begin_fetch(false) else {
            return self.refuse(ReposcopeError::OperationBusy);
        };

        let result = self.blocking(move |backend| backend.fetch(&options)).await;
        self.record("fetch", result)?;

        self.fetch_schedule.mark_fetched(Utc::now().timestamp());
        self.request_refreshes(&RefreshKind::REFS);
        Ok(())
    }

    /// Re-read the bisect session state
    pub fn update_bisect_info(&mut self) -> BisectState {
        self.bisect = bisect::bisect_state(&self.paths.git_dir, &self.paths.common_dir);
        self.bisect
    }

    /// Run a bisect subcommand with the watcher paused
    pub async fn bisect(&mut self, command: BisectCommand) -> Result<String> {
        self.ensure_open()?;
        let _guard = self.begin_operation()?;
        let _pause = self.watch_scope.pause();

        let args = command.args().join(" ");
        let result = self
            .blocking(move |backend| bisect::run(backend, &command))
            .await;
        let result = self.record(&args, result);

        self.update_bisect_info();
        self.refresh_all();
        self.publish();
        result
    }

    pub fn in_progress(&self) -> &InProgressContext {
        &self.in_progress
    }

    /// Continue, skip or abort the merge, rebase, revert or cherry-pick in
    /// progress
    pub async fn in_progress_action(&mut self, action: InProgressAction) -> Result<()> {
        self.ensure_open()?;
        let Some(args) = self.in_progress.action_args(action) else {
            return self.refuse(ReposcopeError::OperationFailed(format!(
                "Cannot {:?} without a matching operation in progress",
                action
            )));
        };
        let _guard = self.begin_operation()?;

        let command = args.join(" ");
        let result = self.blocking(move |backend| backend.run_git(&args)).await;
        let result = self.record(&command, result).map(|_| ());

        self.refresh_all();
        result
    }

    // ----- filters and settings -----

    fn save_settings(&mut self) {
        self.filter_tree.store(&mut self.settings);
        if let Err(e) = self.settings_store.save(&self.paths.common_dir, &self.settings) {
            tracing::warn!(repo = %self.paths.workdir.display(), "Failed to save settings: {}", e);
        }
    }

    fn filters_changed(&mut self, changed: bool) -> bool {
        self.filters_changed_with(changed, true)
    }

    fn filters_changed_with(&mut self, changed: bool, requery: bool) -> bool {
        if changed {
            self.save_settings();
            if requery && self.lifecycle == Lifecycle::Open {
                self.request_refresh(RefreshKind::Commits);
            }
            self.publish();
        }
        changed
    }

    /// Include or exclude a branch or folder in the history.
    ///
    /// With `propagate` off the change is persisted but the history is not
    /// reloaded, so several changes can be batched before one refresh.
    pub fn apply_filter_mode(&mut self, path: &str, mode: FilterMode, clear_others: bool, propagate: bool) -> bool {
        let changed = self.filter_tree.apply_filter_mode(path, mode, clear_others);
        self.filters_changed_with(changed, propagate)
    }

    pub fn set_tag_filter_mode(&mut self, tag: &str, mode: FilterMode, clear_others: bool) -> bool {
        let changed = self.filter_tree.set_tag_filter_mode(tag, mode, clear_others);
        self.filters_changed(changed)
    }

    pub fn remove_filter(&mut self, pattern: &str) -> bool {
        let changed = self.filter_tree.remove_filter(pattern);
        self.filters_changed(changed)
    }

    pub fn clear_filters(&mut self) -> bool {
        let changed = self.filter_tree.clear_all();
        self.filters_changed(changed)
    }

    /// Search branches; a non-empty text flattens the trees
    pub fn set_branch_search(&mut self, text: &str) {
        if self.filter_tree.set_filter_text(text) {
            self.save_settings();
        }
        self.publish();
    }

    pub fn set_sort_modes(&mut self, local: BranchSortMode, remote: BranchSortMode, tags: TagSortMode) {
        self.filter_tree.set_sort_modes(local, remote, tags);
        self.save_settings();
        self.publish();
    }

    pub fn set_expanded(&mut self, path: &str, expanded: bool) {
        if self.filter_tree.set_expanded(path, expanded) {
            self.save_settings();
            self.publish();
        }
    }

    /// Switch amend mode and re-read the staged side
    pub fn set_amend(&mut self, amend: bool) {
        if self.working_copy.set_amend(amend) {
            if self.lifecycle == Lifecycle::Open {
                self.request_refresh(RefreshKind::WorkingCopy);
            }
            self.publish();
        }
    }

    pub fn set_change_filter(&mut self, filter: &str) {
        self.working_copy.set_filter(filter);
        self.publish();
    }

    pub fn set_include_untracked(&mut self, include: bool) {
        if self.settings.include_untracked_in_local_changes == include {
            return;
        }
        self.settings.include_untracked_in_local_changes = include;
        self.save_settings();
        if self.lifecycle == Lifecycle::Open {
            self.request_refresh(RefreshKind::WorkingCopy);
        }
    }

    pub fn set_auto_fetch(&mut self, enabled: bool, interval_minutes: u32) {
        self.settings.enable_auto_fetch = enabled;
        self.settings.auto_fetch_interval = interval_minutes;
        self.fetch_schedule.set_enabled(enabled);
        self.fetch_schedule
            .set_interval_minutes(self.settings.auto_fetch_minutes());
        self.save_settings();
    }

    pub fn set_issue_tracker_rules(&mut self, rules: Vec<IssueTrackerRule>) {
        self.settings.issue_tracker_rules = rules;
        self.save_settings();
    }

    /// Keep the commit message being typed; written out on close
    pub fn set_commit_message_draft(&mut self, message: &str) {
        self.settings.last_commit_message = message.to_string();
        self.publish();
    }
}

impl Drop for Repository {
    fn drop(&mut self) {
        if let Some(token) = self.selection.take() {
            token.cancel();
        }
    }
}
