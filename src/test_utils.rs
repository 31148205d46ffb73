//! Test utilities: temporary git repositories and a scripted backend

#![cfg(test)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;

use crate::error::{ReposcopeError, Result};
use crate::models::{
    Branch, Change, ChangeState, Commit, CommitSignInfo, HistoryQuery, RepositorySettings, Stash,
    Submodule, Tag, Worktree,
};
use crate::services::git_service::{
    BranchData, CommitOptions, CommitOracle, ConflictSide, FetchOptions, GitBackend,
    RepositoryPaths,
};
use crate::services::settings_service::SettingsStore;

/// A temporary git repository for testing
pub struct TestRepo {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TestRepo {
    /// Create a new empty git repository with `main` as its unborn branch
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().to_path_buf();

        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = git2::Repository::init_opts(&path, &opts).expect("Failed to init repo");

        let mut config = repo.config().expect("Failed to get config");
        config
            .set_str("user.name", "Test User")
            .expect("Failed to set user.name");
        config
            .set_str("user.email", "test@example.com")
            .expect("Failed to set user.email");

        Self { dir, path }
    }

    /// Create a repository with an initial commit
    pub fn with_initial_commit() -> Self {
        let test_repo = Self::new();
        test_repo.create_commit("Initial commit", &[("README.md", "# Test Repo")]);
        test_repo
    }

    pub fn repo(&self) -> git2::Repository {
        git2::Repository::open(&self.path).expect("Failed to open repo")
    }

    /// Create a file with content
    pub fn create_file(&self, name: &str, content: &str) {
        let file_path = self.path.join(name);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
    }

    /// Stage a file
    pub fn stage_file(&self, name: &str) {
        let repo = self.repo();
        let mut index = repo.index().expect("Failed to get index");
        index.add_path(Path::new(name)).expect("Failed to stage file");
        index.write().expect("Failed to write index");
    }

    /// Create a commit with the given files
    pub fn create_commit(&self, message: &str, files: &[(&str, &str)]) -> git2::Oid {
        let repo = self.repo();

        for (name, content) in files {
            self.create_file(name, content);
            self.stage_file(name);
        }

        let mut index = repo.index().expect("Failed to get index");
        let tree_oid = index.write_tree().expect("Failed to write tree");
        let tree = repo.find_tree(tree_oid).expect("Failed to find tree");
        let sig = repo.signature().expect("Failed to get signature");

        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.as_ref().into_iter().collect();

        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Create a branch at the current HEAD
    pub fn create_branch(&self, name: &str) -> git2::Oid {
        let repo = self.repo();
        let commit = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .expect("Failed to get HEAD commit");
        repo.branch(name, &commit, false).expect("Failed to create branch");
        commit.id()
    }

    /// Create `refs/remotes/<remote>/<name>` at HEAD, adding the remote if needed
    pub fn create_remote_branch(&self, remote: &str, name: &str) {
        let repo = self.repo();
        if repo.find_remote(remote).is_err() {
            repo.remote(remote, &format!("https://example.com/{}.git", remote))
                .expect("Failed to add remote");
        }
        let head = self.head_oid();
        repo.reference(
            &format!("refs/remotes/{}/{}", remote, name),
            head,
            true,
            "create remote branch",
        )
        .expect("Failed to create remote branch");
    }

    /// Track `upstream` (e.g. `origin/main`) from a local branch
    pub fn set_upstream(&self, local: &str, upstream: &str) {
        let repo = self.repo();
        let mut branch = repo
            .find_branch(local, git2::BranchType::Local)
            .expect("Failed to find branch");
        branch
            .set_upstream(Some(upstream))
            .expect("Failed to set upstream");
    }

    /// Get the HEAD commit OID
    pub fn head_oid(&self) -> git2::Oid {
        let repo = self.repo();
        let head = repo.head().expect("Failed to get HEAD");
        head.target().expect("Failed to get target")
    }

    /// Create an annotated tag
    pub fn create_tag(&self, name: &str) -> git2::Oid {
        let repo = self.repo();
        let commit = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .expect("Failed to get HEAD commit");
        let sig = repo.signature().expect("Failed to get signature");
        repo.tag(name, commit.as_object(), &sig, &format!("Tag {}", name), false)
            .expect("Failed to create tag")
    }

    /// Create a lightweight tag
    pub fn create_lightweight_tag(&self, name: &str) {
        let repo = self.repo();
        let commit = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .expect("Failed to get HEAD commit");
        repo.tag_lightweight(name, commit.as_object(), false)
            .expect("Failed to create lightweight tag");
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// A local branch as the backend would report it
pub fn local_branch(name: &str, is_current: bool) -> Branch {
    Branch {
        full_name: format!("refs/heads/{}", name),
        name: name.to_string(),
        head: "1111111111111111111111111111111111111111".to_string(),
        upstream: None,
        track_status: None,
        is_current,
        is_local: true,
        remote: None,
        committer_date: 0,
    }
}

/// A mutation issued against [`MockBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StageAll(bool),
    StagePaths(Vec<String>),
    /// Paths read back from the pathspec file
    StagePathspecFile(Vec<String>),
    UnstageAll,
    UnstagePaths(Vec<String>),
    UnstagePathspecFile(Vec<String>),
    ResetIndexTo(Option<String>, Vec<String>),
    DiscardPaths(Vec<String>),
    CheckoutConflictSide(ConflictSide, Vec<String>),
    Commit(CommitOptions),
    PushCurrent,
    Fetch(FetchOptions),
    RunGit(Vec<String>),
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    pathspec_file: bool,
    branches: BranchData,
    tags: Vec<Tag>,
    commits: Vec<Commit>,
    changes: Vec<Change>,
    messages: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
    head_parent: Option<String>,
    last_diff_base: Option<String>,
    last_history_query: Option<HistoryQuery>,
    fail_fetch: Option<String>,
    fail_run_git: Option<String>,
}

impl MockState {
    fn stage(&mut self, paths: Option<&HashSet<String>>) {
        for change in &mut self.changes {
            if change.work_tree == ChangeState::None
                || paths.is_some_and(|p| !p.contains(&change.path))
            {
                continue;
            }
            change.index = match change.work_tree {
                ChangeState::Untracked => ChangeState::Added,
                state => state,
            };
            change.work_tree = ChangeState::None;
        }
    }

    fn unstage(&mut self, paths: Option<&HashSet<String>>) {
        for change in &mut self.changes {
            if matches!(change.index, ChangeState::None | ChangeState::Untracked)
                || paths.is_some_and(|p| !p.contains(&change.path))
            {
                continue;
            }
            change.work_tree = match change.index {
                ChangeState::Added => ChangeState::Untracked,
                state => state,
            };
            change.index = ChangeState::None;
        }
    }
}

fn path_set(paths: &[String]) -> HashSet<String> {
    paths.iter().cloned().collect()
}

fn read_pathspec(file: &Path) -> Result<Vec<String>> {
    Ok(std::fs::read_to_string(file)?
        .lines()
        .map(str::to_string)
        .collect())
}

/// A backend that records mutations and simulates a tiny index
pub struct MockBackend {
    dir: TempDir,
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir_all(dir.path().join(".git")).expect("Failed to create git dir");
        Self {
            dir,
            state: Mutex::new(MockState {
                pathspec_file: true,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }

    /// Paths of a repository living in the mock's temp dir
    pub fn paths(&self) -> RepositoryPaths {
        let workdir = self.dir.path().to_path_buf();
        let git_dir = workdir.join(".git");
        RepositoryPaths {
            workdir,
            common_dir: git_dir.clone(),
            git_dir,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn set_pathspec_file_support(&self, supported: bool) {
        self.state().pathspec_file = supported;
    }

    pub fn set_branches(&self, branches: BranchData) {
        self.state().branches = branches;
    }

    pub fn set_changes(&self, changes: Vec<Change>) {
        self.state().changes = changes;
    }

    pub fn set_head_parent(&self, parent: Option<&str>) {
        self.state().head_parent = parent.map(str::to_string);
    }

    pub fn last_diff_base(&self) -> Option<String> {
        self.state().last_diff_base.clone()
    }

    pub fn last_history_query(&self) -> Option<HistoryQuery> {
        self.state().last_history_query.clone()
    }

    /// Register a commit known to [`CommitOracle::commit_exists`]
    pub fn add_commit(&self, sha: &str, message: &str) {
        self.state()
            .messages
            .insert(sha.to_string(), message.to_string());
    }

    pub fn set_children(&self, sha: &str, children: Vec<String>) {
        self.state().children.insert(sha.to_string(), children);
    }

    pub fn fail_next_fetch(&self, message: &str) {
        self.state().fail_fetch = Some(message.to_string());
    }

    pub fn fail_next_run_git(&self, message: &str) {
        self.state().fail_run_git = Some(message.to_string());
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitOracle for MockBackend {
    fn commit_exists(&self, sha: &str) -> bool {
        self.state().messages.keys().any(|known| known.starts_with(sha))
    }
}

impl GitBackend for MockBackend {
    fn workdir(&self) -> &Path {
        self.dir.path()
    }

    fn branches(&self) -> Result<BranchData> {
        Ok(self.state().branches.clone())
    }

    fn tags(&self) -> Result<Vec<Tag>> {
        Ok(self.state().tags.clone())
    }

    fn commits(&self, query: &HistoryQuery) -> Result<Vec<Commit>> {
        let mut state = self.state();
        state.last_history_query = Some(query.clone());
        Ok(state.commits.clone())
    }

    fn changes(&self, include_untracked: bool) -> Result<Vec<Change>> {
        Ok(self
            .state()
            .changes
            .iter()
            .filter(|c| include_untracked || c.work_tree != ChangeState::Untracked)
            .cloned()
            .collect())
    }

    fn stashes(&self) -> Result<Vec<Stash>> {
        Ok(Vec::new())
    }

    fn worktrees(&self) -> Result<Vec<Worktree>> {
        Ok(Vec::new())
    }

    fn submodules(&self) -> Result<Vec<Submodule>> {
        Ok(Vec::new())
    }

    fn head_parent(&self) -> Result<Option<String>> {
        Ok(self.state().head_parent.clone())
    }

    fn diff_index_against(&self, base: &str) -> Result<Vec<Change>> {
        let mut state = self.state();
        state.last_diff_base = Some(base.to_string());
        Ok(state
            .changes
            .iter()
            .filter(|c| !matches!(c.index, ChangeState::None | ChangeState::Untracked))
            .cloned()
            .collect())
    }

    fn commit_message(&self, sha: &str) -> Result<String> {
        self.state()
            .messages
            .get(sha)
            .cloned()
            .ok_or_else(|| ReposcopeError::CommitNotFound(sha.to_string()))
    }

    fn commit_sign_info(&self, _sha: &str) -> Result<CommitSignInfo> {
        Ok(CommitSignInfo::parse("N"))
    }

    fn commit_children(&self, sha: &str) -> Result<Vec<String>> {
        Ok(self.state().children.get(sha).cloned().unwrap_or_default())
    }

    fn commit_changes(&self, _sha: &str) -> Result<Vec<Change>> {
        Ok(Vec::new())
    }

    fn supports_pathspec_file(&self) -> bool {
        self.state().pathspec_file
    }

    fn stage_all(&self, include_untracked: bool) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::StageAll(include_untracked));
        state.stage(None);
        Ok(())
    }

    fn stage_paths(&self, paths: &[String]) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::StagePaths(paths.to_vec()));
        state.stage(Some(&path_set(paths)));
        Ok(())
    }

    fn stage_pathspec_file(&self, pathspec_file: &Path) -> Result<()> {
        let paths = read_pathspec(pathspec_file)?;
        let mut state = self.state();
        state.stage(Some(&path_set(&paths)));
        state.calls.push(Call::StagePathspecFile(paths));
        Ok(())
    }

    fn unstage_all(&self) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::UnstageAll);
        state.unstage(None);
        Ok(())
    }

    fn unstage_paths(&self, paths: &[String]) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::UnstagePaths(paths.to_vec()));
        state.unstage(Some(&path_set(paths)));
        Ok(())
    }

    fn unstage_pathspec_file(&self, pathspec_file: &Path) -> Result<()> {
        let paths = read_pathspec(pathspec_file)?;
        let mut state = self.state();
        state.unstage(Some(&path_set(&paths)));
        state.calls.push(Call::UnstagePathspecFile(paths));
        Ok(())
    }

    fn reset_index_to(&self, revision: Option<&str>, paths: &[String]) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::ResetIndexTo(
            revision.map(str::to_string),
            paths.to_vec(),
        ));
        state.unstage(Some(&path_set(paths)));
        Ok(())
    }

    fn discard_paths(&self, paths: &[String]) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DiscardPaths(paths.to_vec()));
        let discarded = path_set(paths);
        for change in &mut state.changes {
            if discarded.contains(&change.path) {
                change.work_tree = ChangeState::None;
            }
        }
        state.changes.retain(|c| c.index != ChangeState::None || c.work_tree != ChangeState::None);
        Ok(())
    }

    fn checkout_conflict_side(&self, side: ConflictSide, paths: &[String]) -> Result<()> {
        self.record(Call::CheckoutConflictSide(side, paths.to_vec()));
        Ok(())
    }

    fn commit(&self, options: &CommitOptions) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Commit(options.clone()));
        for change in &mut state.changes {
            if !matches!(change.index, ChangeState::Untracked) {
                change.index = ChangeState::None;
            }
        }
        state.changes.retain(|c| c.work_tree != ChangeState::None);
        Ok(())
    }

    fn push_current(&self) -> Result<()> {
        self.record(Call::PushCurrent);
        Ok(())
    }

    fn fetch(&self, options: &FetchOptions) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Fetch(options.clone()));
        match state.fail_fetch.take() {
            Some(message) => Err(ReposcopeError::CommandFailed {
                command: "fetch".to_string(),
                message,
            }),
            None => Ok(()),
        }
    }

    fn run_git(&self, args: &[String]) -> Result<String> {
        let mut state = self.state();
        state.calls.push(Call::RunGit(args.to_vec()));
        match state.fail_run_git.take() {
            Some(message) => Err(ReposcopeError::CommandFailed {
                command: args.join(" "),
                message,
            }),
            None => Ok(String::new()),
        }
    }
}

/// Settings store that keeps everything in memory
#[derive(Default)]
pub struct MemorySettingsStore {
    loaded: Mutex<Option<RepositorySettings>>,
    saved: Mutex<Option<RepositorySettings>>,
}

impl MemorySettingsStore {
    /// Settings returned by the next load
    pub fn put(&self, settings: RepositorySettings) {
        *self.loaded.lock().expect("store poisoned") = Some(settings);
    }

    /// Settings written by the last save
    pub fn saved(&self) -> Option<RepositorySettings> {
        self.saved.lock().expect("store poisoned").clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self, _common_dir: &Path) -> RepositorySettings {
        self.loaded
            .lock()
            .expect("store poisoned")
            .clone()
            .unwrap_or_default()
    }

    fn save(&self, _common_dir: &Path, settings: &RepositorySettings) -> Result<()> {
        *self.saved.lock().expect("store poisoned") = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_repo_on_main() {
        let repo = TestRepo::new();
        assert!(repo.path.join(".git").exists());
        let git_repo = repo.repo();
        let head = git_repo.find_reference("HEAD").unwrap();
        assert_eq!(head.symbolic_target(), Some("refs/heads/main"));
    }

    #[test]
    fn test_create_remote_branch_adds_remote() {
        let repo = TestRepo::with_initial_commit();
        repo.create_remote_branch("origin", "main");
        let git_repo = repo.repo();
        assert!(git_repo.find_remote("origin").is_ok());
        assert!(git_repo.find_reference("refs/remotes/origin/main").is_ok());
    }

    #[test]
    fn test_mock_index_round_trip() {
        let backend = MockBackend::new();
        backend.set_changes(vec![Change::new("a.txt", ChangeState::None, ChangeState::Untracked)]);
        backend.stage_paths(&["a.txt".to_string()]).unwrap();
        assert_eq!(backend.changes(true).unwrap()[0].index, ChangeState::Added);
        backend.unstage_all().unwrap();
        assert_eq!(backend.changes(true).unwrap()[0].work_tree, ChangeState::Untracked);
    }
}
