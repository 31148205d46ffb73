//! Git service: the command-execution boundary of a repository
//!
//! Queries go through git2 where libgit2 covers them; mutations and the few
//! queries libgit2 cannot answer (rev-list ancestry, signature checks,
//! pathspec files) shell out through [`run_git`]. Every method is blocking
//! and is expected to run inside `spawn_blocking`.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

use crate::error::{ReposcopeError, Result};
use crate::models::{
    AheadBehind, Branch, Change, ChangeState, Commit, CommitSignInfo, HistoryQuery, Stash,
    Submodule, SubmoduleStatus, Tag, Worktree,
};
use crate::utils::{parse_git_version, run_git};

/// Object id of the empty tree
pub const EMPTY_TREE_SHA: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// First git release that understands `--pathspec-from-file`
const PATHSPEC_FILE_VERSION: (u32, u32, u32) = (2, 25, 0);

/// Answers whether a revision names a commit in the repository
pub trait CommitOracle {
    fn commit_exists(&self, sha: &str) -> bool;
}

impl<F> CommitOracle for F
where
    F: Fn(&str) -> bool,
{
    fn commit_exists(&self, sha: &str) -> bool {
        self(sha)
    }
}

/// Which side of a conflict to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSide {
    Ours,
    Theirs,
}

impl ConflictSide {
    fn checkout_flag(&self) -> &'static str {
        match self {
            ConflictSide::Ours => "--ours",
            ConflictSide::Theirs => "--theirs",
        }
    }
}

/// Branches together with the configured remote names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchData {
    pub branches: Vec<Branch>,
    pub remotes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOptions {
    pub message: String,
    pub amend: bool,
    pub sign_off: bool,
    pub allow_empty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Fetch every remote when `None`
    pub remote: Option<String>,
    pub prune: bool,
    pub no_tags: bool,
}

/// Operations the live-state controller needs from git
pub trait GitBackend: CommitOracle + Send + Sync {
    fn workdir(&self) -> &Path;

    fn branches(&self) -> Result<BranchData>;
    fn tags(&self) -> Result<Vec<Tag>>;
    fn commits(&self, query: &HistoryQuery) -> Result<Vec<Commit>>;
    fn changes(&self, include_untracked: bool) -> Result<Vec<Change>>;
    fn stashes(&self) -> Result<Vec<Stash>>;
    fn worktrees(&self) -> Result<Vec<Worktree>>;
    fn submodules(&self) -> Result<Vec<Submodule>>;

    /// First parent of HEAD, `None` for a root commit or an unborn branch
    fn head_parent(&self) -> Result<Option<String>>;
    /// Index entries that differ from the tree of `base`
    fn diff_index_against(&self, base: &str) -> Result<Vec<Change>>;

    fn commit_message(&self, sha: &str) -> Result<String>;
    fn commit_sign_info(&self, sha: &str) -> Result<CommitSignInfo>;
    fn commit_children(&self, sha: &str) -> Result<Vec<String>>;
    fn commit_changes(&self, sha: &str) -> Result<Vec<Change>>;

    fn supports_pathspec_file(&self) -> bool;
    fn stage_all(&self, include_untracked: bool) -> Result<()>;
    fn stage_paths(&self, paths: &[String]) -> Result<()>;
    fn stage_pathspec_file(&self, pathspec_file: &Path) -> Result<()>;
    fn unstage_all(&self) -> Result<()>;
    fn unstage_paths(&self, paths: &[String]) -> Result<()>;
    fn unstage_pathspec_file(&self, pathspec_file: &Path) -> Result<()>;
    /// Reset index entries to `revision`, or drop them when there is none
    fn reset_index_to(&self, revision: Option<&str>, paths: &[String]) -> Result<()>;
    fn discard_paths(&self, paths: &[String]) -> Result<()>;
    fn checkout_conflict_side(&self, side: ConflictSide, paths: &[String]) -> Result<()>;

    fn commit(&self, options: &CommitOptions) -> Result<()>;
    fn push_current(&self) -> Result<()>;
    fn fetch(&self, options: &FetchOptions) -> Result<()>;

    /// Run an arbitrary git command in the working copy
    fn run_git(&self, args: &[String]) -> Result<String>;
}

/// Locations of a repository on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryPaths {
    pub workdir: PathBuf,
    /// Per-worktree git dir (`.git/worktrees/<name>` for linked worktrees)
    pub git_dir: PathBuf,
    /// Git dir shared by all worktrees
    pub common_dir: PathBuf,
}

impl RepositoryPaths {
    /// Resolve the paths of the repository containing `path`
    pub fn discover(path: &Path) -> Result<Self> {
        let repo = git2::Repository::discover(path)
            .map_err(|_| ReposcopeError::RepositoryNotFound(path.display().to_string()))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| ReposcopeError::InvalidPath(format!("{} is bare", path.display())))?;

        Ok(RepositoryPaths {
            workdir: trim_dir(workdir),
            git_dir: trim_dir(repo.path()),
            common_dir: trim_dir(repo.commondir()),
        })
    }
}

fn trim_dir(path: &Path) -> PathBuf {
    path.components().collect()
}

/// [`GitBackend`] backed by libgit2 and the git executable
pub struct GitService {
    workdir: PathBuf,
    pathspec_file: OnceCell<bool>,
}

impl GitService {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            pathspec_file: OnceCell::new(),
        }
    }

    fn open(&self) -> Result<git2::Repository> {
        Ok(git2::Repository::open(&self.workdir)?)
    }

    fn git<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
        run_git(&self.workdir, args)
    }

    fn git_with_paths(&self, prefix: &[&str], paths: &[String]) -> Result<()> {
        let mut args: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
        args.push("--".to_string());
        args.extend(paths.iter().cloned());
        self.git(&args).map(|_| ())
    }
}

fn delta_state(delta: git2::Delta) -> ChangeState {
    match delta {
        git2::Delta::Added => ChangeState::Added,
        git2::Delta::Deleted => ChangeState::Deleted,
        git2::Delta::Modified => ChangeState::Modified,
        git2::Delta::Renamed => ChangeState::Renamed,
        git2::Delta::Copied => ChangeState::Copied,
        git2::Delta::Typechange => ChangeState::TypeChanged,
        git2::Delta::Untracked => ChangeState::Untracked,
        git2::Delta::Conflicted => ChangeState::Conflict,
        _ => ChangeState::None,
    }
}

/// Convert a diff into changes carried on the index side
fn diff_to_changes(diff: &mut git2::Diff) -> Result<Vec<Change>> {
    diff.find_similar(None)?;

    let mut changes = Vec::new();
    for delta in diff.deltas() {
        let state = delta_state(delta.status());
        if state == ChangeState::None {
            continue;
        }
        let new_path = delta.new_file().path().or_else(|| delta.old_file().path());
        let Some(new_path) = new_path else {
            continue;
        };

        let mut change = Change::new(
            new_path.to_string_lossy().into_owned(),
            state,
            ChangeState::None,
        );
        if matches!(state, ChangeState::Renamed | ChangeState::Copied) {
            change.original_path = delta
                .old_file()
                .path()
                .map(|p| p.to_string_lossy().into_owned());
        }
        changes.push(change);
    }
    Ok(changes)
}

impl CommitOracle for GitService {
    fn commit_exists(&self, sha: &str) -> bool {
        let Ok(repo) = self.open() else {
            return false;
        };
        let found = repo.revparse_single(&format!("{}^{{commit}}", sha)).is_ok();
        found
    }
}

impl GitBackend for GitService {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn branches(&self) -> Result<BranchData> {
        let repo = self.open()?;
        let head = repo.head().ok();
        let head_name = head.as_ref().and_then(|h| h.name().map(str::to_string));
        let mut branches = Vec::new();

        for branch_result in repo.branches(None)? {
            let (branch, branch_type) = branch_result?;
            let reference = branch.get();
            if reference.kind() == Some(git2::ReferenceType::Symbolic) {
                continue;
            }
            let Some(full_name) = reference.name().map(str::to_string) else {
                continue;
            };
            let Some(target) = reference.target() else {
                continue;
            };

            let is_local = branch_type == git2::BranchType::Local;
            let short = branch.name()?.unwrap_or("").to_string();
            let (remote, name) = if is_local {
                (None, short)
            } else {
                // remote names may contain '/', so ask the configured refspecs
                let remote = repo
                    .branch_remote_name(&full_name)
                    .ok()
                    .and_then(|buf| buf.as_str().map(str::to_string));
                let name = remote
                    .as_deref()
                    .and_then(|r| short.strip_prefix(r))
                    .and_then(|rest| rest.strip_prefix('/'))
                    .map(str::to_string)
                    .unwrap_or(short);
                (remote, name)
            };

            let upstream_branch = if is_local { branch.upstream().ok() } else { None };
            let upstream = upstream_branch
                .as_ref()
                .and_then(|u| u.get().name().map(str::to_string));
            let track_status = upstream_branch
                .as_ref()
                .and_then(|u| u.get().target())
                .and_then(|upstream_oid| repo.graph_ahead_behind(target, upstream_oid).ok())
                .map(|(ahead, behind)| AheadBehind { ahead, behind });

            let committer_date = repo
                .find_commit(target)
                .map(|c| c.committer().when().seconds())
                .unwrap_or(0);

            branches.push(Branch {
                is_current: head_name.as_deref() == Some(full_name.as_str()),
                full_name,
                name,
                head: target.to_string(),
                upstream,
                track_status,
                is_local,
                remote,
                committer_date,
            });
        }

        let remotes = repo
            .remotes()?
            .iter()
            .flatten()
            .map(str::to_string)
            .collect();

        Ok(BranchData { branches, remotes })
    }

    fn tags(&self) -> Result<Vec<Tag>> {
        let repo = self.open()?;
        let mut tags = Vec::new();

        repo.tag_foreach(|oid, name| {
            let name_str = String::from_utf8_lossy(name).to_string();
            let short_name = name_str
                .strip_prefix("refs/tags/")
                .unwrap_or(&name_str)
                .to_string();

            let (target, creator_date, message) = match repo.find_tag(oid) {
                Ok(tag) => (
                    tag.target_id().to_string(),
                    tag.tagger().map(|t| t.when().seconds()).unwrap_or(0),
                    tag.message().map(|m| m.trim().to_string()),
                ),
                Err(_) => {
                    let date = repo
                        .find_commit(oid)
                        .map(|c| c.committer().when().seconds())
                        .unwrap_or(0);
                    (oid.to_string(), date, None)
                }
            };

            tags.push(Tag {
                name: short_name,
                target,
                creator_date,
                message,
            });
            true
        })?;

        Ok(tags)
    }

    fn commits(&self, query: &HistoryQuery) -> Result<Vec<Commit>> {
        let mut args = vec![
            "log".to_string(),
            "--no-show-signature".to_string(),
            "--decorate=no".to_string(),
            "--date-order".to_string(),
            format!("--max-count={}", query.max_count),
            "--format=%x1e%H%x1f%P%x1f%an%x1f%ae%x1f%at%x1f%cn%x1f%ce%x1f%ct%x1f%s".to_string(),
        ];
        if query.revisions.is_empty() {
            args.push("--all".to_string());
        } else {
            args.extend(query.revisions.iter().cloned());
        }
        args.push("--".to_string());

        let output = self.git(&args)?;
        Ok(output
            .split('\x1e')
            .filter_map(Commit::from_log_record)
            .collect())
    }

    fn changes(&self, include_untracked: bool) -> Result<Vec<Change>> {
        let untracked = if include_untracked { "-uall" } else { "-uno" };
        let output = self.git(&[
            "--no-optional-locks",
            "status",
            "-z",
            "--porcelain",
            "--ignore-submodules=dirty",
            untracked,
        ])?;
        Ok(Change::parse_porcelain_z(&output))
    }

    fn stashes(&self) -> Result<Vec<Stash>> {
        let mut repo = self.open()?;
        let mut entries = Vec::new();

        repo.stash_foreach(|index, message, oid| {
            entries.push((index, message.to_string(), *oid));
            true
        })?;

        Ok(entries
            .into_iter()
            .map(|(index, message, oid)| Stash {
                index,
                name: format!("stash@{{{}}}", index),
                message,
                oid: oid.to_string(),
                time: repo.find_commit(oid).map(|c| c.time().seconds()).unwrap_or(0),
            })
            .collect())
    }

    fn worktrees(&self) -> Result<Vec<Worktree>> {
        let output = self.git(&["worktree", "list", "--porcelain"])?;
        Ok(Worktree::parse_porcelain(&output))
    }

    fn submodules(&self) -> Result<Vec<Submodule>> {
        let repo = self.open()?;
        let mut submodules = Vec::new();

        for submodule in repo.submodules()? {
            let status = match submodule.open() {
                Ok(sub_repo) => {
                    let head_id = sub_repo.head().ok().and_then(|h| h.target());
                    if head_id != submodule.index_id() {
                        SubmoduleStatus::Modified
                    } else {
                        let mut options = git2::StatusOptions::new();
                        options.include_untracked(true).recurse_untracked_dirs(false);
                        let dirty = sub_repo
                            .statuses(Some(&mut options))
                            .map(|s| s.iter().any(|e| !e.status().is_empty()))
                            .unwrap_or(false);
                        if dirty {
                            SubmoduleStatus::Dirty
                        } else {
                            SubmoduleStatus::Current
                        }
                    }
                }
                Err(_) => SubmoduleStatus::Uninitialized,
            };

            submodules.push(Submodule {
                path: submodule.path().to_string_lossy().into_owned(),
                url: submodule.url().map(str::to_string),
                head: submodule.head_id().map(|id| id.to_string()),
                status,
            });
        }

        Ok(submodules)
    }

    fn head_parent(&self) -> Result<Option<String>> {
        let repo = self.open()?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let commit = head.peel_to_commit()?;
        Ok(commit.parent_id(0).ok().map(|id| id.to_string()))
    }

    fn diff_index_against(&self, base: &str) -> Result<Vec<Change>> {
        let repo = self.open()?;
        let tree = if base == EMPTY_TREE_SHA {
            None
        } else {
            Some(repo.revparse_single(base)?.peel_to_tree()?)
        };

        let mut options = git2::DiffOptions::new();
        options.include_typechange(true);
        let mut diff = repo.diff_tree_to_index(tree.as_ref(), None, Some(&mut options))?;
        diff_to_changes(&mut diff)
    }

    fn commit_message(&self, sha: &str) -> Result<String> {
        let repo = self.open()?;
        let commit = repo
            .revparse_single(sha)
            .and_then(|o| o.peel_to_commit())
            .map_err(|_| ReposcopeError::CommitNotFound(sha.to_string()))?;
        Ok(String::from_utf8_lossy(commit.message_bytes()).into_owned())
    }

    fn commit_sign_info(&self, sha: &str) -> Result<CommitSignInfo> {
        let output = self.git(&["--no-pager", "log", "-1", "--format=%G?%x00%GS%x00%GK", sha])?;
        Ok(CommitSignInfo::parse(&output))
    }

    fn commit_children(&self, sha: &str) -> Result<Vec<String>> {
        let exclude = format!("^{}", sha);
        let output = self.git(&[
            "rev-list",
            "--parents",
            "--branches",
            "--remotes",
            "--tags",
            "--ancestry-path",
            exclude.as_str(),
        ])?;

        Ok(output
            .lines()
            .filter_map(|line| {
                let mut ids = line.split_whitespace();
                let child = ids.next()?;
                ids.any(|parent| parent == sha).then(|| child.to_string())
            })
            .collect())
    }

    fn commit_changes(&self, sha: &str) -> Result<Vec<Change>> {
        let repo = self.open()?;
        let commit = repo
            .revparse_single(sha)
            .and_then(|o| o.peel_to_commit())
            .map_err(|_| ReposcopeError::CommitNotFound(sha.to_string()))?;

        let tree = commit.tree()?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };

        let mut options = git2::DiffOptions::new();
        options.include_typechange(true);
        let mut diff =
            repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut options))?;
        diff_to_changes(&mut diff)
    }

    fn supports_pathspec_file(&self) -> bool {
        *self.pathspec_file.get_or_init(|| {
            self.git(&["--version"])
                .ok()
                .and_then(|out| parse_git_version(&out))
                .map(|version| version >= PATHSPEC_FILE_VERSION)
                .unwrap_or(false)
        })
    }

    fn stage_all(&self, include_untracked: bool) -> Result<()> {
        let mode = if include_untracked { "--all" } else { "--update" };
        self.git(&["add", mode]).map(|_| ())
    }

    fn stage_paths(&self, paths: &[String]) -> Result<()> {
        self.git_with_paths(&["add"], paths)
    }

    fn stage_pathspec_file(&self, pathspec_file: &Path) -> Result<()> {
        let arg = format!("--pathspec-from-file={}", pathspec_file.display());
        self.git(&["add", arg.as_str()]).map(|_| ())
    }

    fn unstage_all(&self) -> Result<()> {
        if self.open()?.head().is_ok() {
            self.git(&["reset", "-q"]).map(|_| ())
        } else {
            self.git(&["rm", "--cached", "-r", "-q", "--ignore-unmatch", "--", "."])
                .map(|_| ())
        }
    }

    fn unstage_paths(&self, paths: &[String]) -> Result<()> {
        self.git_with_paths(&["reset", "-q"], paths)
    }

    fn unstage_pathspec_file(&self, pathspec_file: &Path) -> Result<()> {
        let arg = format!("--pathspec-from-file={}", pathspec_file.display());
        self.git(&["reset", "-q", arg.as_str()]).map(|_| ())
    }

    fn reset_index_to(&self, revision: Option<&str>, paths: &[String]) -> Result<()> {
        match revision {
            Some(revision) => self.git_with_paths(&["reset", "-q", revision], paths),
            None => self.git_with_paths(&["rm", "--cached", "--ignore-unmatch", "-r", "-q"], paths),
        }
    }

    fn discard_paths(&self, paths: &[String]) -> Result<()> {
        self.git_with_paths(&["checkout", "--force"], paths)
    }

    fn checkout_conflict_side(&self, side: ConflictSide, paths: &[String]) -> Result<()> {
        self.git_with_paths(&["checkout", side.checkout_flag()], paths)
    }

    fn commit(&self, options: &CommitOptions) -> Result<()> {
        let mut message_file = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut message_file, options.message.as_bytes())?;

        let mut args = vec![
            "commit".to_string(),
            format!("--file={}", message_file.path().display()),
        ];
        if options.amend {
            args.push("--amend".to_string());
        }
        if options.sign_off {
            args.push("--signoff".to_string());
        }
        if options.allow_empty {
            args.push("--allow-empty".to_string());
        }

        self.git(&args).map(|_| ())
    }

    fn push_current(&self) -> Result<()> {
        let repo = self.open()?;
        let head = repo.head().map_err(|_| ReposcopeError::NoCurrentBranch)?;
        if !head.is_branch() {
            return Err(ReposcopeError::NoCurrentBranch);
        }
        let branch_name = head
            .shorthand()
            .ok_or(ReposcopeError::NoCurrentBranch)?
            .to_string();

        let has_upstream = repo
            .find_branch(&branch_name, git2::BranchType::Local)
            .and_then(|b| b.upstream())
            .is_ok();
        if has_upstream {
            return self.git(&["push"]).map(|_| ());
        }

        let remotes = repo.remotes()?;
        let remote = remotes
            .iter()
            .flatten()
            .find(|r| *r == "origin")
            .or_else(|| remotes.iter().flatten().next())
            .ok_or(ReposcopeError::NoRemotes)?
            .to_string();

        self.git(&["push", "--set-upstream", remote.as_str(), branch_name.as_str()])
            .map(|_| ())
    }

    fn fetch(&self, options: &FetchOptions) -> Result<()> {
        let mut args = vec!["fetch".to_string(), "--force".to_string()];
        if options.prune {
            args.push("--prune".to_string());
        }
        if options.no_tags {
            args.push("--no-tags".to_string());
        }
        match &options.remote {
            Some(remote) => args.push(remote.clone()),
            None => args.push("--all".to_string()),
        }
        self.git(&args).map(|_| ())
    }

    fn run_git(&self, args: &[String]) -> Result<String> {
        self.git(args)
    }
}
