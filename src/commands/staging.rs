//! Stage, unstage and discard selections of working copy changes

use std::collections::HashSet;
use std::io::Write;

use crate::error::Result;
use crate::models::{Change, ChangeState};
use crate::services::git_service::GitBackend;

/// Paths passed to one git invocation when no pathspec file can be used
pub const PATHSPEC_BATCH_SIZE: usize = 10;

fn paths_of(changes: &[Change]) -> Vec<String> {
    changes.iter().map(|c| c.path.clone()).collect()
}

/// Whether `selection` names exactly the paths of a non-empty `all`
fn is_full_set(selection: &[Change], all: &[Change]) -> bool {
    if all.is_empty() {
        return false;
    }
    let selected: HashSet<&str> = selection.iter().map(|c| c.path.as_str()).collect();
    let known: HashSet<&str> = all.iter().map(|c| c.path.as_str()).collect();
    selected == known
}

/// Run `by_file` once with a pathspec file when git supports it, otherwise
/// `by_chunk` for every batch of at most [`PATHSPEC_BATCH_SIZE`] paths.
pub(crate) fn run_batched<F, C>(
    backend: &dyn GitBackend,
    paths: &[String],
    by_file: F,
    by_chunk: C,
) -> Result<()>
where
    F: FnOnce(&std::path::Path) -> Result<()>,
    C: Fn(&[String]) -> Result<()>,
{
    if paths.is_empty() {
        return Ok(());
    }

    if backend.supports_pathspec_file() {
        let mut pathspec = tempfile::NamedTempFile::new()?;
        for path in paths {
            writeln!(pathspec, "{}", path)?;
        }
        pathspec.flush()?;
        return by_file(pathspec.path());
    }

    for chunk in paths.chunks(PATHSPEC_BATCH_SIZE) {
        by_chunk(chunk)?;
    }
    Ok(())
}

/// Add paths to the index in batches
pub(crate) fn add_paths(backend: &dyn GitBackend, paths: &[String]) -> Result<()> {
    run_batched(
        backend,
        paths,
        |file| backend.stage_pathspec_file(file),
        |chunk| backend.stage_paths(chunk),
    )
}

/// Stage `selection` out of the full unstaged list
pub fn stage(
    backend: &dyn GitBackend,
    selection: &[Change],
    unstaged: &[Change],
    include_untracked: bool,
) -> Result<()> {
    if selection.is_empty() {
        return Ok(());
    }

    if is_full_set(selection, unstaged) {
        tracing::debug!("Staging all {} changes", unstaged.len());
        return backend.stage_all(include_untracked);
    }

    add_paths(backend, &paths_of(selection))
}

/// Unstage `selection` out of the full staged list.
///
/// In amend mode the entries are reset to HEAD's parent instead of HEAD;
/// `amend_base` is that parent, `None` when HEAD is a root commit.
pub fn unstage(
    backend: &dyn GitBackend,
    selection: &[Change],
    staged: &[Change],
    amend_base: Option<Option<&str>>,
) -> Result<()> {
    if selection.is_empty() {
        return Ok(());
    }

    let paths = paths_of(selection);

    if let Some(base) = amend_base {
        let mut paths = paths;
        // renamed entries have to bring their source back
        paths.extend(selection.iter().filter_map(|c| c.original_path.clone()));
        for chunk in paths.chunks(PATHSPEC_BATCH_SIZE) {
            backend.reset_index_to(base, chunk)?;
        }
        return Ok(());
    }

    if is_full_set(selection, staged) {
        tracing::debug!("Unstaging all {} changes", staged.len());
        return backend.unstage_all();
    }

    run_batched(
        backend,
        &paths,
        |file| backend.unstage_pathspec_file(file),
        |chunk| backend.unstage_paths(chunk),
    )
}

/// Throw away working tree changes. Untracked files are deleted.
pub fn discard(backend: &dyn GitBackend, changes: &[Change]) -> Result<()> {
    let workdir = backend.workdir().to_path_buf();
    let mut tracked = Vec::new();

    for change in changes {
        if change.work_tree == ChangeState::Untracked {
            let full_path = workdir.join(&change.path);
            if full_path.is_dir() {
                std::fs::remove_dir_all(&full_path)?;
            } else if full_path.exists() {
                std::fs::remove_file(&full_path)?;
            }
        } else if change.work_tree != ChangeState::None {
            tracked.push(change.path.clone());
        }
    }

    for chunk in tracked.chunks(PATHSPEC_BATCH_SIZE) {
        backend.discard_paths(chunk)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::git_service::GitService;
    use crate::state::change_set::partition;
    use crate::test_utils::{Call, MockBackend, TestRepo};

    fn modified(count: usize) -> Vec<Change> {
        (0..count)
            .map(|i| Change::new(format!("file{:02}.txt", i), ChangeState::None, ChangeState::Modified))
            .collect()
    }

    #[test]
    fn test_stage_batches_without_pathspec_file() {
        let backend = MockBackend::new();
        backend.set_pathspec_file_support(false);
        let unstaged = modified(26);

        stage(&backend, &unstaged[..25], &unstaged, true).unwrap();

        let sizes: Vec<usize> = backend
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::StagePaths(paths) => Some(paths.len()),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[test]
    fn test_stage_full_set_is_single_call() {
        let backend = MockBackend::new();
        backend.set_pathspec_file_support(false);
        let unstaged = modified(25);

        stage(&backend, &unstaged, &unstaged, true).unwrap();
        assert_eq!(backend.calls(), vec![Call::StageAll(true)]);
    }

    #[test]
    fn test_stage_against_unknown_list_names_paths() {
        let backend = MockBackend::new();
        backend.set_pathspec_file_support(false);
        let selection = modified(1);

        stage(&backend, &selection, &[], true).unwrap();
        assert_eq!(backend.calls(), vec![Call::StagePaths(vec!["file00.txt".to_string()])]);
    }

    #[test]
    fn test_selection_outside_list_is_not_full_set() {
        let backend = MockBackend::new();
        backend.set_pathspec_file_support(false);
        let staged = modified(2);
        let mut selection = staged.clone();
        selection.push(Change::new("other.txt", ChangeState::Modified, ChangeState::None));

        unstage(&backend, &selection, &staged, None).unwrap();
        assert_eq!(
            backend.calls(),
            vec![Call::UnstagePaths(vec![
                "file00.txt".to_string(),
                "file01.txt".to_string(),
                "other.txt".to_string(),
            ])]
        );
    }

    #[test]
    fn test_stage_uses_pathspec_file() {
        let backend = MockBackend::new();
        backend.set_pathspec_file_support(true);
        let unstaged = modified(25);

        stage(&backend, &unstaged[..24], &unstaged, true).unwrap();
        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            Call::StagePathspecFile(paths) => assert_eq!(paths.len(), 24),
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn test_unstage_amend_resets_to_parent() {
        let backend = MockBackend::new();
        let staged = modified(3);

        unstage(&backend, &staged[..1], &staged, Some(Some("abc123"))).unwrap();
        assert_eq!(
            backend.calls(),
            vec![Call::ResetIndexTo(
                Some("abc123".to_string()),
                vec!["file00.txt".to_string()]
            )]
        );
    }

    #[test]
    fn test_unstage_amend_root_commit_removes_entries() {
        let backend = MockBackend::new();
        let staged = modified(2);

        unstage(&backend, &staged, &staged, Some(None)).unwrap();
        assert!(matches!(&backend.calls()[0], Call::ResetIndexTo(None, paths) if paths.len() == 2));
    }

    #[test]
    fn test_stage_then_unstage_restores_unstaged() {
        let backend = MockBackend::new();
        backend.set_pathspec_file_support(false);
        backend.set_changes(vec![
            Change::new("a.txt", ChangeState::None, ChangeState::Modified),
            Change::new("b.txt", ChangeState::None, ChangeState::Untracked),
            Change::new("c.txt", ChangeState::None, ChangeState::Deleted),
        ]);

        let before = partition(&backend.changes(true).unwrap(), false, &backend).unwrap();
        stage(&backend, &before.unstaged, &before.unstaged, true).unwrap();

        let middle = partition(&backend.changes(true).unwrap(), false, &backend).unwrap();
        assert!(middle.unstaged.is_empty());
        assert_eq!(middle.staged.len(), 3);

        unstage(&backend, &middle.staged, &middle.staged, None).unwrap();
        let after = partition(&backend.changes(true).unwrap(), false, &backend).unwrap();

        let mut expected: Vec<_> = before.unstaged.iter().map(|c| c.identity()).collect();
        let mut actual: Vec<_> = after.unstaged.iter().map(|c| c.identity()).collect();
        expected.sort();
        actual.sort();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_discard_against_real_repository() {
        let repo = TestRepo::with_initial_commit();
        repo.create_file("README.md", "Modified content");
        repo.create_file("untracked.txt", "Untracked content");

        let service = GitService::new(&repo.path);
        let changes = service.changes(true).unwrap();
        assert_eq!(changes.len(), 2);

        discard(&service, &changes).unwrap();

        let content = std::fs::read_to_string(repo.path.join("README.md")).unwrap();
        assert_eq!(content, "# Test Repo");
        assert!(!repo.path.join("untracked.txt").exists());
        assert!(service.changes(true).unwrap().is_empty());
    }

    #[test]
    fn test_stage_and_unstage_against_real_repository() {
        let repo = TestRepo::with_initial_commit();
        repo.create_file("a.txt", "a");
        repo.create_file("b.txt", "b");

        let service = GitService::new(&repo.path);
        let unstaged = service.changes(true).unwrap();
        let selection: Vec<_> = unstaged.iter().filter(|c| c.path == "a.txt").cloned().collect();

        stage(&service, &selection, &unstaged, true).unwrap();
        let after = partition(&service.changes(true).unwrap(), false, &service).unwrap();
        assert_eq!(after.staged.len(), 1);
        assert_eq!(after.staged[0].path, "a.txt");

        unstage(&service, &after.staged, &after.staged, None).unwrap();
        let restored = partition(&service.changes(true).unwrap(), false, &service).unwrap();
        assert!(restored.staged.is_empty());
        assert_eq!(restored.unstaged.len(), 2);
    }
}
