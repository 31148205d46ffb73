//! Bisect session state and subcommands

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::models::{BisectCommand, BisectState};
use crate::services::git_service::GitBackend;

/// Good and bad refs recorded under `refs/bisect`, loose and packed
fn bisect_refs(git_dir: &Path, common_dir: &Path) -> (bool, bool) {
    let mut has_bad = false;
    let mut has_good = false;

    let mut record = |name: &str| {
        if name == "bad" {
            has_bad = true;
        } else if name.starts_with("good-") {
            has_good = true;
        }
    };

    for dir in [git_dir, common_dir] {
        if let Ok(entries) = fs::read_dir(dir.join("refs").join("bisect")) {
            for entry in entries.flatten() {
                record(&entry.file_name().to_string_lossy());
            }
        }
    }

    if let Ok(packed) = fs::read_to_string(common_dir.join("packed-refs")) {
        for line in packed.lines() {
            if let Some(name) = line
                .split_whitespace()
                .nth(1)
                .and_then(|r| r.strip_prefix("refs/bisect/"))
            {
                record(name);
            }
        }
    }

    (has_bad, has_good)
}

/// Read the bisect session state of a worktree
pub fn bisect_state(git_dir: &Path, common_dir: &Path) -> BisectState {
    if !git_dir.join("BISECT_START").exists() {
        return BisectState::None;
    }

    match bisect_refs(git_dir, common_dir) {
        (true, true) => BisectState::Detecting,
        _ => BisectState::WaitingForRange,
    }
}

/// Run a bisect subcommand and return git's output
pub fn run(backend: &dyn GitBackend, command: &BisectCommand) -> Result<String> {
    backend.run_git(&command.args())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Call, MockBackend};
    use tempfile::TempDir;

    #[test]
    fn test_no_session() {
        let dir = TempDir::new().unwrap();
        assert_eq!(bisect_state(dir.path(), dir.path()), BisectState::None);
    }

    #[test]
    fn test_waiting_for_range() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("BISECT_START"), "main").unwrap();
        assert_eq!(bisect_state(dir.path(), dir.path()), BisectState::WaitingForRange);

        let refs = dir.path().join("refs").join("bisect");
        fs::create_dir_all(&refs).unwrap();
        fs::write(refs.join("bad"), "aaaa").unwrap();
        assert_eq!(bisect_state(dir.path(), dir.path()), BisectState::WaitingForRange);
    }

    #[test]
    fn test_detecting_with_loose_refs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("BISECT_START"), "main").unwrap();
        let refs = dir.path().join("refs").join("bisect");
        fs::create_dir_all(&refs).unwrap();
        fs::write(refs.join("bad"), "aaaa").unwrap();
        fs::write(refs.join("good-bbbb"), "bbbb").unwrap();
        assert_eq!(bisect_state(dir.path(), dir.path()), BisectState::Detecting);
    }

    #[test]
    fn test_detecting_with_packed_refs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("BISECT_START"), "main").unwrap();
        fs::write(
            dir.path().join("packed-refs"),
            "# pack-refs with: peeled fully-peeled sorted\naaaa refs/bisect/bad\nbbbb refs/bisect/good-bbbb\n",
        )
        .unwrap();
        assert_eq!(bisect_state(dir.path(), dir.path()), BisectState::Detecting);
    }

    #[test]
    fn test_run_passes_subcommand() {
        let backend = MockBackend::new();
        run(&backend, &BisectCommand::Good(Some("v1.0".to_string()))).unwrap();
        assert_eq!(
            backend.calls(),
            vec![Call::RunGit(vec![
                "bisect".to_string(),
                "good".to_string(),
                "v1.0".to_string()
            ])]
        );
    }
}
