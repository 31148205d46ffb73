//! Detection of merge, rebase, revert and cherry-pick sessions

use std::fs;
use std::path::Path;

use crate::models::InProgressContext;

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Probe the marker files of a worktree's git dir.
///
/// The markers are checked in a fixed order so at most one context is
/// reported even when several are present.
pub fn probe(git_dir: &Path) -> InProgressContext {
    let cherry_pick = git_dir.join("CHERRY_PICK_HEAD");
    if cherry_pick.exists() {
        return InProgressContext::CherryPick {
            head: read_trimmed(&cherry_pick).unwrap_or_default(),
        };
    }

    for dir in ["rebase-merge", "rebase-apply"] {
        let rebase_dir = git_dir.join(dir);
        if rebase_dir.is_dir() {
            let head_name = read_trimmed(&rebase_dir.join("head-name")).unwrap_or_default();
            return InProgressContext::Rebase {
                head_name: head_name
                    .strip_prefix("refs/heads/")
                    .map(str::to_string)
                    .unwrap_or(head_name),
                onto: read_trimmed(&rebase_dir.join("onto")).unwrap_or_default(),
            };
        }
    }

    let revert = git_dir.join("REVERT_HEAD");
    if revert.exists() {
        return InProgressContext::Revert {
            head: read_trimmed(&revert).unwrap_or_default(),
        };
    }

    let merge = git_dir.join("MERGE_HEAD");
    if merge.exists() {
        let source = read_trimmed(&merge)
            .and_then(|s| s.lines().next().map(str::to_string))
            .unwrap_or_default();
        return InProgressContext::Merge { source };
    }

    InProgressContext::None
}
