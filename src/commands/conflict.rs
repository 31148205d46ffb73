//! Conflict resolution: take one side or mark resolved

use crate::commands::staging::{add_paths, PATHSPEC_BATCH_SIZE};
use crate::error::Result;
use crate::models::Change;
use crate::services::git_service::{ConflictSide, GitBackend};

/// Resolve conflicted entries of `changes` by taking `side`.
///
/// Entries that are not conflicted are ignored. When the chosen side deleted
/// the file it is removed from the working tree instead of checked out.
/// Every resolved path is staged afterwards. Returns the resolved paths.
pub fn use_side(backend: &dyn GitBackend, changes: &[Change], side: ConflictSide) -> Result<Vec<String>> {
    let workdir = backend.workdir().to_path_buf();
    let mut checkout = Vec::new();
    let mut resolved = Vec::new();

    for change in changes.iter().filter(|c| c.is_conflict()) {
        let deleted = match side {
            ConflictSide::Theirs => change.conflict_reason.deleted_by_them(),
            ConflictSide::Ours => change.conflict_reason.deleted_by_us(),
        };

        if deleted {
            let full_path = workdir.join(&change.path);
            if full_path.exists() {
                std::fs::remove_file(&full_path)?;
            }
        } else {
            checkout.push(change.path.clone());
        }
        resolved.push(change.path.clone());
    }

    for chunk in checkout.chunks(PATHSPEC_BATCH_SIZE) {
        backend.checkout_conflict_side(side, chunk)?;
    }

    add_paths(backend, &resolved)?;
    tracing::info!("Resolved {} conflicts using {:?}", resolved.len(), side);
    Ok(resolved)
}

/// Stage conflicted entries as they are in the working tree
pub fn mark_resolved(backend: &dyn GitBackend, changes: &[Change]) -> Result<Vec<String>> {
    let paths: Vec<String> = changes
        .iter()
        .filter(|c| c.is_conflict())
        .map(|c| c.path.clone())
        .collect();
    add_paths(backend, &paths)?;
    Ok(paths)
}
