//! Working copy snapshot reconciliation and staged/unstaged partitioning

use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::models::{Change, ChangeState};
use crate::services::git_service::{GitBackend, EMPTY_TREE_SHA};

/// Whether two snapshots differ as multisets of `(path, work tree, index)`
pub fn reconcile(previous: &[Change], next: &[Change]) -> bool {
    if previous.len() != next.len() {
        return true;
    }

    let mut counts: HashMap<(&str, ChangeState, ChangeState), isize> = HashMap::new();
    for change in previous {
        *counts.entry(change.identity()).or_default() += 1;
    }
    for change in next {
        *counts.entry(change.identity()).or_default() -= 1;
    }
    counts.values().any(|&count| count != 0)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub unstaged: Vec<Change>,
    pub staged: Vec<Change>,
}

fn unstaged_of(changes: &[Change]) -> Vec<Change> {
    changes
        .iter()
        .filter(|c| c.work_tree != ChangeState::None)
        .cloned()
        .collect()
}

fn staged_of(changes: &[Change]) -> Vec<Change> {
    changes
        .iter()
        .filter(|c| !matches!(c.index, ChangeState::None | ChangeState::Untracked))
        .cloned()
        .collect()
}

/// Revision an amended commit would be compared against
pub fn amend_base(backend: &dyn GitBackend) -> Result<String> {
    Ok(backend
        .head_parent()?
        .unwrap_or_else(|| EMPTY_TREE_SHA.to_string()))
}

/// Split a snapshot into unstaged and staged changes.
///
/// In amend mode the staged side is the diff between HEAD's parent and the
/// index, so it covers what HEAD already committed.
pub fn partition(changes: &[Change], amend: bool, backend: &dyn GitBackend) -> Result<Partition> {
    let staged = if amend {
        let base = amend_base(backend)?;
        backend.diff_index_against(&base)?
    } else {
        staged_of(changes)
    };

    Ok(Partition {
        unstaged: unstaged_of(changes),
        staged,
    })
}

/// Live working copy state of a repository
#[derive(Debug, Clone, Default)]
pub struct WorkingCopy {
    changes: Vec<Change>,
    partition: Partition,
    /// Whether `partition.staged` was computed against HEAD's parent
    partition_amend: bool,
    is_amend: bool,
    filter: String,
    conflict_count: usize,
    pending_selection: Vec<String>,
}

impl WorkingCopy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a fresh snapshot.
    ///
    /// `amend_staged` is the staged side computed for amend mode, `None` for
    /// a snapshot taken in normal mode. Partitions are only recomputed when
    /// something changed; the conflict count is refreshed every time.
    pub fn set_data(&mut self, changes: Vec<Change>, amend_staged: Option<Vec<Change>>) -> bool {
        self.conflict_count = changes.iter().filter(|c| c.is_conflict()).count();

        let changed = reconcile(&self.changes, &changes);
        let staged_changed = match (&amend_staged, self.partition_amend) {
            (Some(staged), true) => reconcile(&self.partition.staged, staged),
            (None, false) => false,
            _ => true,
        };

        if !changed && !staged_changed {
            return false;
        }

        self.partition = Partition {
            unstaged: unstaged_of(&changes),
            staged: match amend_staged {
                Some(staged) => {
                    self.partition_amend = true;
                    staged
                }
                None => {
                    self.partition_amend = false;
                    staged_of(&changes)
                }
            },
        };
        self.changes = changes;
        true
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn unstaged(&self) -> &[Change] {
        &self.partition.unstaged
    }

    pub fn staged(&self) -> &[Change] {
        &self.partition.staged
    }

    pub fn conflict_count(&self) -> usize {
        self.conflict_count
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflict_count > 0
    }

    pub fn is_amend(&self) -> bool {
        self.is_amend
    }

    /// Switch amend mode. Returns whether the mode changed.
    pub fn set_amend(&mut self, amend: bool) -> bool {
        let changed = self.is_amend != amend;
        self.is_amend = amend;
        changed
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn is_filtering(&self) -> bool {
        !self.filter.is_empty()
    }

    pub fn set_filter(&mut self, filter: &str) {
        self.filter = filter.trim().to_string();
    }

    fn matches_filter(&self, change: &Change) -> bool {
        self.filter.is_empty() || change.path.to_lowercase().contains(&self.filter.to_lowercase())
    }

    pub fn visible_unstaged(&self) -> Vec<Change> {
        self.partition
            .unstaged
            .iter()
            .filter(|c| self.matches_filter(c))
            .cloned()
            .collect()
    }

    pub fn visible_staged(&self) -> Vec<Change> {
        self.partition
            .staged
            .iter()
            .filter(|c| self.matches_filter(c))
            .cloned()
            .collect()
    }

    pub fn pending_selection(&self) -> &[String] {
        &self.pending_selection
    }

    pub fn set_pending_selection(&mut self, paths: Vec<String>) {
        self.pending_selection = paths;
    }

    pub fn take_pending_selection(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_selection)
    }
}
