//! Working copy and commit change models

use serde::{Deserialize, Serialize};

/// State of one side (index or worktree) of a change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeState {
    #[default]
    None,
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
    Untracked,
    Conflict,
    TypeChanged,
}

impl ChangeState {
    /// Map one column of a porcelain `XY` status code
    pub fn from_code(code: char) -> Self {
        match code {
            'M' => ChangeState::Modified,
            'T' => ChangeState::TypeChanged,
            'A' => ChangeState::Added,
            'D' => ChangeState::Deleted,
            'R' => ChangeState::Renamed,
            'C' => ChangeState::Copied,
            '?' => ChangeState::Untracked,
            'U' => ChangeState::Conflict,
            _ => ChangeState::None,
        }
    }
}

/// Why a path is conflicted, from the unmerged porcelain codes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictReason {
    #[default]
    None,
    BothDeleted,
    AddedByUs,
    DeletedByThem,
    AddedByThem,
    DeletedByUs,
    BothAdded,
    BothModified,
}

impl ConflictReason {
    fn from_codes(x: char, y: char) -> Self {
        match (x, y) {
            ('D', 'D') => ConflictReason::BothDeleted,
            ('A', 'U') => ConflictReason::AddedByUs,
            ('U', 'D') => ConflictReason::DeletedByThem,
            ('U', 'A') => ConflictReason::AddedByThem,
            ('D', 'U') => ConflictReason::DeletedByUs,
            ('A', 'A') => ConflictReason::BothAdded,
            ('U', 'U') => ConflictReason::BothModified,
            _ => ConflictReason::None,
        }
    }

    /// Whether "their" side of the conflict removed the file
    pub fn deleted_by_them(&self) -> bool {
        matches!(self, ConflictReason::DeletedByThem | ConflictReason::BothDeleted)
    }

    /// Whether "our" side of the conflict removed the file
    pub fn deleted_by_us(&self) -> bool {
        matches!(self, ConflictReason::DeletedByUs | ConflictReason::BothDeleted)
    }
}

/// A working-copy or commit-diff entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub path: String,
    /// Source path of a rename or copy
    pub original_path: Option<String>,
    /// Staged state
    pub index: ChangeState,
    /// Unstaged state
    pub work_tree: ChangeState,
    pub conflict_reason: ConflictReason,
}

impl Change {
    pub fn new(path: impl Into<String>, index: ChangeState, work_tree: ChangeState) -> Self {
        Change {
            path: path.into(),
            original_path: None,
            index,
            work_tree,
            conflict_reason: ConflictReason::None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.work_tree == ChangeState::Conflict
    }

    /// Identity used when comparing snapshots
    pub fn identity(&self) -> (&str, ChangeState, ChangeState) {
        (&self.path, self.work_tree, self.index)
    }

    /// Parse one record of `git status --porcelain -z`.
    ///
    /// Renames and copies carry their source path in the record that
    /// follows, so the caller passes it in as `next`. Returns the change and
    /// whether `next` was consumed.
    pub fn from_porcelain(record: &str, next: Option<&str>) -> Option<(Self, bool)> {
        let mut chars = record.chars();
        let x = chars.next()?;
        let y = chars.next()?;
        let path = record.get(3..).filter(|p| !p.is_empty())?;

        if x == '!' {
            return None;
        }

        let reason = ConflictReason::from_codes(x, y);
        if reason != ConflictReason::None {
            let mut change = Change::new(path, ChangeState::None, ChangeState::Conflict);
            change.conflict_reason = reason;
            return Some((change, false));
        }

        let (index, work_tree) = if x == '?' {
            (ChangeState::None, ChangeState::Untracked)
        } else {
            (ChangeState::from_code(x), ChangeState::from_code(y))
        };

        let mut change = Change::new(path, index, work_tree);
        let has_source = matches!(x, 'R' | 'C') || matches!(y, 'R' | 'C');
        if has_source {
            change.original_path = next.map(str::to_string);
        }
        Some((change, has_source && next.is_some()))
    }

    /// Parse the full output of `git status --porcelain -z`
    pub fn parse_porcelain_z(output: &str) -> Vec<Change> {
        let records: Vec<&str> = output.split('\0').filter(|r| !r.is_empty()).collect();
        let mut changes = Vec::with_capacity(records.len());
        let mut i = 0;

        while i < records.len() {
            let next = records.get(i + 1).copied();
            match Change::from_porcelain(records[i], next) {
                Some((change, consumed)) => {
                    changes.push(change);
                    i += if consumed { 2 } else { 1 };
                }
                None => i += 1,
            }
        }

        changes
    }
}
