//! Lock-free flags shared between the watcher, the auto-fetch timer and the
//! update queue

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Category of repository state made stale by a file-system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyCategory {
    /// Branches, tags and everything derived from refs
    Refs,
    /// Working copy changes and stashes
    WorkingCopy,
    /// Both of the above
    All,
}

/// Shared flags for one repository
#[derive(Debug, Default)]
pub struct RepoSignals {
    dirty_refs: AtomicBool,
    dirty_working_copy: AtomicBool,
    fetching: AtomicBool,
    auto_fetching: AtomicBool,
    operation: AtomicBool,
}

impl RepoSignals {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mark_dirty(&self, category: DirtyCategory) {
        if matches!(category, DirtyCategory::Refs | DirtyCategory::All) {
            self.dirty_refs.store(true, Ordering::Release);
        }
        if matches!(category, DirtyCategory::WorkingCopy | DirtyCategory::All) {
            self.dirty_working_copy.store(true, Ordering::Release);
        }
    }

    /// Clear the refs flag, returning whether it was set
    pub fn take_dirty_refs(&self) -> bool {
        self.dirty_refs.swap(false, Ordering::AcqRel)
    }

    /// Clear the working copy flag, returning whether it was set
    pub fn take_dirty_working_copy(&self) -> bool {
        self.dirty_working_copy.swap(false, Ordering::AcqRel)
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }

    pub fn is_auto_fetching(&self) -> bool {
        self.auto_fetching.load(Ordering::Acquire)
    }

    pub fn is_operation_running(&self) -> bool {
        self.operation.load(Ordering::Acquire)
    }

    /// Claim the fetch slot. Returns `None` when a fetch is already running.
    pub fn try_begin_fetch(self: &Arc<Self>, automatic: bool) -> Option<FetchGuard> {
        self.fetching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        if automatic {
            self.auto_fetching.store(true, Ordering::Release);
        }
        Some(FetchGuard {
            signals: Arc::clone(self),
            automatic,
        })
    }

    /// Claim the operation slot. Returns `None` when another operation runs.
    pub fn try_begin_operation(self: &Arc<Self>) -> Option<OperationGuard> {
        self.operation
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(OperationGuard {
            signals: Arc::clone(self),
        })
    }
}

/// Held while a fetch runs; releases the fetch flag on drop
#[derive(Debug)]
pub struct FetchGuard {
    signals: Arc<RepoSignals>,
    automatic: bool,
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        if self.automatic {
            self.signals.auto_fetching.store(false, Ordering::Release);
        }
        self.signals.fetching.store(false, Ordering::Release);
    }
}

/// Held while a user operation runs; releases the operation flag on drop
#[derive(Debug)]
pub struct OperationGuard {
    signals: Arc<RepoSignals>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.signals.operation.store(false, Ordering::Release);
    }
}
