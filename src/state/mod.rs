//! Live-state controller of an open repository

pub mod annotator;
pub mod change_set;
pub mod filter_tree;
pub mod repository;
pub mod update;

pub use annotator::annotate;
pub use change_set::{reconcile, Partition, WorkingCopy};
pub use filter_tree::{BranchTree, BranchTreeNode, BranchTreeNodeKind, BranchTrees, FilterTree, TagNode};
pub use repository::Repository;
pub use update::{
    CommandLogEntry, CommitDetailPart, Lifecycle, RefreshData, RefreshKind, RepositorySnapshot,
    StateUpdate, WorkingCopyData,
};
