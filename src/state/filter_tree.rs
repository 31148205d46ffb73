//! Branch tree with per-ref history filters
//!
//! Trees are rebuilt from the flat branch and tag lists on every refresh or
//! filter change. Nodes live in an arena owned by a [`BranchTree`] and are
//! addressed by index; `BranchTree::index` maps a ref path to its node.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::models::{
    Branch, BranchSortMode, Filter, FilterKind, FilterMode, HistoryQuery, RepositorySettings, Tag,
    TagSortMode,
};

const LOCAL_PREFIX: &str = "refs/heads";
const REMOTE_PREFIX: &str = "refs/remotes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "branch", rename_all = "kebab-case")]
pub enum BranchTreeNodeKind {
    Remote,
    Folder,
    Branch(Branch),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchTreeNode {
    pub name: String,
    /// Ref path; folders use the path of the segments above their leaves
    pub path: String,
    pub kind: BranchTreeNodeKind,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
    pub is_expanded: bool,
    pub filter_mode: FilterMode,
}

impl BranchTreeNode {
    pub fn is_folder(&self) -> bool {
        !matches!(self.kind, BranchTreeNodeKind::Branch(_))
    }

    pub fn branch(&self) -> Option<&Branch> {
        match &self.kind {
            BranchTreeNodeKind::Branch(branch) => Some(branch),
            _ => None,
        }
    }
}

/// One tree of nodes, either local branches or remotes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchTree {
    nodes: Vec<BranchTreeNode>,
    roots: Vec<usize>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl BranchTree {
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn node(&self, id: usize) -> Option<&BranchTreeNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[BranchTreeNode] {
        &self.nodes
    }

    pub fn find(&self, path: &str) -> Option<&BranchTreeNode> {
        self.index.get(path).map(|&id| &self.nodes[id])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Branch leaves in display order
    pub fn leaves(&self) -> Vec<&Branch> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if let Some(branch) = node.branch() {
                out.push(branch);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Paths of the strict ancestors of `path`, nearest first
    fn ancestor_paths(&self, path: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self.index.get(path).and_then(|&id| self.nodes[id].parent);
        while let Some(id) = current {
            out.push(self.nodes[id].path.clone());
            current = self.nodes[id].parent;
        }
        out
    }

    /// Paths of every node below `path`
    fn descendant_paths(&self, path: &str) -> Vec<String> {
        let Some(&id) = self.index.get(path) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack = self.nodes[id].children.clone();
        while let Some(child) = stack.pop() {
            out.push(self.nodes[child].path.clone());
            stack.extend(self.nodes[child].children.iter().copied());
        }
        out
    }

    fn push(&mut self, node: BranchTreeNode) -> usize {
        let id = self.nodes.len();
        self.index.insert(node.path.clone(), id);
        match node.parent {
            Some(parent) => self.nodes[parent].children.push(id),
            None => self.roots.push(id),
        }
        self.nodes.push(node);
        id
    }

    fn folder(&mut self, parent: Option<usize>, kind: BranchTreeNodeKind, name: &str, path: String) -> usize {
        if let Some(&id) = self.index.get(&path) {
            return id;
        }
        self.push(BranchTreeNode {
            name: name.to_string(),
            path,
            kind,
            children: Vec::new(),
            parent,
            is_expanded: false,
            filter_mode: FilterMode::None,
        })
    }

    fn leaf(&mut self, parent: Option<usize>, name: &str, branch: &Branch) {
        self.push(BranchTreeNode {
            name: name.to_string(),
            path: branch.full_name.clone(),
            kind: BranchTreeNodeKind::Branch(branch.clone()),
            children: Vec::new(),
            parent,
            is_expanded: false,
            filter_mode: FilterMode::None,
        });
    }

    /// Insert a branch under `parent`, creating a folder per `/` segment
    fn insert_hierarchical(&mut self, parent: Option<usize>, base: &str, branch: &Branch) {
        let segments: Vec<&str> = branch.name.split('/').collect();
        let mut parent = parent;
        let mut path = base.to_string();

        for segment in &segments[..segments.len() - 1] {
            path.push('/');
            path.push_str(segment);
            parent = Some(self.folder(parent, BranchTreeNodeKind::Folder, segment, path.clone()));
        }

        let leaf_name = segments.last().copied().unwrap_or_default();
        self.leaf(parent, leaf_name, branch);
    }

    fn compare(&self, a: usize, b: usize, mode: BranchSortMode) -> Ordering {
        let (a, b) = (&self.nodes[a], &self.nodes[b]);
        match (a.branch(), b.branch()) {
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) if mode == BranchSortMode::CommitterDate => y
                .committer_date
                .cmp(&x.committer_date)
                .then_with(|| compare_names(&a.name, &b.name)),
            _ => compare_names(&a.name, &b.name),
        }
    }

    fn sort(&mut self, mode: BranchSortMode) {
        let mut roots = std::mem::take(&mut self.roots);
        roots.sort_by(|&a, &b| self.compare(a, b, mode));
        self.roots = roots;

        for id in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[id].children);
            children.sort_by(|&a, &b| self.compare(a, b, mode));
            self.nodes[id].children = children;
        }
    }

    fn apply_modes(&mut self, filters: &[Filter]) {
        for node in &mut self.nodes {
            node.filter_mode = mode_of(filters, &node.path);
        }
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn mode_of(filters: &[Filter], pattern: &str) -> FilterMode {
    filters
        .iter()
        .find(|f| f.pattern == pattern)
        .map(|f| f.mode)
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagNode {
    pub tag: Tag,
    pub filter_mode: FilterMode,
}

/// Output of a tree build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchTrees {
    pub local: BranchTree,
    pub remotes: BranchTree,
    pub tags: Vec<TagNode>,
}

/// Branch and tag trees together with the persisted history filters
#[derive(Debug, Clone, Default)]
pub struct FilterTree {
    filters: Vec<Filter>,
    expanded: BTreeSet<String>,
    local_sort: BranchSortMode,
    remote_sort: BranchSortMode,
    tag_sort: TagSortMode,
    branches: Vec<Branch>,
    tags: Vec<Tag>,
    branches_loaded: bool,
    filter_text: String,
    trees: BranchTrees,
}

impl FilterTree {
    pub fn from_settings(settings: &RepositorySettings) -> Self {
        FilterTree {
            filters: settings.histories_filters.clone(),
            expanded: settings.expanded_branch_nodes.clone(),
            local_sort: settings.local_branch_sort_mode,
            remote_sort: settings.remote_branch_sort_mode,
            tag_sort: settings.tag_sort_mode,
            ..Default::default()
        }
    }

    /// Copy filter, expansion and sort state back into `settings`
    pub fn store(&self, settings: &mut RepositorySettings) {
        settings.histories_filters = self.filters.clone();
        settings.expanded_branch_nodes = self.expanded.clone();
        settings.local_branch_sort_mode = self.local_sort;
        settings.remote_branch_sort_mode = self.remote_sort;
        settings.tag_sort_mode = self.tag_sort;
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn expanded_paths(&self) -> &BTreeSet<String> {
        &self.expanded
    }

    pub fn trees(&self) -> &BranchTrees {
        &self.trees
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn is_flat(&self) -> bool {
        !self.filter_text.is_empty()
    }

    /// Rebuild from fresh branch and tag lists.
    ///
    /// Returns whether stale expanded paths were pruned, in which case the
    /// caller should persist settings.
    pub fn build(&mut self, branches: &[Branch], tags: &[Tag], filter_text: &str) -> bool {
        self.branches = branches.to_vec();
        self.branches_loaded = true;
        self.tags = tags.to_vec();
        self.filter_text = filter_text.trim().to_string();
        self.rebuild()
    }

    /// Replace the tag list only. Branch nodes are left as they are.
    pub fn set_tags(&mut self, tags: &[Tag]) {
        self.tags = tags.to_vec();
        self.trees.tags = self.build_tags();
    }

    /// Change the search text and rebuild from the last branch and tag lists
    pub fn set_filter_text(&mut self, filter_text: &str) -> bool {
        self.filter_text = filter_text.trim().to_string();
        self.rebuild()
    }

    pub fn set_sort_modes(&mut self, local: BranchSortMode, remote: BranchSortMode, tags: TagSortMode) -> bool {
        self.local_sort = local;
        self.remote_sort = remote;
        self.tag_sort = tags;
        self.rebuild()
    }

    pub fn sort_modes(&self) -> (BranchSortMode, BranchSortMode, TagSortMode) {
        (self.local_sort, self.remote_sort, self.tag_sort)
    }

    fn rebuild(&mut self) -> bool {
        let mut trees = BranchTrees::default();
        let mut pruned = false;

        if self.filter_text.is_empty() {
            self.build_hierarchical(&mut trees);

            // nothing is stale until a branch list has been read
            let stale: Vec<String> = self
                .expanded
                .iter()
                .filter(|_| self.branches_loaded)
                .filter(|p| !trees.local.contains(p) && !trees.remotes.contains(p))
                .cloned()
                .collect();
            for path in &stale {
                tracing::debug!("Pruning stale expanded node {}", path);
                self.expanded.remove(path);
            }
            pruned = !stale.is_empty();

            for node in trees.local.nodes.iter_mut().chain(trees.remotes.nodes.iter_mut()) {
                node.is_expanded = node.is_folder() && self.expanded.contains(&node.path);
            }
        } else {
            self.build_flat(&mut trees);
        }

        trees.tags = self.build_tags();
        trees.local.sort(self.local_sort);
        trees.remotes.sort(self.remote_sort);
        trees.local.apply_modes(&self.filters);
        trees.remotes.apply_modes(&self.filters);

        self.trees = trees;
        pruned
    }

    fn build_hierarchical(&self, trees: &mut BranchTrees) {
        for branch in &self.branches {
            if branch.is_local {
                trees.local.insert_hierarchical(None, LOCAL_PREFIX, branch);
                continue;
            }
            let Some(remote) = branch.remote.as_deref() else {
                continue;
            };
            let remote_path = format!("{}/{}", REMOTE_PREFIX, remote);
            let root = trees
                .remotes
                .folder(None, BranchTreeNodeKind::Remote, remote, remote_path.clone());
            trees.remotes.insert_hierarchical(Some(root), &remote_path, branch);
        }
    }

    fn build_flat(&self, trees: &mut BranchTrees) {
        let needle = self.filter_text.to_lowercase();
        for branch in &self.branches {
            if !branch.full_name.to_lowercase().contains(&needle) {
                continue;
            }
            if branch.is_local {
                trees.local.leaf(None, &branch.name, branch);
            } else {
                trees.remotes.leaf(None, &branch.friendly_name(), branch);
            }
        }
    }

    fn build_tags(&self) -> Vec<TagNode> {
        let needle = self.filter_text.to_lowercase();
        let mut tags: Vec<TagNode> = self
            .tags
            .iter()
            .filter(|t| needle.is_empty() || t.name.to_lowercase().contains(&needle))
            .map(|tag| TagNode {
                filter_mode: self.tag_mode(&tag.name),
                tag: tag.clone(),
            })
            .collect();

        match self.tag_sort {
            TagSortMode::CreatorDate => tags.sort_by(|a, b| {
                b.tag
                    .creator_date
                    .cmp(&a.tag.creator_date)
                    .then_with(|| compare_names(&a.tag.name, &b.tag.name))
            }),
            TagSortMode::Name => tags.sort_by(|a, b| compare_names(&a.tag.name, &b.tag.name)),
        }
        tags
    }

    fn tag_mode(&self, name: &str) -> FilterMode {
        self.filters
            .iter()
            .find(|f| f.kind == FilterKind::Tag && f.pattern == name)
            .map(|f| f.mode)
            .unwrap_or_default()
    }

    fn refresh_modes(&mut self) {
        self.trees.local.apply_modes(&self.filters);
        self.trees.remotes.apply_modes(&self.filters);
        let filters = &self.filters;
        for node in &mut self.trees.tags {
            node.filter_mode = filters
                .iter()
                .find(|f| f.kind == FilterKind::Tag && f.pattern == node.tag.name)
                .map(|f| f.mode)
                .unwrap_or_default();
        }
    }

    fn upsert(&mut self, pattern: &str, kind: FilterKind, mode: FilterMode) {
        let position = self
            .filters
            .iter()
            .position(|f| f.pattern == pattern && f.kind == kind);
        match (position, mode) {
            (Some(i), FilterMode::None) => {
                self.filters.remove(i);
            }
            (Some(i), mode) => self.filters[i].mode = mode,
            (None, FilterMode::None) => {}
            (None, mode) => self.filters.push(Filter::new(pattern, kind, mode)),
        }
    }

    fn remove_patterns(&mut self, patterns: &[String]) {
        self.filters
            .retain(|f| f.kind == FilterKind::Tag || !patterns.contains(&f.pattern));
    }

    /// Set the history filter of the branch tree node at `path`.
    ///
    /// Every strict ancestor folder loses its own entry. Returns whether the
    /// persisted filter list changed.
    pub fn apply_filter_mode(&mut self, path: &str, mode: FilterMode, clear_others: bool) -> bool {
        let (node, is_local) = if let Some(node) = self.trees.local.find(path) {
            (node.clone(), true)
        } else if let Some(node) = self.trees.remotes.find(path) {
            (node.clone(), false)
        } else {
            tracing::debug!("No branch tree node at {}", path);
            return false;
        };

        let before = self.filters.clone();
        if clear_others {
            self.filters.clear();
        }

        let kind = match (&node.kind, is_local) {
            (BranchTreeNodeKind::Branch(_), true) => FilterKind::LocalBranch,
            (BranchTreeNodeKind::Branch(_), false) => FilterKind::RemoteBranch,
            (_, true) => FilterKind::LocalBranchFolder,
            (_, false) => FilterKind::RemoteBranchFolder,
        };
        self.upsert(path, kind, mode);

        let tree = if is_local { &self.trees.local } else { &self.trees.remotes };
        let mut cleared = tree.ancestor_paths(path);
        if node.is_folder() {
            cleared.extend(tree.descendant_paths(path));
        }

        if let Some(upstream) = node.branch().filter(|b| b.is_local).and_then(|b| b.upstream.clone()) {
            self.upsert(&upstream, FilterKind::RemoteBranch, mode);
            cleared.extend(self.trees.remotes.ancestor_paths(&upstream));
        }

        self.remove_patterns(&cleared);
        self.refresh_modes();
        before != self.filters
    }

    /// Set the history filter of a tag
    pub fn set_tag_filter_mode(&mut self, tag: &str, mode: FilterMode, clear_others: bool) -> bool {
        let before = self.filters.clone();
        if clear_others {
            self.filters.clear();
        }
        self.upsert(tag, FilterKind::Tag, mode);
        self.refresh_modes();
        before != self.filters
    }

    /// Drop the filter entry for `pattern`
    pub fn remove_filter(&mut self, pattern: &str) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f.pattern != pattern);
        self.refresh_modes();
        before != self.filters.len()
    }

    /// Mode of the first filter in list order
    pub fn active_mode(&self) -> FilterMode {
        self.filters.first().map(|f| f.mode).unwrap_or_default()
    }

    /// Drop every filter. Expanded state is kept.
    pub fn clear_all(&mut self) -> bool {
        let changed = !self.filters.is_empty();
        self.filters.clear();
        self.refresh_modes();
        changed
    }

    /// Record a folder as expanded or collapsed
    pub fn set_expanded(&mut self, path: &str, expanded: bool) -> bool {
        let changed = if expanded {
            self.expanded.insert(path.to_string())
        } else {
            self.expanded.remove(path)
        };

        for tree in [&mut self.trees.local, &mut self.trees.remotes] {
            if let Some(&id) = tree.index.get(path) {
                tree.nodes[id].is_expanded = expanded;
            }
        }
        changed
    }

    /// `git log` revisions selected by the active filters
    pub fn history_query(&self, max_count: usize) -> HistoryQuery {
        let included: Vec<String> = self
            .filters
            .iter()
            .filter(|f| f.mode == FilterMode::Included)
            .map(Filter::include_arg)
            .collect();

        let revisions = if !included.is_empty() {
            included
        } else {
            let mut revisions: Vec<String> = self
                .filters
                .iter()
                .filter(|f| f.mode == FilterMode::Excluded)
                .map(Filter::exclude_arg)
                .collect();
            revisions.push("--exclude=refs/stash".to_string());
            revisions.push("--all".to_string());
            revisions
        };

        HistoryQuery { revisions, max_count }
    }
}
