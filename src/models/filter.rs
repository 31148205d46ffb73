//! History filter models

use serde::{Deserialize, Serialize};

/// Visibility mode of a branch, folder or tag in the history view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterMode {
    #[default]
    None,
    Included,
    Excluded,
}

/// What a filter pattern refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    LocalBranch,
    LocalBranchFolder,
    RemoteBranch,
    RemoteBranchFolder,
    Tag,
}

impl FilterKind {
    pub fn is_folder(&self) -> bool {
        matches!(self, FilterKind::LocalBranchFolder | FilterKind::RemoteBranchFolder)
    }
}

/// One persisted history filter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Full ref path for branches and folders, plain name for tags
    pub pattern: String,
    pub kind: FilterKind,
    pub mode: FilterMode,
}

impl Filter {
    pub fn new(pattern: impl Into<String>, kind: FilterKind, mode: FilterMode) -> Self {
        Filter {
            pattern: pattern.into(),
            kind,
            mode,
        }
    }

    /// Revision argument selecting this filter's refs in `git log`
    pub fn include_arg(&self) -> String {
        match self.kind {
            FilterKind::LocalBranch | FilterKind::RemoteBranch => self.pattern.clone(),
            FilterKind::Tag => format!("refs/tags/{}", self.pattern),
            FilterKind::LocalBranchFolder => format!(
                "--branches={}/*",
                self.pattern.strip_prefix("refs/heads/").unwrap_or(&self.pattern)
            ),
            FilterKind::RemoteBranchFolder => format!(
                "--remotes={}/*",
                self.pattern.strip_prefix("refs/remotes/").unwrap_or(&self.pattern)
            ),
        }
    }

    /// `--exclude` argument hiding this filter's refs from `--all`
    pub fn exclude_arg(&self) -> String {
        match self.kind {
            FilterKind::LocalBranch | FilterKind::RemoteBranch => {
                format!("--exclude={}", self.pattern)
            }
            FilterKind::Tag => format!("--exclude=refs/tags/{}", self.pattern),
            FilterKind::LocalBranchFolder | FilterKind::RemoteBranchFolder => {
                format!("--exclude={}/*", self.pattern)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_args() {
        let branch = Filter::new("refs/heads/main", FilterKind::LocalBranch, FilterMode::Included);
        assert_eq!(branch.include_arg(), "refs/heads/main");

        let folder = Filter::new(
            "refs/remotes/origin/feature",
            FilterKind::RemoteBranchFolder,
            FilterMode::Included,
        );
        assert_eq!(folder.include_arg(), "--remotes=origin/feature/*");

        let tag = Filter::new("v1.0", FilterKind::Tag, FilterMode::Included);
        assert_eq!(tag.include_arg(), "refs/tags/v1.0");
    }

    #[test]
    fn test_exclude_args() {
        let folder = Filter::new(
            "refs/heads/wip",
            FilterKind::LocalBranchFolder,
            FilterMode::Excluded,
        );
        assert_eq!(folder.exclude_arg(), "--exclude=refs/heads/wip/*");

        let tag = Filter::new("nightly", FilterKind::Tag, FilterMode::Excluded);
        assert_eq!(tag.exclude_arg(), "--exclude=refs/tags/nightly");
    }
}
