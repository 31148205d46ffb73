//! Inline references detected in commit messages

use serde::{Deserialize, Serialize};

/// Kind of an inline reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InlineElementKind {
    Link,
    CommitSha,
}

/// A detected reference inside a commit message.
///
/// `start` and `length` are byte offsets into the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineElement {
    pub kind: InlineElementKind,
    pub start: usize,
    pub length: usize,
    /// Target URL for links, the full matched hash for commits
    pub payload: String,
}

impl InlineElement {
    pub fn new(kind: InlineElementKind, start: usize, length: usize, payload: String) -> Self {
        InlineElement {
            kind,
            start,
            length,
            payload,
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    /// Whether `[start, start + length)` overlaps this element
    pub fn intersects(&self, start: usize, length: usize) -> bool {
        start < self.end() && self.start < start + length
    }
}

/// A user-configured issue tracker link rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTrackerRule {
    pub name: String,
    pub regex: String,
    /// Link template, `$1`..`$9` are replaced by capture groups
    pub url_template: String,
}

impl IssueTrackerRule {
    pub fn new(name: &str, regex: &str, url_template: &str) -> Self {
        IssueTrackerRule {
            name: name.to_string(),
            regex: regex.to_string(),
            url_template: url_template.to_string(),
        }
    }

    pub fn github(repo_url: &str) -> Self {
        Self::new(
            "GitHub ISSUE",
            r"#(\d+)",
            &format!("{}/issues/$1", repo_url.trim_end_matches('/')),
        )
    }

    pub fn jira(base_url: &str) -> Self {
        Self::new(
            "Jira Tracker",
            r"\b([A-Z][A-Z0-9]+-\d+)\b",
            &format!("{}/browse/$1", base_url.trim_end_matches('/')),
        )
    }

    pub fn azure_devops(project_url: &str) -> Self {
        Self::new(
            "Azure DevOps",
            r"AB#(\d+)",
            &format!("{}/_workitems/edit/$1", project_url.trim_end_matches('/')),
        )
    }

    pub fn gitlab_merge_request(repo_url: &str) -> Self {
        Self::new(
            "GitLab MR",
            r"!(\d+)",
            &format!("{}/-/merge_requests/$1", repo_url.trim_end_matches('/')),
        )
    }
}
