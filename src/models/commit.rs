//! Commit models

use serde::{Deserialize, Serialize};

use super::{Change, InlineElement};

/// Commit information as listed in history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub sha: String,
    pub short_sha: String,
    pub subject: String,
    pub author: Signature,
    pub committer: Signature,
    pub parents: Vec<String>,
    pub timestamp: i64,
}

/// Git signature (author/committer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub timestamp: i64,
}

impl From<git2::Signature<'_>> for Signature {
    fn from(sig: git2::Signature) -> Self {
        Signature {
            name: sig.name().unwrap_or("Unknown").to_string(),
            email: sig.email().unwrap_or("").to_string(),
            timestamp: sig.when().seconds(),
        }
    }
}

impl Commit {
    pub fn from_git2(commit: &git2::Commit) -> Self {
        let sha = commit.id().to_string();
        let author = Signature::from(commit.author());
        let committer = Signature::from(commit.committer());
        let timestamp = author.timestamp.max(committer.timestamp);

        Commit {
            short_sha: sha.chars().take(10).collect(),
            sha,
            subject: commit.summary().unwrap_or("").to_string(),
            author,
            committer,
            parents: commit.parent_ids().map(|id| id.to_string()).collect(),
            timestamp,
        }
    }

    /// Parse one record of the `git log` format used by the git service.
    ///
    /// Fields are separated by `\x1f`: sha, parents, author name, author email,
    /// author time, committer name, committer email, committer time, subject.
    pub fn from_log_record(record: &str) -> Option<Self> {
        let fields: Vec<&str> = record.trim_matches('\n').splitn(9, '\x1f').collect();
        if fields.len() != 9 || fields[0].is_empty() {
            return None;
        }

        let author = Signature {
            name: fields[2].to_string(),
            email: fields[3].to_string(),
            timestamp: fields[4].parse().unwrap_or(0),
        };
        let committer = Signature {
            name: fields[5].to_string(),
            email: fields[6].to_string(),
            timestamp: fields[7].parse().unwrap_or(0),
        };

        Some(Commit {
            sha: fields[0].to_string(),
            short_sha: fields[0].chars().take(10).collect(),
            subject: fields[8].to_string(),
            parents: fields[1].split_whitespace().map(str::to_string).collect(),
            timestamp: author.timestamp.max(committer.timestamp),
            author,
            committer,
        })
    }
}

/// Signature verification status, from `%G?`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureStatus {
    Good,
    GoodUnknownValidity,
    Bad,
    Expired,
    ExpiredKey,
    Revoked,
    CannotCheck,
    Unsigned,
}

impl SignatureStatus {
    pub fn from_status_char(c: char) -> Self {
        match c {
            'G' => SignatureStatus::Good,
            'U' => SignatureStatus::GoodUnknownValidity,
            'B' => SignatureStatus::Bad,
            'X' => SignatureStatus::Expired,
            'Y' => SignatureStatus::ExpiredKey,
            'R' => SignatureStatus::Revoked,
            'E' => SignatureStatus::CannotCheck,
            _ => SignatureStatus::Unsigned,
        }
    }
}

/// Result of verifying a commit's signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSignInfo {
    pub status: SignatureStatus,
    pub signer: Option<String>,
    pub key: Option<String>,
}

impl CommitSignInfo {
    /// Parse `%G?%x00%GS%x00%GK` output
    pub fn parse(output: &str) -> Self {
        let mut parts = output.trim().split('\0');
        let status = parts
            .next()
            .and_then(|s| s.chars().next())
            .map(SignatureStatus::from_status_char)
            .unwrap_or(SignatureStatus::Unsigned);
        let non_empty = |s: Option<&str>| s.map(str::trim).filter(|s| !s.is_empty()).map(String::from);

        CommitSignInfo {
            status,
            signer: non_empty(parts.next()),
            key: non_empty(parts.next()),
        }
    }
}

/// Details loaded for the selected commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitDetail {
    pub sha: String,
    pub message: Option<String>,
    pub inlines: Vec<InlineElement>,
    pub sign_info: Option<CommitSignInfo>,
    pub children: Option<Vec<String>>,
    pub changes: Option<Vec<Change>>,
}

impl CommitDetail {
    pub fn pending(sha: &str) -> Self {
        CommitDetail {
            sha: sha.to_string(),
            ..Default::default()
        }
    }

    /// Whether every detail part has arrived
    pub fn is_complete(&self) -> bool {
        self.message.is_some()
            && self.sign_info.is_some()
            && self.children.is_some()
            && self.changes.is_some()
    }
}

/// Arguments passed to `git log` for the history view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub revisions: Vec<String>,
    pub max_count: usize,
}
