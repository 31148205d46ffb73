//! Repository-level models

use serde::{Deserialize, Serialize};

/// An ongoing multi-step operation, probed from marker files in the git dir
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InProgressContext {
    CherryPick {
        head: String,
    },
    Rebase {
        head_name: String,
        onto: String,
    },
    Revert {
        head: String,
    },
    Merge {
        source: String,
    },
    #[default]
    None,
}

/// Follow-up action for an in-progress operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InProgressAction {
    Continue,
    Skip,
    Abort,
}

impl InProgressContext {
    pub fn is_none(&self) -> bool {
        matches!(self, InProgressContext::None)
    }

    /// git subcommand driving the operation
    pub fn command(&self) -> Option<&'static str> {
        match self {
            InProgressContext::CherryPick { .. } => Some("cherry-pick"),
            InProgressContext::Rebase { .. } => Some("rebase"),
            InProgressContext::Revert { .. } => Some("revert"),
            InProgressContext::Merge { .. } => Some("merge"),
            InProgressContext::None => None,
        }
    }

    /// Arguments for `action`, or `None` when the operation does not support it
    pub fn action_args(&self, action: InProgressAction) -> Option<Vec<String>> {
        let command = self.command()?;
        let flag = match (self, action) {
            (InProgressContext::Merge { .. }, InProgressAction::Skip) => return None,
            (_, InProgressAction::Continue) => "--continue",
            (_, InProgressAction::Skip) => "--skip",
            (_, InProgressAction::Abort) => "--abort",
        };

        let mut args = Vec::new();
        if action == InProgressAction::Continue {
            // continuing must not open an editor for the commit message
            args.extend(["-c".to_string(), "core.editor=true".to_string()]);
        }
        args.push(command.to_string());
        args.push(flag.to_string());
        Some(args)
    }
}

/// Bisect session state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BisectState {
    #[default]
    None,
    WaitingForRange,
    Detecting,
}

/// A bisect subcommand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "revision", rename_all = "kebab-case")]
pub enum BisectCommand {
    Start,
    Good(Option<String>),
    Bad(Option<String>),
    Skip,
    Reset,
}

impl BisectCommand {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["bisect".to_string()];
        let (sub, revision) = match self {
            BisectCommand::Start => ("start", None),
            BisectCommand::Good(rev) => ("good", rev.as_ref()),
            BisectCommand::Bad(rev) => ("bad", rev.as_ref()),
            BisectCommand::Skip => ("skip", None),
            BisectCommand::Reset => ("reset", None),
        };
        args.push(sub.to_string());
        if let Some(rev) = revision {
            args.push(rev.clone());
        }
        args
    }
}

/// A linked or main worktree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worktree {
    pub path: String,
    pub head: Option<String>,
    /// Branch short name, `None` when detached
    pub branch: Option<String>,
    pub is_main: bool,
    pub is_locked: bool,
    pub is_bare: bool,
}

impl Worktree {
    /// Parse `git worktree list --porcelain`
    pub fn parse_porcelain(output: &str) -> Vec<Worktree> {
        let mut worktrees = Vec::new();

        for block in output.split("\n\n") {
            let mut lines = block.lines();
            let Some(path) = lines.next().and_then(|l| l.strip_prefix("worktree ")) else {
                continue;
            };

            let mut worktree = Worktree {
                path: path.to_string(),
                head: None,
                branch: None,
                is_main: worktrees.is_empty(),
                is_locked: false,
                is_bare: false,
            };

            for line in lines {
                if let Some(head) = line.strip_prefix("HEAD ") {
                    worktree.head = Some(head.to_string());
                } else if let Some(branch) = line.strip_prefix("branch ") {
                    let short = branch.strip_prefix("refs/heads/").unwrap_or(branch);
                    worktree.branch = Some(short.to_string());
                } else if line == "bare" {
                    worktree.is_bare = true;
                } else if line == "locked" || line.starts_with("locked ") {
                    worktree.is_locked = true;
                }
            }

            worktrees.push(worktree);
        }

        worktrees
    }
}

/// Status of a submodule relative to the superproject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmoduleStatus {
    Current,
    /// A different commit is checked out than recorded
    Modified,
    Uninitialized,
    /// The submodule has local changes
    Dirty,
}

/// A registered submodule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submodule {
    pub path: String,
    pub url: Option<String>,
    pub head: Option<String>,
    pub status: SubmoduleStatus,
}
