//! Commit guards and execution

use serde::{Deserialize, Serialize};

use crate::error::{ReposcopeError, Result};
use crate::services::git_service::{CommitOptions, GitBackend};

/// A commit as requested by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub message: String,
    pub amend: bool,
    pub sign_off: bool,
    /// Stage everything before committing
    pub auto_stage: bool,
    pub auto_push: bool,
    pub allow_empty: bool,
    /// The user accepted committing changes hidden by the path filter
    pub confirmed_filtered: bool,
}

/// What happened to a commit request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CommitOutcome {
    Committed { pushed: bool },
    /// Only `visible` of `total` staged changes pass the current filter
    NeedsFilterConfirmation { visible: usize, total: usize },
    /// Nothing is staged; the user has to choose stage-all or abort
    NeedsStageAllDecision { unstaged: usize },
}

/// Counts of the working copy a commit is checked against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagedCounts {
    pub staged: usize,
    pub visible_staged: usize,
    pub unstaged: usize,
}

/// Check a request before any git command runs.
///
/// Returns `Ok(Some(outcome))` when the user has to answer first and
/// `Ok(None)` when the commit can go ahead.
pub fn precheck(request: &CommitRequest, counts: StagedCounts) -> Result<Option<CommitOutcome>> {
    if request.message.trim().is_empty() {
        return Err(ReposcopeError::EmptyCommitMessage);
    }

    if !request.confirmed_filtered && counts.visible_staged < counts.staged {
        return Ok(Some(CommitOutcome::NeedsFilterConfirmation {
            visible: counts.visible_staged,
            total: counts.staged,
        }));
    }

    if counts.staged == 0 && !request.auto_stage && !request.allow_empty && !request.amend {
        if counts.unstaged == 0 {
            return Err(ReposcopeError::NothingToCommit);
        }
        return Ok(Some(CommitOutcome::NeedsStageAllDecision {
            unstaged: counts.unstaged,
        }));
    }

    Ok(None)
}

/// Stage if requested, then commit
pub fn run(backend: &dyn GitBackend, request: &CommitRequest, include_untracked: bool) -> Result<()> {
    if request.auto_stage {
        backend.stage_all(include_untracked)?;
    }

    backend.commit(&CommitOptions {
        message: request.message.clone(),
        amend: request.amend,
        sign_off: request.sign_off,
        allow_empty: request.allow_empty,
    })?;

    tracing::info!(amend = request.amend, "Created commit");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Call, MockBackend};

    fn request(message: &str) -> CommitRequest {
        CommitRequest {
            message: message.to_string(),
            ..Default::default()
        }
    }

    fn counts(staged: usize, visible_staged: usize, unstaged: usize) -> StagedCounts {
        StagedCounts {
            staged,
            visible_staged,
            unstaged,
        }
    }

    #[test]
    fn test_blank_message_refused() {
        let result = precheck(&request("  \n"), counts(1, 1, 0));
        assert!(matches!(result, Err(ReposcopeError::EmptyCommitMessage)));
    }

    #[test]
    fn test_filtered_staged_needs_confirmation() {
        let outcome = precheck(&request("msg"), counts(3, 1, 0)).unwrap();
        assert_eq!(
            outcome,
            Some(CommitOutcome::NeedsFilterConfirmation { visible: 1, total: 3 })
        );

        let mut confirmed = request("msg");
        confirmed.confirmed_filtered = true;
        assert_eq!(precheck(&confirmed, counts(3, 1, 0)).unwrap(), None);
    }

    #[test]
    fn test_nothing_staged_needs_decision() {
        let outcome = precheck(&request("msg"), counts(0, 0, 4)).unwrap();
        assert_eq!(outcome, Some(CommitOutcome::NeedsStageAllDecision { unstaged: 4 }));

        let mut auto = request("msg");
        auto.auto_stage = true;
        assert_eq!(precheck(&auto, counts(0, 0, 4)).unwrap(), None);

        let mut empty = request("msg");
        empty.allow_empty = true;
        assert_eq!(precheck(&empty, counts(0, 0, 0)).unwrap(), None);
    }

    #[test]
    fn test_nothing_at_all_refused() {
        let result = precheck(&request("msg"), counts(0, 0, 0));
        assert!(matches!(result, Err(ReposcopeError::NothingToCommit)));
    }

    #[test]
    fn test_run_stages_then_commits() {
        let backend = MockBackend::new();
        let mut req = request("Add feature");
        req.auto_stage = true;
        req.sign_off = true;

        run(&backend, &req, false).unwrap();
        assert_eq!(
            backend.calls(),
            vec![
                Call::StageAll(false),
                Call::Commit(CommitOptions {
                    message: "Add feature".to_string(),
                    amend: false,
                    sign_off: true,
                    allow_empty: false,
                }),
            ]
        );
    }
}
