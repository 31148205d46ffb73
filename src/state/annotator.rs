//! Detects issue references, links and commit ids inside commit messages
//!
//! Passes run in priority order and each rejects candidates overlapping an
//! element accepted earlier: issue-tracker rules, then URLs, then hex ids
//! confirmed by a [`CommitOracle`]. Offsets are byte offsets into the message.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{InlineElement, InlineElementKind, IssueTrackerRule};
use crate::services::git_service::CommitOracle;

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(https?://|ftp://)[\w\d\._/\-~%@()+:?&=#!]*[\w\d/]").expect("valid url regex")
});

static SHA_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9a-f]{6,40}\b").expect("valid sha regex"));

fn overlaps(elements: &[InlineElement], start: usize, length: usize) -> bool {
    elements.iter().any(|e| e.intersects(start, length))
}

/// Append the matches of one issue-tracker rule that do not overlap `out`
pub fn apply_rule(rule: &IssueTrackerRule, message: &str, out: &mut Vec<InlineElement>) {
    let regex = match Regex::new(&rule.regex) {
        Ok(regex) => regex,
        Err(e) => {
            tracing::warn!("Skipping issue tracker rule {}: {}", rule.name, e);
            return;
        }
    };

    for captures in regex.captures_iter(message) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if whole.as_str().is_empty() || overlaps(out, whole.start(), whole.len()) {
            continue;
        }

        let mut url = String::new();
        captures.expand(&rule.url_template, &mut url);
        out.push(InlineElement::new(
            InlineElementKind::Link,
            whole.start(),
            whole.len(),
            url,
        ));
    }
}

/// Find inline elements in a commit message, ordered by start offset
pub fn annotate<O>(message: &str, rules: &[IssueTrackerRule], oracle: &O) -> Vec<InlineElement>
where
    O: CommitOracle + ?Sized,
{
    let mut elements = Vec::new();

    for rule in rules {
        apply_rule(rule, message, &mut elements);
    }

    for m in URL_REGEX.find_iter(message) {
        if overlaps(&elements, m.start(), m.len()) {
            continue;
        }
        if url::Url::parse(m.as_str()).is_ok() {
            elements.push(InlineElement::new(
                InlineElementKind::Link,
                m.start(),
                m.len(),
                m.as_str().to_string(),
            ));
        }
    }

    for m in SHA_REGEX.find_iter(message) {
        if overlaps(&elements, m.start(), m.len()) {
            continue;
        }
        if oracle.commit_exists(m.as_str()) {
            elements.push(InlineElement::new(
                InlineElementKind::CommitSha,
                m.start(),
                m.len(),
                m.as_str().to_string(),
            ));
        }
    }

    elements.sort_by_key(|e| e.start);
    elements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none(_: &str) -> bool {
        false
    }

    fn assert_ordered_non_overlapping(elements: &[InlineElement]) {
        for pair in elements.windows(2) {
            assert!(pair[0].start <= pair[1].start);
            assert!(!pair[0].intersects(pair[1].start, pair[1].length));
        }
    }

    #[test]
    fn test_unknown_sha_is_not_annotated() {
        let elements = annotate("Fixes #123, see abc1234def (not a real commit)", &[], &none);
        assert!(elements
            .iter()
            .all(|e| e.kind != InlineElementKind::CommitSha));
        assert!(elements.is_empty());
    }

    #[test]
    fn test_known_sha_is_annotated() {
        let oracle = |sha: &str| sha == "abc1234def";
        let message = "Revert abc1234def and deadbeef";
        let elements = annotate(message, &[], &oracle);

        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, InlineElementKind::CommitSha);
        assert_eq!(&message[elements[0].start..elements[0].end()], "abc1234def");
    }

    #[test]
    fn test_sha_requires_word_boundaries_and_length() {
        let oracle = |_: &str| true;
        let elements = annotate("xabc1234 abc12 ABCDEF1 0123456", &[], &oracle);
        let payloads: Vec<_> = elements.iter().map(|e| e.payload.as_str()).collect();
        assert_eq!(payloads, vec!["0123456"]);
    }

    #[test]
    fn test_issue_rule_expands_template() {
        let rules = vec![IssueTrackerRule::github("https://github.com/org/repo")];
        let message = "Fixes #42 and #7";
        let elements = annotate(message, &rules, &none);

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].payload, "https://github.com/org/repo/issues/42");
        assert_eq!(elements[0].start, 6);
        assert_eq!(elements[0].length, 3);
        assert_eq!(elements[1].payload, "https://github.com/org/repo/issues/7");
    }

    #[test]
    fn test_issue_rule_beats_url() {
        let rules = vec![IssueTrackerRule::new(
            "Tracker links",
            r"https://tracker\.example\.com/(\d+)",
            "https://tracker.example.com/view/$1",
        )];
        let message = "See https://tracker.example.com/99 for details";
        let elements = annotate(message, &rules, &none);

        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].payload, "https://tracker.example.com/view/99");
    }

    #[test]
    fn test_url_detection() {
        let message = "Docs: https://example.com/a/b?x=1, mirror ftp://files.example.org/pub/";
        let elements = annotate(message, &[], &none);

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].payload, "https://example.com/a/b?x=1");
        assert_eq!(elements[1].payload, "ftp://files.example.org/pub/");
        assert_ordered_non_overlapping(&elements);
    }

    #[test]
    fn test_sha_inside_url_not_duplicated() {
        let oracle = |_: &str| true;
        let message = "https://example.com/commit/abcdef1234 then abcdef1234";
        let elements = annotate(message, &[], &oracle);

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].kind, InlineElementKind::Link);
        assert_eq!(elements[1].kind, InlineElementKind::CommitSha);
        assert_eq!(elements[1].start, 43);
    }

    #[test]
    fn test_results_sorted_across_passes() {
        let oracle = |_: &str| true;
        let rules = vec![IssueTrackerRule::jira("https://jira.example.com")];
        let message = "abcdef0 https://example.com PROJ-12";
        let elements = annotate(message, &rules, &oracle);

        let kinds: Vec<_> = elements.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InlineElementKind::CommitSha,
                InlineElementKind::Link,
                InlineElementKind::Link
            ]
        );
        assert_eq!(elements[2].payload, "https://jira.example.com/browse/PROJ-12");
        assert_ordered_non_overlapping(&elements);
    }

    #[test]
    fn test_overlapping_rules_first_wins() {
        let rules = vec![
            IssueTrackerRule::azure_devops("https://dev.azure.com/org/proj"),
            IssueTrackerRule::github("https://github.com/org/repo"),
        ];
        let elements = annotate("Done AB#15", &rules, &none);
        assert_eq!(elements.len(), 1);
        assert_eq!(
            elements[0].payload,
            "https://dev.azure.com/org/proj/_workitems/edit/15"
        );
    }

    #[test]
    fn test_invalid_rule_is_skipped() {
        let rules = vec![IssueTrackerRule::new("broken", r"(\d+", "x/$1")];
        let elements = annotate("#12 https://example.com", &rules, &none);
        assert_eq!(elements.len(), 1);
    }

    #[test]
    fn test_offsets_are_bytes() {
        let oracle = |_: &str| true;
        let message = "修复 abcdef1";
        let elements = annotate(message, &[], &oracle);
        assert_eq!(elements.len(), 1);
        assert_eq!(&message[elements[0].start..elements[0].end()], "abcdef1");
    }
}
