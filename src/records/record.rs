use std::fmt;

use crate::models::{Commit, IssueId, PullRequest};
use crate::records::commit::CommitRecord;
use crate::records::hierarchy::HierarchyIssueRecord;
use crate::records::issue::IssueRecord;
use crate::records::pull_request::PullRequestRecord;

/// Identifier of one record, unique across a whole generation run.
///
/// Home-repository issues and pull requests share GitHub's number space, so
/// a plain number cannot collide; cross-repository issues carry their full
/// id and direct commits their sha. The derived ordering (numbers first,
/// ascending, then foreign ids, then shas) is the composer's sort order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordId {
    Number(u64),
    Foreign(IssueId),
    Sha(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(number) => write!(f, "#{}", number),
            RecordId::Foreign(id) => write!(f, "{}", id),
            RecordId::Sha(sha) => write!(f, "{}", sha),
        }
    }
}

/// One unified unit of change: an issue, a pull request, a direct commit,
/// or a sub-issue hierarchy root.
pub enum Record {
    Issue(IssueRecord),
    PullRequest(PullRequestRecord),
    Commit(CommitRecord),
    Hierarchy(HierarchyIssueRecord),
}

impl Record {
    pub fn record_id(&self) -> RecordId {
        match self {
            Record::Issue(r) => r.record_id(),
            Record::PullRequest(r) => r.record_id(),
            Record::Commit(r) => r.record_id(),
            Record::Hierarchy(r) => r.record_id(),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        match self {
            Record::Issue(r) => r.issue().label_names(),
            Record::PullRequest(r) => r.pull_request().label_names(),
            Record::Commit(_) => Vec::new(),
            Record::Hierarchy(r) => r.issue().issue().label_names(),
        }
    }

    pub fn has_any_label(&self, names: &[String]) -> bool {
        let labels = self.labels();
        names.iter().any(|n| labels.contains(n))
    }

    pub fn skip(&self) -> bool {
        match self {
            Record::Issue(r) => r.skip(),
            Record::PullRequest(r) => r.skip(),
            Record::Commit(_) => false,
            Record::Hierarchy(r) => r.issue().skip(),
        }
    }

    pub fn present_in_chapters(&self) -> u32 {
        match self {
            Record::Issue(r) => r.present_in_chapters(),
            Record::PullRequest(r) => r.present_in_chapters(),
            Record::Commit(r) => r.present_in_chapters(),
            Record::Hierarchy(r) => r.issue().present_in_chapters(),
        }
    }

    pub fn increment_present_in_chapters(&mut self) {
        match self {
            Record::Issue(r) => r.increment_present_in_chapters(),
            Record::PullRequest(r) => r.increment_present_in_chapters(),
            Record::Commit(r) => r.increment_present_in_chapters(),
            Record::Hierarchy(r) => r.issue_mut().increment_present_in_chapters(),
        }
    }

    pub fn reset_present_in_chapters(&mut self) {
        match self {
            Record::Issue(r) => r.reset_present_in_chapters(),
            Record::PullRequest(r) => r.reset_present_in_chapters(),
            Record::Commit(r) => r.reset_present_in_chapters(),
            Record::Hierarchy(r) => r.issue_mut().reset_present_in_chapters(),
        }
    }

    /// Union of assignees, linked pull request authors, and commit authors.
    pub fn developers(&self) -> Vec<String> {
        match self {
            Record::Issue(r) => r.developers(),
            Record::PullRequest(r) => r.developers(),
            Record::Commit(r) => r.developers(),
            Record::Hierarchy(r) => r.developers(),
        }
    }

    /// Attaches a pull request to the issue identified by `target` if this
    /// record owns it.
    pub fn register_pull_request(&mut self, target: &IssueId, pull_request: PullRequest) -> bool {
        match self {
            Record::Issue(r) => {
                if r.id() == target {
                    r.register_pull_request(pull_request);
                    true
                } else {
                    false
                }
            }
            Record::Hierarchy(r) => r.register_pull_request(target, pull_request),
            _ => false,
        }
    }

    /// Attaches a commit to a contained pull request whose merge or head
    /// sha matches.
    pub fn register_commit(&mut self, commit: &Commit) -> bool {
        match self {
            Record::Issue(r) => r.register_commit(commit),
            Record::PullRequest(r) => r.register_commit(commit),
            Record::Hierarchy(r) => r.register_commit(commit),
            Record::Commit(_) => false,
        }
    }

    pub fn to_chapter_row(&self, duplicity_icon: &str) -> String {
        match self {
            Record::Issue(r) => r.row(duplicity_icon),
            Record::PullRequest(r) => r.row(duplicity_icon),
            Record::Commit(r) => r.row(duplicity_icon),
            Record::Hierarchy(r) => r.row(duplicity_icon),
        }
    }
}
