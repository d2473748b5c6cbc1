use std::collections::BTreeMap;

use crate::models::{Commit, PullRequest};
use crate::records::record::RecordId;

/// A pull request that delivers work without a linked issue.
pub struct PullRequestRecord {
    pull_request: PullRequest,
    skip: bool,
    present_in_chapters: u32,
    commits: BTreeMap<String, Commit>,
}

impl PullRequestRecord {
    pub fn new(pull_request: PullRequest, skip: bool) -> Self {
        Self {
            pull_request,
            skip,
            present_in_chapters: 0,
            commits: BTreeMap::new(),
        }
    }

    pub fn record_id(&self) -> RecordId {
        RecordId::Number(self.pull_request.number)
    }

    pub fn pull_request(&self) -> &PullRequest {
        &self.pull_request
    }

    pub fn skip(&self) -> bool {
        self.skip
    }

    pub fn is_merged(&self) -> bool {
        self.pull_request.is_merged()
    }

    pub fn is_closed(&self) -> bool {
        self.pull_request.is_closed()
    }

    pub fn contains_issue_mentions(&self) -> bool {
        self.pull_request.contains_issue_mentions()
    }

    pub fn present_in_chapters(&self) -> u32 {
        self.present_in_chapters
    }

    pub fn increment_present_in_chapters(&mut self) {
        self.present_in_chapters += 1;
    }

    pub fn reset_present_in_chapters(&mut self) {
        self.present_in_chapters = 0;
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    /// Registers a commit when its sha matches the merge commit or the
    /// head of this pull request.
    pub fn register_commit(&mut self, commit: &Commit) -> bool {
        let merge_match = self
            .pull_request
            .merge_commit_sha
            .as_deref()
            .map(|sha| sha == commit.sha)
            .unwrap_or(false);
        let head_match = self
            .pull_request
            .head_sha()
            .map(|sha| sha == commit.sha)
            .unwrap_or(false);
        if merge_match || head_match {
            self.commits.insert(commit.sha.clone(), commit.clone());
            true
        } else {
            false
        }
    }

    pub fn developers(&self) -> Vec<String> {
        let mut developers = self.pull_request.assignee_logins();
        if let Some(author) = self.pull_request.author_login() {
            developers.push(author.to_string());
        }
        for commit in self.commits.values() {
            if let Some(author) = commit.author_login() {
                developers.push(author.to_string());
            }
        }
        developers.sort();
        developers.dedup();
        developers
    }

    pub fn row(&self, duplicity_icon: &str) -> String {
        let mut row = String::new();
        if self.present_in_chapters > 1 {
            row.push_str(duplicity_icon);
            row.push(' ');
        }
        row.push_str(&format!(
            "#{} _{}_",
            self.pull_request.number, self.pull_request.title
        ));
        let developers = self.developers();
        if !developers.is_empty() {
            let handles: Vec<String> = developers.iter().map(|d| format!("@{}", d)).collect();
            row.push_str(&format!(" implemented by {}", handles.join(", ")));
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::models::{Actor, GitReference};

    fn pull_request(merged: bool) -> PullRequest {
        PullRequest {
            number: 5,
            title: "Improve logging".to_string(),
            state: "closed".to_string(),
            body: Some("Closes #3".to_string()),
            labels: Vec::new(),
            user: Some(Actor {
                login: "carol".to_string(),
            }),
            assignees: Vec::new(),
            merged_at: merged.then(|| Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
            closed_at: Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
            merge_commit_sha: Some("merge111".to_string()),
            head: Some(GitReference {
                sha: "head222".to_string(),
            }),
            html_url: "https://github.com/org/repo/pull/5".to_string(),
        }
    }

    fn commit(sha: &str) -> Commit {
        Commit {
            sha: sha.to_string(),
            commit: crate::models::CommitDetails {
                message: "work".to_string(),
                author: crate::models::CommitAuthor {
                    name: "Carol".to_string(),
                    email: "carol@example.com".to_string(),
                    date: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
                },
            },
            author: Some(Actor {
                login: "carol".to_string(),
            }),
        }
    }

    #[test]
    fn test_merged_and_closed_are_exclusive() {
        assert!(PullRequestRecord::new(pull_request(true), false).is_merged());
        assert!(!PullRequestRecord::new(pull_request(true), false).is_closed());
        assert!(PullRequestRecord::new(pull_request(false), false).is_closed());
    }

    #[test]
    fn test_register_commit_by_merge_or_head_sha() {
        let mut record = PullRequestRecord::new(pull_request(true), false);
        assert!(record.register_commit(&commit("merge111")));
        assert!(record.register_commit(&commit("head222")));
        assert!(!record.register_commit(&commit("other333")));
        assert_eq!(record.commit_count(), 2);
    }

    #[test]
    fn test_row_mentions_author() {
        let record = PullRequestRecord::new(pull_request(true), false);
        assert_eq!(record.row("🔁"), "#5 _Improve logging_ implemented by @carol");
    }
}
