use std::collections::BTreeMap;

use crate::models::{Commit, Issue, IssueId, PullRequest};
use crate::records::pull_request::PullRequestRecord;
use crate::records::record::RecordId;

/// An issue together with the pull requests delivered against it.
pub struct IssueRecord {
    id: IssueId,
    issue: Issue,
    home: bool,
    skip: bool,
    present_in_chapters: u32,
    pull_requests: BTreeMap<u64, PullRequestRecord>,
}

impl IssueRecord {
    pub fn new(id: IssueId, issue: Issue, home: bool, skip: bool) -> Self {
        Self {
            id,
            issue,
            home,
            skip,
            present_in_chapters: 0,
            pull_requests: BTreeMap::new(),
        }
    }

    pub fn record_id(&self) -> RecordId {
        if self.home {
            RecordId::Number(self.issue.number)
        } else {
            RecordId::Foreign(self.id.clone())
        }
    }

    pub fn id(&self) -> &IssueId {
        &self.id
    }

    pub fn issue(&self) -> &Issue {
        &self.issue
    }

    pub fn skip(&self) -> bool {
        self.skip
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

    pub fn pull_requests(&self) -> &BTreeMap<u64, PullRequestRecord> {
        &self.pull_requests
    }

    pub fn pull_request_count(&self) -> usize {
        self.pull_requests.len()
    }

    pub fn commit_count(&self) -> usize {
        self.pull_requests.values().map(|pr| pr.commit_count()).sum()
    }

    pub fn register_pull_request(&mut self, pull_request: PullRequest) {
        self.pull_requests
            .insert(pull_request.number, PullRequestRecord::new(pull_request, false));
    }

    pub fn register_commit(&mut self, commit: &Commit) -> bool {
        self.pull_requests
            .values_mut()
            .any(|pr| pr.register_commit(commit))
    }

    pub fn developers(&self) -> Vec<String> {
        let mut developers = self.issue.assignee_logins();
        for pr in self.pull_requests.values() {
            developers.extend(pr.developers());
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
        match self.record_id() {
            RecordId::Foreign(id) => row.push_str(&format!("{} _{}_", id, self.issue.title)),
            _ => row.push_str(&format!("#{} _{}_", self.issue.number, self.issue.title)),
        }
        if !self.pull_requests.is_empty() {
            let numbers: Vec<String> = self
                .pull_requests
                .keys()
                .map(|n| format!("#{}", n))
                .collect();
            row.push_str(&format!(" in {}", numbers.join(", ")));
        }
        let developers = self.developers();
        if !developers.is_empty() {
            let handles: Vec<String> = developers.iter().map(|d| format!("@{}", d)).collect();
            row.push_str(&format!(" implemented by {}", handles.join(", ")));
        }
        row
    }
}
