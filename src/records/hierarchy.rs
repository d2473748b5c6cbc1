use std::collections::BTreeMap;

use crate::models::{Commit, IssueId, PullRequest};
use crate::records::issue::IssueRecord;
use crate::records::record::RecordId;

/// An issue acting as a parent in a sub-issue tree, e.g. an Epic. Owns its
/// leaf children directly and nests children that are themselves parents.
pub struct HierarchyIssueRecord {
    issue: IssueRecord,
    level: usize,
    sub_issues: BTreeMap<IssueId, IssueRecord>,
    sub_hierarchy_issues: BTreeMap<IssueId, HierarchyIssueRecord>,
}

impl HierarchyIssueRecord {
    pub fn new(issue: IssueRecord, level: usize) -> Self {
        Self {
            issue,
            level,
            sub_issues: BTreeMap::new(),
            sub_hierarchy_issues: BTreeMap::new(),
        }
    }

    pub fn record_id(&self) -> RecordId {
        self.issue.record_id()
    }

    pub fn issue(&self) -> &IssueRecord {
        &self.issue
    }

    pub fn issue_mut(&mut self) -> &mut IssueRecord {
        &mut self.issue
    }

    /// Depth from the hierarchy root, 0-based.
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn sub_issues(&self) -> &BTreeMap<IssueId, IssueRecord> {
        &self.sub_issues
    }

    pub fn sub_hierarchy_issues(&self) -> &BTreeMap<IssueId, HierarchyIssueRecord> {
        &self.sub_hierarchy_issues
    }

    pub fn add_sub_issue(&mut self, record: IssueRecord) {
        self.sub_issues.insert(record.id().clone(), record);
    }

    pub fn add_sub_hierarchy(&mut self, record: HierarchyIssueRecord) {
        self.sub_hierarchy_issues
            .insert(record.issue.id().clone(), record);
    }

    /// Every issue id contained in this tree, the root included.
    pub fn issue_ids(&self) -> Vec<IssueId> {
        let mut ids = vec![self.issue.id().clone()];
        ids.extend(self.sub_issues.keys().cloned());
        for child in self.sub_hierarchy_issues.values() {
            ids.extend(child.issue_ids());
        }
        ids
    }

    /// Pull requests delivered anywhere in the tree.
    pub fn pull_request_count(&self) -> usize {
        self.issue.pull_request_count()
            + self
                .sub_issues
                .values()
                .map(|r| r.pull_request_count())
                .sum::<usize>()
            + self
                .sub_hierarchy_issues
                .values()
                .map(|r| r.pull_request_count())
                .sum::<usize>()
    }

    pub fn commit_count(&self) -> usize {
        self.issue.commit_count()
            + self
                .sub_issues
                .values()
                .map(|r| r.commit_count())
                .sum::<usize>()
            + self
                .sub_hierarchy_issues
                .values()
                .map(|r| r.commit_count())
                .sum::<usize>()
    }

    pub fn register_pull_request(&mut self, target: &IssueId, pull_request: PullRequest) -> bool {
        if self.issue.id() == target {
            self.issue.register_pull_request(pull_request);
            return true;
        }
        if let Some(child) = self.sub_issues.get_mut(target) {
            child.register_pull_request(pull_request);
            return true;
        }
        self.sub_hierarchy_issues
            .values_mut()
            .any(|child| child.register_pull_request(target, pull_request.clone()))
    }

    pub fn register_commit(&mut self, commit: &Commit) -> bool {
        if self.issue.register_commit(commit) {
            return true;
        }
        if self
            .sub_issues
            .values_mut()
            .any(|child| child.register_commit(commit))
        {
            return true;
        }
        self.sub_hierarchy_issues
            .values_mut()
            .any(|child| child.register_commit(commit))
    }

    pub fn developers(&self) -> Vec<String> {
        let mut developers = self.issue.developers();
        for child in self.sub_issues.values() {
            developers.extend(child.developers());
        }
        for child in self.sub_hierarchy_issues.values() {
            developers.extend(child.developers());
        }
        developers.sort();
        developers.dedup();
        developers
    }

    /// Multi-line chapter row: the root line followed by one indented
    /// bullet per descendant, indentation driven by tree level.
    pub fn row(&self, duplicity_icon: &str) -> String {
        let mut lines = vec![self.issue.row(duplicity_icon)];
        self.append_child_rows(&mut lines, duplicity_icon);
        lines.join("\n")
    }

    fn append_child_rows(&self, lines: &mut Vec<String>, duplicity_icon: &str) {
        let indent = "  ".repeat(self.level + 1);
        for child in self.sub_issues.values() {
            lines.push(format!("{}- {}", indent, child.row(duplicity_icon)));
        }
        for child in self.sub_hierarchy_issues.values() {
            lines.push(format!("{}- {}", indent, child.issue.row(duplicity_icon)));
            child.append_child_rows(lines, duplicity_icon);
        }
    }
}
