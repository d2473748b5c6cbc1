use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{Commit, Issue, IssueId, PullRequest, Release, Repository};

/// Per-run cache of everything mined from the platform. Issues are keyed
/// by their canonical cross-repository id; repositories are looked up by
/// full name. Lives for exactly one generation run.
pub struct MinedData {
    pub home_repository: Repository,
    pub release: Option<Release>,
    pub since: Option<DateTime<Utc>>,
    pub issues: HashMap<IssueId, Issue>,
    pub pull_requests: HashMap<u64, PullRequest>,
    pub commits: HashMap<String, Commit>,
    /// Full repository name → repository, grown lazily as cross-repo
    /// issues are discovered.
    pub repositories: HashMap<String, Repository>,
    /// Canonical issue id → direct children, as discovered by the
    /// sub-issue collector. Leaves carry an empty list.
    pub parents_sub_issues: HashMap<IssueId, Vec<IssueId>>,
}

impl MinedData {
    pub fn new(home_repository: Repository) -> Self {
        let mut repositories = HashMap::new();
        repositories.insert(home_repository.full_name.clone(), home_repository.clone());
        Self {
            home_repository,
            release: None,
            since: None,
            issues: HashMap::new(),
            pull_requests: HashMap::new(),
            commits: HashMap::new(),
            repositories,
            parents_sub_issues: HashMap::new(),
        }
    }

    /// Canonical id for an issue number in the home repository.
    pub fn home_issue_id(&self, number: u64) -> IssueId {
        IssueId::from_repository(&self.home_repository, number)
    }

    pub fn is_home(&self, id: &IssueId) -> bool {
        id.repository_full_name() == self.home_repository.full_name
    }

    pub fn add_issue(&mut self, id: IssueId, issue: Issue) {
        self.issues.insert(id, issue);
    }

    pub fn get_issue(&self, id: &IssueId) -> Option<&Issue> {
        self.issues.get(id)
    }

    pub fn add_repository(&mut self, repository: Repository) {
        self.repositories
            .insert(repository.full_name.clone(), repository);
    }

    pub fn get_repository(&self, full_name: &str) -> Option<&Repository> {
        self.repositories.get(full_name)
    }

    /// Direct children of `id`, if the collector visited it.
    pub fn sub_issues_of(&self, id: &IssueId) -> &[IssueId] {
        self.parents_sub_issues
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    pub fn has_sub_issues(&self, id: &IssueId) -> bool {
        !self.sub_issues_of(id).is_empty()
    }
}
