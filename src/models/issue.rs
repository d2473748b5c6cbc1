use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::repository::Repository;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub user: Option<Actor>,
    #[serde(default)]
    pub assignees: Vec<Actor>,
    #[serde(rename = "type")]
    pub issue_type: Option<IssueType>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub html_url: String,
    /// Present when the entry in a list-issues response is actually a pull
    /// request; such entries are excluded from mining.
    #[serde(default)]
    pub pull_request: Option<PullRequestMarker>,
}

impl Issue {
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }

    pub fn is_closed(&self) -> bool {
        self.state == "closed"
    }

    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }

    pub fn has_any_label(&self, names: &[String]) -> bool {
        self.labels.iter().any(|l| names.contains(&l.name))
    }

    pub fn type_name(&self) -> Option<&str> {
        self.issue_type.as_ref().map(|t| t.name.as_str())
    }

    pub fn author_login(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.login.as_str())
    }

    pub fn assignee_logins(&self) -> Vec<String> {
        self.assignees.iter().map(|a| a.login.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueType {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestMarker {
    pub url: String,
}

/// Canonical cross-repository issue identifier, `org/repo#number`.
/// Orders by (owner, repo, number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IssueId {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl IssueId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }

    pub fn from_repository(repository: &Repository, number: u64) -> Self {
        Self::new(repository.owner.login.clone(), repository.name.clone(), number)
    }

    pub fn parse(value: &str) -> Option<Self> {
        let (full_name, number) = value.split_once('#')?;
        let (owner, repo) = full_name.split_once('/')?;
        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        let number = number.parse().ok()?;
        Some(Self::new(owner, repo, number))
    }

    pub fn repository_full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}
