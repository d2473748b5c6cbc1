use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::issue::{Actor, Label};

/// Matches closing keywords followed by an issue reference, e.g. "Closes #10".
fn closing_mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:close[sd]?|fix(?:e[sd])?|resolve[sd]?)\s+#(\d+)")
            .expect("closing mention pattern is valid")
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub user: Option<Actor>,
    #[serde(default)]
    pub assignees: Vec<Actor>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merge_commit_sha: Option<String>,
    pub head: Option<GitReference>,
    pub html_url: String,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.state == "closed" && !self.is_merged()
    }

    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }

    pub fn has_any_label(&self, names: &[String]) -> bool {
        self.labels.iter().any(|l| names.contains(&l.name))
    }

    pub fn author_login(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.login.as_str())
    }

    pub fn assignee_logins(&self) -> Vec<String> {
        self.assignees.iter().map(|a| a.login.clone()).collect()
    }

    pub fn head_sha(&self) -> Option<&str> {
        self.head.as_ref().map(|h| h.sha.as_str())
    }

    /// Issue numbers referenced in the body with a closing keyword.
    pub fn mentioned_issue_numbers(&self) -> Vec<u64> {
        let Some(body) = self.body.as_deref() else {
            return Vec::new();
        };
        let mut numbers: Vec<u64> = closing_mention_pattern()
            .captures_iter(body)
            .filter_map(|c| c[1].parse().ok())
            .collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers
    }

    pub fn contains_issue_mentions(&self) -> bool {
        !self.mentioned_issue_numbers().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitReference {
    pub sha: String,
}
