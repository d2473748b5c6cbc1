use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::time::{timeout, Duration};

use crate::config::GenerationConfig;
use crate::error::Result;
use crate::github::{PlatformClient, SubIssueCollector};
use crate::mining::mined_data::MinedData;
use crate::models::{Issue, IssueId};

const MISSING_ISSUE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Mines the release window from the platform and discovers the sub-issue
/// hierarchy beneath the mined issues.
pub struct DataMiner<'a> {
    client: &'a dyn PlatformClient,
    config: &'a GenerationConfig,
}

impl<'a> DataMiner<'a> {
    pub fn new(client: &'a dyn PlatformClient, config: &'a GenerationConfig) -> Self {
        Self { client, config }
    }

    pub async fn mine(&self, owner: &str, repo: &str) -> Result<MinedData> {
        let repository = self.client.get_repository(owner, repo).await?;
        let mut data = MinedData::new(repository);

        data.release = self.client.get_latest_release(owner, repo).await?;
        data.since = data.release.as_ref().map(|r| r.boundary());
        match &data.release {
            Some(release) => {
                tracing::info!("Mining changes since release {}", release.tag_name)
            }
            None => tracing::info!("No previous release found, mining the full history"),
        }

        let issues = self.client.get_issues(owner, repo, data.since).await?;
        for issue in issues {
            // The issues listing includes pull requests; those are mined
            // separately through the pulls endpoint.
            if issue.pull_request.is_some() {
                continue;
            }
            if let (Some(since), Some(closed_at)) = (data.since, issue.closed_at) {
                if closed_at < since {
                    continue;
                }
            }
            let id = data.home_issue_id(issue.number);
            data.add_issue(id, issue);
        }

        let pull_requests = self.client.get_pull_requests(owner, repo).await?;
        for pr in pull_requests {
            if let Some(since) = data.since {
                let merged_in_window = pr.merged_at.map(|t| t >= since).unwrap_or(false);
                let closed_in_window = pr.closed_at.map(|t| t >= since).unwrap_or(false);
                if !merged_in_window && !closed_in_window {
                    continue;
                }
            }
            data.pull_requests.insert(pr.number, pr);
        }

        let commits = self.client.get_commits(owner, repo, data.since).await?;
        for commit in commits {
            data.commits.insert(commit.sha.clone(), commit);
        }

        tracing::info!(
            "Mined {} issues, {} pull requests, {} commits",
            data.issues.len(),
            data.pull_requests.len(),
            data.commits.len()
        );

        self.scan_hierarchy(&mut data).await?;
        self.fetch_missing_issues(&mut data).await;

        Ok(data)
    }

    /// Drives breadth-first sub-issue collection rounds until the frontier
    /// is exhausted.
    async fn scan_hierarchy(&self, data: &mut MinedData) -> Result<()> {
        let mut collector = SubIssueCollector::new(self.client);

        let mut frontier: Vec<IssueId> = data.issues.keys().cloned().collect();
        frontier.sort();

        let mut round = 0;
        while !frontier.is_empty() {
            round += 1;
            tracing::debug!(
                "Sub-issue scan round {} with {} parents",
                round,
                frontier.len()
            );
            frontier = collector.scan_sub_issues_for_parents(&frontier).await?;
        }

        data.parents_sub_issues = collector.into_parents_sub_issues();
        Ok(())
    }

    /// Fetches issues referenced by the hierarchy but absent from the mined
    /// window, with a bounded worker pool. Failed fetches are logged and
    /// skipped; results are merged on the calling task only.
    async fn fetch_missing_issues(&self, data: &mut MinedData) {
        let mut missing: Vec<IssueId> = Vec::new();
        let mut seen: HashSet<&IssueId> = HashSet::new();
        for (parent, children) in &data.parents_sub_issues {
            for id in std::iter::once(parent).chain(children.iter()) {
                if !data.issues.contains_key(id) && seen.insert(id) {
                    missing.push(id.clone());
                }
            }
        }
        if missing.is_empty() {
            return;
        }
        missing.sort();

        tracing::info!("Fetching {} issues discovered via sub-issue links", missing.len());
        let semaphore = Arc::new(Semaphore::new(self.config.fetch_concurrency));

        let pb = ProgressBar::new(missing.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} issues")
                .unwrap()
                .progress_chars("#>-"),
        );

        let fetches = missing.iter().map(|id| {
            let sem = semaphore.clone();
            let pb = pb.clone();
            async move {
                let _permit = sem.acquire().await.ok()?;
                let result = timeout(
                    MISSING_ISSUE_FETCH_TIMEOUT,
                    self.client.get_issue(&id.owner, &id.repo, id.number),
                )
                .await;
                pb.inc(1);
                match result {
                    Ok(Ok(issue)) => Some((id.clone(), issue)),
                    Ok(Err(e)) => {
                        tracing::warn!("Failed to fetch issue {}: {}", id, e);
                        None
                    }
                    Err(_) => {
                        tracing::warn!("Timed out fetching issue {}", id);
                        None
                    }
                }
            }
        });

        let fetched: Vec<Option<(IssueId, Issue)>> = join_all(fetches).await;
        pb.finish_and_clear();

        for (id, issue) in fetched.into_iter().flatten() {
            if self.ensure_repository(data, &id).await {
                data.add_issue(id, issue);
            }
        }
    }

    async fn ensure_repository(&self, data: &mut MinedData, id: &IssueId) -> bool {
        let full_name = id.repository_full_name();
        if data.get_repository(&full_name).is_some() {
            return true;
        }
        match self.client.get_repository(&id.owner, &id.repo).await {
            Ok(repository) => {
                data.add_repository(repository);
                true
            }
            Err(e) => {
                tracing::warn!("Skipping {}: repository {} not reachable: {}", id, full_name, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    use crate::error::Error;
    use crate::models::{
        Actor, Commit, CommitAuthor, CommitDetails, Issue, PullRequest, Release, Repository,
        RepositoryOwner,
    };

    fn repository(owner: &str, name: &str) -> Repository {
        Repository {
            id: 1,
            name: name.to_string(),
            full_name: format!("{}/{}", owner, name),
            html_url: format!("https://github.com/{}/{}", owner, name),
            owner: RepositoryOwner {
                login: owner.to_string(),
            },
        }
    }

    fn issue(number: u64, state: &str, closed_at: Option<DateTime<Utc>>) -> Issue {
        Issue {
            number,
            title: format!("Issue {}", number),
            state: state.to_string(),
            body: None,
            labels: Vec::new(),
            user: Some(Actor {
                login: "dev".to_string(),
            }),
            assignees: Vec::new(),
            issue_type: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            closed_at,
            html_url: format!("https://github.com/org/repo/issues/{}", number),
            pull_request: None,
        }
    }

    fn pull_request(number: u64, merged_at: Option<DateTime<Utc>>) -> PullRequest {
        PullRequest {
            number,
            title: format!("PR {}", number),
            state: "closed".to_string(),
            body: None,
            labels: Vec::new(),
            user: None,
            assignees: Vec::new(),
            merged_at,
            closed_at: merged_at,
            merge_commit_sha: None,
            head: None,
            html_url: format!("https://github.com/org/repo/pull/{}", number),
        }
    }

    fn commit(sha: &str) -> Commit {
        Commit {
            sha: sha.to_string(),
            commit: CommitDetails {
                message: "change".to_string(),
                author: CommitAuthor {
                    name: "Dev".to_string(),
                    email: "dev@example.com".to_string(),
                    date: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
                },
            },
            author: None,
        }
    }

    struct MinerClient {
        issues: Vec<Issue>,
        pull_requests: Vec<PullRequest>,
        commits: Vec<Commit>,
        release: Option<Release>,
        graphql_responses: Mutex<Vec<Value>>,
        cross_repo_issue: Option<(IssueId, Issue)>,
    }

    #[async_trait]
    impl PlatformClient for MinerClient {
        async fn get_repository(&self, owner: &str, repo: &str) -> Result<Repository> {
            Ok(repository(owner, repo))
        }

        async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<Issue> {
            if let Some((id, issue)) = &self.cross_repo_issue {
                if id.owner == owner && id.repo == repo && id.number == number {
                    return Ok(issue.clone());
                }
            }
            Err(Error::IssueNotFound(format!("{}/{}#{}", owner, repo, number)))
        }

        async fn get_issues(
            &self,
            _: &str,
            _: &str,
            _: Option<DateTime<Utc>>,
        ) -> Result<Vec<Issue>> {
            Ok(self.issues.clone())
        }

        async fn get_pull_requests(&self, _: &str, _: &str) -> Result<Vec<PullRequest>> {
            Ok(self.pull_requests.clone())
        }

        async fn get_commits(
            &self,
            _: &str,
            _: &str,
            _: Option<DateTime<Utc>>,
        ) -> Result<Vec<Commit>> {
            Ok(self.commits.clone())
        }

        async fn get_latest_release(&self, _: &str, _: &str) -> Result<Option<Release>> {
            Ok(self.release.clone())
        }

        async fn get_closing_issue_numbers(&self, _: &str, _: &str, _: u64) -> Result<Vec<u64>> {
            Ok(Vec::new())
        }

        async fn graphql(&self, _: &str) -> Result<Value> {
            let mut responses = self.graphql_responses.lock().unwrap();
            if responses.is_empty() {
                // No scripted round left: report no sub-issues anywhere.
                return Ok(json!({"data": {}}));
            }
            Ok(responses.remove(0))
        }
    }

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn release() -> Release {
        Release {
            tag_name: "v1.0.0".to_string(),
            name: None,
            draft: false,
            prerelease: false,
            created_at: since(),
            published_at: Some(since()),
        }
    }

    #[tokio::test]
    async fn test_mine_applies_release_window() {
        let in_window = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let before_window = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();

        let mut pr_entry = issue(99, "closed", Some(in_window));
        pr_entry.pull_request = Some(crate::models::PullRequestMarker {
            url: "https://api.github.com/repos/org/repo/pulls/99".to_string(),
        });

        let client = MinerClient {
            issues: vec![
                issue(1, "closed", Some(in_window)),
                issue(2, "open", None),
                issue(3, "closed", Some(before_window)),
                pr_entry,
            ],
            pull_requests: vec![
                pull_request(10, Some(in_window)),
                pull_request(11, Some(before_window)),
            ],
            commits: vec![commit("abc1234")],
            release: Some(release()),
            graphql_responses: Mutex::new(Vec::new()),
            cross_repo_issue: None,
        };
        let config = GenerationConfig::default();
        let miner = DataMiner::new(&client, &config);

        let data = miner.mine("org", "repo").await.unwrap();

        assert_eq!(data.since, Some(since()));
        let mut numbers: Vec<u64> = data.issues.keys().map(|id| id.number).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(data.pull_requests.len(), 1);
        assert!(data.pull_requests.contains_key(&10));
        assert_eq!(data.commits.len(), 1);
    }

    #[tokio::test]
    async fn test_mine_fetches_cross_repo_sub_issue() {
        let in_window = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let foreign_id = IssueId::new("other", "lib", 5);

        // Round one: issue org/repo#1 has a leaf child in another repo.
        let scan_response = json!({
            "data": {"r0": {"i0_0": {"subIssues": {
                "nodes": [{
                    "number": 5,
                    "repository": {"owner": {"login": "other"}, "name": "lib"},
                    "subIssues": {"totalCount": 0}
                }],
                "pageInfo": {"hasNextPage": false, "endCursor": null}
            }}}}
        });

        let client = MinerClient {
            issues: vec![issue(1, "closed", Some(in_window))],
            pull_requests: Vec::new(),
            commits: Vec::new(),
            release: Some(release()),
            graphql_responses: Mutex::new(vec![scan_response]),
            cross_repo_issue: Some((foreign_id.clone(), issue(5, "open", None))),
        };
        let config = GenerationConfig::default();
        let miner = DataMiner::new(&client, &config);

        let data = miner.mine("org", "repo").await.unwrap();

        assert!(data.issues.contains_key(&foreign_id));
        assert!(data.get_repository("other/lib").is_some());
        assert_eq!(
            data.sub_issues_of(&data.home_issue_id(1)),
            &[foreign_id.clone()]
        );
        assert!(data.has_sub_issues(&data.home_issue_id(1)));
    }

    #[tokio::test]
    async fn test_failed_missing_issue_fetch_is_skipped() {
        let in_window = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();

        let scan_response = json!({
            "data": {"r0": {"i0_0": {"subIssues": {
                "nodes": [{
                    "number": 77,
                    "repository": {"owner": {"login": "ghost"}, "name": "gone"},
                    "subIssues": {"totalCount": 0}
                }],
                "pageInfo": {"hasNextPage": false, "endCursor": null}
            }}}}
        });

        let client = MinerClient {
            issues: vec![issue(1, "closed", Some(in_window))],
            pull_requests: Vec::new(),
            commits: Vec::new(),
            release: Some(release()),
            graphql_responses: Mutex::new(vec![scan_response]),
            cross_repo_issue: None,
        };
        let config = GenerationConfig::default();
        let miner = DataMiner::new(&client, &config);

        let data = miner.mine("org", "repo").await.unwrap();

        // The unfetchable child stays out of the cache but the hierarchy
        // link is still recorded.
        assert!(!data.issues.contains_key(&IssueId::new("ghost", "gone", 77)));
        assert_eq!(
            data.sub_issues_of(&data.home_issue_id(1)),
            &[IssueId::new("ghost", "gone", 77)]
        );
    }
}
