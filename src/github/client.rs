use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Client};

use crate::error::{Error, Result};
use crate::github::paginator::Paginator;
use crate::github::rate_limiter::RateLimiter;
use crate::models::{Commit, Issue, PullRequest, Release, Repository};

/// The platform capabilities the generation core consumes: typed entity
/// retrieval plus the ability to run a single GraphQL query.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<Repository>;

    async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<Issue>;

    async fn get_issues(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Issue>>;

    async fn get_pull_requests(&self, owner: &str, repo: &str) -> Result<Vec<PullRequest>>;

    async fn get_commits(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Commit>>;

    async fn get_latest_release(&self, owner: &str, repo: &str) -> Result<Option<Release>>;

    /// Issue numbers the platform itself links to a pull request as
    /// closing references.
    async fn get_closing_issue_numbers(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<Vec<u64>>;

    /// Executes one GraphQL query and returns the parsed response body.
    async fn graphql(&self, query: &str) -> Result<serde_json::Value>;
}

pub struct GitHubClient {
    client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, "https://api.github.com")
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("relnotes/0.1"),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

}

#[async_trait]
impl PlatformClient for GitHubClient {
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<Repository> {
        self.rate_limiter.wait().await;
        let url = format!("{}/repos/{}/{}", self.base_url, owner, repo);
        tracing::debug!("Fetching repository: {}/{}", owner, repo);

        let response = self.client.get(&url).send().await?;
        self.rate_limiter.update(&response).await;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::RepoNotFound(format!("{}/{}", owner, repo)));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch repository {}/{}: {} - {}",
                owner, repo, status, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<Issue> {
        self.rate_limiter.wait().await;
        let url = format!("{}/repos/{}/{}/issues/{}", self.base_url, owner, repo, number);
        tracing::debug!("Fetching issue: {}/{}#{}", owner, repo, number);

        let response = self.client.get(&url).send().await?;
        self.rate_limiter.update(&response).await;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::IssueNotFound(format!("{}/{}#{}", owner, repo, number)));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch issue {}/{}#{}: {} - {}",
                owner, repo, number, status, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn get_issues(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Issue>> {
        let mut url = format!("{}/repos/{}/{}/issues?state=all", self.base_url, owner, repo);
        if let Some(since) = since {
            url.push_str(&format!(
                "&since={}",
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        tracing::info!("Fetching issues for: {}/{}", owner, repo);
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        paginator.fetch_all(&url, 100).await
    }

    async fn get_pull_requests(&self, owner: &str, repo: &str) -> Result<Vec<PullRequest>> {
        let url = format!(
            "{}/repos/{}/{}/pulls?state=closed&sort=updated&direction=desc",
            self.base_url, owner, repo
        );
        tracing::info!("Fetching pull requests for: {}/{}", owner, repo);
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        paginator.fetch_all(&url, 100).await
    }

    async fn get_commits(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Commit>> {
        let mut url = format!("{}/repos/{}/{}/commits", self.base_url, owner, repo);
        if let Some(since) = since {
            url.push_str(&format!(
                "?since={}",
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        tracing::info!("Fetching commits for: {}/{}", owner, repo);
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        paginator.fetch_all(&url, 100).await
    }

    async fn get_latest_release(&self, owner: &str, repo: &str) -> Result<Option<Release>> {
        self.rate_limiter.wait().await;
        let url = format!("{}/repos/{}/{}/releases/latest", self.base_url, owner, repo);
        tracing::debug!("Fetching latest release: {}/{}", owner, repo);

        let response = self.client.get(&url).send().await?;
        self.rate_limiter.update(&response).await;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch latest release for {}/{}: {} - {}",
                owner, repo, status, body
            )));
        }

        Ok(Some(response.json().await?))
    }

    async fn get_closing_issue_numbers(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<Vec<u64>> {
        let query = format!(
            r#"query {{ repository(owner: "{}", name: "{}") {{ pullRequest(number: {}) {{ closingIssuesReferences(first: 100) {{ nodes {{ number }} }} }} }} }}"#,
            owner, repo, pr_number
        );
        let payload = self.graphql(&query).await?;

        if let Some(errors) = payload.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                return Err(Error::GraphQl(format!(
                    "closingIssuesReferences for #{}: {}",
                    pr_number, errors[0]
                )));
            }
        }

        let numbers = payload
            .pointer("/data/repository/pullRequest/closingIssuesReferences/nodes")
            .and_then(|n| n.as_array())
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|n| n.get("number").and_then(|v| v.as_u64()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(numbers)
    }

    async fn graphql(&self, query: &str) -> Result<serde_json::Value> {
        self.rate_limiter.wait().await;
        let url = format!("{}/graphql", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;
        self.rate_limiter.update(&response).await;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "GraphQL request failed: {} - {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}
