use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;
use tokio::time::{sleep, Duration};

use crate::error::{Error, Result};
use crate::github::client::PlatformClient;
use crate::models::IssueId;

const MAX_PARENTS_PER_REPOSITORY: usize = 20;
const MAX_REPOSITORIES_PER_QUERY: usize = 5;
const SUB_ISSUE_PAGE_SIZE: u32 = 50;
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

struct PendingParent {
    id: IssueId,
    cursor: Option<String>,
}

struct RepoBlock {
    alias: String,
    parents: Vec<(String, PendingParent)>,
}

/// Discovers the full parent→child sub-issue tree via batched GraphQL
/// queries, one breadth-first round per call.
pub struct SubIssueCollector<'a> {
    client: &'a dyn PlatformClient,
    visited: HashSet<IssueId>,
    parents_sub_issues: HashMap<IssueId, Vec<IssueId>>,
}

impl<'a> SubIssueCollector<'a> {
    pub fn new(client: &'a dyn PlatformClient) -> Self {
        Self {
            client,
            visited: HashSet::new(),
            parents_sub_issues: HashMap::new(),
        }
    }

    pub fn parents_sub_issues(&self) -> &HashMap<IssueId, Vec<IssueId>> {
        &self.parents_sub_issues
    }

    pub fn into_parents_sub_issues(self) -> HashMap<IssueId, Vec<IssueId>> {
        self.parents_sub_issues
    }

    /// Expands one frontier of parent issues and returns the discovered
    /// children that are themselves parents, sorted by (org, repo, number).
    ///
    /// Every queried parent ends up with an entry in the parent map, as does
    /// every discovered leaf (with an empty child list). A parent whose
    /// sub-issue list does not fit one page keeps its cursor and is
    /// re-queried within the same call until exhausted.
    pub async fn scan_sub_issues_for_parents(
        &mut self,
        parents: &[IssueId],
    ) -> Result<Vec<IssueId>> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }

        let original: HashSet<IssueId> = parents.iter().cloned().collect();
        self.visited.extend(parents.iter().cloned());

        let mut new_frontier: Vec<IssueId> = Vec::new();
        let mut pending: Vec<PendingParent> = parents
            .iter()
            .map(|id| PendingParent {
                id: id.clone(),
                cursor: None,
            })
            .collect();

        while !pending.is_empty() {
            let batches = build_batches(std::mem::take(&mut pending));
            for blocks in batches {
                let query = build_query(&blocks);
                tracing::debug!("Scanning sub-issues for {} repository blocks", blocks.len());
                let payload = self.execute_with_retry(&query).await?;
                self.apply_response(&payload, blocks, &original, &mut new_frontier, &mut pending);
            }
        }

        new_frontier.sort();
        new_frontier.dedup();
        Ok(new_frontier)
    }

    async fn execute_with_retry(&self, query: &str) -> Result<Value> {
        let mut attempt = 1;
        loop {
            match self.client.graphql(query).await {
                Ok(payload) => {
                    if let Some(errors) = payload.get("errors").and_then(|e| e.as_array()) {
                        if !errors.is_empty() {
                            let messages: Vec<&str> = errors
                                .iter()
                                .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                                .collect();
                            return Err(Error::GraphQl(messages.join("; ")));
                        }
                    }
                    return Ok(payload);
                }
                Err(e) if e.is_retryable() => {
                    if attempt >= MAX_RETRIES {
                        return Err(Error::RetryExhausted {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    let delay = RETRY_BASE_DELAY * attempt;
                    tracing::warn!(
                        "Sub-issue query failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        MAX_RETRIES,
                        delay,
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn apply_response(
        &mut self,
        payload: &Value,
        blocks: Vec<RepoBlock>,
        original: &HashSet<IssueId>,
        new_frontier: &mut Vec<IssueId>,
        pending: &mut Vec<PendingParent>,
    ) {
        let data = payload.get("data");

        for block in blocks {
            let repo_node = data
                .and_then(|d| d.get(&block.alias))
                .filter(|n| !n.is_null());

            for (issue_alias, parent) in block.parents {
                let issue_node = repo_node
                    .and_then(|r| r.get(&issue_alias))
                    .filter(|n| !n.is_null());

                let Some(issue_node) = issue_node else {
                    tracing::warn!("Parent issue {} not found or inaccessible", parent.id);
                    self.parents_sub_issues.entry(parent.id).or_default();
                    continue;
                };

                self.parents_sub_issues.entry(parent.id.clone()).or_default();

                let sub_issues = issue_node.get("subIssues");
                let nodes = sub_issues
                    .and_then(|s| s.get("nodes"))
                    .and_then(|n| n.as_array());

                if let Some(nodes) = nodes {
                    for node in nodes {
                        let Some(child) = child_id(node) else {
                            tracing::warn!("Malformed sub-issue node under {}", parent.id);
                            continue;
                        };
                        let child_count = node
                            .pointer("/subIssues/totalCount")
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0);

                        if !self.visited.insert(child.clone()) {
                            continue;
                        }

                        self.parents_sub_issues
                            .get_mut(&parent.id)
                            .expect("parent entry created above")
                            .push(child.clone());

                        if child_count > 0 {
                            if !original.contains(&child) {
                                new_frontier.push(child);
                            }
                        } else {
                            self.parents_sub_issues.entry(child).or_default();
                        }
                    }
                }

                let page_info = sub_issues.and_then(|s| s.get("pageInfo"));
                let has_next = page_info
                    .and_then(|p| p.get("hasNextPage"))
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if has_next {
                    let cursor = page_info
                        .and_then(|p| p.get("endCursor"))
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string());
                    if cursor.is_some() {
                        pending.push(PendingParent {
                            id: parent.id,
                            cursor,
                        });
                    }
                }
            }
        }
    }
}

fn child_id(node: &Value) -> Option<IssueId> {
    let number = node.get("number").and_then(|v| v.as_u64())?;
    let owner = node.pointer("/repository/owner/login").and_then(|v| v.as_str())?;
    let repo = node.pointer("/repository/name").and_then(|v| v.as_str())?;
    Some(IssueId::new(owner, repo, number))
}

/// Splits pending parents into queries, bounded by the per-repository and
/// per-query batching limits.
fn build_batches(pending: Vec<PendingParent>) -> Vec<Vec<RepoBlock>> {
    let mut by_repo: BTreeMap<(String, String), Vec<PendingParent>> = BTreeMap::new();
    for parent in pending {
        let key = (parent.id.owner.clone(), parent.id.repo.clone());
        by_repo.entry(key).or_default().push(parent);
    }

    let mut blocks: Vec<Vec<PendingParent>> = Vec::new();
    for (_, mut parents) in by_repo {
        parents.sort_by_key(|p| p.id.number);
        let mut chunk = Vec::new();
        for parent in parents {
            chunk.push(parent);
            if chunk.len() == MAX_PARENTS_PER_REPOSITORY {
                blocks.push(std::mem::take(&mut chunk));
            }
        }
        if !chunk.is_empty() {
            blocks.push(chunk);
        }
    }

    let mut queries: Vec<Vec<RepoBlock>> = Vec::new();
    let mut current: Vec<RepoBlock> = Vec::new();
    for block in blocks {
        let repo_index = current.len();
        let parents = block
            .into_iter()
            .enumerate()
            .map(|(i, parent)| (format!("i{}_{}", repo_index, i), parent))
            .collect();
        current.push(RepoBlock {
            alias: format!("r{}", repo_index),
            parents,
        });
        if current.len() == MAX_REPOSITORIES_PER_QUERY {
            queries.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        queries.push(current);
    }
    queries
}

fn build_query(blocks: &[RepoBlock]) -> String {
    let mut query = String::from("query {\n");
    for block in blocks {
        let first = &block.parents[0].1.id;
        query.push_str(&format!(
            "  {}: repository(owner: \"{}\", name: \"{}\") {{\n",
            block.alias, first.owner, first.repo
        ));
        for (issue_alias, parent) in &block.parents {
            let after = parent
                .cursor
                .as_ref()
                .map(|c| format!(", after: \"{}\"", c))
                .unwrap_or_default();
            query.push_str(&format!(
                "    {}: issue(number: {}) {{\n",
                issue_alias, parent.id.number
            ));
            query.push_str(&format!(
                "      subIssues(first: {}{}) {{\n",
                SUB_ISSUE_PAGE_SIZE, after
            ));
            query.push_str(
                "        nodes { number repository { owner { login } name } subIssues(first: 0) { totalCount } }\n",
            );
            query.push_str("        pageInfo { hasNextPage endCursor }\n");
            query.push_str("      }\n");
            query.push_str("    }\n");
        }
        query.push_str("  }\n");
    }
    query.push('}');
    query
}
