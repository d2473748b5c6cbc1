use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::config::GenerationConfig;
use crate::error::Result;
use crate::github::PlatformClient;
use crate::mining::MinedData;
use crate::models::{Issue, IssueId};
use crate::records::commit::CommitRecord;
use crate::records::hierarchy::HierarchyIssueRecord;
use crate::records::issue::IssueRecord;
use crate::records::pull_request::PullRequestRecord;
use crate::records::record::{Record, RecordId};

/// Links mined issues, pull requests, and commits into records, resolving
/// the sub-issue hierarchy and cross-references between them.
pub struct RecordFactory<'a> {
    client: &'a dyn PlatformClient,
    config: &'a GenerationConfig,
}

impl<'a> RecordFactory<'a> {
    pub fn new(client: &'a dyn PlatformClient, config: &'a GenerationConfig) -> Self {
        Self { client, config }
    }

    pub async fn generate(&self, data: &mut MinedData) -> Result<BTreeMap<RecordId, Record>> {
        let mut records: BTreeMap<RecordId, Record> = BTreeMap::new();
        // Issue id → id of the top-level record that owns it. Hierarchy
        // records own every issue in their tree.
        let mut issue_owner: HashMap<IssueId, RecordId> = HashMap::new();
        let mut claimed: HashSet<IssueId> = HashSet::new();

        self.build_hierarchy_records(data, &mut records, &mut issue_owner, &mut claimed);
        self.build_flat_issue_records(data, &mut records, &mut issue_owner, &claimed);
        self.link_pull_requests(data, &mut records, &mut issue_owner, &mut claimed)
            .await?;
        self.attach_commits(data, &mut records);

        tracing::debug!("Record factory produced {} records", records.len());
        Ok(records)
    }

    /// Claims hierarchy roots by ranked parent type, heaviest first. An
    /// issue claimed by any parent is never reconsidered.
    fn build_hierarchy_records(
        &self,
        data: &MinedData,
        records: &mut BTreeMap<RecordId, Record>,
        issue_owner: &mut HashMap<IssueId, RecordId>,
        claimed: &mut HashSet<IssueId>,
    ) {
        for parent_type in &self.config.hierarchy_parent_types {
            let mut roots: Vec<IssueId> = data
                .issues
                .iter()
                .filter(|(id, issue)| {
                    !claimed.contains(*id)
                        && issue
                            .type_name()
                            .map(|t| t.eq_ignore_ascii_case(parent_type))
                            .unwrap_or(false)
                        && data.has_sub_issues(*id)
                })
                .map(|(id, _)| id.clone())
                .collect();
            roots.sort();

            for root in roots {
                // A root of this type may have been claimed as a child of
                // an earlier root.
                if claimed.contains(&root) {
                    continue;
                }
                let Some(record) = self.build_hierarchy_record(&root, data, claimed) else {
                    continue;
                };
                let record_id = record.record_id();
                for id in record.issue_ids() {
                    issue_owner.insert(id, record_id.clone());
                }
                records.insert(record_id, Record::Hierarchy(record));
            }
        }
    }

    /// Builds one hierarchy tree with an explicit work-stack: nodes land in
    /// an arena with parent indices and are folded back to front, so a
    /// parent always exists before its children attach.
    fn build_hierarchy_record(
        &self,
        root: &IssueId,
        data: &MinedData,
        claimed: &mut HashSet<IssueId>,
    ) -> Option<HierarchyIssueRecord> {
        struct PendingNode {
            parent: Option<usize>,
            record: HierarchyIssueRecord,
        }

        let mut arena: Vec<PendingNode> = Vec::new();
        let mut stack: Vec<(IssueId, Option<usize>, usize)> = vec![(root.clone(), None, 0)];

        while let Some((id, parent, level)) = stack.pop() {
            if !claimed.insert(id.clone()) {
                continue;
            }
            let Some(issue) = data.get_issue(&id) else {
                tracing::warn!("Hierarchy issue {} was never fetched, leaving it out", id);
                continue;
            };

            let node_index = arena.len();
            let record = HierarchyIssueRecord::new(
                self.make_issue_record(id.clone(), issue.clone(), data),
                level,
            );
            arena.push(PendingNode { parent, record });

            for child in data.sub_issues_of(&id) {
                if claimed.contains(child) {
                    continue;
                }
                if data.has_sub_issues(child) {
                    stack.push((child.clone(), Some(node_index), level + 1));
                } else {
                    claimed.insert(child.clone());
                    match data.get_issue(child) {
                        Some(child_issue) => arena[node_index].record.add_sub_issue(
                            self.make_issue_record(child.clone(), child_issue.clone(), data),
                        ),
                        None => tracing::warn!(
                            "Sub-issue {} was never fetched, leaving it out",
                            child
                        ),
                    }
                }
            }
        }

        while arena.len() > 1 {
            let node = arena.pop().expect("arena holds at least two nodes");
            let parent = node.parent.expect("non-root nodes keep a parent index");
            arena[parent].record.add_sub_hierarchy(node.record);
        }
        arena.pop().map(|node| node.record)
    }

    fn build_flat_issue_records(
        &self,
        data: &MinedData,
        records: &mut BTreeMap<RecordId, Record>,
        issue_owner: &mut HashMap<IssueId, RecordId>,
        claimed: &HashSet<IssueId>,
    ) {
        let mut rest: Vec<IssueId> = data
            .issues
            .keys()
            .filter(|id| !claimed.contains(*id))
            .cloned()
            .collect();
        rest.sort();

        for id in rest {
            let issue = data.issues[&id].clone();
            let record = self.make_issue_record(id.clone(), issue, data);
            let record_id = record.record_id();
            issue_owner.insert(id, record_id.clone());
            records.insert(record_id, Record::Issue(record));
        }
    }

    /// Attaches each pull request to every issue it closes, native
    /// closing references unioned with body mentions. A pull request
    /// linking nothing becomes a standalone record.
    async fn link_pull_requests(
        &self,
        data: &mut MinedData,
        records: &mut BTreeMap<RecordId, Record>,
        issue_owner: &mut HashMap<IssueId, RecordId>,
        claimed: &mut HashSet<IssueId>,
    ) -> Result<()> {
        let owner = data.home_repository.owner.login.clone();
        let repo = data.home_repository.name.clone();

        let mut numbers: Vec<u64> = data.pull_requests.keys().copied().collect();
        numbers.sort_unstable();

        for number in numbers {
            let pull_request = data.pull_requests[&number].clone();

            let mut linked: BTreeSet<u64> = match self
                .client
                .get_closing_issue_numbers(&owner, &repo, number)
                .await
            {
                Ok(numbers) => numbers.into_iter().collect(),
                Err(e) => {
                    tracing::warn!("Closing references lookup failed for #{}: {}", number, e);
                    BTreeSet::new()
                }
            };
            linked.extend(pull_request.mentioned_issue_numbers());

            let mut attached = false;
            for issue_number in linked {
                let issue_id = data.home_issue_id(issue_number);

                if !issue_owner.contains_key(&issue_id) {
                    match self.client.get_issue(&owner, &repo, issue_number).await {
                        Ok(issue) => self.materialize_issue(
                            issue_id.clone(),
                            issue,
                            data,
                            records,
                            issue_owner,
                            claimed,
                        ),
                        Err(e) => {
                            tracing::warn!(
                                "PR #{} references {} which cannot be resolved: {}",
                                number,
                                issue_id,
                                e
                            );
                            continue;
                        }
                    }
                }

                let registered = issue_owner
                    .get(&issue_id)
                    .and_then(|record_id| records.get_mut(record_id))
                    .map(|record| record.register_pull_request(&issue_id, pull_request.clone()))
                    .unwrap_or(false);
                if registered {
                    attached = true;
                }
            }

            if !attached {
                let skip = pull_request.has_any_label(&self.config.skip_labels);
                let record = PullRequestRecord::new(pull_request, skip);
                records.insert(record.record_id(), Record::PullRequest(record));
            }
        }

        Ok(())
    }

    /// Adds an issue fetched on demand to the cache and creates its record.
    fn materialize_issue(
        &self,
        id: IssueId,
        issue: Issue,
        data: &mut MinedData,
        records: &mut BTreeMap<RecordId, Record>,
        issue_owner: &mut HashMap<IssueId, RecordId>,
        claimed: &mut HashSet<IssueId>,
    ) {
        data.add_issue(id.clone(), issue);

        if data.has_sub_issues(&id) && !claimed.contains(&id) {
            if let Some(record) = self.build_hierarchy_record(&id, data, claimed) {
                let record_id = record.record_id();
                for contained in record.issue_ids() {
                    issue_owner.insert(contained, record_id.clone());
                }
                records.insert(record_id, Record::Hierarchy(record));
            }
        } else {
            let issue = data.issues[&id].clone();
            let record = self.make_issue_record(id.clone(), issue, data);
            let record_id = record.record_id();
            issue_owner.insert(id, record_id.clone());
            records.insert(record_id, Record::Issue(record));
        }
    }

    /// Commits attach to the first record holding a pull request with a
    /// matching sha; the rest become direct commit records.
    fn attach_commits(&self, data: &MinedData, records: &mut BTreeMap<RecordId, Record>) {
        let mut shas: Vec<String> = data.commits.keys().cloned().collect();
        shas.sort();

        for sha in shas {
            let commit = &data.commits[&sha];
            let attached = records
                .values_mut()
                .any(|record| record.register_commit(commit));
            if !attached {
                let record = CommitRecord::new(commit.clone());
                records.insert(record.record_id(), Record::Commit(record));
            }
        }
    }

    fn make_issue_record(&self, id: IssueId, issue: Issue, data: &MinedData) -> IssueRecord {
        let home = data.is_home(&id);
        let skip = issue.has_any_label(&self.config.skip_labels);
        IssueRecord::new(id, issue, home, skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::Value;
    use std::collections::HashMap as StdHashMap;

    use crate::error::Error;
    use crate::models::{
        Actor, Commit, CommitAuthor, CommitDetails, GitReference, IssueType, Label, PullRequest,
        Release, Repository, RepositoryOwner,
    };

    fn repository() -> Repository {
        Repository {
            id: 1,
            name: "repo".to_string(),
            full_name: "org/repo".to_string(),
            html_url: "https://github.com/org/repo".to_string(),
            owner: RepositoryOwner {
                login: "org".to_string(),
            },
        }
    }

    fn issue(number: u64, state: &str) -> Issue {
        Issue {
            number,
            title: format!("Issue {}", number),
            state: state.to_string(),
            body: None,
            labels: Vec::new(),
            user: None,
            assignees: Vec::new(),
            issue_type: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            closed_at: None,
            html_url: format!("https://github.com/org/repo/issues/{}", number),
            pull_request: None,
        }
    }

    fn typed_issue(number: u64, type_name: &str) -> Issue {
        Issue {
            issue_type: Some(IssueType {
                name: type_name.to_string(),
            }),
            ..issue(number, "open")
        }
    }

    fn pull_request(number: u64, body: Option<&str>) -> PullRequest {
        PullRequest {
            number,
            title: format!("PR {}", number),
            state: "closed".to_string(),
            body: body.map(|b| b.to_string()),
            labels: Vec::new(),
            user: Some(Actor {
                login: "dev".to_string(),
            }),
            assignees: Vec::new(),
            merged_at: Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
            closed_at: None,
            merge_commit_sha: Some(format!("merge{}", number)),
            head: Some(GitReference {
                sha: format!("head{}", number),
            }),
            html_url: format!("https://github.com/org/repo/pull/{}", number),
        }
    }

    fn commit(sha: &str) -> Commit {
        Commit {
            sha: sha.to_string(),
            commit: CommitDetails {
                message: "work".to_string(),
                author: CommitAuthor {
                    name: "Dev".to_string(),
                    email: "dev@example.com".to_string(),
                    date: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
                },
            },
            author: Some(Actor {
                login: "dev".to_string(),
            }),
        }
    }

    fn mined_data() -> MinedData {
        MinedData::new(repository())
    }

    fn home_id(number: u64) -> IssueId {
        IssueId::new("org", "repo", number)
    }

    /// Client whose closing references and on-demand issues are canned.
    struct FactoryClient {
        closing: StdHashMap<u64, Vec<u64>>,
        fetchable: StdHashMap<u64, Issue>,
    }

    impl FactoryClient {
        fn empty() -> Self {
            Self {
                closing: StdHashMap::new(),
                fetchable: StdHashMap::new(),
            }
        }
    }

    #[async_trait]
    impl PlatformClient for FactoryClient {
        async fn get_repository(&self, _: &str, _: &str) -> Result<Repository> {
            Ok(repository())
        }

        async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<Issue> {
            self.fetchable.get(&number).cloned().ok_or_else(|| {
                Error::IssueNotFound(format!("{}/{}#{}", owner, repo, number))
            })
        }

        async fn get_issues(
            &self,
            _: &str,
            _: &str,
            _: Option<DateTime<Utc>>,
        ) -> Result<Vec<Issue>> {
            unimplemented!()
        }

        async fn get_pull_requests(&self, _: &str, _: &str) -> Result<Vec<PullRequest>> {
            unimplemented!()
        }

        async fn get_commits(
            &self,
            _: &str,
            _: &str,
            _: Option<DateTime<Utc>>,
        ) -> Result<Vec<Commit>> {
            unimplemented!()
        }

        async fn get_latest_release(&self, _: &str, _: &str) -> Result<Option<Release>> {
            unimplemented!()
        }

        async fn get_closing_issue_numbers(&self, _: &str, _: &str, pr: u64) -> Result<Vec<u64>> {
            Ok(self.closing.get(&pr).cloned().unwrap_or_default())
        }

        async fn graphql(&self, _: &str) -> Result<Value> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_body_mention_links_pr_to_issue() {
        let mut data = mined_data();
        data.add_issue(home_id(10), issue(10, "closed"));
        data.pull_requests
            .insert(11, pull_request(11, Some("Closes #10")));

        let client = FactoryClient::empty();
        let config = GenerationConfig::default();
        let factory = RecordFactory::new(&client, &config);

        let records = factory.generate(&mut data).await.unwrap();

        assert_eq!(records.len(), 1);
        let Record::Issue(record) = &records[&RecordId::Number(10)] else {
            panic!("expected an issue record");
        };
        assert_eq!(record.pull_request_count(), 1);
        assert!(record.pull_requests().contains_key(&11));
    }

    #[tokio::test]
    async fn test_native_closing_reference_links_pr() {
        let mut data = mined_data();
        data.add_issue(home_id(10), issue(10, "closed"));
        data.pull_requests.insert(11, pull_request(11, None));

        let mut client = FactoryClient::empty();
        client.closing.insert(11, vec![10]);
        let config = GenerationConfig::default();
        let factory = RecordFactory::new(&client, &config);

        let records = factory.generate(&mut data).await.unwrap();

        let Record::Issue(record) = &records[&RecordId::Number(10)] else {
            panic!("expected an issue record");
        };
        assert_eq!(record.pull_request_count(), 1);
    }

    #[tokio::test]
    async fn test_pr_without_links_is_standalone() {
        let mut data = mined_data();
        data.pull_requests
            .insert(11, pull_request(11, Some("General cleanup")));

        let client = FactoryClient::empty();
        let config = GenerationConfig::default();
        let factory = RecordFactory::new(&client, &config);

        let records = factory.generate(&mut data).await.unwrap();

        assert!(matches!(
            records[&RecordId::Number(11)],
            Record::PullRequest(_)
        ));
    }

    #[tokio::test]
    async fn test_mentioned_issue_fetched_on_demand() {
        let mut data = mined_data();
        data.pull_requests
            .insert(11, pull_request(11, Some("Fixes #10")));

        let mut client = FactoryClient::empty();
        client.fetchable.insert(10, issue(10, "open"));
        let config = GenerationConfig::default();
        let factory = RecordFactory::new(&client, &config);

        let records = factory.generate(&mut data).await.unwrap();

        assert_eq!(records.len(), 1);
        let Record::Issue(record) = &records[&RecordId::Number(10)] else {
            panic!("expected an issue record");
        };
        assert_eq!(record.pull_request_count(), 1);
        assert!(data.issues.contains_key(&home_id(10)));
    }

    #[tokio::test]
    async fn test_unresolvable_mention_demotes_pr_to_standalone() {
        let mut data = mined_data();
        data.pull_requests
            .insert(11, pull_request(11, Some("Fixes #404")));

        let client = FactoryClient::empty();
        let config = GenerationConfig::default();
        let factory = RecordFactory::new(&client, &config);

        let records = factory.generate(&mut data).await.unwrap();

        assert_eq!(records.len(), 1);
        assert!(matches!(
            records[&RecordId::Number(11)],
            Record::PullRequest(_)
        ));
    }

    #[tokio::test]
    async fn test_commits_attach_or_become_direct() {
        let mut data = mined_data();
        data.pull_requests.insert(11, pull_request(11, None));
        data.commits
            .insert("merge11".to_string(), commit("merge11"));
        data.commits.insert("orphan".to_string(), commit("orphan"));

        let client = FactoryClient::empty();
        let config = GenerationConfig::default();
        let factory = RecordFactory::new(&client, &config);

        let records = factory.generate(&mut data).await.unwrap();

        assert_eq!(records.len(), 2);
        assert!(matches!(
            records[&RecordId::Sha("orphan".to_string())],
            Record::Commit(_)
        ));
        let Record::PullRequest(pr) = &records[&RecordId::Number(11)] else {
            panic!("expected a pull request record");
        };
        assert_eq!(pr.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_hierarchy_resolution_by_ranked_types() {
        let mut data = mined_data();
        data.add_issue(home_id(1), typed_issue(1, "Epic"));
        data.add_issue(home_id(2), issue(2, "open"));
        data.add_issue(home_id(3), typed_issue(3, "Feature"));
        data.add_issue(home_id(4), issue(4, "open"));
        data.parents_sub_issues
            .insert(home_id(1), vec![home_id(2), home_id(3)]);
        data.parents_sub_issues.insert(home_id(3), vec![home_id(4)]);
        data.parents_sub_issues.insert(home_id(2), Vec::new());
        data.parents_sub_issues.insert(home_id(4), Vec::new());

        let client = FactoryClient::empty();
        let config = GenerationConfig::default();
        let factory = RecordFactory::new(&client, &config);

        let records = factory.generate(&mut data).await.unwrap();

        assert_eq!(records.len(), 1);
        let Record::Hierarchy(root) = &records[&RecordId::Number(1)] else {
            panic!("expected a hierarchy record");
        };
        assert_eq!(root.level(), 0);
        assert_eq!(root.sub_issues().len(), 1);
        assert!(root.sub_issues().contains_key(&home_id(2)));

        let nested = &root.sub_hierarchy_issues()[&home_id(3)];
        assert_eq!(nested.level(), 1);
        assert!(nested.sub_issues().contains_key(&home_id(4)));
    }

    #[tokio::test]
    async fn test_first_claim_wins_for_shared_child() {
        let mut data = mined_data();
        data.add_issue(home_id(1), typed_issue(1, "Epic"));
        data.add_issue(home_id(5), typed_issue(5, "Epic"));
        data.add_issue(home_id(2), issue(2, "open"));
        data.parents_sub_issues.insert(home_id(1), vec![home_id(2)]);
        data.parents_sub_issues.insert(home_id(5), vec![home_id(2)]);
        data.parents_sub_issues.insert(home_id(2), Vec::new());

        let client = FactoryClient::empty();
        let config = GenerationConfig::default();
        let factory = RecordFactory::new(&client, &config);

        let records = factory.generate(&mut data).await.unwrap();

        let Record::Hierarchy(first) = &records[&RecordId::Number(1)] else {
            panic!("expected a hierarchy record");
        };
        let Record::Hierarchy(second) = &records[&RecordId::Number(5)] else {
            panic!("expected a hierarchy record");
        };
        assert!(first.sub_issues().contains_key(&home_id(2)));
        assert!(second.sub_issues().is_empty());
    }

    #[tokio::test]
    async fn test_unranked_parent_type_stays_flat() {
        let mut data = mined_data();
        data.add_issue(home_id(1), typed_issue(1, "Initiative"));
        data.add_issue(home_id(2), issue(2, "open"));
        data.parents_sub_issues.insert(home_id(1), vec![home_id(2)]);
        data.parents_sub_issues.insert(home_id(2), Vec::new());

        let client = FactoryClient::empty();
        let config = GenerationConfig::default();
        let factory = RecordFactory::new(&client, &config);

        let records = factory.generate(&mut data).await.unwrap();

        assert_eq!(records.len(), 2);
        assert!(matches!(records[&RecordId::Number(1)], Record::Issue(_)));
        assert!(matches!(records[&RecordId::Number(2)], Record::Issue(_)));
    }

    #[tokio::test]
    async fn test_skip_label_marks_record() {
        let mut data = mined_data();
        let mut skipped = issue(10, "closed");
        skipped.labels.push(Label {
            name: "skip-release-notes".to_string(),
        });
        data.add_issue(home_id(10), skipped);

        let client = FactoryClient::empty();
        let config = GenerationConfig::default();
        let factory = RecordFactory::new(&client, &config);

        let records = factory.generate(&mut data).await.unwrap();

        assert!(records[&RecordId::Number(10)].skip());
    }

    #[tokio::test]
    async fn test_record_ids_unique_across_kinds() {
        let mut data = mined_data();
        data.add_issue(home_id(1), typed_issue(1, "Epic"));
        data.add_issue(home_id(2), issue(2, "open"));
        data.add_issue(home_id(3), issue(3, "closed"));
        data.parents_sub_issues.insert(home_id(1), vec![home_id(2)]);
        data.parents_sub_issues.insert(home_id(2), Vec::new());
        data.pull_requests
            .insert(11, pull_request(11, Some("Closes #3")));
        data.commits.insert("orphan".to_string(), commit("orphan"));

        let client = FactoryClient::empty();
        let config = GenerationConfig::default();
        let factory = RecordFactory::new(&client, &config);

        let records = factory.generate(&mut data).await.unwrap();

        // Hierarchy #1 (owning #2), flat issue #3 with PR #11, direct commit.
        assert_eq!(records.len(), 3);
        let ids: Vec<RecordId> = records.keys().cloned().collect();
        let mut deduped = ids.clone();
        deduped.dedup();
        assert_eq!(ids, deduped);
    }
}
