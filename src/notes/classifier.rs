use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::config::GenerationConfig;
use crate::notes::chapter::Chapter;
use crate::records::{Record, RecordId};

pub const CLOSED_HIERARCHY_ISSUES: &str = "Closed Hierarchy Issues";
pub const NEW_HIERARCHY_ISSUES: &str = "New Hierarchy Issues";
pub const SILENT_LIVE_HIERARCHY_ISSUES: &str = "Silent Live Hierarchy Issues";

pub const CLOSED_ISSUES_WITHOUT_PR: &str = "Closed Issues without Pull Request ⚠️";
pub const CLOSED_ISSUES_WITHOUT_USER_LABELS: &str = "Closed Issues without User Defined Labels ⚠️";
pub const MERGED_PRS_WITHOUT_ISSUE_AND_LABELS: &str =
    "Merged PRs without Issue and User Defined Labels ⚠️";
pub const CLOSED_PRS_WITHOUT_ISSUE_AND_LABELS: &str =
    "Closed PRs without Issue and User Defined Labels ⚠️";
pub const PRS_LINKED_TO_OPEN_ISSUE: &str = "Merged PRs Linked to Not Closed Issue ⚠️";
pub const OTHERS_NO_TOPIC: &str = "Others - No Topic ⚠️";
pub const DIRECT_COMMITS: &str = "Direct Commits ⚠️";

/// Output of one classification pass, grouped by chapter category.
pub struct ClassifiedChapters {
    /// User-configured chapters, in configuration order.
    pub custom: Vec<Chapter>,
    /// Hierarchy triage chapters: closed, new, silent live.
    pub hierarchy: Vec<Chapter>,
    /// The seven fixed diagnostic chapters.
    pub service: Vec<Chapter>,
}

/// Assigns records to chapters. Records are processed in ascending id
/// order and the pass is idempotent: classifying the same record set twice
/// yields identical chapters.
pub struct ChapterClassifier<'a> {
    config: &'a GenerationConfig,
}

impl<'a> ChapterClassifier<'a> {
    pub fn new(config: &'a GenerationConfig) -> Self {
        Self { config }
    }

    pub fn classify(
        &self,
        records: &mut BTreeMap<RecordId, Record>,
        since: Option<DateTime<Utc>>,
    ) -> ClassifiedChapters {
        for record in records.values_mut() {
            record.reset_present_in_chapters();
        }

        let icon = self.config.duplicity_icon.clone();
        let scope = self.config.duplicity_scope;
        let ids: Vec<RecordId> = records.keys().cloned().collect();
        let mut shown: HashSet<RecordId> = HashSet::new();

        let mut custom = self.build_custom_chapters();
        let mut closed_hierarchy = Chapter::new(CLOSED_HIERARCHY_ISSUES, Vec::new());
        let mut new_hierarchy = Chapter::new(NEW_HIERARCHY_ISSUES, Vec::new());
        let mut silent_hierarchy = Chapter::new(SILENT_LIVE_HIERARCHY_ISSUES, Vec::new());

        // Custom category pass.
        for id in &ids {
            let record = records.get_mut(id).expect("id taken from the map");
            if record.skip() {
                continue;
            }

            if let Record::Hierarchy(root) = record {
                // Hierarchy roots bypass label matching; they are triaged
                // by state against the release boundary instead.
                let issue = root.issue().issue();
                let chapter = if issue.is_closed() {
                    &mut closed_hierarchy
                } else if since.map(|s| issue.created_at > s).unwrap_or(true) {
                    &mut new_hierarchy
                } else {
                    &mut silent_hierarchy
                };
                add_row(chapter, id, record, &icon, &mut shown);
                continue;
            }

            if shown.contains(id) && !scope.allows_custom() {
                continue;
            }
            let delivers = match record {
                Record::Issue(r) => r.pull_request_count() > 0,
                Record::PullRequest(_) | Record::Commit(_) => true,
                Record::Hierarchy(_) => unreachable!("handled above"),
            };
            if !delivers {
                continue;
            }

            let labels = record.labels();
            for index in 0..custom.len() {
                if custom[index].matches_labels(&labels) {
                    add_row(&mut custom[index], id, record, &icon, &mut shown);
                }
            }
        }

        // Service category pass.
        let custom_labels = self.config.custom_chapter_labels();
        let mut closed_without_pr = Chapter::new(CLOSED_ISSUES_WITHOUT_PR, Vec::new());
        let mut closed_without_labels = Chapter::new(CLOSED_ISSUES_WITHOUT_USER_LABELS, Vec::new());
        let mut merged_without_issue =
            Chapter::new(MERGED_PRS_WITHOUT_ISSUE_AND_LABELS, Vec::new());
        let mut closed_without_issue =
            Chapter::new(CLOSED_PRS_WITHOUT_ISSUE_AND_LABELS, Vec::new());
        let mut linked_to_open_issue = Chapter::new(PRS_LINKED_TO_OPEN_ISSUE, Vec::new());
        let mut others = Chapter::new(OTHERS_NO_TOPIC, Vec::new());
        let mut direct_commits = Chapter::new(DIRECT_COMMITS, Vec::new());

        for id in &ids {
            let record = records.get_mut(id).expect("id taken from the map");
            if record.skip() || matches!(record, Record::Hierarchy(_)) {
                continue;
            }

            let already_shown = shown.contains(id);
            let allowed = !already_shown || scope.allows_service();
            let has_custom_label = record.has_any_label(&custom_labels);

            match record {
                Record::Issue(r) if r.issue().is_closed() => {
                    let without_pr = r.pull_request_count() == 0;
                    let mut flagged = false;
                    if without_pr && allowed {
                        add_row(&mut closed_without_pr, id, record, &icon, &mut shown);
                        flagged = true;
                    }
                    if !has_custom_label && allowed {
                        add_row(&mut closed_without_labels, id, record, &icon, &mut shown);
                        flagged = true;
                    }
                    if !flagged && !already_shown {
                        add_row(&mut others, id, record, &icon, &mut shown);
                    }
                }
                Record::Issue(r) => {
                    // Open issue: delivered work keeps it visible as a
                    // not-yet-closed topic, otherwise it is dropped.
                    if r.pull_request_count() > 0 && allowed {
                        add_row(&mut linked_to_open_issue, id, record, &icon, &mut shown);
                    }
                }
                Record::PullRequest(r) if r.is_merged() => {
                    let mentions = r.contains_issue_mentions();
                    let mut flagged = false;
                    if !mentions && !has_custom_label && allowed {
                        add_row(&mut merged_without_issue, id, record, &icon, &mut shown);
                        flagged = true;
                    } else if mentions && allowed {
                        add_row(&mut linked_to_open_issue, id, record, &icon, &mut shown);
                        flagged = true;
                    }
                    if !flagged && !already_shown {
                        add_row(&mut others, id, record, &icon, &mut shown);
                    }
                }
                Record::PullRequest(r) if r.is_closed() => {
                    let without = !r.contains_issue_mentions() && !has_custom_label;
                    let mut flagged = false;
                    if without && allowed {
                        add_row(&mut closed_without_issue, id, record, &icon, &mut shown);
                        flagged = true;
                    }
                    if !flagged && !already_shown {
                        add_row(&mut others, id, record, &icon, &mut shown);
                    }
                }
                Record::PullRequest(_) => {}
                Record::Commit(_) => {
                    if allowed {
                        add_row(&mut direct_commits, id, record, &icon, &mut shown);
                    }
                }
                Record::Hierarchy(_) => unreachable!("filtered above"),
            }
        }

        ClassifiedChapters {
            custom,
            hierarchy: vec![closed_hierarchy, new_hierarchy, silent_hierarchy],
            service: vec![
                closed_without_pr,
                closed_without_labels,
                merged_without_issue,
                closed_without_issue,
                linked_to_open_issue,
                others,
                direct_commits,
            ],
        }
    }

    /// Chapter specs sharing a title merge their trigger labels, keeping
    /// configuration order.
    fn build_custom_chapters(&self) -> Vec<Chapter> {
        let mut chapters: Vec<Chapter> = Vec::new();
        for spec in &self.config.chapters {
            match chapters.iter_mut().find(|c| c.title == spec.title) {
                Some(chapter) => chapter.labels.push(spec.label.clone()),
                None => chapters.push(Chapter::new(&spec.title, vec![spec.label.clone()])),
            }
        }
        chapters
    }
}

fn add_row(
    chapter: &mut Chapter,
    id: &RecordId,
    record: &mut Record,
    icon: &str,
    shown: &mut HashSet<RecordId>,
) {
    record.increment_present_in_chapters();
    chapter.add_row(id.clone(), record.to_chapter_row(icon));
    shown.insert(id.clone());
}
