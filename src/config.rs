use serde::Deserialize;
use std::env;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: String,
    pub duplicity_scope: DuplicityScope,
    pub duplicity_icon: String,
    pub skip_labels: Vec<String>,
    pub hierarchy_parent_types: Vec<String>,
    pub print_empty_chapters: bool,
    pub sort_ascending: bool,
    pub fetch_concurrency: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token = env::var("GITHUB_TOKEN")
            .map_err(|_| Error::Config("GITHUB_TOKEN environment variable not set".to_string()))?;

        let duplicity_scope = env::var("DUPLICITY_SCOPE")
            .map(|v| DuplicityScope::parse(&v))
            .unwrap_or(DuplicityScope::Both);

        let duplicity_icon = env::var("DUPLICITY_ICON").unwrap_or_else(|_| "🔁".to_string());

        let skip_labels = env::var("SKIP_RELEASE_NOTES_LABELS")
            .map(|v| split_list(&v))
            .unwrap_or_else(|_| vec!["skip-release-notes".to_string()]);

        let hierarchy_parent_types = env::var("HIERARCHY_PARENT_TYPES")
            .map(|v| split_list(&v))
            .unwrap_or_else(|_| {
                vec!["Epic".to_string(), "Feature".to_string(), "Task".to_string()]
            });

        let print_empty_chapters = env::var("PRINT_EMPTY_CHAPTERS")
            .ok()
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(true);

        let sort_ascending = env::var("ROW_ORDER")
            .ok()
            .map(|v| v.to_lowercase() != "desc")
            .unwrap_or(true);

        let fetch_concurrency = env::var("FETCH_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8);

        Ok(Self {
            github_token,
            duplicity_scope,
            duplicity_icon,
            skip_labels,
            hierarchy_parent_types,
            print_empty_chapters,
            sort_ascending,
            fetch_concurrency,
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// One user-configured chapter trigger: records carrying `label` land in the
/// chapter titled `title`. Several entries may share a title; their labels
/// are merged.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterSpec {
    pub title: String,
    pub label: String,
}

pub fn parse_chapters(json: &str) -> Result<Vec<ChapterSpec>> {
    let chapters: Vec<ChapterSpec> = serde_json::from_str(json)?;
    Ok(chapters)
}

/// Controls whether a record already placed in one chapter category (custom
/// vs. service) may appear again in the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicityScope {
    None,
    Custom,
    Service,
    Both,
}

impl DuplicityScope {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "none" => DuplicityScope::None,
            "custom" => DuplicityScope::Custom,
            "service" => DuplicityScope::Service,
            "both" => DuplicityScope::Both,
            other => {
                tracing::warn!("Unknown duplicity scope '{}', defaulting to 'both'", other);
                DuplicityScope::Both
            }
        }
    }

    pub fn allows_custom(self) -> bool {
        matches!(self, DuplicityScope::Custom | DuplicityScope::Both)
    }

    pub fn allows_service(self) -> bool {
        matches!(self, DuplicityScope::Service | DuplicityScope::Both)
    }
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub chapters: Vec<ChapterSpec>,
    pub duplicity_scope: DuplicityScope,
    pub duplicity_icon: String,
    pub skip_labels: Vec<String>,
    pub hierarchy_parent_types: Vec<String>,
    pub print_empty_chapters: bool,
    pub sort_ascending: bool,
    pub fetch_concurrency: usize,
}

impl GenerationConfig {
    /// Every label that triggers some user-configured chapter.
    pub fn custom_chapter_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.chapters.iter().map(|c| c.label.clone()).collect();
        labels.sort();
        labels.dedup();
        labels
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            chapters: Vec::new(),
            duplicity_scope: DuplicityScope::Both,
            duplicity_icon: "🔁".to_string(),
            skip_labels: vec!["skip-release-notes".to_string()],
            hierarchy_parent_types: vec![
                "Epic".to_string(),
                "Feature".to_string(),
                "Task".to_string(),
            ],
            print_empty_chapters: true,
            sort_ascending: true,
            fetch_concurrency: 8,
        }
    }
}

impl From<&Config> for GenerationConfig {
    fn from(config: &Config) -> Self {
        Self {
            chapters: Vec::new(),
            duplicity_scope: config.duplicity_scope,
            duplicity_icon: config.duplicity_icon.clone(),
            skip_labels: config.skip_labels.clone(),
            hierarchy_parent_types: config.hierarchy_parent_types.clone(),
            print_empty_chapters: config.print_empty_chapters,
            sort_ascending: config.sort_ascending,
            fetch_concurrency: config.fetch_concurrency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chapters() {
        let json = r#"[
            {"title": "Breaking Changes 💥", "label": "breaking-change"},
            {"title": "New Features 🎉", "label": "feature"},
            {"title": "New Features 🎉", "label": "enhancement"}
        ]"#;
        let chapters = parse_chapters(json).unwrap();
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].title, "Breaking Changes 💥");
        assert_eq!(chapters[2].label, "enhancement");
    }

    #[test]
    fn test_parse_chapters_invalid() {
        assert!(parse_chapters("not json").is_err());
    }

    #[test]
    fn test_duplicity_scope_parse() {
        assert_eq!(DuplicityScope::parse("none"), DuplicityScope::None);
        assert_eq!(DuplicityScope::parse("CUSTOM"), DuplicityScope::Custom);
        assert_eq!(DuplicityScope::parse("Service"), DuplicityScope::Service);
        assert_eq!(DuplicityScope::parse("both"), DuplicityScope::Both);
        assert_eq!(DuplicityScope::parse("bogus"), DuplicityScope::Both);
    }

    #[test]
    fn test_duplicity_scope_categories() {
        assert!(DuplicityScope::Both.allows_custom());
        assert!(DuplicityScope::Both.allows_service());
        assert!(DuplicityScope::Custom.allows_custom());
        assert!(!DuplicityScope::Custom.allows_service());
        assert!(!DuplicityScope::None.allows_custom());
        assert!(!DuplicityScope::None.allows_service());
    }

    #[test]
    fn test_custom_chapter_labels_deduplicated() {
        let config = GenerationConfig {
            chapters: vec![
                ChapterSpec {
                    title: "A".to_string(),
                    label: "bug".to_string(),
                },
                ChapterSpec {
                    title: "B".to_string(),
                    label: "bug".to_string(),
                },
                ChapterSpec {
                    title: "B".to_string(),
                    label: "feature".to_string(),
                },
            ],
            ..Default::default()
        };
        assert_eq!(config.custom_chapter_labels(), vec!["bug", "feature"]);
    }
}
