use crate::config::GenerationConfig;
use crate::models::{Release, Repository};
use crate::notes::chapter::Chapter;
use crate::notes::classifier::{ClassifiedChapters, CLOSED_ISSUES_WITHOUT_USER_LABELS};

/// Assembles the final document: custom chapters in configuration order,
/// hierarchy triage, the specially-placed unlabeled-issues chapter, the
/// remaining service chapters, and the changelog footer.
pub struct NotesComposer<'a> {
    config: &'a GenerationConfig,
}

impl<'a> NotesComposer<'a> {
    pub fn new(config: &'a GenerationConfig) -> Self {
        Self { config }
    }

    pub fn compose(
        &self,
        chapters: &ClassifiedChapters,
        repository: &Repository,
        previous_release: Option<&Release>,
        tag_name: &str,
    ) -> String {
        let mut sections: Vec<String> = Vec::new();

        for chapter in chapters.custom.iter().chain(chapters.hierarchy.iter()) {
            self.push_chapter(&mut sections, chapter);
        }

        if let Some(unlabeled) = chapters
            .service
            .iter()
            .find(|c| c.title == CLOSED_ISSUES_WITHOUT_USER_LABELS)
        {
            self.push_chapter(&mut sections, unlabeled);
        }

        for chapter in chapters
            .service
            .iter()
            .filter(|c| c.title != CLOSED_ISSUES_WITHOUT_USER_LABELS)
        {
            self.push_chapter(&mut sections, chapter);
        }

        sections.push(self.changelog_footer(repository, previous_release, tag_name));
        sections.join("\n")
    }

    fn push_chapter(&self, sections: &mut Vec<String>, chapter: &Chapter) {
        if chapter.is_empty() && !self.config.print_empty_chapters {
            return;
        }
        sections.push(chapter.render(self.config.sort_ascending));
    }

    fn changelog_footer(
        &self,
        repository: &Repository,
        previous_release: Option<&Release>,
        tag_name: &str,
    ) -> String {
        let link = match previous_release {
            Some(release) => format!(
                "{}/compare/{}...{}",
                repository.html_url, release.tag_name, tag_name
            ),
            None => format!("{}/commits/{}", repository.html_url, tag_name),
        };
        format!("#### Full Changelog\n{}\n", link)
    }
}
