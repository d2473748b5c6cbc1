use crate::config::GenerationConfig;
use crate::error::Result;
use crate::github::PlatformClient;
use crate::mining::DataMiner;
use crate::notes::classifier::ChapterClassifier;
use crate::notes::composer::NotesComposer;
use crate::records::RecordFactory;

/// Runs the full generation pipeline: mine → link → classify → compose.
pub struct ReleaseNotesGenerator<'a> {
    client: &'a dyn PlatformClient,
    config: GenerationConfig,
}

impl<'a> ReleaseNotesGenerator<'a> {
    pub fn new(client: &'a dyn PlatformClient, config: GenerationConfig) -> Self {
        Self { client, config }
    }

    pub async fn generate(&self, owner: &str, repo: &str, tag_name: &str) -> Result<String> {
        let miner = DataMiner::new(self.client, &self.config);
        let mut data = miner.mine(owner, repo).await?;

        let factory = RecordFactory::new(self.client, &self.config);
        let mut records = factory.generate(&mut data).await?;
        tracing::info!("Linked mined data into {} records", records.len());

        let classifier = ChapterClassifier::new(&self.config);
        let chapters = classifier.classify(&mut records, data.since);

        let composer = NotesComposer::new(&self.config);
        let notes = composer.compose(
            &chapters,
            &data.home_repository,
            data.release.as_ref(),
            tag_name,
        );
        tracing::info!("Generated release notes for {}/{} {}", owner, repo, tag_name);
        Ok(notes)
    }
}
