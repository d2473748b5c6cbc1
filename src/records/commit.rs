use crate::models::Commit;
use crate::records::record::RecordId;

/// A commit not reachable from any pull request.
pub struct CommitRecord {
    commit: Commit,
    present_in_chapters: u32,
}

impl CommitRecord {
    pub fn new(commit: Commit) -> Self {
        Self {
            commit,
            present_in_chapters: 0,
        }
    }

    pub fn record_id(&self) -> RecordId {
        RecordId::Sha(self.commit.sha.clone())
    }

    pub fn commit(&self) -> &Commit {
        &self.commit
    }

    pub fn present_in_chapters(&self) -> u32 {
        self.present_in_chapters
    }

    pub fn increment_present_in_chapters(&mut self) {
        self.present_in_chapters += 1;
    }

    pub fn reset_present_in_chapters(&mut self) {
        self.present_in_chapters = 0;
    }

    pub fn developers(&self) -> Vec<String> {
        match self.commit.author_login() {
            Some(login) => vec![login.to_string()],
            None => vec![self.commit.commit.author.name.clone()],
        }
    }

    pub fn row(&self, duplicity_icon: &str) -> String {
        let mut row = String::new();
        if self.present_in_chapters > 1 {
            row.push_str(duplicity_icon);
            row.push(' ');
        }
        row.push_str(&format!(
            "{} _{}_",
            self.commit.short_sha(),
            self.commit.summary()
        ));
        match self.commit.author_login() {
            Some(login) => row.push_str(&format!(" by @{}", login)),
            None => row.push_str(&format!(" by {}", self.commit.commit.author.name)),
        }
        row
    }
}
