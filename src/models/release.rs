use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub name: Option<String>,
    pub draft: bool,
    pub prerelease: bool,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Release {
    /// Timestamp used as the mining window boundary.
    pub fn boundary(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.created_at)
    }
}
