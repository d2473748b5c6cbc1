pub mod config;
pub mod error;
pub mod models;
pub mod github;
pub mod mining;
pub mod records;
pub mod notes;

pub use config::{Config, DuplicityScope, GenerationConfig};
pub use error::{Error, Result};
pub use github::{GitHubClient, PlatformClient};
pub use mining::{DataMiner, MinedData};
pub use records::{Record, RecordFactory, RecordId};
pub use notes::ReleaseNotesGenerator;
