pub mod client;
pub mod rate_limiter;
pub mod paginator;
pub mod sub_issues;

pub use client::{GitHubClient, PlatformClient};
pub use rate_limiter::RateLimiter;
pub use paginator::Paginator;
pub use sub_issues::SubIssueCollector;
