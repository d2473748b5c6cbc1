use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::github::rate_limiter::RateLimiter;

pub struct Paginator<'a> {
    client: &'a Client,
    rate_limiter: &'a RateLimiter,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a Client, rate_limiter: &'a RateLimiter) -> Self {
        Self {
            client,
            rate_limiter,
        }
    }

    /// Fetches every page of a list endpoint, following the Link header.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        base_url: &str,
        per_page: u32,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            self.rate_limiter.wait().await;

            let separator = if base_url.contains('?') { "&" } else { "?" };
            let url = format!("{}{}per_page={}&page={}", base_url, separator, per_page, page);

            tracing::debug!("Fetching: {}", url);
            let response = self.client.get(&url).send().await?;
            self.rate_limiter.update(&response).await;

            let has_next = response
                .headers()
                .get("link")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.contains("rel=\"next\""))
                .unwrap_or(false);

            let batch: Vec<T> = response.json().await?;
            let batch_len = batch.len();
            items.extend(batch);

            if !has_next || batch_len < per_page as usize {
                break;
            }

            page += 1;
        }

        Ok(items)
    }
}
