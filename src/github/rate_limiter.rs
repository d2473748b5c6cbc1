use reqwest::Response;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

/// Tracks GitHub rate-limit response headers and pauses outgoing requests
/// once the remaining budget hits zero.
pub struct RateLimiter {
    state: Mutex<RateLimitState>,
}

struct RateLimitState {
    remaining: u32,
    reset_at: Option<Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RateLimitState {
                remaining: 5000,
                reset_at: None,
            }),
        }
    }

    pub async fn wait(&self) {
        let wait_duration = {
            let state = self.state.lock().await;
            match (state.remaining, state.reset_at) {
                (0, Some(reset_at)) => reset_at.checked_duration_since(Instant::now()),
                _ => None,
            }
        };

        if let Some(duration) = wait_duration {
            tracing::info!("Rate limited, waiting {:?}", duration);
            sleep(duration).await;
        }
    }

    pub async fn update(&self, response: &Response) {
        let remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());

        let Some(remaining) = remaining else {
            return;
        };

        let reset_epoch = response
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let mut state = self.state.lock().await;
        state.remaining = remaining;
        if let Some(reset_epoch) = reset_epoch {
            let now_epoch = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            if reset_epoch > now_epoch {
                state.reset_at =
                    Some(Instant::now() + Duration::from_secs(reset_epoch - now_epoch));
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
