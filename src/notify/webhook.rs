use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use super::{Event, NotificationError, Notifier};

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub url: String,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl WebhookConfig {
    /// Returns `None` when `NOTIFY_WEBHOOK_URL` is unset.
    pub fn from_env() -> Option<Self> {
        let url = env::var("NOTIFY_WEBHOOK_URL").ok()?;
        let max_attempts = env::var("NOTIFY_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3)
            .max(1);

        Some(Self {
            url,
            max_attempts,
            backoff: Duration::from_millis(500),
        })
    }
}

/// Posts each event as JSON, retrying with linear backoff.
pub struct WebhookNotifier {
    client: Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }

    async fn post_once(&self, event: &Event) -> Result<(), NotificationError> {
        let response = self.client.post(&self.config.url).json(event).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &Event) -> Result<(), NotificationError> {
        let mut attempt = 1;
        loop {
            match self.post_once(event).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.config.max_attempts => {
                    return Err(NotificationError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!(
                        "webhook delivery of {} failed (attempt {}/{}): {}",
                        event.name(),
                        attempt,
                        self.config.max_attempts,
                        e
                    );
                    tokio::time::sleep(self.config.backoff * attempt).await;
                    attempt += 1;
                }
            }
        }
    }
}
