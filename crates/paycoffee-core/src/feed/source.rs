use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::FetchError;

/// Anything that can produce one full snapshot of the supporter feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the raw feed payload. No pagination: each call is a full snapshot.
    async fn fetch(&self) -> Result<Value, FetchError>;
}

/// `GET <feed-url>` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: Client,
    url: String,
}

impl HttpFeedSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<Value, FetchError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(url = %self.url, status = status.as_u16(), "feed fetch failed");
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
