//! # feed::source
//!
//! Where CSV bodies come from. Production polls a published spreadsheet over
//! HTTP; tests plug in a scripted source.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use super::FeedError;

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch one raw CSV body.
    async fn fetch(&self) -> Result<String, FeedError>;

    /// Human-readable origin for logs / status.
    fn describe(&self) -> String;
}

// ─── HttpFeedSource ───────────────────────────────────────────────────────────

/// GETs a published sheet export. URLs are tried in order, primary first
/// then the fallback. First success wins.
pub struct HttpFeedSource {
    client:  reqwest::Client,
    urls:    Vec<String>,
    timeout: Duration,
}

impl HttpFeedSource {
    pub fn new(client: reqwest::Client, urls: Vec<String>, timeout: Duration) -> Self {
        Self { client, urls, timeout }
    }

    async fn fetch_url(&self, url: &str) -> Result<String, FeedError> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        // ไม่มี Content-Type → ยอมรับ, มีแต่ไม่ใช่ CSV (เช่นหน้า login HTML) → ปฏิเสธ
        if let Some(content_type) = resp.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
            if !is_csv_content_type(content_type) {
                return Err(FeedError::ContentType(content_type.to_string()));
            }
        }

        resp.text().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> FeedError {
        if err.is_timeout() {
            FeedError::Timeout(self.timeout)
        } else {
            FeedError::Fetch(err.to_string())
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<String, FeedError> {
        let mut last_err = FeedError::NotConfigured;

        for (attempt, url) in self.urls.iter().enumerate() {
            match self.fetch_url(url).await {
                Ok(body) => {
                    debug!(url = %url, bytes = body.len(), "feed body fetched");
                    return Ok(body);
                }
                Err(e) => {
                    warn!(url = %url, attempt = attempt + 1, error = %e, "feed URL failed");
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    fn describe(&self) -> String {
        match self.urls.first() {
            Some(primary) if self.urls.len() > 1 => format!("{primary} (+{} fallback)", self.urls.len() - 1),
            Some(primary) => primary.clone(),
            None => "unconfigured".to_string(),
        }
    }
}

/// `text/csv` or `text/plain`, any parameters (charset) allowed.
pub fn is_csv_content_type(value: &str) -> bool {
    let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    matches!(mime.as_str(), "text/csv" | "text/plain")
}

// ─── ScriptedSource (tests) ───────────────────────────────────────────────────

#[cfg(test)]
pub use scripted::ScriptedSource;
