/// Page fetching and content fingerprinting.
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt;

/// Lowercase hex SHA-256 digest of a page body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[allow(dead_code)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash the decoded body text.
pub fn fingerprint(body: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Source of page fingerprints.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fingerprint, FetchError>;
}

/// Fetches pages over HTTP with a shared client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_body(&self, url: &str) -> Result<String, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let resp = self.client.get(url).send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(transport)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fingerprint, FetchError> {
        match self.get_body(url).await {
            Ok(body) => {
                let fp = fingerprint(&body);
                tracing::debug!(url, bytes = body.len(), fingerprint = %fp, "page fetched");
                Ok(fp)
            }
            Err(e) => {
                tracing::warn!(error = %e, "error fetching page");
                Err(e)
            }
        }
    }
}

/// HTTP client shared by the fetcher and notifier.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("pagewatch/", env!("CARGO_PKG_VERSION")))
        .build()
}
