//! Outbound source fetching.
//!
//! The HTTP fetcher reads the origin body chunk by chunk so an oversized
//! source is rejected as soon as it crosses the limit, without buffering it
//! all first.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Url;

use crate::error::ProxyError;

/// Where to fetch a source image from. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    url: Url,
    correlation_id: String,
}

impl SourceRequest {
    pub fn new(url: Url, correlation_id: impl Into<String>) -> Self {
        Self {
            url,
            correlation_id: correlation_id.into(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Correlation identifier from the inbound request; may be empty
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Source body as received from the origin
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub body: Bytes,
    pub status: u16,
    /// Length announced by the origin, when it sent one
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

/// Fetches source bytes for a request
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, request: &SourceRequest) -> Result<FetchedSource, ProxyError>;
}

/// Settings for [`HttpSourceFetcher`]
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    pub timeout: Duration,
    pub max_body_bytes: u64,
    /// Header used to forward the correlation identifier
    pub correlation_header: String,
}

/// Fetches sources over HTTP(S) with a shared connection pool
#[derive(Debug, Clone)]
pub struct HttpSourceFetcher {
    client: reqwest::Client,
    config: HttpFetcherConfig,
}

impl HttpSourceFetcher {
    /// Create a new fetcher
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Config` if the HTTP client cannot be created
    /// (e.g., TLS configuration issues).
    pub fn new(config: HttpFetcherConfig) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProxyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn map_error(&self, error: reqwest::Error) -> ProxyError {
        if error.is_timeout() {
            ProxyError::FetchTimeout(self.config.timeout)
        } else {
            ProxyError::FetchTransport(error.to_string())
        }
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, request: &SourceRequest) -> Result<FetchedSource, ProxyError> {
        let mut outbound = self.client.get(request.url().clone());
        if !request.correlation_id().is_empty() {
            outbound = outbound.header(
                self.config.correlation_header.as_str(),
                request.correlation_id(),
            );
        }

        let mut response = outbound.send().await.map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            // Passed through on purpose: the body fails later at decode time
            tracing::warn!(
                url = %request.url(),
                correlation_id = %request.correlation_id(),
                status = status.as_u16(),
                "Origin returned non-success status"
            );
        }

        let max = self.config.max_body_bytes;
        let content_length = response.content_length();
        if content_length.is_some_and(|len| len > max) {
            return Err(ProxyError::SourceTooLarge { max });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let capacity = content_length.unwrap_or(8192).min(max) as usize;
        let mut body = BytesMut::with_capacity(capacity);
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_error(e))? {
            if (body.len() + chunk.len()) as u64 > max {
                return Err(ProxyError::SourceTooLarge { max });
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(
            url = %request.url(),
            status = status.as_u16(),
            bytes = body.len(),
            "Fetched source"
        );

        Ok(FetchedSource {
            body: body.freeze(),
            status: status.as_u16(),
            content_length,
            content_type,
        })
    }
}
