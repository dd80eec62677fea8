//! Transport-neutral request and response values.
//!
//! The orchestrator returns a [`ServiceResponse`] instead of writing to the
//! session directly. The proxy layer owns the writing, which keeps the whole
//! pipeline testable without a listening socket.

use bytes::Bytes;

use crate::error::ProxyError;
use crate::image_optimizer::{vary_header, ProcessedImage};

/// What the pipeline needs to know about an inbound request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: String,
    pub path_and_query: String,
    pub accept: Option<String>,
    pub forwarded_proto: Option<String>,
    pub forwarded_host: Option<String>,
    /// Value of the correlation header; empty when the client sent none
    pub correlation_id: String,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, path_and_query: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path_and_query: path_and_query.into(),
            ..Default::default()
        }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_forwarded(mut self, proto: impl Into<String>, host: impl Into<String>) -> Self {
        self.forwarded_proto = Some(proto.into());
        self.forwarded_host = Some(host.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Path without the query string
    pub fn path(&self) -> &str {
        match self.path_and_query.split_once('?') {
            Some((path, _)) => path,
            None => &self.path_and_query,
        }
    }

    pub fn is_head(&self) -> bool {
        self.method.eq_ignore_ascii_case("HEAD")
    }
}

/// Fully decided response: status, headers and body are all known before
/// anything is written to the client.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
    /// HEAD: headers (Content-Length included) are sent, the body is not
    pub omit_body: bool,
}

impl ServiceResponse {
    fn with_body(status: u16, content_type: Option<&str>, body: Bytes) -> Self {
        let mut headers = Vec::with_capacity(3);
        if let Some(content_type) = content_type {
            headers.push(("Content-Type", content_type.to_string()));
        }
        headers.push(("Content-Length", body.len().to_string()));
        Self {
            status,
            headers,
            body,
            omit_body: false,
        }
    }

    /// Status with an empty body (health checks)
    pub fn empty(status: u16) -> Self {
        Self::with_body(status, None, Bytes::new())
    }

    /// Transformed image with its negotiated Content-Type
    pub fn image(image: ProcessedImage) -> Self {
        let mut response = Self::with_body(
            200,
            Some(image.format.content_type()),
            Bytes::from(image.data),
        );
        if image.vary_accept {
            response.headers.push(("Vary", vary_header().to_string()));
        }
        response
    }

    /// JSON error body for a failed request
    pub fn error(error: &ProxyError) -> Self {
        let status = error.to_http_status();
        let body = serde_json::json!({
            "error": error.kind(),
            "message": error.to_string(),
            "status": status
        })
        .to_string();

        let mut response = Self::with_body(status, Some("application/json"), Bytes::from(body));
        if matches!(error, ProxyError::MethodNotAllowed(_)) {
            response.headers.push(("Allow", "GET, HEAD".to_string()));
        }
        response
    }

    pub fn without_body(mut self) -> Self {
        self.omit_body = true;
        self
    }

    /// First header value with this name, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Bytes that will actually go on the wire
    pub fn body_to_send(&self) -> Option<&Bytes> {
        if self.omit_body || self.body.is_empty() {
            None
        } else {
            Some(&self.body)
        }
    }
}
