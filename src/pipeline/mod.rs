// Request pipeline module - per-request context and the service orchestrator
//
// The orchestrator in `service` knows nothing about Pingora. The proxy layer
// turns a session into an `InboundRequest`, runs `ImageService::handle`, and
// writes the returned `ServiceResponse`.

mod response;
mod service;

pub use response::{InboundRequest, ServiceResponse};
pub use service::{is_health_check, ImageService};

use std::fmt;
use std::time::Instant;
use uuid::Uuid;

use crate::image_optimizer::OutputFormat;

/// Where a request is in the pipeline
///
/// Stages only move forward. A failed request keeps the last stage it
/// completed, which is what failure logs report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RequestStage {
    Received,
    MethodChecked,
    HealthShortCircuit,
    Parsed,
    Resolved,
    SlotAcquired,
    Fetched,
    Transformed,
    Negotiated,
    Streamed,
    Done,
}

impl RequestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStage::Received => "received",
            RequestStage::MethodChecked => "method_checked",
            RequestStage::HealthShortCircuit => "health_short_circuit",
            RequestStage::Parsed => "parsed",
            RequestStage::Resolved => "resolved",
            RequestStage::SlotAcquired => "slot_acquired",
            RequestStage::Fetched => "fetched",
            RequestStage::Transformed => "transformed",
            RequestStage::Negotiated => "negotiated",
            RequestStage::Streamed => "streamed",
            RequestStage::Done => "done",
        }
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request context that holds everything known about one request
/// as it flows through the pipeline
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    correlation_id: String,
    started: Instant,
    stage: RequestStage,
    error_kind: Option<&'static str>,
    output_format: Option<OutputFormat>,
}

impl RequestContext {
    /// Create a new RequestContext
    /// Automatically generates a unique request ID (UUID v4) and starts the clock
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method: method.into(),
            path: path.into(),
            correlation_id: String::new(),
            started: Instant::now(),
            stage: RequestStage::Received,
            error_kind: None,
            output_format: None,
        }
    }

    /// Empty context for Pingora's `new_ctx`, replaced once the request
    /// header is read. Does not allocate a request ID.
    pub fn placeholder() -> Self {
        Self {
            request_id: String::new(),
            method: String::new(),
            path: String::new(),
            correlation_id: String::new(),
            started: Instant::now(),
            stage: RequestStage::Received,
            error_kind: None,
            output_format: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Get the unique request ID
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Correlation identifier sent by the client; empty when absent
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn stage(&self) -> RequestStage {
        self.stage
    }

    /// Move to `stage`. Moving backwards is ignored.
    pub fn advance(&mut self, stage: RequestStage) {
        if stage > self.stage {
            self.stage = stage;
        }
    }

    /// Record the failure kind; the stage stays where it was
    pub fn fail(&mut self, kind: &'static str) {
        self.error_kind = Some(kind);
    }

    pub fn error_kind(&self) -> Option<&'static str> {
        self.error_kind
    }

    pub fn is_failed(&self) -> bool {
        self.error_kind.is_some()
    }

    pub fn set_output_format(&mut self, format: OutputFormat) {
        self.output_format = Some(format);
    }

    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output_format
    }

    /// Milliseconds since the request was received
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
