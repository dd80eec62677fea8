// Proxy module - Pingora ProxyHttp implementation
// Every request is answered from request_filter; nothing is proxied upstream.

pub mod helpers;

use async_trait::async_trait;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;

use crate::pipeline::{ImageService, RequestContext, RequestStage};

/// ResizeProxy implements the Pingora ProxyHttp trait
/// and hands every request to the image service
pub struct ResizeProxy {
    service: Arc<ImageService>,
    correlation_header: String,
}

impl ResizeProxy {
    pub fn new(service: Arc<ImageService>, correlation_header: impl Into<String>) -> Self {
        Self {
            service,
            correlation_header: correlation_header.into(),
        }
    }

    pub fn service(&self) -> &Arc<ImageService> {
        &self.service
    }
}

#[async_trait]
impl ProxyHttp for ResizeProxy {
    type CTX = RequestContext;

    fn new_ctx(&self) -> Self::CTX {
        RequestContext::placeholder()
    }

    /// Never reached: request_filter always answers the request
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "Image requests have no upstream peer",
        ))
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let inbound = helpers::inbound_request(session.req_header(), &self.correlation_header);
        *ctx = RequestContext::new(inbound.method.as_str(), inbound.path())
            .with_correlation_id(inbound.correlation_id.as_str());

        tracing::debug!(
            request_id = %ctx.request_id(),
            correlation_id = %ctx.correlation_id(),
            method = %ctx.method(),
            path = %inbound.path_and_query,
            "Request received"
        );

        let response = self
            .service
            .handle(&inbound, ctx, helpers::client_disconnected(session))
            .await;

        if let Err(e) = helpers::write_response(session, &response).await {
            // Usually the client is already gone
            tracing::debug!(
                request_id = %ctx.request_id(),
                status_code = response.status,
                error = %e,
                "Could not write response"
            );
            return Ok(true);
        }
        ctx.advance(RequestStage::Streamed);

        Ok(true)
    }

    /// Log request completion
    async fn logging(
        &self,
        session: &mut Session,
        _e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status_code = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);
        let streamed = ctx.stage() >= RequestStage::Streamed;
        ctx.advance(RequestStage::Done);

        tracing::info!(
            request_id = %ctx.request_id(),
            correlation_id = %ctx.correlation_id(),
            client_ip = %helpers::get_client_ip(session),
            method = %ctx.method(),
            path = %ctx.path(),
            status_code = status_code,
            streamed = streamed,
            output_format = ctx.output_format().map(|f| f.as_str()).unwrap_or("-"),
            error_kind = ctx.error_kind().unwrap_or("-"),
            duration_ms = ctx.elapsed_ms(),
            "Request completed"
        );
    }
}
