//! Proxy utility functions.
//!
//! Translation between the Pingora session and the transport-neutral
//! pipeline types:
//! - Inbound request extraction from the request header
//! - Client disconnect detection
//! - Chunked response writing
//! - Client IP detection (X-Forwarded-For aware)

use bytes::Bytes;
use pingora_core::{ErrorType, Result};
use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::Session;

use crate::constants::STREAM_CHUNK_SIZE;
use crate::pipeline::{InboundRequest, ServiceResponse};

fn header_value(req: &RequestHeader, name: &str) -> Option<String> {
    req.headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Extract what the pipeline needs from the request header.
///
/// Headers with non-UTF8 values are treated as absent.
pub fn inbound_request(req: &RequestHeader, correlation_header: &str) -> InboundRequest {
    let path_and_query = req
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri.path().to_string());

    InboundRequest {
        method: req.method.as_str().to_string(),
        path_and_query,
        accept: header_value(req, "accept"),
        forwarded_proto: header_value(req, "x-forwarded-proto"),
        forwarded_host: header_value(req, "x-forwarded-host"),
        correlation_id: header_value(req, correlation_header).unwrap_or_default(),
    }
}

/// Resolves once the client has gone away.
///
/// Never resolves for a connection that stays open. Read errors other than a
/// closed connection are not treated as a disconnect.
pub async fn client_disconnected(session: &mut Session) {
    loop {
        match session.read_body_or_idle(true).await {
            Ok(Some(_)) => continue,
            Ok(None) => std::future::pending::<()>().await,
            Err(e) if matches!(e.etype(), ErrorType::ConnectionClosed | ErrorType::ReadError) => {
                return
            }
            Err(_) => std::future::pending::<()>().await,
        }
    }
}

/// Build the Pingora response header for a decided response
pub fn response_header(response: &ServiceResponse) -> Result<ResponseHeader> {
    let mut header = ResponseHeader::build(response.status, Some(response.headers.len()))?;
    for (name, value) in &response.headers {
        header.insert_header(*name, value.as_str())?;
    }
    Ok(header)
}

/// Split a body into the chunks it is streamed in
pub fn body_chunks(body: &Bytes, chunk_size: usize) -> impl Iterator<Item = Bytes> + '_ {
    let chunk_size = chunk_size.max(1);
    (0..body.len())
        .step_by(chunk_size)
        .map(move |start| body.slice(start..(start + chunk_size).min(body.len())))
}

/// Write a decided response to the client.
///
/// Errors writing the header are returned. Once the header is out, the
/// status can no longer change, so body write failures are logged only.
pub async fn write_response(session: &mut Session, response: &ServiceResponse) -> Result<()> {
    let header = response_header(response)?;

    let Some(body) = response.body_to_send() else {
        return session.write_response_header(Box::new(header), true).await;
    };

    session.write_response_header(Box::new(header), false).await?;

    let total = body.len();
    let mut sent = 0;
    for chunk in body_chunks(body, STREAM_CHUNK_SIZE) {
        sent += chunk.len();
        if let Err(e) = session.write_response_body(Some(chunk), sent == total).await {
            tracing::warn!(
                status_code = response.status,
                bytes_sent = sent,
                bytes_total = total,
                error = %e,
                "Response body write failed mid-stream"
            );
            break;
        }
    }
    Ok(())
}

/// Extract client IP address from session (X-Forwarded-For aware).
///
/// The header can contain multiple IPs: `"client, proxy1, proxy2"`.
/// The first IP is the original client, which is what we return.
pub fn get_client_ip(session: &Session) -> String {
    if let Some(forwarded_for) = session
        .req_header()
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(client_ip) = forwarded_for.split(',').next() {
            return client_ip.trim().to_string();
        }
    }

    session
        .client_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
