// End-to-end pipeline tests: request in, decided response out

use super::test_harness::*;
use bytes::Bytes;
use shukusho::pipeline::{InboundRequest, RequestStage};
use std::sync::Arc;

const PNG_URL: &str = "http://origin.test/a.png";
const JPEG_URL: &str = "http://origin.test/photo.jpg";

fn fetcher() -> StaticFetcher {
    StaticFetcher::new()
        .with_source(PNG_URL, png(40, 20))
        .with_source(JPEG_URL, jpeg(40, 20))
        .with_source("http://origin.test/broken.jpg", Bytes::from_static(b"<html>404</html>"))
        .with_source("https://cdn.test/images/wide.png", png(100, 50))
}

#[tokio::test]
async fn test_png_source_without_webp_stays_png() {
    let service = build_service(Arc::new(fetcher()), 4);
    let request = InboundRequest::new("GET", format!("/w=10/{}", PNG_URL)).with_accept("text/html");

    let (response, ctx) = run(&service, request).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("image/png"));
    assert_eq!(response.header("Vary"), None);
    assert_eq!(
        response.header("Content-Length"),
        Some(response.body.len().to_string().as_str())
    );
    assert_eq!(dimensions(&response.body), (10, 5));
    assert_eq!(ctx.stage(), RequestStage::Negotiated);
    assert!(!ctx.is_failed());
}

#[tokio::test]
async fn test_webp_accept_wins_and_sets_vary() {
    let service = build_service(Arc::new(fetcher()), 4);
    let request =
        InboundRequest::new("GET", format!("/w=10/{}", JPEG_URL)).with_accept("image/webp,*/*");

    let (response, _) = run(&service, request).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("image/webp"));
    assert_eq!(response.header("Vary"), Some("Accept"));
    assert_eq!(&response.body[0..4], b"RIFF");
    assert_eq!(&response.body[8..12], b"WEBP");
}

#[tokio::test]
async fn test_jpeg_is_default_output() {
    let service = build_service(Arc::new(fetcher()), 4);
    let request = InboundRequest::new("GET", format!("/h=10/{}", JPEG_URL));

    let (response, _) = run(&service, request).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("image/jpeg"));
    assert_eq!(&response.body[0..2], &[0xFF, 0xD8]);
    assert_eq!(dimensions(&response.body), (20, 10));
}

#[tokio::test]
async fn test_never_upscales() {
    let service = build_service(Arc::new(fetcher()), 4);
    let request = InboundRequest::new("GET", format!("/w=400,h=400/{}", PNG_URL));

    let (response, _) = run(&service, request).await;

    assert_eq!(response.status, 200);
    assert_eq!(dimensions(&response.body), (40, 20));
}

#[tokio::test]
async fn test_crop_fills_box() {
    let service = build_service(Arc::new(fetcher()), 4);
    let request = InboundRequest::new("GET", "/w=20,h=20,fit=crop/images/wide.png")
        .with_forwarded("https", "cdn.test");

    let (response, _) = run(&service, request).await;

    assert_eq!(response.status, 200);
    assert_eq!(dimensions(&response.body), (20, 20));
}

#[tokio::test]
async fn test_relative_locator_uses_forwarded_origin_and_correlation() {
    let fetcher = Arc::new(fetcher());
    let service = build_service(fetcher.clone(), 4);
    let request = InboundRequest::new("GET", "/w=50/images/wide.png")
        .with_forwarded("https", "cdn.test")
        .with_correlation_id("edge-42");

    let (response, ctx) = run(&service, request).await;

    assert_eq!(response.status, 200);
    let seen = fetcher.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].url().as_str(), "https://cdn.test/images/wide.png");
    assert_eq!(seen[0].correlation_id(), "edge-42");
    assert_eq!(ctx.correlation_id(), "edge-42");
}

#[tokio::test]
async fn test_head_sets_length_without_body() {
    let service = build_service(Arc::new(fetcher()), 4);
    let path = format!("/w=10/{}", PNG_URL);

    let (get, _) = run(&service, InboundRequest::new("GET", path.as_str())).await;
    let (head, _) = run(&service, InboundRequest::new("HEAD", path.as_str())).await;

    assert_eq!(head.status, 200);
    assert!(head.omit_body);
    assert!(head.body_to_send().is_none());
    assert_eq!(head.header("Content-Length"), get.header("Content-Length"));
    assert_eq!(head.header("Content-Type"), Some("image/png"));
}

#[tokio::test]
async fn test_post_is_rejected_before_fetch() {
    let fetcher = Arc::new(fetcher());
    let service = build_service(fetcher.clone(), 4);

    let (response, ctx) = run(&service, InboundRequest::new("POST", format!("/w=10/{}", PNG_URL))).await;

    assert_eq!(response.status, 405);
    assert_eq!(response.header("Allow"), Some("GET, HEAD"));
    assert_eq!(error_kind(&response), "method_not_allowed");
    assert_eq!(ctx.stage(), RequestStage::Received);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_malformed_path_is_503() {
    let fetcher = Arc::new(fetcher());
    let service = build_service(fetcher.clone(), 4);

    let (response, ctx) = run(&service, InboundRequest::new("GET", "/w=10")).await;

    assert_eq!(response.status, 503);
    assert_eq!(response.header("Content-Type"), Some("application/json"));
    assert_eq!(error_kind(&response), "malformed_path");
    assert_eq!(ctx.error_kind(), Some("malformed_path"));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_malformed_options_is_503() {
    let service = build_service(Arc::new(fetcher()), 4);

    let (response, _) = run(&service, InboundRequest::new("GET", format!("/crop/{}", PNG_URL))).await;

    assert_eq!(response.status, 503);
    assert_eq!(error_kind(&response), "malformed_options");
}

#[tokio::test]
async fn test_undecodable_source_is_503() {
    let service = build_service(Arc::new(fetcher()), 4);

    let (response, ctx) = run(
        &service,
        InboundRequest::new("GET", "/w=10/http://origin.test/broken.jpg"),
    )
    .await;

    assert_eq!(response.status, 503);
    assert_eq!(error_kind(&response), "decode_error");
    assert_eq!(ctx.stage(), RequestStage::Fetched);
    assert_eq!(service.gate().in_use(), 0);
}

#[tokio::test]
async fn test_fetch_failure_is_503_and_releases_slot() {
    let service = build_service(Arc::new(fetcher()), 1);

    let (response, ctx) = run(
        &service,
        InboundRequest::new("GET", "/w=10/http://origin.test/missing.png"),
    )
    .await;

    assert_eq!(response.status, 503);
    assert_eq!(error_kind(&response), "fetch_error");
    assert_eq!(ctx.stage(), RequestStage::SlotAcquired);
    assert_eq!(service.gate().available(), 1);
}

#[tokio::test]
async fn test_head_error_keeps_content_length() {
    let service = build_service(Arc::new(fetcher()), 4);

    let (response, _) = run(&service, InboundRequest::new("HEAD", "/w=10")).await;

    assert_eq!(response.status, 503);
    assert!(response.body_to_send().is_none());
    assert_eq!(
        response.header("Content-Length"),
        Some(response.body.len().to_string().as_str())
    );
}

#[tokio::test]
async fn test_requests_after_shutdown_are_rejected() {
    let service = build_service(Arc::new(fetcher()), 2);
    assert!(service.shutdown(std::time::Duration::from_secs(1)).await);

    let (response, _) = run(&service, InboundRequest::new("GET", format!("/w=10/{}", PNG_URL))).await;

    assert_eq!(response.status, 503);
    assert_eq!(error_kind(&response), "shutting_down");
}
