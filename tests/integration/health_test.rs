// Health check and favicon short-circuit
//
// These paths are answered before any parsing and must never reach the
// fetcher.

use super::test_harness::*;
use async_trait::async_trait;
use mockall::mock;
use rstest::rstest;
use shukusho::error::ProxyError;
use shukusho::fetch::{FetchedSource, SourceFetcher, SourceRequest};
use shukusho::pipeline::{InboundRequest, RequestStage};
use std::sync::Arc;

mock! {
    pub Fetcher {}

    #[async_trait]
    impl SourceFetcher for Fetcher {
        async fn fetch(&self, request: &SourceRequest) -> Result<FetchedSource, ProxyError>;
    }
}

fn untouchable_fetcher() -> Arc<MockFetcher> {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch().never();
    Arc::new(fetcher)
}

#[rstest]
#[case("GET", "/healthz")]
#[case("HEAD", "/healthz")]
#[case("GET", "/healthcheck")]
#[case("GET", "/favicon.ico")]
#[case("HEAD", "/favicon.ico")]
#[case("GET", "/healthz?probe=1")]
#[tokio::test]
async fn test_health_paths_short_circuit(#[case] method: &str, #[case] path: &str) {
    let service = build_service(untouchable_fetcher(), 2);

    let (response, ctx) = run(&service, InboundRequest::new(method, path)).await;

    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());
    assert_eq!(response.header("Content-Length"), Some("0"));
    assert_eq!(ctx.stage(), RequestStage::HealthShortCircuit);
    assert_eq!(service.gate().available(), 2);
}

#[tokio::test]
async fn test_health_check_requires_get_or_head() {
    let service = build_service(untouchable_fetcher(), 1);

    let (response, _) = run(&service, InboundRequest::new("DELETE", "/healthz")).await;

    assert_eq!(response.status, 405);
}

#[tokio::test]
async fn test_health_check_answers_after_shutdown() {
    let service = build_service(untouchable_fetcher(), 1);
    service.shutdown(std::time::Duration::from_millis(100)).await;

    let (response, _) = run(&service, InboundRequest::new("GET", "/healthz")).await;

    assert_eq!(response.status, 200);
}
