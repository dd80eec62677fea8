// Error handling tests
//
// Every pipeline failure surfaces as 503 so clients never receive a partially
// transformed image. Client aborts get their own 499 so monitoring can tell
// them apart from server defects.

use shukusho::error::ProxyError;
use shukusho::image_optimizer::ImageError;
use shukusho::pipeline::ServiceResponse;
use std::time::Duration;

#[test]
fn test_status_mapping_covers_every_variant() {
    let cases = vec![
        (ProxyError::MalformedPath("/x".into()), 503, "malformed_path"),
        (ProxyError::MalformedOptions("crop".into()), 503, "malformed_options"),
        (ProxyError::FetchTransport("dns".into()), 503, "fetch_error"),
        (ProxyError::FetchTimeout(Duration::from_secs(1)), 503, "fetch_timeout"),
        (ProxyError::SourceTooLarge { max: 1 }, 503, "source_too_large"),
        (ProxyError::Image(ImageError::decode_failed("x")), 503, "decode_error"),
        (ProxyError::Image(ImageError::resize_failed("x")), 503, "resize_error"),
        (ProxyError::Image(ImageError::encode_failed("webp", "x")), 503, "encode_error"),
        (ProxyError::Image(ImageError::EngineUnavailable), 503, "engine_unavailable"),
        (
            ProxyError::Image(ImageError::JobPanicked {
                message: "codec".into(),
            }),
            503,
            "engine_panic",
        ),
        (
            ProxyError::Image(ImageError::DimensionsExceeded {
                width: 20000,
                height: 1,
                max_width: 10000,
                max_height: 10000,
                max_pixels: 100_000_000,
            }),
            503,
            "source_dimensions_exceeded",
        ),
        (ProxyError::Cancelled, 499, "request_cancelled"),
        (ProxyError::MethodNotAllowed("PUT".into()), 405, "method_not_allowed"),
        (ProxyError::ShuttingDown, 503, "shutting_down"),
        (ProxyError::Config("bad".into()), 503, "config_error"),
    ];

    for (error, status, kind) in cases {
        assert_eq!(error.to_http_status(), status, "status for {}", error);
        assert_eq!(error.kind(), kind, "kind for {}", error);
    }
}

#[test]
fn test_error_body_is_json_with_status() {
    let error = ProxyError::SourceTooLarge { max: 2048 };
    let response = ServiceResponse::error(&error);

    let parsed: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(parsed["error"], "source_too_large");
    assert_eq!(parsed["message"], "Source exceeds maximum size of 2048 bytes");
    assert_eq!(parsed["status"], 503);
}

#[test]
fn test_cancelled_response_is_499() {
    let response = ServiceResponse::error(&ProxyError::Cancelled);
    assert_eq!(response.status, 499);
    assert_eq!(response.header("Allow"), None);
}

#[test]
fn test_encode_error_names_format() {
    let error: ProxyError = ImageError::encode_failed("webp", "encoder returned no data").into();
    assert!(error.to_string().contains("webp"));
}
