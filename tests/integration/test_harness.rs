// Test harness for integration tests
// Builds an in-process image service with controllable fetchers, and a tiny
// local HTTP origin for exercising the real fetcher.

use async_trait::async_trait;
use bytes::Bytes;
use shukusho::error::ProxyError;
use shukusho::fetch::{FetchGate, FetchedSource, SourceFetcher, SourceRequest};
use shukusho::image_optimizer::{EncoderQuality, ResizeDefaults, TransformEngine};
use shukusho::pipeline::{ImageService, InboundRequest, RequestContext, ServiceResponse};
use shukusho::router::Router;
use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub const DEFAULTS: ResizeDefaults = ResizeDefaults {
    max_width: 3840,
    max_height: 2160,
};

/// Encode a solid-colour image of the given size
pub fn encoded_image(width: u32, height: u32, format: image::ImageFormat) -> Bytes {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 100, 50, 255]));
    let img = match format {
        image::ImageFormat::Jpeg => image::DynamicImage::ImageRgb8(
            image::DynamicImage::ImageRgba8(img).to_rgb8(),
        ),
        _ => image::DynamicImage::ImageRgba8(img),
    };
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).unwrap();
    Bytes::from(buffer.into_inner())
}

pub fn png(width: u32, height: u32) -> Bytes {
    encoded_image(width, height, image::ImageFormat::Png)
}

pub fn jpeg(width: u32, height: u32) -> Bytes {
    encoded_image(width, height, image::ImageFormat::Jpeg)
}

/// Dimensions of an encoded response body
pub fn dimensions(body: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(body).unwrap();
    (img.width(), img.height())
}

pub fn build_service(fetcher: Arc<dyn SourceFetcher>, slots: usize) -> ImageService {
    ImageService::new(
        Router::new(None),
        DEFAULTS,
        FetchGate::new(slots),
        fetcher,
        TransformEngine::start(2, EncoderQuality::default()).unwrap(),
    )
}

/// Run one request to completion with a client that never disconnects
pub async fn run(service: &ImageService, request: InboundRequest) -> (ServiceResponse, RequestContext) {
    let mut ctx = RequestContext::new(request.method.as_str(), request.path())
        .with_correlation_id(request.correlation_id.as_str());
    let response = service
        .handle(&request, &mut ctx, std::future::pending::<()>())
        .await;
    (response, ctx)
}

pub fn error_kind(response: &ServiceResponse) -> String {
    let parsed: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    parsed["error"].as_str().unwrap_or_default().to_string()
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory origin keyed by URL, with an optional per-fetch delay
#[derive(Default)]
pub struct StaticFetcher {
    sources: HashMap<String, Bytes>,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    seen: Mutex<Vec<SourceRequest>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, url: &str, body: Bytes) -> Self {
        self.sources.insert(url.to_string(), body);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches seen running at once
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SourceRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for StaticFetcher {
    async fn fetch(&self, request: &SourceRequest) -> Result<FetchedSource, ProxyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _active = ActiveGuard(&self.active);
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.sources.get(request.url().as_str()) {
            Some(body) => Ok(FetchedSource {
                body: body.clone(),
                status: 200,
                content_length: Some(body.len() as u64),
                content_type: None,
            }),
            None => Err(ProxyError::FetchTransport(format!(
                "connection refused: {}",
                request.url()
            ))),
        }
    }
}

/// Fetcher that parks every call until released
pub struct BlockingFetcher {
    body: Bytes,
    release: Notify,
    started: AtomicUsize,
}

impl BlockingFetcher {
    pub fn new(body: Bytes) -> Self {
        Self {
            body,
            release: Notify::new(),
            started: AtomicUsize::new(0),
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Let every parked fetch finish
    pub fn release_all(&self) {
        self.release.notify_waiters();
    }

    pub async fn wait_started(&self, n: usize) {
        while self.started() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl SourceFetcher for BlockingFetcher {
    async fn fetch(&self, _request: &SourceRequest) -> Result<FetchedSource, ProxyError> {
        let released = self.release.notified();
        self.started.fetch_add(1, Ordering::SeqCst);
        released.await;
        Ok(FetchedSource {
            body: self.body.clone(),
            status: 200,
            content_length: Some(self.body.len() as u64),
            content_type: None,
        })
    }
}

/// Minimal HTTP/1.1 origin answering every request with one fixed response
pub struct TestOrigin {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestOrigin {
    pub async fn start(status: u16, content_type: &str, body: Bytes) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        let content_type = content_type.to_string();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let seen = Arc::clone(&seen);
                let content_type = content_type.clone();
                let body = body.clone();
                tokio::spawn(async move {
                    let head = read_request_head(&mut socket).await;
                    seen.lock().unwrap().push(head);
                    let header = format!(
                        "HTTP/1.1 {} Test\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        status,
                        content_type,
                        body.len()
                    );
                    let _ = socket.write_all(header.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    /// Origin that accepts connections but never answers
    pub async fn silent() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        Self {
            addr,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    /// Raw request heads received so far, lowercased
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buffer).to_lowercase()
}
