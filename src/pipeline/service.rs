//! Service orchestrator: runs one request through the whole pipeline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::error::ProxyError;
use crate::fetch::{FetchGate, HttpFetcherConfig, HttpSourceFetcher, SourceFetcher};
use crate::image_optimizer::{build_transform_spec, ProcessedImage, ResizeDefaults, TransformEngine};
use crate::router::{Forwarded, Router};

use super::{InboundRequest, RequestContext, RequestStage, ServiceResponse};

const HEALTH_PATHS: [&str; 3] = ["/healthz", "/healthcheck", "/favicon.ico"];

/// Paths answered with an empty 200 before any parsing
pub fn is_health_check(path: &str) -> bool {
    HEALTH_PATHS.contains(&path)
}

/// Process-wide image service
///
/// Owns the fetch gate and the transform engine; both live from startup to
/// [`ImageService::shutdown`].
pub struct ImageService {
    router: Router,
    defaults: ResizeDefaults,
    gate: FetchGate,
    fetcher: Arc<dyn SourceFetcher>,
    engine: TransformEngine,
    request_timeout: Duration,
}

impl ImageService {
    pub fn new(
        router: Router,
        defaults: ResizeDefaults,
        gate: FetchGate,
        fetcher: Arc<dyn SourceFetcher>,
        engine: TransformEngine,
    ) -> Self {
        Self {
            router,
            defaults,
            gate,
            fetcher,
            engine,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Requests still running after `timeout` are cancelled (499)
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the service from configuration: HTTP fetcher, gate and engine
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the engine pool cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, ProxyError> {
        let fetcher = HttpSourceFetcher::new(HttpFetcherConfig {
            timeout: Duration::from_secs(config.fetch.timeout),
            max_body_bytes: config.fetch.max_source_bytes,
            correlation_header: config.fetch.correlation_header.clone(),
        })?;
        let engine =
            TransformEngine::start(config.image.engine_threads, config.image.encoder_quality())?
                .with_source_limits(config.image.source_limits());

        Ok(Self::new(
            Router::new(config.fetch.upstream_base_url.clone()),
            config.image.resize_defaults(),
            FetchGate::new(config.fetch.slots),
            Arc::new(fetcher),
            engine,
        )
        .with_request_timeout(Duration::from_secs(config.server.request_timeout)))
    }

    pub fn gate(&self) -> &FetchGate {
        &self.gate
    }

    pub fn engine(&self) -> &TransformEngine {
        &self.engine
    }

    /// Handle one request
    ///
    /// `cancelled` resolves when the client goes away. Whichever comes first
    /// of that, the request timeout, or the pipeline finishing decides the
    /// response. Dropping the pipeline future returns the fetch slot unless
    /// the engine already holds it, in which case the engine returns it when
    /// its job ends.
    pub async fn handle<C>(
        &self,
        request: &InboundRequest,
        ctx: &mut RequestContext,
        cancelled: C,
    ) -> ServiceResponse
    where
        C: Future<Output = ()>,
    {
        if !matches!(request.method.as_str(), "GET" | "HEAD") {
            return self.failed(ctx, ProxyError::MethodNotAllowed(request.method.clone()), false);
        }
        ctx.advance(RequestStage::MethodChecked);

        if is_health_check(request.path()) {
            ctx.advance(RequestStage::HealthShortCircuit);
            return finish(ServiceResponse::empty(200), request.is_head());
        }

        let timeout = self.request_timeout;
        let outcome = tokio::select! {
            result = tokio::time::timeout(timeout, self.run(request, ctx)) => {
                result.unwrap_or_else(|_| {
                    tracing::debug!(timeout_secs = timeout.as_secs(), "Request deadline exceeded");
                    Err(ProxyError::Cancelled)
                })
            }
            _ = cancelled => Err(ProxyError::Cancelled),
        };

        match outcome {
            Ok(image) => {
                ctx.set_output_format(image.format);
                ctx.advance(RequestStage::Negotiated);
                finish(ServiceResponse::image(image), request.is_head())
            }
            Err(e) => self.failed(ctx, e, request.is_head()),
        }
    }

    async fn run(
        &self,
        request: &InboundRequest,
        ctx: &mut RequestContext,
    ) -> Result<ProcessedImage, ProxyError> {
        let forwarded = Forwarded {
            proto: request.forwarded_proto.as_deref().unwrap_or_default(),
            host: request.forwarded_host.as_deref().unwrap_or_default(),
        };
        let (options, source) =
            self.router
                .resolve(&request.path_and_query, forwarded, &request.correlation_id)?;
        ctx.advance(RequestStage::Parsed);
        let spec = build_transform_spec(&options, &self.defaults);
        ctx.advance(RequestStage::Resolved);

        tracing::debug!(
            request_id = %ctx.request_id(),
            source = %source.url(),
            width = ?spec.width,
            height = ?spec.height,
            fit = ?spec.fit,
            "Resolved transform"
        );

        let slot = self.gate.acquire().await?;
        ctx.advance(RequestStage::SlotAcquired);

        let fetched = self.fetcher.fetch(&source).await?;
        ctx.advance(RequestStage::Fetched);

        // The slot rides along into the engine job and is freed when it ends
        let image = self
            .engine
            .transform(fetched.body, spec, request.accept.clone(), slot)
            .await?;
        ctx.advance(RequestStage::Transformed);

        Ok(image)
    }

    fn failed(&self, ctx: &mut RequestContext, error: ProxyError, head: bool) -> ServiceResponse {
        ctx.fail(error.kind());
        let response = ServiceResponse::error(&error);

        tracing::warn!(
            request_id = %ctx.request_id(),
            correlation_id = %ctx.correlation_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            stage = %ctx.stage(),
            error_kind = error.kind(),
            error = %error,
            status_code = response.status,
            duration_ms = ctx.elapsed_ms(),
            "Request failed"
        );

        finish(response, head)
    }

    /// Wait for in-flight work, then stop taking new work
    ///
    /// Returns `false` if in-flight work did not finish within `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let drained = self.gate.drain(timeout).await;
        self.engine.shutdown();
        drained
    }
}

impl std::fmt::Debug for ImageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageService")
            .field("router", &self.router)
            .field("defaults", &self.defaults)
            .field("gate", &self.gate)
            .field("engine", &self.engine)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn finish(response: ServiceResponse, head: bool) -> ServiceResponse {
    if head {
        response.without_body()
    } else {
        response
    }
}
