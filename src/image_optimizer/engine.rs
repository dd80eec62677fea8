//! Transform engine runtime
//!
//! Image work is CPU-bound and must not run on the async executor. The engine
//! owns a dedicated rayon pool sized once at startup; async callers submit a
//! job and await its result over a oneshot channel.
//!
//! Codec panics are caught inside the job. An unhandled panic on a rayon
//! worker aborts the process.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;

use super::encoder::EncoderQuality;
use super::error::ImageError;
use super::params::TransformSpec;
use super::processor::{process_image, ProcessedImage, SourceLimits};

/// Process-wide image engine with a fixed worker budget
pub struct TransformEngine {
    pool: rayon::ThreadPool,
    quality: EncoderQuality,
    limits: SourceLimits,
    running: AtomicBool,
    in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformEngine")
            .field("threads", &self.pool.current_num_threads())
            .field("limits", &self.limits)
            .field("running", &self.is_running())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl TransformEngine {
    /// Start the engine with `threads` workers
    pub fn start(threads: usize, quality: EncoderQuality) -> Result<Self, ImageError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("transform-worker-{}", i))
            .build()
            .map_err(|e| ImageError::resize_failed(format!("engine init failed: {}", e)))?;

        tracing::info!(
            threads = pool.current_num_threads(),
            quality = quality.quality,
            "Transform engine started"
        );

        Ok(Self {
            pool,
            quality,
            limits: SourceLimits::default(),
            running: AtomicBool::new(true),
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn with_source_limits(mut self, limits: SourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn source_limits(&self) -> SourceLimits {
        self.limits
    }

    /// Transform `data` on the engine pool
    ///
    /// `guard` is moved into the job and dropped only when the job finishes,
    /// even if the caller stops waiting. Callers pass their fetch slot here so
    /// that slots account for real engine work.
    pub async fn transform<G>(
        &self,
        data: Bytes,
        spec: TransformSpec,
        accept: Option<String>,
        guard: G,
    ) -> Result<ProcessedImage, ImageError>
    where
        G: Send + 'static,
    {
        if !self.is_running() {
            return Err(ImageError::EngineUnavailable);
        }

        let (tx, rx) = oneshot::channel();
        let quality = self.quality;
        let limits = self.limits;
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        self.pool.spawn(move || {
            let result = run_job(|| process_image(&data, &spec, accept.as_deref(), quality, &limits));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            drop(guard);
            // Receiver is gone when the request was cancelled
            let _ = tx.send(result);
        });

        rx.await.map_err(|_| ImageError::EngineUnavailable)?
    }

    /// Stop accepting new work. Jobs already queued run to completion.
    ///
    /// Worker threads are not joined here; the rayon pool exits when the
    /// engine is dropped.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!(in_flight = self.in_flight(), "Transform engine shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Jobs submitted but not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Run one engine job, turning a codec panic into an error
fn run_job<T>(job: impl FnOnce() -> Result<T, ImageError>) -> Result<T, ImageError> {
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(error = %message, "Transform job panicked");
        Err(ImageError::JobPanicked { message })
    })
}
