//! Bounded admission for fetch + transform work.
//!
//! A [`FetchGate`] hands out a fixed number of [`FetchSlot`]s. A slot is held
//! from before the outbound fetch until the engine finishes with the image,
//! and is returned when dropped, on every exit path.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ProxyError;

/// Counting gate over concurrent fetch/transform operations
#[derive(Debug)]
pub struct FetchGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One unit of admission. Released on drop.
#[derive(Debug)]
pub struct FetchSlot {
    _permit: OwnedSemaphorePermit,
}

impl FetchGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot
    ///
    /// Suspends only the calling task. Dropping the returned future while it
    /// waits leaves the pool untouched.
    pub async fn acquire(&self) -> Result<FetchSlot, ProxyError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ProxyError::ShuttingDown)?;
        Ok(FetchSlot { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held by requests
    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Wait for every held slot to come back, then close the gate
    ///
    /// After closing, pending and future `acquire` calls fail with
    /// [`ProxyError::ShuttingDown`]. Returns `false` if the wait hit `timeout`;
    /// the gate is closed either way.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let all = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        // Hold the permits until the gate is closed so nobody slips in between
        let acquired = tokio::time::timeout(timeout, self.semaphore.acquire_many(all)).await;
        self.semaphore.close();
        let drained = matches!(acquired, Ok(Ok(_)));

        if drained {
            tracing::info!(capacity = self.capacity, "Fetch slots drained");
        } else {
            tracing::warn!(
                in_use = self.in_use(),
                timeout_secs = timeout.as_secs(),
                "Fetch slots not drained before timeout"
            );
        }
        drained
    }
}
