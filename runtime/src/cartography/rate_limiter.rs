//! Fetch politeness for audit runs: a concurrency cap plus a minimum gap
//! between request starts.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Limits in-flight fetches and spaces out their start times.
#[derive(Debug)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    min_delay: Duration,
    last_request: tokio::sync::Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `max_concurrent` is clamped to at least one permit.
    pub fn new(max_concurrent: usize, min_delay: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            min_delay,
            last_request: tokio::sync::Mutex::new(None),
        }
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a free slot and for the minimum gap since the previous start.
    ///
    /// Returns `None` once `cancel` fires, whether still queued for a slot
    /// or waiting out the gap.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<RateLimitGuard> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            guard = self.acquire_inner() => guard,
        }
    }

    async fn acquire_inner(&self) -> Option<RateLimitGuard> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;

        if !self.min_delay.is_zero() {
            let mut last = self.last_request.lock().await;
            if let Some(prev) = *last {
                let elapsed = prev.elapsed();
                if elapsed < self.min_delay {
                    tokio::time::sleep(self.min_delay - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        Some(RateLimitGuard { _permit: permit })
    }
}

/// Releases the slot when dropped.
#[derive(Debug)]
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
}
