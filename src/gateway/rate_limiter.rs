//! Per-provider admission control
//!
//! Each provider family gets a counting semaphore. Callers acquire a permit
//! before any model call; the permit is released when dropped, so cancelled
//! callers never leak capacity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use super::provider::ModelError;
use crate::models::job::ProviderKind;

/// A held provider slot; dropping it releases the slot
#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: OwnedSemaphorePermit,
}

#[derive(Clone)]
pub struct RateLimiter {
    permits_per_provider: usize,
    acquire_timeout: Duration,
    semaphores: Arc<Mutex<HashMap<ProviderKind, Arc<Semaphore>>>>,
}

impl RateLimiter {
    pub fn new(permits_per_provider: usize, acquire_timeout: Duration) -> Self {
        Self {
            permits_per_provider: permits_per_provider.max(1),
            acquire_timeout,
            semaphores: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn semaphore_for(&self, provider: ProviderKind) -> Arc<Semaphore> {
        let mut map = self
            .semaphores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(provider)
            .or_insert_with(|| Arc::new(Semaphore::new(self.permits_per_provider)))
            .clone()
    }

    /// Wait for a slot on the given provider
    ///
    /// Admission is FIFO (tokio semaphores queue waiters in order). Waiting
    /// longer than the configured timeout yields `RateLimitTimeout`.
    pub async fn acquire(&self, provider: ProviderKind) -> Result<RateLimitPermit, ModelError> {
        let semaphore = self.semaphore_for(provider);
        let acquired = tokio::time::timeout(self.acquire_timeout, semaphore.acquire_owned()).await;
        match acquired {
            Ok(Ok(permit)) => {
                debug!("acquired {} slot", provider);
                Ok(RateLimitPermit { _permit: permit })
            }
            Ok(Err(_)) => Err(ModelError::Transport {
                provider,
                message: "rate limiter closed".to_string(),
            }),
            Err(_) => Err(ModelError::RateLimitTimeout {
                provider,
                waited: self.acquire_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrency_never_exceeds_permit_count() {
        let limiter = RateLimiter::new(2, Duration::from_secs(5));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            let in_flight = in_flight.clone();
            let high_water = high_water.clone();
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire(ProviderKind::OpenAi).await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                high_water.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(high_water.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn exhausted_limiter_times_out() {
        let limiter = RateLimiter::new(1, Duration::from_millis(30));
        let held = limiter.acquire(ProviderKind::Anthropic).await.unwrap();
        let err = limiter.acquire(ProviderKind::Anthropic).await.unwrap_err();
        assert!(matches!(err, ModelError::RateLimitTimeout { .. }));
        drop(held);
        // slot is available again after the permit drops
        assert!(limiter.acquire(ProviderKind::Anthropic).await.is_ok());
    }

    #[tokio::test]
    async fn providers_are_limited_independently() {
        let limiter = RateLimiter::new(1, Duration::from_millis(30));
        let _openai = limiter.acquire(ProviderKind::OpenAi).await.unwrap();
        // an exhausted OpenAI pool does not block Anthropic
        assert!(limiter.acquire(ProviderKind::Anthropic).await.is_ok());
    }
}
