//! Request pacing
//!
//! The governor combines a token bucket, refilled lazily at the effective
//! requests-per-second ceiling, with a semaphore bounding the number of
//! outstanding requests. Every request acquires a [`GovernorPermit`] first.

use super::quota::RateCeiling;
use crate::domain::{GeorefError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{watch, Semaphore, SemaphorePermit};
use tokio::time::Instant;

#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_second: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(refill_per_second: f64, capacity: f64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_per_second,
            last_refill: Instant::now(),
        }
    }

    /// Refills for the elapsed time, then takes one token or reports how
    /// long until one is available
    fn try_take(&mut self, now: Instant) -> std::result::Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_second).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_per_second))
        }
    }
}

/// Paces and bounds requests against one deployment
#[derive(Debug)]
pub struct RateGovernor {
    requests_per_second: Option<f64>,
    bucket: Option<Mutex<TokenBucket>>,
    slots: Semaphore,
    max_in_flight: usize,
    in_flight: AtomicUsize,
    shutdown: Option<watch::Receiver<bool>>,
}

/// An acquired request slot; dropping it frees the slot
#[derive(Debug)]
pub struct GovernorPermit<'a> {
    _slot: SemaphorePermit<'a>,
    in_flight: &'a AtomicUsize,
}

impl Drop for GovernorPermit<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RateGovernor {
    /// Governor pacing at `ceiling`
    ///
    /// Burst capacity and outstanding requests are both bounded by
    /// `max(1, ceil(rps))`, and never exceed `max_concurrency`.
    pub fn new(ceiling: &RateCeiling, max_concurrency: usize) -> Self {
        let rps = ceiling.requests_per_second.max(f64::MIN_POSITIVE);
        let burst = rps.ceil().max(1.0);
        let max_in_flight = (burst as usize).min(max_concurrency.max(1));

        tracing::info!(
            requests_per_second = rps,
            window = ceiling.window.map(|w| w.name()).unwrap_or("none"),
            max_in_flight,
            "Rate governor configured"
        );

        Self {
            requests_per_second: Some(rps),
            bucket: Some(Mutex::new(TokenBucket::new(rps, burst))),
            slots: Semaphore::new(max_in_flight),
            max_in_flight,
            in_flight: AtomicUsize::new(0),
            shutdown: None,
        }
    }

    /// Governor that only bounds concurrency
    pub fn unthrottled(max_concurrency: usize) -> Self {
        let max_in_flight = max_concurrency.max(1);
        Self {
            requests_per_second: None,
            bucket: None,
            slots: Semaphore::new(max_in_flight),
            max_in_flight,
            in_flight: AtomicUsize::new(0),
            shutdown: None,
        }
    }

    /// Makes waits interruptible by a shutdown signal
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Effective ceiling, `None` when unthrottled
    pub fn requests_per_second(&self) -> Option<f64> {
        self.requests_per_second
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Requests currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Waits for a free slot and a token
    ///
    /// # Errors
    ///
    /// `GeorefError::Cancelled` if shutdown is signalled while waiting.
    pub async fn acquire(&self) -> Result<GovernorPermit<'_>> {
        self.check_shutdown()?;

        let slot = tokio::select! {
            slot = self.slots.acquire() => slot.map_err(|_| {
                GeorefError::Cancelled("rate governor closed".to_string())
            })?,
            _ = self.wait_for_shutdown() => return Err(cancelled()),
        };

        if let Some(bucket) = &self.bucket {
            loop {
                let wait = match bucket.lock() {
                    Ok(mut bucket) => bucket.try_take(Instant::now()),
                    Err(poisoned) => poisoned.into_inner().try_take(Instant::now()),
                };
                match wait {
                    Ok(()) => break,
                    Err(delay) => self.pause(delay).await?,
                }
            }
        }

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(GovernorPermit {
            _slot: slot,
            in_flight: &self.in_flight,
        })
    }

    /// Sleeps for `delay` unless shutdown is signalled first
    pub async fn pause(&self, delay: Duration) -> Result<()> {
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = self.wait_for_shutdown() => Err(cancelled()),
        }
    }

    fn check_shutdown(&self) -> Result<()> {
        match &self.shutdown {
            Some(rx) if *rx.borrow() => Err(cancelled()),
            _ => Ok(()),
        }
    }

    /// Resolves once shutdown is signalled; never resolves without a signal
    async fn wait_for_shutdown(&self) {
        let Some(rx) = &self.shutdown else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

fn cancelled() -> GeorefError {
    GeorefError::Cancelled("shutdown requested while waiting for rate governor".to_string())
}
