//! Process-wide token-bucket rate limiter shared across every LLM call
//! (spec §5 "The LLM Gateway's rate limiter is process-wide and shared").
//!
//! Implemented over `tokio::sync::Semaphore`, the same primitive the teacher
//! would reach for to gate concurrent work, refilled by a background tick
//! task rather than computed on every acquire.

use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    capacity: u32,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_per_sec: u32) -> Self {
        let capacity = capacity.max(1);
        let semaphore = Arc::new(Semaphore::new(capacity as usize));

        if refill_per_sec > 0 {
            let semaphore = semaphore.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
                loop {
                    interval.tick().await;
                    let available = semaphore.available_permits();
                    let refill = (refill_per_sec as usize).min((capacity as usize).saturating_sub(available));
                    if refill > 0 {
                        semaphore.add_permits(refill);
                    }
                }
            });
        }

        Self { semaphore, capacity }
    }

    /// Blocks until a token is available, consuming it.
    pub async fn acquire(&self) {
        match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit.forget(),
            Err(_) => unreachable!("semaphore is never closed"),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
