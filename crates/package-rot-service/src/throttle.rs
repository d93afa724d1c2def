//! Courtesy delay between registry requests
//!
//! Every request that reaches the registry first waits on a shared
//! [`CourtesyDelay`]. Each caller reserves the next free slot, at least one
//! interval after both "now" and the previously reserved slot, so the spacing
//! holds no matter how many workers share the limiter.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default spacing between registry requests
pub const DEFAULT_COURTESY_DELAY_MS: u64 = 500;

#[derive(Debug)]
pub struct CourtesyDelay {
    interval: Duration,
    last_slot: Mutex<Option<Instant>>,
}

impl Default for CourtesyDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_COURTESY_DELAY_MS))
    }
}

impl CourtesyDelay {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_slot: Mutex::new(None),
        }
    }

    /// A limiter that never waits
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for this caller's turn to contact the registry
    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }

        let slot = {
            let mut last = self.last_slot.lock().await;
            let earliest = Instant::now() + self.interval;
            let slot = match *last {
                Some(previous) if previous + self.interval > earliest => previous + self.interval,
                _ => earliest,
            };
            *last = Some(slot);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}
