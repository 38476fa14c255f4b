//! Bounded waits.
//!
//! Pages here give no "ready" signal, so anything that depends on page state
//! is polled: run a check, sleep, run it again, give up at a deadline. Every
//! wait in the crate goes through [`Poll::until`].

use crate::driver::Driver;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Shortest pause between two checks; smaller intervals are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Interval and timeout of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poll {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Poll {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub const fn millis(interval_ms: u64, timeout_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    /// Run `check` until it yields a value or the timeout elapses.
    ///
    /// The check always runs at least once, and once more at the deadline.
    /// Checks are at least [`MIN_INTERVAL`] apart.
    /// On expiry returns [`Error::Timeout`] carrying `what` and the time spent.
    pub async fn until<T, F, Fut>(&self, what: &str, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let interval = self.interval.max(MIN_INTERVAL);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if let Some(value) = check().await {
                trace!("{} ready after {} attempt(s)", what, attempts);
                return Ok(value);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    what: what.to_string(),
                    elapsed: now - start,
                });
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
    }
}

/// Wait for `locator` to match a node. Driver errors count as "not yet".
pub async fn node<D: Driver>(driver: &D, locator: &str, poll: Poll) -> Result<D::Node> {
    poll.until(locator, || async move {
        match driver.find_one(locator).await {
            Ok(found) => found,
            Err(e) => {
                trace!("lookup of {} failed: {}", locator, e);
                None
            }
        }
    })
    .await
}

/// Wait for the current location to start with `prefix`.
pub async fn location_prefix<D: Driver>(driver: &D, prefix: &str, poll: Poll) -> Result<String> {
    let what = format!("location starting with {}", prefix);
    poll.until(&what, || async move {
        match driver.current_location().await {
            Ok(location) if location.starts_with(prefix) => Some(location),
            Ok(_) => None,
            Err(e) => {
                trace!("reading location failed: {}", e);
                None
            }
        }
    })
    .await
}
