//! Deciding when a lazily loaded list is done loading.
//!
//! The page never says so. We scroll, wait, count, and call the list
//! complete once the count has read the same several rounds in a row.

use crate::driver::Driver;
use crate::Result;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Scrolls `arguments[0]` to its bottom edge.
pub const SCROLL_TO_BOTTOM_JS: &str = "arguments[0].scrollTop = arguments[0].scrollHeight";

/// Per-call convergence state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StabilizationCounter {
    pub previous_count: Option<usize>,
    pub current_count: usize,
    /// Length of the current run of identical readings. A reading equal to
    /// the one before extends the run; any other reading starts a new one.
    pub consecutive_stable_rounds: u32,
}

impl StabilizationCounter {
    /// Record one reading and return the updated run length.
    pub fn record(&mut self, count: usize) -> u32 {
        if self.previous_count == Some(count) {
            self.consecutive_stable_rounds += 1;
        } else {
            self.consecutive_stable_rounds = 1;
        }
        self.previous_count = Some(count);
        self.current_count = count;
        self.consecutive_stable_rounds
    }
}

/// How a stabilization run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stabilization {
    /// Item count at the last reading.
    pub count: usize,
    /// Scroll rounds performed.
    pub rounds: u32,
    /// The wall-clock cap stopped the loop before the count settled.
    pub capped: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Stabilizer {
    settle: Duration,
    threshold: u32,
    max_duration: Option<Duration>,
}

impl Stabilizer {
    pub fn new(settle: Duration, threshold: u32) -> Self {
        Self {
            settle,
            threshold: threshold.max(1),
            max_duration: None,
        }
    }

    /// Stop after `cap` even if the list is still growing.
    pub fn with_max_duration(mut self, cap: Option<Duration>) -> Self {
        self.max_duration = cap;
        self
    }

    /// Scroll `container` until counting `items` reads the same
    /// `threshold` times in a row.
    ///
    /// A failing scroll aborts; a failing count reads as zero items.
    pub async fn run<D: Driver>(
        &self,
        driver: &D,
        container: &D::Node,
        items: &str,
    ) -> Result<Stabilization> {
        let start = Instant::now();
        let mut counter = StabilizationCounter::default();
        let mut rounds = 0;

        loop {
            driver.run_script(SCROLL_TO_BOTTOM_JS, &[container]).await?;
            tokio::time::sleep(self.settle).await;

            let count = match driver.find_many(items).await {
                Ok(nodes) => nodes.len(),
                Err(e) => {
                    debug!("counting comments failed, reading as 0: {}", e);
                    0
                }
            };
            rounds += 1;
            info!("loaded {} comments...", count);

            if counter.record(count) >= self.threshold {
                debug!("comment count settled at {} after {} rounds", count, rounds);
                return Ok(Stabilization {
                    count,
                    rounds,
                    capped: false,
                });
            }

            if let Some(cap) = self.max_duration {
                if start.elapsed() >= cap {
                    warn!(
                        "comment list still growing after {:?}, stopping at {} comments",
                        cap, count
                    );
                    return Ok(Stabilization {
                        count,
                        rounds,
                        capped: true,
                    });
                }
            }
        }
    }
}
