use std::{collections::VecDeque, time::Duration};
use tokio::{sync::Mutex, time::Instant};

/// Shortest sleep between two attempts of a waiting caller
pub const MIN_BACKOFF: Duration = Duration::from_millis(10);

/// Sliding-window rate limiter.
///
/// Admits at most `limit` acquisitions in any window of `window` length.
/// Acceptance times are kept oldest-first; an attempt drops the ones that
/// have left the window and either records itself or sleeps until the
/// oldest one expires. Runs on tokio's clock, so tests can drive it with
/// a paused runtime.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>
}

impl RateLimiter {
    /// A `limit` of 0 is treated as 1.
    pub fn new(limit: usize, window: Duration) -> Self {
        let limit = limit.max(1);

        RateLimiter {
            limit,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(limit))
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits until the caller may proceed
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock().await;
                let now = Instant::now();

                while let Some(oldest) = timestamps.front() {
                    if now.duration_since(*oldest) > self.window {
                        timestamps.pop_front();
                    } else {
                        break;
                    }
                }

                if timestamps.len() < self.limit {
                    timestamps.push_back(now);
                    return;
                }

                let oldest = timestamps.front().copied().unwrap_or(now);
                self.window.saturating_sub(now.duration_since(oldest))
            };

            tokio::time::sleep(wait.max(MIN_BACKOFF)).await;
        }
    }

    /// Acquisitions still inside the current window
    pub async fn in_window(&self) -> usize {
        let timestamps = self.timestamps.lock().await;
        let now = Instant::now();

        timestamps
            .iter()
            .filter(|t| now.duration_since(**t) <= self.window)
            .count()
    }
}
