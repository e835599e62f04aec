//! Process-wide admission control for model and tool requests.
//!
//! A sliding window of request timestamps: a caller may proceed once fewer
//! than `max_requests` permits were handed out during the last `window`.
//! Callers over the ceiling are delayed, never rejected.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::metrics;

#[derive(Debug)]
pub struct RequestRateLimiter {
    max_requests: usize,
    window: Duration,
    history: Mutex<VecDeque<Instant>>,
}

impl RequestRateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            max_requests,
            window,
            history: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn per_minute(max_rpm: u32) -> Self {
        Self::new(max_rpm as usize, Duration::from_secs(60))
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Wait until a request may be issued and record it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut history = self.history.lock().await;
                let now = Instant::now();
                while history
                    .front()
                    .is_some_and(|issued| now.duration_since(*issued) >= self.window)
                {
                    history.pop_front();
                }

                if history.len() < self.max_requests {
                    history.push_back(now);
                    return;
                }

                history
                    .front()
                    .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                    .unwrap_or_default()
            };

            debug!(
                wait_ms = wait.as_millis() as u64,
                max_requests = self.max_requests,
                "request ceiling reached; waiting for a permit"
            );
            metrics::record_rate_limit_wait(wait);
            sleep(wait).await;
        }
    }

    /// Permits handed out within the current window.
    pub async fn in_flight_window(&self) -> usize {
        let history = self.history.lock().await;
        let now = Instant::now();
        history
            .iter()
            .filter(|issued| now.duration_since(**issued) < self.window)
            .count()
    }
}
