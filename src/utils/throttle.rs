//! Minimum-interval pacing for outbound requests.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// Enforces a minimum interval between consecutive requests.
///
/// The first call returns immediately; later calls wait until `interval` has
/// passed since the previous one. A zero interval never waits.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Wait until the next request may go out, then mark it as sent.
    pub async fn wait(&mut self) {
        if !self.interval.is_zero() {
            if let Some(last) = self.last {
                sleep_until(last + self.interval).await;
            }
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_interval_does_not_wait() {
        let mut throttle = Throttle::new(Duration::ZERO);
        let start = std::time::Instant::now();
        for _ in 0..100 {
            throttle.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_between_calls() {
        let mut throttle = Throttle::from_millis(2000);
        let start = Instant::now();

        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        throttle.wait().await;
        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(4000));
    }
}
