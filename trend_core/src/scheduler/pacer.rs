use std::time::Duration;
use tokio::time::{self, Instant};

/// Enforces the minimum spacing between exchange requests and the extended
/// pause after a rate-limit response.
#[derive(Debug)]
pub struct RequestPacer {
    spacing: Duration,
    backoff: Duration,
    next_allowed: Option<Instant>,
    consecutive_rate_limits: u32,
}

impl RequestPacer {
    pub fn new(spacing: Duration, backoff: Duration) -> Self {
        Self {
            spacing,
            backoff,
            next_allowed: None,
            consecutive_rate_limits: 0,
        }
    }

    /// Sleeps until the next request is allowed.
    pub async fn wait(&self) {
        if let Some(until) = self.next_allowed {
            if Instant::now() < until {
                time::sleep_until(until).await;
            }
        }
    }

    /// Records a finished request. A rate-limited request pushes the next
    /// allowed instant out by spacing plus backoff.
    pub fn mark(&mut self, rate_limited: bool) {
        let mut delay = self.spacing;
        if rate_limited {
            delay += self.backoff;
            self.consecutive_rate_limits += 1;
            log::warn!(
                "[pacer] rate limited ({} in a row), pausing requests for {:?}",
                self.consecutive_rate_limits,
                delay
            );
        } else {
            self.consecutive_rate_limits = 0;
        }
        self.next_allowed = Some(Instant::now() + delay);
    }

    pub fn consecutive_rate_limits(&self) -> u32 {
        self.consecutive_rate_limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_does_not_wait() {
        let pacer = RequestPacer::new(Duration::from_millis(1050), Duration::from_secs(5));
        let start = Instant::now();
        pacer.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_and_backoff() {
        let mut pacer = RequestPacer::new(Duration::from_millis(1050), Duration::from_secs(5));

        let start = Instant::now();
        pacer.mark(false);
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(1050));

        let start = Instant::now();
        pacer.mark(true);
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(6050));
        assert_eq!(pacer.consecutive_rate_limits(), 1);

        pacer.mark(true);
        assert_eq!(pacer.consecutive_rate_limits(), 2);
        pacer.mark(false);
        assert_eq!(pacer.consecutive_rate_limits(), 0);
    }
}
