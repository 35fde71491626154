//! Exponential backoff between datafeed retries

use std::time::Duration;

use crate::config::RetryConfig;

/// Exponential backoff with an upper bound and no attempt ceiling
///
/// The loop keeps retrying transient failures and stale-feed recoveries
/// for as long as it runs; this only spaces the attempts out.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    multiplier: f64,
    max: Duration,
    current: Option<Duration>,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        let multiplier = if config.multiplier.is_finite() {
            config.multiplier.max(1.0)
        } else {
            1.0
        };
        Self {
            initial: config.initial_interval.min(config.max_interval),
            multiplier,
            max: config.max_interval,
            current: None,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => self.initial,
            Some(previous) => {
                let nanos = previous.as_nanos() as f64 * self.multiplier;
                if nanos >= self.max.as_nanos() as f64 {
                    self.max
                } else {
                    Duration::from_nanos(nanos as u64)
                }
            }
        };
        self.current = Some(delay);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Reset after a successful call
    pub fn reset(&mut self) {
        self.current = None;
        self.attempts = 0;
    }

    /// Consecutive failures since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(initial_ms: u64, multiplier: f64, max_ms: u64) -> RetryConfig {
        RetryConfig {
            initial_interval: Duration::from_millis(initial_ms),
            multiplier,
            max_interval: Duration::from_millis(max_ms),
        }
    }

    #[test]
    fn backoff_first_delay_is_initial() {
        let mut backoff = Backoff::new(&config(100, 2.0, 1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn backoff_grows_until_capped() {
        let mut backoff = Backoff::new(&config(100, 2.0, 500));

        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay()).collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(500),
                Duration::from_millis(500),
            ]
        );
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn backoff_reset_starts_over() {
        let mut backoff = Backoff::new(&config(100, 3.0, 10_000));
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();

        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn backoff_ignores_shrinking_multiplier() {
        let mut backoff = Backoff::new(&config(100, 0.5, 1000));
        backoff.next_delay();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn backoff_initial_never_exceeds_max() {
        let mut backoff = Backoff::new(&config(5000, 2.0, 1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
    }
}
