use std::time::Duration;

/// Backoff applied between failed claim attempts
///
/// The first failure waits `initial`; each further consecutive failure
/// multiplies the wait by `multiplier`, capped at `max`. A successful claim
/// resets the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
        }
    }

    /// Retry immediately, with no delay
    pub fn immediate() -> Self {
        Self {
            initial: Duration::ZERO,
            max: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Start a fresh backoff sequence
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            current: None,
            attempts: 0,
        }
    }
}

/// Running state of a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    current: Option<Duration>,
    attempts: u32,
}

impl Backoff {
    /// Delay to wait before the next attempt, advancing the sequence
    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.policy.initial,
            Some(current) => {
                let scaled = (current.as_nanos() as f64 * self.policy.multiplier.max(1.0)).round();
                if scaled >= self.policy.max.as_nanos() as f64 {
                    self.policy.max
                } else {
                    Duration::from_nanos(scaled as u64)
                }
            }
        };
        let next = next.min(self.policy.max);

        self.current = Some(next);
        self.attempts += 1;
        next
    }

    /// Consecutive failures since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.attempts = 0;
    }
}
