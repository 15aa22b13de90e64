use std::time::Duration;

/// Upper bound of the random stretch, as a fraction of the delay.
pub const MAX_JITTER: f64 = 1.0;

/// Delay before re-running a group that ended with a retryable error.
pub trait RetryPolicy {
    /// `attempt` is the number of the attempt that just failed, starting at 1.
    fn delay(&self, attempt: u32) -> Duration;
}

pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RetryPolicy for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Fixed delay stretched by a random factor in `[0, jitter)`.
pub struct JitteredBackoff {
    delay: Duration,
    jitter: f64,
}

impl JitteredBackoff {
    pub fn new(delay: Duration, jitter: f64) -> Self {
        Self {
            delay,
            jitter: if jitter.is_finite() {
                jitter.clamp(0.0, MAX_JITTER)
            } else {
                0.0
            },
        }
    }
}

impl RetryPolicy for JitteredBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        let factor = 1.0 + fastrand::f64() * self.jitter;
        Duration::try_from_secs_f64(self.delay.as_secs_f64() * factor).unwrap_or(self.delay)
    }
}

pub fn create_retry_policy(delay: Duration, jitter: f64) -> Box<dyn RetryPolicy + Send + Sync> {
    if jitter > 0.0 {
        Box::new(JitteredBackoff::new(delay, jitter))
    } else {
        Box::new(FixedBackoff::new(delay))
    }
}
