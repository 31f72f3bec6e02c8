//! Reconnect backoff.

use std::time::Duration;

/// Jitter applied to every reconnect delay (±50%).
pub const JITTER_FACTOR: f64 = 0.5;

/// Exponential reconnect delays with a cap and jitter.
#[derive(Clone, Copy, Debug)]
pub struct Backoff {
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
}

impl Backoff {
    /// Doubling from `base`, capped at `max`, jittered by [`JITTER_FACTOR`].
    pub fn new(base: Duration, max: Duration) -> Self {
        let base_delay_ms = duration_ms(base).max(1);
        Self {
            base_delay_ms,
            max_delay_ms: duration_ms(max).max(base_delay_ms),
            jitter_factor: JITTER_FACTOR,
        }
    }

    /// Same schedule without jitter.
    pub fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }

    /// Delay before reconnect attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(delay_with_random(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_factor,
            rand::random::<f64>(),
        ))
    }
}

/// Backoff delay in ms for a given `random` in `[0.0, 1.0)`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn delay_with_random(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    random: f64,
) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(max_delay_ms);

    // random [0,1) maps to [-jitter, +jitter]
    let jitter = 1.0 + (random * 2.0 - 1.0) * jitter_factor;
    ((capped as f64) * jitter).round().max(0.0) as u64
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_then_caps() {
        let b = Backoff::new(Duration::from_secs(1), Duration::from_secs(5)).without_jitter();
        assert_eq!(b.delay(0), Duration::from_millis(1000));
        assert_eq!(b.delay(1), Duration::from_millis(2000));
        assert_eq!(b.delay(2), Duration::from_millis(4000));
        assert_eq!(b.delay(3), Duration::from_millis(5000));
        assert_eq!(b.delay(40), Duration::from_millis(5000));
    }

    #[test]
    fn jitter_bounds() {
        assert_eq!(delay_with_random(0, 1000, 5000, 0.5, 0.0), 500);
        assert_eq!(delay_with_random(0, 1000, 5000, 0.5, 0.5), 1000);
        assert!(delay_with_random(0, 1000, 5000, 0.5, 0.999_999) <= 1500);
    }

    #[test]
    fn jittered_delay_stays_in_range() {
        let b = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        for _ in 0..100 {
            let d = b.delay(10).as_millis();
            assert!((2500..=7500).contains(&d), "delay {d} out of range");
        }
    }

    #[test]
    fn max_below_base_is_raised() {
        let b = Backoff::new(Duration::from_secs(2), Duration::from_secs(1)).without_jitter();
        assert_eq!(b.delay(3), Duration::from_secs(2));
    }
}
