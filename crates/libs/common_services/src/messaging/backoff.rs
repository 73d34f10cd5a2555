use app_state::BackoffSettings;
use std::time::Duration;

const JITTER: f64 = 0.1;

/// Capped exponential reconnect delay with ±10% jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    settings: BackoffSettings,
    attempt: u32,
}

impl Backoff {
    #[must_use]
    pub const fn new(settings: BackoffSettings) -> Self {
        Self {
            settings,
            attempt: 0,
        }
    }

    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delay before the next attempt, before jitter is applied.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        let initial = self.settings.initial().as_secs_f64();
        let max = self.settings.max().as_secs_f64();
        let exponent = i32::try_from(self.attempt).unwrap_or(i32::MAX);
        let delay = initial * self.settings.multiplier.powi(exponent);
        Duration::from_secs_f64(if delay.is_finite() { delay.min(max) } else { max })
    }

    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay();
        self.attempt = self.attempt.saturating_add(1);
        let factor = 1.0 + JITTER * fastrand::f64().mul_add(2.0, -1.0);
        base.mul_f64(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BackoffSettings {
        BackoffSettings {
            initial_ms: 100,
            max_ms: 1_000,
            multiplier: 2.0,
        }
    }

    #[test]
    fn grows_then_caps() {
        let mut backoff = Backoff::new(settings());
        let bases: Vec<u128> = (0..6)
            .map(|_| {
                let base = backoff.base_delay().as_millis();
                let _ = backoff.next_delay();
                base
            })
            .collect();
        assert_eq!(bases, vec![100, 200, 400, 800, 1_000, 1_000]);
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let mut backoff = Backoff::new(settings());
        for _ in 0..200 {
            let base = backoff.base_delay().as_secs_f64();
            let delay = backoff.next_delay().as_secs_f64();
            assert!(delay >= base * 0.9 - 1e-9 && delay <= base * 1.1 + 1e-9);
        }
    }

    #[test]
    fn reset_starts_over() {
        let mut backoff = Backoff::new(settings());
        for _ in 0..4 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.base_delay(), Duration::from_millis(100));
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let mut backoff = Backoff::new(settings());
        backoff.attempt = u32::MAX;
        assert_eq!(backoff.base_delay(), Duration::from_secs(1));
    }
}
