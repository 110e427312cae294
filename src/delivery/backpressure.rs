//! Adaptive inter-send delay
//!
//! The delay jumps by a random 25-50ms whenever the board reports overload
//! and relaxes by a fixed step every delivery cycle. It is always kept within
//! `[min, max]`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use yarrboard_shared::protocol;

#[derive(Debug)]
pub struct Backpressure {
    delay: Duration,
    min: Duration,
    max: Duration,
    decay: Duration,
    rng: StdRng,
}

impl Backpressure {
    /// Create a backpressure delay starting at `min`
    pub fn new(min: Duration, max: Duration, decay: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            delay: min,
            min,
            max: max.max(min),
            decay,
            rng,
        }
    }

    /// Current inter-send delay
    pub fn current(&self) -> Duration {
        self.delay
    }

    #[cfg(test)]
    pub fn bounds(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    /// React to an overload signal
    pub fn increase(&mut self) -> Duration {
        let increment = self.rng.gen_range(protocol::OVERLOAD_INCREMENT_MS);
        self.delay = (self.delay + Duration::from_millis(increment)).min(self.max);
        self.delay
    }

    /// Relax toward the minimum; called once per delivery cycle
    pub fn decay(&mut self) -> Duration {
        self.delay = self.delay.saturating_sub(self.decay).max(self.min);
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backpressure() -> Backpressure {
        Backpressure::new(
            Duration::from_millis(10),
            Duration::from_millis(200),
            Duration::from_millis(5),
            Some(7),
        )
    }

    #[test]
    fn test_overload_increment_range() {
        let mut bp = backpressure();
        for _ in 0..50 {
            let before = bp.current();
            let after = bp.increase();
            if after < bp.bounds().1 {
                let step = after - before;
                assert!(step >= Duration::from_millis(25) && step < Duration::from_millis(50));
            }
            // Fall back to the floor for the next sample
            while bp.current() > bp.bounds().0 {
                bp.decay();
            }
        }
    }

    #[test]
    fn test_delay_stays_within_bounds() {
        let mut bp = backpressure();
        for _ in 0..100 {
            bp.increase();
            assert!(bp.current() <= Duration::from_millis(200));
        }
        assert_eq!(bp.current(), Duration::from_millis(200));

        for _ in 0..100 {
            bp.decay();
            assert!(bp.current() >= Duration::from_millis(10));
        }
        assert_eq!(bp.current(), Duration::from_millis(10));
    }

    #[test]
    fn test_decay_is_fixed_step() {
        let mut bp = backpressure();
        let raised = bp.increase();
        assert_eq!(bp.decay(), raised - Duration::from_millis(5));
    }

    #[test]
    fn test_seeded_jitter_is_deterministic() {
        let mut a = backpressure();
        let mut b = backpressure();
        assert_eq!(a.increase(), b.increase());
        assert_eq!(a.increase(), b.increase());
    }
}
