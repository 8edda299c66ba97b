//! Bounded noise used to model forecast uncertainty

use std::sync::Mutex;

/// Source of noise values in `[-1.0, 1.0]`
pub trait NoiseSource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Deterministic zero noise, for tests and reproducible runs
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNoise;

impl NoiseSource for NoNoise {
    fn sample(&self) -> f64 {
        0.0
    }
}

/// Uniform noise backed by a seedable `fastrand` generator
#[derive(Debug)]
pub struct BoundedNoise {
    rng: Mutex<fastrand::Rng>,
}

impl BoundedNoise {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    /// Seeded from process entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Uniform value in `[0.0, 1.0)`
    pub fn next_unit(&self) -> f64 {
        // A poisoned generator is still a valid generator
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.f64()
    }
}

impl NoiseSource for BoundedNoise {
    fn sample(&self) -> f64 {
        self.next_unit() * 2.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_noise_stays_in_range() {
        let noise = BoundedNoise::with_seed(42);
        for _ in 0..10_000 {
            let v = noise.sample();
            assert!((-1.0..=1.0).contains(&v), "noise {} out of range", v);
        }
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let a = BoundedNoise::with_seed(7);
        let b = BoundedNoise::with_seed(7);
        for _ in 0..100 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn test_unit_values_are_half_open() {
        let noise = BoundedNoise::from_entropy();
        for _ in 0..10_000 {
            let v = noise.next_unit();
            assert!((0.0..1.0).contains(&v), "unit value {} out of range", v);
        }
    }

    #[test]
    fn test_no_noise_is_zero() {
        assert_eq!(NoNoise.sample(), 0.0);
    }
}
