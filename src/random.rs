//! Random number generation for path tracing.
//!
//! Every pixel owns a small, fast [`PixelRng`] that lives in the frame state
//! and keeps mutating across frames. Seeds come from a ChaCha20 stream which
//! is either drawn from OS entropy or from an explicit seed for reproducible
//! renders.

use glam::Vec3A;
use rand::rngs::SmallRng;
use rand::{rng, Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Attempts before [`PixelRng::random_unit_vector`] gives up on rejection.
const UNIT_VECTOR_ATTEMPTS: usize = 4;

/// Per-pixel generator with the two operations the kernels need.
#[derive(Debug, Clone)]
pub struct PixelRng(SmallRng);

impl PixelRng {
    /// Seed a generator from an arbitrary source generator.
    pub fn from_source(source: &mut ChaCha20Rng) -> Self {
        Self(SmallRng::from_rng(source))
    }

    /// Deterministic generator for a single seed.
    pub fn seed_from_u64(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }

    /// Uniform float in [0, 1).
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        self.0.random()
    }

    /// Uniform integer in [0, n). `n` must be non-zero.
    #[inline]
    pub fn next_index(&mut self, n: usize) -> usize {
        self.0.random_range(0..n)
    }

    /// Uniform float in [min, max).
    #[inline]
    pub fn next_f32_range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }

    /// Unit vector by bounded rejection sampling in the [-1, 1) cube.
    ///
    /// Accepts the first draw inside the unit ball; after
    /// `UNIT_VECTOR_ATTEMPTS` misses it normalizes the last draw anyway,
    /// which slightly biases toward the cube corners.
    pub fn random_unit_vector(&mut self) -> Vec3A {
        let mut candidate = Vec3A::ZERO;
        for _ in 0..UNIT_VECTOR_ATTEMPTS {
            candidate = Vec3A::new(
                self.next_f32_range(-1.0, 1.0),
                self.next_f32_range(-1.0, 1.0),
                self.next_f32_range(-1.0, 1.0),
            );
            if candidate.length_squared() <= 1.0 {
                break;
            }
        }
        candidate.try_normalize().unwrap_or(Vec3A::Y)
    }
}

/// Source of per-pixel seeds for one frame-state allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedSource {
    /// Fresh OS entropy on every allocation.
    #[default]
    Entropy,
    /// Reproducible stream derived from this seed.
    Fixed(u64),
}

impl SeedSource {
    /// Build the ChaCha20 stream the per-pixel generators are seeded from.
    pub fn seeder(self) -> ChaCha20Rng {
        match self {
            SeedSource::Entropy => ChaCha20Rng::from_rng(&mut rng()),
            SeedSource::Fixed(seed) => ChaCha20Rng::seed_from_u64(seed),
        }
    }
}
