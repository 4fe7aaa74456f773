//! Random number generation
//!
//! Uses a seeded ChaCha RNG for reproducibility.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Game random number generator
///
/// Wraps ChaCha8Rng for reproducible random number generation.
/// Note: RNG state is not serialized - games restore with a new stream
/// derived from the original seed.
#[derive(Debug, Clone)]
pub struct GameRng {
    rng: ChaCha8Rng,
    seed: u64,
}

// Custom serialization - only serialize seed, recreate RNG on deserialize
impl Serialize for GameRng {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.seed.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GameRng {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let seed = u64::deserialize(deserializer)?;
        Ok(GameRng::new(seed))
    }
}

impl GameRng {
    /// Create a new RNG with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create a new RNG with a random seed
    pub fn from_entropy() -> Self {
        let seed = rand::random();
        Self::new(seed)
    }

    /// Get the seed used to create this RNG
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns 0..n-1, or 0 if n is not positive
    pub fn rn2(&mut self, n: i32) -> i32 {
        if n <= 0 {
            return 0;
        }
        self.rng.gen_range(0..n)
    }

    /// Returns 1..=n, or 0 if n is not positive
    pub fn rnd(&mut self, n: i32) -> i32 {
        if n <= 0 {
            return 0;
        }
        self.rng.gen_range(1..=n)
    }

    /// Returns lo..=hi (inclusive on both ends)
    pub fn range_inclusive(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    /// Roll n dice with m sides and take the sum
    pub fn dice(&mut self, n: i32, m: i32) -> i32 {
        (0..n).map(|_| self.rnd(m)).sum()
    }

    /// Returns true with probability 1/n; always true for n <= 1
    pub fn one_in(&mut self, n: i32) -> bool {
        n <= 1 || self.rnd(n) == 1
    }

    /// Returns true with probability x/y
    pub fn x_in_y(&mut self, x: i32, y: i32) -> bool {
        self.rnd(y) <= x
    }

    /// Returns true with probability percent/100
    pub fn percent(&mut self, percent: i32) -> bool {
        self.rn2(100) < percent
    }

    /// Uniform float in lo..hi
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        self.rng.gen_range(lo..hi)
    }

    /// Computes x/y, randomly rounding up or down weighted by the remainder
    pub fn div_rand(&mut self, x: i32, y: i32) -> i32 {
        let sign = if (x > 0) ^ (y > 0) { -1 } else { 1 };
        let x = x.abs();
        let y = y.abs();
        if y == 0 {
            return 0;
        }
        let rem = x % y;
        sign * (x / y + i32::from(self.rnd(y) <= rem))
    }

    /// Multiplies num by the fraction x/y with randomized rounding
    pub fn mult_rand_frac(&mut self, num: i32, x: i32, y: i32) -> i32 {
        self.div_rand(num * x, y)
    }

    /// Choose a random element from a slice
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.rn2(items.len() as i32) as usize])
        }
    }

    /// Choose among weighted alternatives; weights must not all be zero
    pub fn choose_weighted<T: Copy>(&mut self, pairs: &[(T, i32)]) -> T {
        let total: i32 = pairs.iter().map(|&(_, w)| w).sum();
        let mut roll = self.rn2(total);
        for &(value, weight) in pairs {
            if roll < weight {
                return value;
            }
            roll -= weight;
        }
        pairs[pairs.len() - 1].0
    }

    /// Shuffle a slice in place
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.rn2(i as i32 + 1) as usize;
            items.swap(i, j);
        }
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}
