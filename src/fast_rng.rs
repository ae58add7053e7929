// PCG-LCG random number stream used for split/roulette decisions
// Same generator and constants as OpenMC's random_lcg

use rand::{RngCore, SeedableRng};

/// LCG multiplier (same as OpenMC)
const PRN_MULT: u64 = 6364136223846793005;
/// LCG additive constant (same as OpenMC)
const PRN_ADD: u64 = 1442695040888963407;
/// Random numbers reserved for each history
pub const PRN_STRIDE: u64 = 152917;

/// Seed after advancing the LCG `n` steps from `seed`, in O(log n).
///
/// Brown, "Random Number Generation with Arbitrary Stride" (1994).
pub fn future_seed(mut n: u64, seed: u64) -> u64 {
    let mut g = PRN_MULT;
    let mut c = PRN_ADD;
    let mut g_new: u64 = 1;
    let mut c_new: u64 = 0;
    while n > 0 {
        if n & 1 == 1 {
            g_new = g_new.wrapping_mul(g);
            c_new = c_new.wrapping_mul(g).wrapping_add(c);
        }
        c = g.wrapping_add(1).wrapping_mul(c);
        g = g.wrapping_mul(g);
        n >>= 1;
    }
    g_new.wrapping_mul(seed).wrapping_add(c_new)
}

/// Fast RNG using OpenMC's PCG-LCG algorithm.
///
/// This is a PCG (Permuted Congruential Generator) variant that uses
/// an LCG as the base generator with output permutation for quality.
///
/// Reference: Melissa E. O'Neill, "PCG: A Family of Simple Fast Space-Efficient
/// Statistically Good Algorithms for Random Number Generation"
#[derive(Clone, Copy, Debug)]
pub struct FastRng {
    seed: u64,
}

impl FastRng {
    /// Create a new FastRng with the given seed
    #[inline]
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Generate a random f64 in [0, 1) - matches OpenMC's prn() function
    #[inline(always)]
    pub fn random(&mut self) -> f64 {
        // Advance the LCG
        self.seed = PRN_MULT.wrapping_mul(self.seed).wrapping_add(PRN_ADD);

        // PCG output permutation (RXS-M-XS variant)
        let word = ((self.seed >> ((self.seed >> 59) + 5)) ^ self.seed)
            .wrapping_mul(12605985483714917081);
        let result = (word >> 43) ^ word;

        // Convert to f64 in [0, 1) - equivalent to ldexp(result, -64)
        (result as f64) * 5.421010862427522e-20
    }

    /// Independent, reproducible stream for history `id` of a run seeded
    /// with `seed`: the run's stream skipped ahead by `id * PRN_STRIDE`.
    #[inline]
    pub fn for_history(seed: u64, id: u64) -> Self {
        Self::new(future_seed(id.wrapping_mul(PRN_STRIDE), seed))
    }

    /// Advance the stream by `n` numbers without generating them.
    #[inline]
    pub fn skip(&mut self, n: u64) {
        self.seed = future_seed(n, self.seed);
    }

    /// Reseed the RNG (for reuse across particles)
    #[inline]
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
    }
}

impl SeedableRng for FastRng {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self {
            seed: u64::from_le_bytes(seed),
        }
    }
}

impl RngCore for FastRng {
    #[inline(always)]
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    #[inline(always)]
    fn next_u64(&mut self) -> u64 {
        // Advance the LCG
        self.seed = PRN_MULT.wrapping_mul(self.seed).wrapping_add(PRN_ADD);

        // PCG output permutation
        let word = ((self.seed >> ((self.seed >> 59) + 5)) ^ self.seed)
            .wrapping_mul(12605985483714917081);
        (word >> 43) ^ word
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        // Fill bytes using next_u64
        let mut left = dest;
        while left.len() >= 8 {
            let bytes = self.next_u64().to_le_bytes();
            left[..8].copy_from_slice(&bytes);
            left = &mut left[8..];
        }
        if !left.is_empty() {
            let bytes = self.next_u64().to_le_bytes();
            left.copy_from_slice(&bytes[..left.len()]);
        }
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
