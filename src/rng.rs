//! Deterministic RNG for the simulated I/O latency.
//!
//! xorshift64*: fast, stable across platforms, and reproducible from a seed
//! so that a scenario always produces the same schedule. Not suitable for
//! anything security related.

/// Deterministic RNG with a single 64-bit state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new RNG. A zero seed is remapped to a non-zero constant,
    /// since zero is a fixed point of xorshift.
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
        Self { state }
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform value in `lo..=hi`. Requires `lo <= hi`.
    #[inline]
    pub fn range_inclusive(&mut self, lo: u32, hi: u32) -> u32 {
        debug_assert!(lo <= hi);
        let span = u64::from(hi - lo) + 1;
        lo + (self.next_u64() % span) as u32
    }
}
