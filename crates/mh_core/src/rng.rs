//! Deterministic pseudo-random numbers for simulation-side effects.
//!
//! A 64-bit LCG is all the particle emitters need: identical seeds give
//! identical runs on every platform, which keeps the fixed-step replay
//! tests byte-stable. Not for anything security-adjacent.

#[derive(Debug, Clone)]
pub struct Lcg64 {
    state: u64,
}

impl Lcg64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.state >> 33) as u32
    }

    /// Uniform in [0, 1].
    pub fn next_f32(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }

    /// Uniform in [lo, hi].
    pub fn range_f32(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }

    /// Uniform index in [0, len). `len` must be non-zero.
    pub fn pick(&mut self, len: usize) -> usize {
        (self.next_u32() as usize) % len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Lcg64::new(12345);
        let mut b = Lcg64::new(12345);
        let xs: Vec<u32> = (0..16).map(|_| a.next_u32()).collect();
        let ys: Vec<u32> = (0..16).map(|_| b.next_u32()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Lcg64::new(1);
        let mut b = Lcg64::new(2);
        let xs: Vec<u32> = (0..8).map(|_| a.next_u32()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.next_u32()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn range_f32_stays_in_bounds() {
        let mut rng = Lcg64::new(999);
        for _ in 0..200 {
            let v = rng.range_f32(-50.0, 50.0);
            assert!(v >= -50.0 && v <= 50.0);
        }
    }

    #[test]
    fn pick_covers_valid_indices() {
        let mut rng = Lcg64::new(7);
        for _ in 0..100 {
            let i = rng.pick(3);
            assert!(i < 3);
        }
    }
}
