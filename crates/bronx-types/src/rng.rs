// ─────────────────────────────────────────────────────────────────────
// Bronx — Deterministic RNG
// ─────────────────────────────────────────────────────────────────────

/// Lightweight xorshift64 generator. Deterministic for a given seed.
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0xDEAD_BEEF_CAFE_BABE } else { seed },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Standard normal via Box-Muller.
    pub fn next_normal(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-300);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    /// Fill a buffer with `N(0, std²)` draws.
    pub fn fill_normal(&mut self, out: &mut [f64], std: f64) {
        for v in out.iter_mut() {
            *v = std * self.next_normal();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let mut a = SimpleRng::new(7);
        let mut b = SimpleRng::new(7);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_zero_seed_is_remapped() {
        let mut rng = SimpleRng::new(0);
        assert_ne!(rng.next_u64(), 0);
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = SimpleRng::new(3);
        assert!((0..1000).map(|_| rng.next_f64()).all(|v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn test_normal_moments() {
        let mut rng = SimpleRng::new(11);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| rng.next_normal()).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean = {mean}");
        assert!((var - 1.0).abs() < 0.05, "var = {var}");
    }
}
