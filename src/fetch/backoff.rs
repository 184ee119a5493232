use std::time::Duration;

use rand::Rng;

use crate::config::BackoffConfig;

/// Delay after the failed attempt with zero-based index `attempt`:
/// `min(base * 2^attempt + jitter, max)`.
pub fn backoff_delay<R: Rng>(cfg: &BackoffConfig, attempt: u32, rng: &mut R) -> Duration {
    let exponential = cfg.base_ms.saturating_mul(2u64.saturating_pow(attempt));
    let jitter = if cfg.max_jitter_ms == 0 {
        0
    } else {
        rng.gen_range(0..=cfg.max_jitter_ms)
    };
    Duration::from_millis(exponential.saturating_add(jitter).min(cfg.max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn doubles_without_jitter() {
        let cfg = BackoffConfig {
            base_ms: 1_000,
            max_ms: 30_000,
            max_jitter_ms: 0,
        };
        let mut rng = StdRng::seed_from_u64(7);
        let delays: Vec<u64> = (0..4)
            .map(|a| backoff_delay(&cfg, a, &mut rng).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000]);
    }

    #[test]
    fn capped_at_max() {
        let cfg = BackoffConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(backoff_delay(&cfg, 10, &mut rng), Duration::from_secs(30));
        assert_eq!(backoff_delay(&cfg, 63, &mut rng), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_in_bounds_and_never_decreases_the_series() {
        let cfg = BackoffConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let first = backoff_delay(&cfg, 0, &mut rng);
            let second = backoff_delay(&cfg, 1, &mut rng);
            assert!(first >= Duration::from_millis(1_000) && first <= Duration::from_millis(2_000));
            assert!(second >= first, "{second:?} < {first:?}");
        }
    }
}
