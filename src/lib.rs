use num_complex::Complex;
use rand::Rng;

pub mod channel;
pub mod constellation;
pub mod error;
pub mod link;
pub mod modem;
pub mod modulation;
#[cfg(feature = "python")]
mod python;
pub mod quad;
pub mod ser;

pub use crate::{
    channel::Channel,
    error::{ModemError, ModemResult},
    link::{LinkConfig, SerCurve},
    modem::{Modem, Signal},
    modulation::{Coherence, Modulation},
};

#[inline]
pub fn db(x: f64) -> f64 {
    10f64 * x.log10()
}

#[inline]
pub fn undb(x: f64) -> f64 {
    10f64.powf(x / 10f64)
}

#[inline]
pub fn linspace(start: f64, stop: f64, num: usize) -> impl Iterator<Item = f64> {
    let step = if num > 1 {
        (stop - start) / ((num - 1) as f64)
    } else {
        0f64
    };
    (0..num).map(move |i| start + step * (i as f64))
}

/// Error function, `1 - erfc(x)`.
#[inline]
pub fn erf(x: f64) -> f64 {
    1f64 - erfc(x)
}

/// Complementary error function with fractional error below 1.2e-7 everywhere,
/// including the far tail where `1 - erf(x)` would cancel.
#[inline]
pub fn erfc(x: f64) -> f64 {
    let t: f64 = 1f64 / (1f64 + 0.5 * x.abs());
    let tau = t
        * (-x.powi(2) - 1.26551223
            + 1.00002368 * t
            + 0.37409196 * t.powi(2)
            + 0.09678418 * t.powi(3)
            - 0.18628806 * t.powi(4)
            + 0.27886807 * t.powi(5)
            - 1.13520398 * t.powi(6)
            + 1.48851587 * t.powi(7)
            - 0.82215223 * t.powi(8)
            + 0.17087277 * t.powi(9))
        .exp();
    if x >= 0f64 { tau } else { 2f64 - tau }
}

#[inline]
/// Calculates the energy per sample.
pub fn avg_energy(signal: &[Complex<f64>]) -> f64 {
    signal.iter().map(|&sample| sample.norm_sqr()).sum::<f64>() / signal.len() as f64
}

/// `num_symbols` indices drawn uniformly from `[0, m-1]`.
pub fn random_symbols<R: Rng + ?Sized>(m: usize, num_symbols: usize, rng: &mut R) -> Vec<usize> {
    (0..num_symbols).map(|_| rng.random_range(0..m)).collect()
}

#[cfg(test)]
mod tests {

    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn db_conversions() {
        assert_approx_eq!(db(100f64), 20f64);
        assert_approx_eq!(undb(3f64), 1.9952623149688795);
        assert_approx_eq!(undb(db(42f64)), 42f64);
    }

    #[test]
    fn linspace_endpoints() {
        let v: Vec<f64> = linspace(-3f64, 3f64, 4).collect();
        assert_eq!(v, vec![-3f64, -1f64, 1f64, 3f64]);
        assert_eq!(linspace(5f64, 9f64, 1).collect::<Vec<f64>>(), vec![5f64]);
    }

    #[test]
    fn erfc_values() {
        // Reference values from tables.
        for (x, expected) in [
            (0f64, 1f64),
            (0.5, 0.4795001221869535),
            (1f64, 0.15729920705028513),
            (2f64, 4.677734981047266e-3),
            (3.1622776601683795, 7.744216431044e-6),
            (5f64, 1.5374597944280349e-12),
            (-1f64, 1.8427007929497148),
        ] {
            assert!(((erfc(x) - expected) / expected).abs() < 2e-7, "erfc({})", x);
        }
        assert_approx_eq!(erf(0.5), 0.5204998778130465, 1e-7);
    }

    #[test]
    fn symbols_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let symbols = random_symbols(8, 10_000, &mut rng);
        assert_eq!(symbols.len(), 10_000);
        assert!(symbols.iter().all(|&s_i| s_i < 8));
        for k in 0..8 {
            assert!(symbols.contains(&k));
        }
    }
}
