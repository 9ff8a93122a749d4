use std::f64::consts::{FRAC_1_SQRT_2, PI};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    channel::{check_k_factor, Channel},
    erfc,
    error::{ModemError, ModemResult},
    modulation::{bits_per_symbol, Coherence, Modulation},
    quad::Quadrature,
    undb,
};

/// Envelope distribution of a flat-fading channel, K-factor on a linear scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Fading {
    Rayleigh,
    Rician { k: f64 },
}

impl Fading {
    pub fn rician_db(k_db: f64) -> ModemResult<Self> {
        check_k_factor(k_db)?;
        Ok(Fading::Rician { k: undb(k_db) })
    }

    /// MGF of the per-symbol SNR evaluated at `-g / sin²(x)`.
    pub fn mgf(&self, g: f64, gamma_s: f64, x: f64) -> f64 {
        let s = x.sin().powi(2);
        if g * gamma_s == 0f64 {
            return 1f64;
        }
        match *self {
            Fading::Rayleigh => s / (s + g * gamma_s),
            Fading::Rician { k } => {
                let los = (1f64 + k) * s;
                let denom = los + g * gamma_s;
                los / denom * (-k * g * gamma_s / denom).exp()
            }
        }
    }
}

/// Per-symbol SNR `γ_s = log2(M) · 10^(EbN0/10)` for every Eb/N0 in dB.
pub fn gamma_s(m: usize, ebn0_dbs: &[f64]) -> ModemResult<Vec<f64>> {
    if ebn0_dbs.iter().any(|e| e.is_nan()) {
        return Err(ModemError::invalid_parameter("Eb/N0 must not be NaN"));
    }
    let k = bits_per_symbol(m) as f64;
    Ok(ebn0_dbs.iter().map(|&e| k * undb(e)).collect())
}

fn check_gammas(gammas: &[f64]) -> ModemResult<()> {
    if let Some(g) = gammas.iter().find(|g| g.is_nan() || **g < 0f64) {
        return Err(ModemError::invalid_parameter(format!(
            "per-symbol SNR must be a non-negative number, got {}",
            g
        )));
    }
    Ok(())
}

/// Gaussian tail probability `Q(z)`.
#[inline]
fn q_function(z: f64) -> f64 {
    0.5 * erfc(z * FRAC_1_SQRT_2)
}

/// `1 - (1 - p)^n` without cancellation for small `p`.
#[inline]
fn complement_power(p: f64, n: f64) -> f64 {
    -(n * (-p).ln_1p()).exp_m1()
}

pub fn psk_awgn(m: usize, gamma_s: f64) -> f64 {
    let gamma_b = gamma_s / bits_per_symbol(m) as f64;
    match m {
        2 => 0.5 * erfc(gamma_b.sqrt()),
        4 => {
            let q = 0.5 * erfc(gamma_b.sqrt());
            // 2Q - Q^2
            q * (2f64 - q)
        }
        _ => erfc(gamma_s.sqrt() * (PI / m as f64).sin()),
    }
}

pub fn qam_awgn(m: usize, gamma_s: f64) -> f64 {
    let m = m as f64;
    let p = (1f64 - 1f64 / m.sqrt()) * erfc((1.5 * gamma_s / (m - 1f64)).sqrt());
    // 1 - (1 - p)^2
    p * (2f64 - p)
}

pub fn pam_awgn(m: usize, gamma_s: f64) -> f64 {
    let m = m as f64;
    2f64 * (1f64 - 1f64 / m) * 0.5 * erfc((3f64 * gamma_s / (m * m - 1f64)).sqrt())
}

/// Coherent M-FSK: `1 - ∫ Φ(q + √(2γ_s))^(M-1) φ(q) dq`, integrated in its
/// complementary form so the deep tail keeps its precision.
pub fn fsk_coherent_awgn(m: usize, gamma_s: f64, quadrature: &Quadrature) -> ModemResult<f64> {
    let a = (2f64 * gamma_s).sqrt();
    let n = (m - 1) as f64;
    let norm = (2f64 * PI).sqrt().recip();
    let integrand = |q: f64| complement_power(q_function(q + a), n) * (-q * q / 2f64).exp() * norm;

    Ok(quadrature.integrate(integrand, f64::NEG_INFINITY, -a)?
        + quadrature.integrate(integrand, -a, f64::INFINITY)?)
}

/// Noncoherent M-FSK:
/// `Σ_{i=1}^{M-1} (-1)^(i+1) / (i+1) · C(M-1, i) · exp(-i γ_s / (i+1))`.
///
/// The binomial coefficients are built in log space and the sum is accumulated with
/// compensation. When the terms are so large that rounding would swamp the result,
/// the same probability is integrated from the envelope densities instead.
pub fn fsk_noncoherent_awgn(m: usize, gamma_s: f64, quadrature: &Quadrature) -> ModemResult<f64> {
    let n = m - 1;
    let mut ln_binomial = 0f64;
    let mut sum = 0f64;
    let mut compensation = 0f64;
    let mut magnitude = 0f64;

    for i in 1..=n {
        ln_binomial += ((n - i + 1) as f64).ln() - (i as f64).ln();
        let ln_term = ln_binomial - ((i + 1) as f64).ln() - i as f64 * gamma_s / (i + 1) as f64;
        let term = ln_term.exp();
        let term = if i % 2 == 1 { term } else { -term };

        // Neumaier summation.
        let t = sum + term;
        if sum.abs() >= term.abs() {
            compensation += (sum - t) + term;
        } else {
            compensation += (term - t) + sum;
        }
        sum = t;
        magnitude += term.abs();
    }
    let sum = sum + compensation;

    // Only a relative bound is safe here: the result can sit far below any absolute tolerance.
    let rounding = 4f64 * n as f64 * f64::EPSILON * magnitude;
    if sum > 0f64 && rounding <= quadrature.epsrel * sum {
        return Ok(sum);
    }

    tracing::warn!(
        m,
        gamma_s,
        magnitude,
        "alternating FSK sum would cancel, integrating envelope densities instead"
    );
    fsk_noncoherent_integral(m, gamma_s, quadrature)
}

/// `∫_0^∞ x e^{-(x²+a²)/2} I0(a x) [1 - (1 - e^{-x²/2})^(M-1)] dx`, `a = √(2γ_s)`.
fn fsk_noncoherent_integral(m: usize, gamma_s: f64, quadrature: &Quadrature) -> ModemResult<f64> {
    let a = (2f64 * gamma_s).sqrt();
    let n = (m - 1) as f64;
    let relative = Quadrature {
        epsabs: 0f64,
        ..*quadrature
    };
    let integrand = |x: f64| {
        x * (-(x - a).powi(2) / 2f64).exp()
            * bessel_i0_scaled(a * x)
            * complement_power((-x * x / 2f64).exp(), n)
    };

    Ok(relative.integrate(integrand, 0f64, a)? + relative.integrate(integrand, a, f64::INFINITY)?)
}

/// `I0(x) · e^{-|x|}` (polynomial approximation, relative error ~1e-7).
fn bessel_i0_scaled(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 3.75 {
        let y = (x / 3.75).powi(2);
        let i0 = 1f64
            + y * (3.5156229
                + y * (3.0899424
                    + y * (1.2067492 + y * (0.2659732 + y * (0.360768e-1 + y * 0.45813e-2)))));
        i0 * (-ax).exp()
    } else {
        let y = 3.75 / ax;
        (0.39894228
            + y * (0.1328592e-1
                + y * (0.225319e-2
                    + y * (-0.157565e-2
                        + y * (0.916281e-2
                            + y * (-0.2057706e-1
                                + y * (0.2635537e-1 + y * (-0.1647633e-1 + y * 0.392377e-2))))))))
            / ax.sqrt()
    }
}

pub fn psk_fading(
    fading: Fading,
    m: usize,
    gamma_s: f64,
    quadrature: &Quadrature,
) -> ModemResult<f64> {
    // Rician BPSK stays on the integral: the Rayleigh closed form has no K dependence.
    if m == 2 && fading == Fading::Rayleigh {
        let gamma_b = gamma_s;
        return Ok(0.5 * (1f64 - (gamma_b / (1f64 + gamma_b)).sqrt()));
    }
    let g = (PI / m as f64).sin().powi(2);
    let upper = PI * (m - 1) as f64 / m as f64;
    Ok(quadrature.integrate(|x| fading.mgf(g, gamma_s, x), 0f64, upper)? / PI)
}

pub fn qam_fading(
    fading: Fading,
    m: usize,
    gamma_s: f64,
    quadrature: &Quadrature,
) -> ModemResult<f64> {
    let g = 1.5 / (m as f64 - 1f64);
    let c = 1f64 - 1f64 / (m as f64).sqrt();
    let mgf = |x: f64| fading.mgf(g, gamma_s, x);

    let y1 = quadrature.integrate(mgf, 0f64, PI / 2f64)?;
    let y2 = quadrature.integrate(mgf, 0f64, PI / 4f64)?;
    Ok(4f64 / PI * c * y1 - 4f64 / PI * c * c * y2)
}

pub fn pam_fading(
    fading: Fading,
    m: usize,
    gamma_s: f64,
    quadrature: &Quadrature,
) -> ModemResult<f64> {
    let mf = m as f64;
    let g = 3f64 / (mf * mf - 1f64);
    let y = quadrature.integrate(|x| fading.mgf(g, gamma_s, x), 0f64, PI / 2f64)?;
    Ok(2f64 * (mf - 1f64) / (mf * PI) * y)
}

/// AWGN SER for per-symbol SNRs.
pub fn ser_awgn_gamma(
    gammas: &[f64],
    modulation: Modulation,
    m: usize,
    quadrature: &Quadrature,
) -> ModemResult<Vec<f64>> {
    modulation.validate_order(m)?;
    check_gammas(gammas)?;

    gammas
        .par_iter()
        .map(|&g| match modulation {
            Modulation::Psk => Ok(psk_awgn(m, g)),
            Modulation::Qam => Ok(qam_awgn(m, g)),
            Modulation::Pam => Ok(pam_awgn(m, g)),
            Modulation::Fsk(Coherence::Coherent) => fsk_coherent_awgn(m, g, quadrature),
            Modulation::Fsk(Coherence::Noncoherent) => fsk_noncoherent_awgn(m, g, quadrature),
        })
        .collect()
}

/// Flat-fading SER for per-symbol SNRs. Only the IQ families are covered.
pub fn ser_fading_gamma(
    fading: Fading,
    gammas: &[f64],
    modulation: Modulation,
    m: usize,
    quadrature: &Quadrature,
) -> ModemResult<Vec<f64>> {
    modulation.validate_order(m)?;
    check_gammas(gammas)?;

    let ser_fn: fn(Fading, usize, f64, &Quadrature) -> ModemResult<f64> = match modulation {
        Modulation::Psk => psk_fading,
        Modulation::Qam => qam_fading,
        Modulation::Pam => pam_fading,
        Modulation::Fsk(_) => {
            return Err(ModemError::invalid_parameter(
                "fading-channel SER is available for PSK, QAM and PAM only",
            ));
        }
    };

    gammas
        .par_iter()
        .map(|&g| ser_fn(fading, m, g, quadrature))
        .collect()
}

pub fn ser_awgn(ebn0_dbs: &[f64], modulation: Modulation, m: usize) -> ModemResult<Vec<f64>> {
    ser_awgn_with(&Quadrature::default(), ebn0_dbs, modulation, m)
}

pub fn ser_awgn_with(
    quadrature: &Quadrature,
    ebn0_dbs: &[f64],
    modulation: Modulation,
    m: usize,
) -> ModemResult<Vec<f64>> {
    modulation.validate_order(m)?;
    ser_awgn_gamma(&gamma_s(m, ebn0_dbs)?, modulation, m, quadrature)
}

pub fn ser_rayleigh(ebn0_dbs: &[f64], modulation: Modulation, m: usize) -> ModemResult<Vec<f64>> {
    ser_rayleigh_with(&Quadrature::default(), ebn0_dbs, modulation, m)
}

pub fn ser_rayleigh_with(
    quadrature: &Quadrature,
    ebn0_dbs: &[f64],
    modulation: Modulation,
    m: usize,
) -> ModemResult<Vec<f64>> {
    modulation.validate_order(m)?;
    ser_fading_gamma(Fading::Rayleigh, &gamma_s(m, ebn0_dbs)?, modulation, m, quadrature)
}

pub fn ser_rician(
    k_db: f64,
    ebn0_dbs: &[f64],
    modulation: Modulation,
    m: usize,
) -> ModemResult<Vec<f64>> {
    ser_rician_with(&Quadrature::default(), k_db, ebn0_dbs, modulation, m)
}

pub fn ser_rician_with(
    quadrature: &Quadrature,
    k_db: f64,
    ebn0_dbs: &[f64],
    modulation: Modulation,
    m: usize,
) -> ModemResult<Vec<f64>> {
    modulation.validate_order(m)?;
    let fading = Fading::rician_db(k_db)?;
    ser_fading_gamma(fading, &gamma_s(m, ebn0_dbs)?, modulation, m, quadrature)
}

/// Theoretical SER curve for any supported channel.
pub fn theoretical_ser(
    channel: Channel,
    modulation: Modulation,
    m: usize,
    ebn0_dbs: &[f64],
) -> ModemResult<Vec<f64>> {
    theoretical_ser_with(&Quadrature::default(), channel, modulation, m, ebn0_dbs)
}

pub fn theoretical_ser_with(
    quadrature: &Quadrature,
    channel: Channel,
    modulation: Modulation,
    m: usize,
    ebn0_dbs: &[f64],
) -> ModemResult<Vec<f64>> {
    let sers = match channel {
        Channel::Awgn => ser_awgn_with(quadrature, ebn0_dbs, modulation, m),
        Channel::Rayleigh => ser_rayleigh_with(quadrature, ebn0_dbs, modulation, m),
        Channel::Rician { k_db } => ser_rician_with(quadrature, k_db, ebn0_dbs, modulation, m),
    }?;
    tracing::debug!(%modulation, m, ?channel, points = sers.len(), "theoretical SER curve");
    Ok(sers)
}
