use ndarray::{Array2, Axis, Zip};
use num_complex::Complex;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ModemError, ModemResult},
    modem::Signal,
    undb,
};

/// Channel impairment applied between modulator and detector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Additive white Gaussian noise only.
    #[default]
    Awgn,
    /// Rayleigh flat fading followed by AWGN.
    Rayleigh,
    /// Rician flat fading with the given K-factor (dB) followed by AWGN.
    Rician { k_db: f64 },
}

impl Channel {
    pub fn is_faded(&self) -> bool {
        !matches!(self, Channel::Awgn)
    }

    pub fn validate(&self) -> ModemResult<()> {
        match self {
            Channel::Rician { k_db } => check_k_factor(*k_db),
            _ => Ok(()),
        }
    }

    /// Envelope samples for `n` symbols, or `None` when the channel does not fade.
    pub fn fading<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> ModemResult<Option<Vec<f64>>> {
        Ok(match self {
            Channel::Awgn => None,
            Channel::Rayleigh => Some(rayleigh_fading(n, rng)),
            Channel::Rician { k_db } => Some(rician_fading(*k_db, n, rng)?),
        })
    }
}

fn check_snr(snr_db: f64, oversampling: usize) -> ModemResult<()> {
    if snr_db.is_nan() {
        return Err(ModemError::invalid_parameter("SNR must not be NaN"));
    }
    if oversampling == 0 {
        return Err(ModemError::invalid_parameter(
            "oversampling factor must be at least 1",
        ));
    }
    Ok(())
}

pub(crate) fn check_k_factor(k_db: f64) -> ModemResult<()> {
    if k_db.is_nan() || k_db == f64::INFINITY {
        return Err(ModemError::invalid_parameter(format!(
            "Rician K-factor must be finite or -inf dB, got {}",
            k_db
        )));
    }
    Ok(())
}

/// Noise spectral density `N0 = P / γ` for a measured power `P`.
#[inline]
pub fn noise_density(power: f64, snr_db: f64) -> f64 {
    power / undb(snr_db)
}

#[inline]
fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.sample(StandardNormal)
}

#[inline]
fn complex_gaussian<R: Rng + ?Sized>(rng: &mut R) -> Complex<f64> {
    Complex::new(gaussian(rng), gaussian(rng))
}

/// Add complex AWGN so the received SNR is `snr_db` with respect to the measured
/// signal power (times the oversampling factor).
pub fn awgn_complex<R: Rng + ?Sized>(
    signal: &[Complex<f64>],
    snr_db: f64,
    oversampling: usize,
    rng: &mut R,
) -> ModemResult<Vec<Complex<f64>>> {
    check_snr(snr_db, oversampling)?;
    if signal.is_empty() {
        return Ok(Vec::new());
    }
    let power = oversampling as f64 * signal.iter().map(|s_i| s_i.norm_sqr()).sum::<f64>()
        / signal.len() as f64;
    let sigma = (noise_density(power, snr_db) / 2f64).sqrt();

    Ok(signal
        .iter()
        .map(|&s_i| s_i + complex_gaussian(rng) * sigma)
        .collect())
}

/// Real-valued counterpart of [`awgn_complex`]: one noise dimension only.
pub fn awgn_real<R: Rng + ?Sized>(
    signal: &[f64],
    snr_db: f64,
    oversampling: usize,
    rng: &mut R,
) -> ModemResult<Vec<f64>> {
    check_snr(snr_db, oversampling)?;
    if signal.is_empty() {
        return Ok(Vec::new());
    }
    let power =
        oversampling as f64 * signal.iter().map(|s_i| s_i.powi(2)).sum::<f64>() / signal.len() as f64;
    let sigma = (noise_density(power, snr_db) / 2f64).sqrt();

    Ok(signal.iter().map(|&s_i| s_i + gaussian(rng) * sigma).collect())
}

/// AWGN for multi-dimensional symbols (one row per symbol). The signal power is
/// the energy per row, so every tone of every symbol gets noise of variance `N0/2`
/// per real dimension.
pub fn awgn_orthogonal<R: Rng + ?Sized>(
    signal: &Array2<Complex<f64>>,
    snr_db: f64,
    oversampling: usize,
    rng: &mut R,
) -> ModemResult<Array2<Complex<f64>>> {
    check_snr(snr_db, oversampling)?;
    if signal.nrows() == 0 {
        return Ok(signal.clone());
    }
    let power = oversampling as f64 * signal.iter().map(|s_i| s_i.norm_sqr()).sum::<f64>()
        / signal.nrows() as f64;
    let sigma = (noise_density(power, snr_db) / 2f64).sqrt();

    Ok(signal.mapv(|s_i| s_i + complex_gaussian(rng) * sigma))
}

impl Signal {
    /// This signal after an AWGN channel at `snr_db`.
    pub fn with_awgn<R: Rng + ?Sized>(
        &self,
        snr_db: f64,
        oversampling: usize,
        rng: &mut R,
    ) -> ModemResult<Signal> {
        Ok(match self {
            Signal::Iq(samples) => Signal::Iq(awgn_complex(samples, snr_db, oversampling, rng)?),
            Signal::Real(samples) => Signal::Real(awgn_real(samples, snr_db, oversampling, rng)?),
            Signal::Orthogonal(rows) => {
                Signal::Orthogonal(awgn_orthogonal(rows, snr_db, oversampling, rng)?)
            }
        })
    }
}

/// `n` i.i.d. Rayleigh envelopes with unit mean-square value.
pub fn rayleigh_fading<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    let sigma = 0.5f64.sqrt();
    (0..n).map(|_| (complex_gaussian(rng) * sigma).norm()).collect()
}

/// `n` i.i.d. Rician envelopes with unit mean-square value.
///
/// The line-of-sight part carries `K / (K + 1)` of the power, split equally between
/// I and Q, the scattered part the remaining `1 / (K + 1)`.
pub fn rician_fading<R: Rng + ?Sized>(k_db: f64, n: usize, rng: &mut R) -> ModemResult<Vec<f64>> {
    check_k_factor(k_db)?;
    let k = undb(k_db);
    let mu = (k / (2f64 * (k + 1f64))).sqrt();
    let sigma = (1f64 / (2f64 * (k + 1f64))).sqrt();
    let los = Complex::new(mu, mu);

    Ok((0..n)
        .map(|_| (complex_gaussian(rng) * sigma + los).norm())
        .collect())
}

fn check_lengths(signal: &Signal, h: &[f64]) -> ModemResult<()> {
    if signal.len() != h.len() {
        return Err(ModemError::invalid_parameter(format!(
            "{} fading samples for {} symbols",
            h.len(),
            signal.len()
        )));
    }
    Ok(())
}

fn scale_symbols(
    signal: &Signal,
    h: &[f64],
    f: impl Fn(Complex<f64>, f64) -> Complex<f64>,
) -> Signal {
    match signal {
        Signal::Iq(samples) => Signal::Iq(
            samples
                .iter()
                .zip(h.iter())
                .map(|(&s_i, &h_i)| f(s_i, h_i))
                .collect(),
        ),
        Signal::Real(samples) => Signal::Real(
            samples
                .iter()
                .zip(h.iter())
                .map(|(&s_i, &h_i)| f(Complex::new(s_i, 0f64), h_i).re)
                .collect(),
        ),
        Signal::Orthogonal(rows) => {
            let mut out = rows.clone();
            Zip::from(out.axis_iter_mut(Axis(0)))
                .and(h)
                .for_each(|mut row, &h_i| row.mapv_inplace(|s_i| f(s_i, h_i)));
            Signal::Orthogonal(out)
        }
    }
}

/// Multiply every symbol by its fading envelope.
pub fn apply_fading(signal: &Signal, h: &[f64]) -> ModemResult<Signal> {
    check_lengths(signal, h)?;
    Ok(scale_symbols(signal, h, |s_i, h_i| s_i * h_i))
}

/// Ideal channel-state equalisation: divide every symbol by its known envelope.
pub fn equalize(signal: &Signal, h: &[f64]) -> ModemResult<Signal> {
    check_lengths(signal, h)?;
    Ok(scale_symbols(signal, h, |s_i, h_i| s_i / h_i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, Modem};
    use crate::modulation::Coherence;
    use assert_approx_eq::assert_approx_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use rstest::rstest;

    fn measured_snr_db(clean: &[Complex<f64>], noisy: &[Complex<f64>]) -> f64 {
        let signal: f64 = clean.iter().map(|s_i| s_i.norm_sqr()).sum();
        let noise: f64 = clean
            .iter()
            .zip(noisy.iter())
            .map(|(&c, &n)| (n - c).norm_sqr())
            .sum();
        db(signal / noise)
    }

    #[rstest]
    #[case(-5f64)]
    #[case(0f64)]
    #[case(12f64)]
    fn awgn_hits_target_snr(#[case] snr_db: f64) {
        let mut rng = StdRng::seed_from_u64(11);
        // Deliberately not unit power.
        let tx: Vec<Complex<f64>> = (0..200_000)
            .map(|i| Complex::new(3f64 * (i % 3) as f64, -2f64))
            .collect();
        let rx = awgn_complex(&tx, snr_db, 1, &mut rng).unwrap();
        assert_approx_eq!(measured_snr_db(&tx, &rx), snr_db, 0.05);
    }

    #[test]
    fn awgn_oversampling_raises_noise() {
        let mut rng = StdRng::seed_from_u64(5);
        let tx = vec![Complex::new(1f64, 0f64); 200_000];
        let rx = awgn_complex(&tx, 10f64, 4, &mut rng).unwrap();
        assert_approx_eq!(measured_snr_db(&tx, &rx), 10f64 - db(4f64), 0.05);
    }

    #[test]
    fn real_noise_stays_real() {
        let mut rng = StdRng::seed_from_u64(3);
        let tx = vec![1f64; 200_000];
        let rx = awgn_real(&tx, 3f64, 1, &mut rng).unwrap();
        let noise: f64 =
            tx.iter().zip(rx.iter()).map(|(t, r)| (r - t).powi(2)).sum::<f64>() / tx.len() as f64;
        // One dimension carries N0 / 2.
        assert_approx_eq!(noise, 0.5 / undb(3f64), 0.01);
    }

    #[test]
    fn pam_noise_stays_on_the_real_axis() {
        let mut rng = StdRng::seed_from_u64(17);
        let modem = Modem::pam(4).unwrap();
        let symbols = crate::random_symbols(4, 200_000, &mut rng);
        let tx = modem.modulate(&symbols).unwrap();

        let Signal::Real(rx) = tx.with_awgn(0f64, 1, &mut rng).unwrap() else {
            panic!("AWGN changed the PAM signal kind");
        };
        let Signal::Real(clean) = &tx else {
            panic!("PAM must produce a real signal");
        };
        let noise =
            clean.iter().zip(rx.iter()).map(|(t, r)| (r - t).powi(2)).sum::<f64>() / rx.len() as f64;
        // Unit-energy levels at 0 dB: N0 / 2 in the only dimension.
        assert_approx_eq!(noise, 0.5, 0.01);

        let h = rayleigh_fading(tx.len(), &mut rng);
        let faded = apply_fading(&tx, &h).unwrap();
        assert!(matches!(faded, Signal::Real(_)));
        assert_eq!(modem.demodulate(&equalize(&faded, &h).unwrap()).unwrap(), symbols);
    }

    #[test]
    fn orthogonal_noise_per_tone() {
        let mut rng = StdRng::seed_from_u64(9);
        let modem = Modem::fsk(4, Coherence::Coherent).unwrap();
        let symbols = crate::random_symbols(4, 50_000, &mut rng);
        let Signal::Orthogonal(tx) = modem.modulate(&symbols).unwrap() else {
            panic!("FSK must produce orthogonal symbols");
        };
        let rx = awgn_orthogonal(&tx, 0f64, 1, &mut rng).unwrap();
        let noise = (&rx - &tx).iter().map(|n| n.norm_sqr()).sum::<f64>() / tx.len() as f64;
        // N0 = 1 at 0 dB, split over two real dimensions.
        assert_approx_eq!(noise, 1f64, 0.02);
    }

    #[test]
    fn awgn_rejects_bad_arguments() {
        let mut rng = StdRng::seed_from_u64(0);
        let tx = vec![Complex::new(1f64, 0f64); 4];
        assert!(awgn_complex(&tx, f64::NAN, 1, &mut rng).is_err());
        assert!(awgn_complex(&tx, 3f64, 0, &mut rng).is_err());
        assert!(awgn_complex(&[], 3f64, 1, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn fading_length_mismatch() {
        let tx = Signal::Iq(vec![Complex::new(1f64, 0f64); 3]);
        assert!(matches!(
            apply_fading(&tx, &[1f64, 2f64]),
            Err(ModemError::InvalidParameter(_))
        ));
        assert!(equalize(&tx, &[1f64; 4]).is_err());
    }

    #[test]
    fn equalize_undoes_fading() {
        let mut rng = StdRng::seed_from_u64(21);
        let modem = Modem::fsk(8, Coherence::Noncoherent).unwrap();
        let symbols = crate::random_symbols(8, 100, &mut rng);
        let tx = modem.modulate(&symbols).unwrap();
        let h = rician_fading(6f64, tx.len(), &mut rng).unwrap();

        let faded = apply_fading(&tx, &h).unwrap();
        let Signal::Orthogonal(rows) = &faded else {
            panic!("fading changed the signal kind");
        };
        assert_approx_eq!(rows[[0, symbols[0]]].re, h[0]);

        let Signal::Orthogonal(back) = equalize(&faded, &h).unwrap() else {
            panic!("equalisation changed the signal kind");
        };
        let Signal::Orthogonal(orig) = &tx else { unreachable!() };
        for (a, b) in back.iter().zip(orig.iter()) {
            assert_approx_eq!(a.re, b.re, 1e-12);
        }
    }

    #[test]
    fn rician_rejects_bad_k() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(rician_fading(f64::NAN, 1, &mut rng).is_err());
        assert!(rician_fading(f64::INFINITY, 1, &mut rng).is_err());
        assert!(rician_fading(f64::NEG_INFINITY, 1, &mut rng).is_ok());
        assert!(Channel::Rician { k_db: f64::NAN }.validate().is_err());
    }

    #[test]
    fn awgn_channel_does_not_fade() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(Channel::Awgn.fading(10, &mut rng).unwrap().is_none());
        assert_eq!(Channel::Rayleigh.fading(10, &mut rng).unwrap().unwrap().len(), 10);
    }
}
