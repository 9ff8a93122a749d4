use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    channel::{apply_fading, equalize, Channel},
    db,
    error::{ModemError, ModemResult},
    modem::Modem,
    modulation::{bits_per_symbol, Modulation},
    quad::Quadrature,
    random_symbols,
    ser::theoretical_ser_with,
};

/// Everything a Monte-Carlo sweep needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub modulation: Modulation,
    pub m: usize,
    pub channel: Channel,
    /// Symbols drawn per operating point.
    pub num_symbols: usize,
    pub ebn0_dbs: Vec<f64>,
    /// Samples per symbol assumed by the AWGN power estimate.
    pub oversampling: usize,
    pub seed: Option<u64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            modulation: Modulation::Psk,
            m: 4,
            channel: Channel::Awgn,
            num_symbols: 100_000,
            ebn0_dbs: (0..=5).map(|i| 2f64 * i as f64).collect(),
            oversampling: 1,
            seed: None,
        }
    }
}

impl LinkConfig {
    pub fn new(modulation: Modulation, m: usize) -> Self {
        Self {
            modulation,
            m,
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_num_symbols(mut self, num_symbols: usize) -> Self {
        self.num_symbols = num_symbols;
        self
    }

    pub fn with_ebn0_dbs<I: IntoIterator<Item = f64>>(mut self, ebn0_dbs: I) -> Self {
        self.ebn0_dbs = ebn0_dbs.into_iter().collect();
        self
    }

    pub fn with_oversampling(mut self, oversampling: usize) -> Self {
        self.oversampling = oversampling;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> ModemResult<()> {
        self.modulation.validate_order(self.m)?;
        self.channel.validate()?;
        if self.num_symbols == 0 {
            return Err(ModemError::invalid_parameter("num_symbols must be positive"));
        }
        if self.ebn0_dbs.is_empty() {
            return Err(ModemError::invalid_parameter("Eb/N0 sweep is empty"));
        }
        if self.ebn0_dbs.iter().any(|e| e.is_nan()) {
            return Err(ModemError::invalid_parameter("Eb/N0 must not be NaN"));
        }
        if self.oversampling == 0 {
            return Err(ModemError::invalid_parameter("oversampling factor must be at least 1"));
        }
        Ok(())
    }
}

/// SER per Eb/N0 (dB), in sweep order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerCurve {
    pub ebn0_dbs: Vec<f64>,
    pub sers: Vec<f64>,
}

impl SerCurve {
    pub fn len(&self) -> usize {
        self.sers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sers.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.ebn0_dbs.iter().copied().zip(self.sers.iter().copied())
    }
}

/// Symbol errors out of `num_symbols` at one Eb/N0.
pub fn count_symbol_errors<R: Rng + ?Sized>(
    modem: &Modem,
    channel: &Channel,
    num_symbols: usize,
    ebn0_db: f64,
    oversampling: usize,
    rng: &mut R,
) -> ModemResult<usize> {
    let esn0_db = ebn0_db + db(modem.bits_per_symbol() as f64);

    let data = random_symbols(modem.order(), num_symbols, rng);
    let tx = modem.modulate(&data)?;

    let rx = match channel.fading(tx.len(), rng)? {
        Some(h) => {
            let faded = apply_fading(&tx, &h)?.with_awgn(esn0_db, oversampling, rng)?;
            equalize(&faded, &h)?
        }
        None => tx.with_awgn(esn0_db, oversampling, rng)?,
    };

    let detected = modem.demodulate(&rx)?;
    Ok(data
        .iter()
        .zip(detected.iter())
        .filter(|(sent, got)| sent != got)
        .count())
}

/// Empirical SER curve for `config`.
pub fn simulate_ser(config: &LinkConfig) -> ModemResult<SerCurve> {
    config.validate()?;
    let modem = Modem::new(config.modulation, config.m)?;
    let seed = config.seed.unwrap_or_else(|| rand::rng().random());

    let sers = config
        .ebn0_dbs
        .par_iter()
        .enumerate()
        .map(|(index, &ebn0_db)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
            let errors = count_symbol_errors(
                &modem,
                &config.channel,
                config.num_symbols,
                ebn0_db,
                config.oversampling,
                &mut rng,
            )?;
            let ser = errors as f64 / config.num_symbols as f64;

            tracing::debug!(
                modulation = %config.modulation,
                m = config.m,
                ebn0_db,
                esn0_db = ebn0_db + db(bits_per_symbol(config.m) as f64),
                errors,
                ser,
                "simulated operating point"
            );
            Ok(ser)
        })
        .collect::<ModemResult<Vec<f64>>>()?;

    Ok(SerCurve {
        ebn0_dbs: config.ebn0_dbs.clone(),
        sers,
    })
}

/// Theoretical SER over the same sweep as `config`.
pub fn theoretical_curve(config: &LinkConfig) -> ModemResult<SerCurve> {
    theoretical_curve_with(&Quadrature::default(), config)
}

pub fn theoretical_curve_with(
    quadrature: &Quadrature,
    config: &LinkConfig,
) -> ModemResult<SerCurve> {
    config.validate()?;
    let sers = theoretical_ser_with(
        quadrature,
        config.channel,
        config.modulation,
        config.m,
        &config.ebn0_dbs,
    )?;
    Ok(SerCurve {
        ebn0_dbs: config.ebn0_dbs.clone(),
        sers,
    })
}
