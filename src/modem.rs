use ndarray::{Array2, ArrayView1, Axis};
use num_complex::Complex;

use crate::{
    constellation::{min_distance, Constellation},
    error::{ModemError, ModemResult},
    modulation::{bits_per_symbol, Coherence, Modulation},
};

/// Modulated (or received) symbols.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// One IQ sample per symbol.
    Iq(Vec<Complex<f64>>),
    /// One real amplitude per symbol (PAM).
    Real(Vec<f64>),
    /// One row per symbol, one column per orthogonal tone.
    Orthogonal(Array2<Complex<f64>>),
}

impl Signal {
    /// Number of symbols carried.
    pub fn len(&self) -> usize {
        match self {
            Signal::Iq(samples) => samples.len(),
            Signal::Real(samples) => samples.len(),
            Signal::Orthogonal(rows) => rows.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Average energy per symbol.
    pub fn energy(&self) -> f64 {
        if self.is_empty() {
            return 0f64;
        }
        let total: f64 = match self {
            Signal::Iq(samples) => samples.iter().map(|s_i| s_i.norm_sqr()).sum(),
            Signal::Real(samples) => samples.iter().map(|s_i| s_i.powi(2)).sum(),
            Signal::Orthogonal(rows) => rows.iter().map(|s_i| s_i.norm_sqr()).sum(),
        };
        total / self.len() as f64
    }
}

/// A modulator/detector pair for one modulation family and order.
#[derive(Debug, Clone)]
pub struct Modem {
    modulation: Modulation,
    m: usize,
    constellation: Constellation,
    // Half the smallest separation between two points.
    decision_radius: f64,
}

impl Modem {
    pub fn new(modulation: Modulation, m: usize) -> ModemResult<Self> {
        modulation.validate_order(m)?;
        let constellation = Constellation::new(modulation, m)?;
        let decision_radius = constellation
            .points()
            .map(|points| min_distance(points) / 2f64)
            .unwrap_or(0f64);

        Ok(Self {
            modulation,
            m,
            constellation,
            decision_radius,
        })
    }

    pub fn psk(m: usize) -> ModemResult<Self> {
        Self::new(Modulation::Psk, m)
    }

    pub fn qam(m: usize) -> ModemResult<Self> {
        Self::new(Modulation::Qam, m)
    }

    pub fn pam(m: usize) -> ModemResult<Self> {
        Self::new(Modulation::Pam, m)
    }

    pub fn fsk(m: usize, coherence: Coherence) -> ModemResult<Self> {
        Self::new(Modulation::Fsk(coherence), m)
    }

    pub fn modulation(&self) -> Modulation {
        self.modulation
    }

    pub fn order(&self) -> usize {
        self.m
    }

    pub fn bits_per_symbol(&self) -> usize {
        bits_per_symbol(self.m)
    }

    /// Reference points in the IQ plane. `None` for FSK.
    pub fn constellation(&self) -> Option<&[Complex<f64>]> {
        self.constellation.points()
    }

    pub fn reference(&self) -> &Constellation {
        &self.constellation
    }

    /// Binary label of every symbol, most significant bit first.
    pub fn symbol_labels(&self) -> Vec<String> {
        let width = self.bits_per_symbol();
        (0..self.m).map(|i| format!("{:0width$b}", i, width = width)).collect()
    }

    /// Map every symbol index onto its constellation point (or basis signal).
    pub fn modulate(&self, symbols: &[usize]) -> ModemResult<Signal> {
        if let Some(&index) = symbols.iter().find(|&&s_i| s_i >= self.m) {
            return Err(ModemError::OutOfRange { index, m: self.m });
        }

        Ok(match &self.constellation {
            Constellation::Points(points) if self.modulation == Modulation::Pam => {
                Signal::Real(symbols.iter().map(|&s_i| points[s_i].re).collect())
            }
            Constellation::Points(points) => {
                Signal::Iq(symbols.iter().map(|&s_i| points[s_i]).collect())
            }
            Constellation::Orthogonal(basis) => Signal::Orthogonal(basis.select(Axis(0), symbols)),
        })
    }

    /// Minimum-distance detection for IQ families, maximum correlation for FSK.
    /// Ties go to the lowest index.
    pub fn demodulate(&self, received: &Signal) -> ModemResult<Vec<usize>> {
        match (self.modulation, &self.constellation, received) {
            (_, Constellation::Points(points), Signal::Iq(samples)) => Ok(samples
                .iter()
                .map(|&sample| nearest_symbol(sample, points, self.decision_radius))
                .collect()),
            (Modulation::Pam, Constellation::Points(points), Signal::Real(samples)) => Ok(samples
                .iter()
                .map(|&sample| {
                    nearest_symbol(Complex::new(sample, 0f64), points, self.decision_radius)
                })
                .collect()),
            (Modulation::Fsk(coherence), Constellation::Orthogonal(basis), Signal::Orthogonal(rows)) => {
                if rows.ncols() != self.m {
                    return Err(ModemError::invalid_parameter(format!(
                        "expected {} FSK tones per symbol, got {}",
                        self.m,
                        rows.ncols()
                    )));
                }
                let correlations = rows.dot(&basis.t().mapv(|b| b.conj()));
                Ok(correlations
                    .axis_iter(Axis(0))
                    .map(|row| strongest_tone(row, coherence))
                    .collect())
            }
            _ => Err(ModemError::invalid_parameter(format!(
                "signal shape does not match a {} modem",
                self.modulation
            ))),
        }
    }
}

fn nearest_symbol(received_symbol: Complex<f64>, symbols: &[Complex<f64>], radius: f64) -> usize {
    let mut smallest_distance = f64::MAX;
    let mut best_index = 0;

    for (index, &symbol) in symbols.iter().enumerate() {
        let distance = (received_symbol - symbol).norm();

        if distance < radius {
            // No other point can be closer.
            return index;
        } else if distance < smallest_distance {
            smallest_distance = distance;
            best_index = index;
        }
    }
    best_index
}

fn strongest_tone(correlations: ArrayView1<'_, Complex<f64>>, coherence: Coherence) -> usize {
    let metric = |c: &Complex<f64>| match coherence {
        Coherence::Coherent => c.re,
        Coherence::Noncoherent => c.norm(),
    };

    let mut best_index = 0;
    let mut best_metric = f64::NEG_INFINITY;
    for (index, c) in correlations.iter().enumerate() {
        let value = metric(c);
        if value > best_metric {
            best_metric = value;
            best_index = index;
        }
    }
    best_index
}
