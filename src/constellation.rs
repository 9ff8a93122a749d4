use std::f64::consts::PI;

use itertools::Itertools;
use ndarray::Array2;
use num::Zero;
use num_complex::Complex;

use crate::{
    avg_energy,
    error::ModemResult,
    linspace,
    modulation::{check_order, check_square_order, Modulation},
};

/// Reference symbol set of a modem. Index `i` of the alphabet maps to exactly one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constellation {
    /// Points in the IQ plane (PSK, QAM, PAM).
    Points(Vec<Complex<f64>>),
    /// `M` mutually orthogonal basis signals, one per row (FSK).
    Orthogonal(Array2<Complex<f64>>),
}

impl Constellation {
    pub fn new(modulation: Modulation, m: usize) -> ModemResult<Self> {
        Ok(match modulation {
            Modulation::Psk => Constellation::Points(psk_symbols(m)?),
            Modulation::Qam => Constellation::Points(qam_symbols(m)?),
            Modulation::Pam => Constellation::Points(pam_symbols(m)?),
            Modulation::Fsk(_) => Constellation::Orthogonal(fsk_basis(m)?),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            Constellation::Points(points) => points.len(),
            Constellation::Orthogonal(basis) => basis.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn points(&self) -> Option<&[Complex<f64>]> {
        match self {
            Constellation::Points(points) => Some(points),
            Constellation::Orthogonal(_) => None,
        }
    }

    /// Average energy per symbol.
    pub fn energy(&self) -> f64 {
        match self {
            Constellation::Points(points) => avg_energy(points),
            Constellation::Orthogonal(basis) => {
                basis.iter().map(|s_i| s_i.norm_sqr()).sum::<f64>() / basis.nrows() as f64
            }
        }
    }
}

/// `M` unit-energy points evenly spaced on the unit circle, point `k` at `2πk/M`.
pub fn psk_symbols(m: usize) -> ModemResult<Vec<Complex<f64>>> {
    check_order(m)?;
    Ok((0..m)
        .map(|k| Complex::from_polar(1f64, 2f64 * PI * k as f64 / m as f64))
        .collect())
}

/// Gray-mapped square QAM, normalised to unit average energy.
///
/// The grid columns are walked in a snake (down the even columns, up the odd ones)
/// and position `k` of the walk receives the label `k ^ (k >> 1)`. Horizontally and
/// vertically adjacent points therefore differ in exactly one bit.
pub fn qam_symbols(m: usize) -> ModemResult<Vec<Complex<f64>>> {
    check_square_order(m)?;

    let n = 1usize << (m.trailing_zeros() / 2);
    let edge = (n - 1) as f64;
    let levels: Vec<f64> = linspace(-edge, edge, n).collect();
    let scale = (2f64 * (m as f64 - 1f64) / 3f64).sqrt();

    let mut symbols = vec![Complex::zero(); m];
    for k in 0..m {
        let (col, row) = (k / n, k % n);
        let im = if col % 2 == 0 {
            levels[n - 1 - row]
        } else {
            levels[row]
        };
        symbols[gray(k)] = Complex::new(levels[col], im) / scale;
    }
    Ok(symbols)
}

/// `M` equally spaced real levels centred on zero, unit average energy.
pub fn pam_symbols(m: usize) -> ModemResult<Vec<Complex<f64>>> {
    check_order(m)?;
    let scale = ((m * m - 1) as f64 / 3f64).sqrt();
    Ok((0..m)
        .map(|i| Complex::new((2 * i + 1) as f64 - m as f64, 0f64) / scale)
        .collect())
}

/// Unit-energy orthogonal tones: row `i` is the `i`-th basis vector.
pub fn fsk_basis(m: usize) -> ModemResult<Array2<Complex<f64>>> {
    check_order(m)?;
    Ok(Array2::from_shape_fn((m, m), |(i, j)| {
        if i == j {
            Complex::new(1f64, 0f64)
        } else {
            Complex::zero()
        }
    }))
}

/// Smallest distance between any two points.
pub fn min_distance(points: &[Complex<f64>]) -> f64 {
    points
        .iter()
        .tuple_combinations()
        .map(|(&a, &b)| (a - b).norm())
        .fold(f64::INFINITY, f64::min)
}

#[inline]
fn gray(k: usize) -> usize {
    k ^ (k >> 1)
}
