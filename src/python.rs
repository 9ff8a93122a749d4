use ndarray::Ix2;
use num_complex::Complex;
use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1, PyReadonlyArrayDyn};
use pyo3::{
    exceptions::{PyArithmeticError, PyValueError},
    prelude::*,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    channel::{self, Channel},
    link::{simulate_ser as simulate, LinkConfig},
    modem::{Modem, Signal},
    modulation::Modulation,
    ser, ModemError,
};

impl From<ModemError> for PyErr {
    fn from(err: ModemError) -> PyErr {
        if err.is_input_error() {
            PyValueError::new_err(err.to_string())
        } else {
            PyArithmeticError::new_err(err.to_string())
        }
    }
}

fn seeded(seed: Option<u64>) -> StdRng {
    StdRng::seed_from_u64(seed.unwrap_or_else(|| rand::rng().random()))
}

fn parse_channel(name: &str, k_db: Option<f64>) -> Result<Channel, ModemError> {
    match (name.to_lowercase().as_str(), k_db) {
        ("awgn", _) => Ok(Channel::Awgn),
        ("rayleigh", _) => Ok(Channel::Rayleigh),
        ("rician", Some(k_db)) => Ok(Channel::Rician { k_db }),
        ("rician", None) => Err(ModemError::invalid_parameter("rician channel needs k_db")),
        (other, _) => Err(ModemError::invalid_parameter(format!(
            "unknown channel '{}'",
            other
        ))),
    }
}

/// Real (float64) or complex (complex128) samples from numpy.
#[derive(FromPyObject)]
enum Samples<'py> {
    Real(PyReadonlyArray1<'py, f64>),
    Complex(PyReadonlyArrayDyn<'py, Complex<f64>>),
}

fn signal_into_py(py: Python<'_>, signal: Signal) -> Bound<'_, PyAny> {
    match signal {
        Signal::Iq(samples) => samples.into_pyarray(py).into_any(),
        Signal::Real(samples) => samples.into_pyarray(py).into_any(),
        Signal::Orthogonal(rows) => rows.into_pyarray(py).into_any(),
    }
}

/// Constellation points (1-D, real for PAM) or FSK basis rows (2-D) for every symbol index.
#[pyfunction]
#[pyo3(signature = (symbols, mod_type, m, coherence=None))]
fn modulate<'py>(
    py: Python<'py>,
    symbols: Vec<usize>,
    mod_type: &str,
    m: usize,
    coherence: Option<&str>,
) -> PyResult<Bound<'py, PyAny>> {
    let modem = Modem::new(Modulation::from_name(mod_type, coherence)?, m)?;
    Ok(signal_into_py(py, modem.modulate(&symbols)?))
}

#[pyfunction]
#[pyo3(signature = (signal, mod_type, m, coherence=None))]
fn demodulate(
    signal: Samples<'_>,
    mod_type: &str,
    m: usize,
    coherence: Option<&str>,
) -> PyResult<Vec<usize>> {
    let modem = Modem::new(Modulation::from_name(mod_type, coherence)?, m)?;
    let signal = match signal {
        Samples::Real(samples) => {
            return Ok(modem.demodulate(&Signal::Real(samples.as_array().to_vec()))?);
        }
        Samples::Complex(samples) => samples,
    };
    let view = signal.as_array();
    let received = match view.ndim() {
        1 => Signal::Iq(view.iter().copied().collect()),
        2 => Signal::Orthogonal(
            view.to_owned()
                .into_dimensionality::<Ix2>()
                .map_err(|e| ModemError::invalid_parameter(e.to_string()))?,
        ),
        n => {
            return Err(ModemError::invalid_parameter(format!(
                "expected a 1-D or 2-D signal, got {} dimensions",
                n
            ))
            .into());
        }
    };
    Ok(modem.demodulate(&received)?)
}

/// Reference points of a PSK, QAM or PAM constellation.
#[pyfunction]
fn constellation<'py>(
    py: Python<'py>,
    mod_type: &str,
    m: usize,
) -> PyResult<Bound<'py, PyArray1<Complex<f64>>>> {
    let modem = Modem::new(Modulation::from_name(mod_type, None)?, m)?;
    let points = modem
        .constellation()
        .ok_or_else(|| ModemError::invalid_parameter("FSK has no plane constellation"))?;
    Ok(points.to_vec().into_pyarray(py))
}

/// Real inputs get noise on one axis only.
#[pyfunction]
#[pyo3(name = "awgn", signature = (signal, snr_db, oversampling=1, seed=None))]
fn awgn_py<'py>(
    py: Python<'py>,
    signal: Samples<'py>,
    snr_db: f64,
    oversampling: usize,
    seed: Option<u64>,
) -> PyResult<Bound<'py, PyAny>> {
    let mut rng = seeded(seed);
    let noisy = match signal {
        Samples::Real(samples) => Signal::Real(channel::awgn_real(
            &samples.as_array().to_vec(),
            snr_db,
            oversampling,
            &mut rng,
        )?),
        Samples::Complex(samples) => {
            if samples.as_array().ndim() != 1 {
                return Err(ModemError::invalid_parameter("awgn expects a 1-D signal").into());
            }
            let samples: Vec<Complex<f64>> = samples.as_array().iter().copied().collect();
            Signal::Iq(channel::awgn_complex(&samples, snr_db, oversampling, &mut rng)?)
        }
    };
    Ok(signal_into_py(py, noisy))
}

#[pyfunction]
#[pyo3(signature = (n, seed=None))]
fn rayleigh_fading(n: usize, seed: Option<u64>) -> Vec<f64> {
    channel::rayleigh_fading(n, &mut seeded(seed))
}

#[pyfunction]
#[pyo3(signature = (k_db, n, seed=None))]
fn rician_fading(k_db: f64, n: usize, seed: Option<u64>) -> PyResult<Vec<f64>> {
    Ok(channel::rician_fading(k_db, n, &mut seeded(seed))?)
}

#[pyfunction]
#[pyo3(signature = (ebn0_dbs, mod_type, m, coherence=None))]
fn ser_awgn(
    py: Python<'_>,
    ebn0_dbs: Vec<f64>,
    mod_type: &str,
    m: usize,
    coherence: Option<&str>,
) -> PyResult<Vec<f64>> {
    let modulation = Modulation::from_name(mod_type, coherence)?;
    Ok(py.allow_threads(|| ser::ser_awgn(&ebn0_dbs, modulation, m))?)
}

#[pyfunction]
fn ser_rayleigh(py: Python<'_>, ebn0_dbs: Vec<f64>, mod_type: &str, m: usize) -> PyResult<Vec<f64>> {
    let modulation = Modulation::from_name(mod_type, None)?;
    Ok(py.allow_threads(|| ser::ser_rayleigh(&ebn0_dbs, modulation, m))?)
}

#[pyfunction]
fn ser_rician(
    py: Python<'_>,
    k_db: f64,
    ebn0_dbs: Vec<f64>,
    mod_type: &str,
    m: usize,
) -> PyResult<Vec<f64>> {
    let modulation = Modulation::from_name(mod_type, None)?;
    Ok(py.allow_threads(|| ser::ser_rician(k_db, &ebn0_dbs, modulation, m))?)
}

/// Monte-Carlo SER, one value per Eb/N0.
#[pyfunction]
#[pyo3(signature = (
    ebn0_dbs,
    mod_type,
    m,
    coherence=None,
    channel="awgn",
    k_db=None,
    num_symbols=100_000,
    oversampling=1,
    seed=None
))]
#[allow(clippy::too_many_arguments)]
fn simulate_ser(
    py: Python<'_>,
    ebn0_dbs: Vec<f64>,
    mod_type: &str,
    m: usize,
    coherence: Option<&str>,
    channel: &str,
    k_db: Option<f64>,
    num_symbols: usize,
    oversampling: usize,
    seed: Option<u64>,
) -> PyResult<Vec<f64>> {
    let mut config = LinkConfig::new(Modulation::from_name(mod_type, coherence)?, m)
        .with_channel(parse_channel(channel, k_db)?)
        .with_ebn0_dbs(ebn0_dbs)
        .with_num_symbols(num_symbols)
        .with_oversampling(oversampling);
    config.seed = seed;

    let curve = py.allow_threads(|| simulate(&config))?;
    Ok(curve.sers)
}

#[pymodule]
#[pyo3(name = "simbolo")]
fn module_with_functions(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(modulate, m)?)?;
    m.add_function(wrap_pyfunction!(demodulate, m)?)?;
    m.add_function(wrap_pyfunction!(constellation, m)?)?;
    m.add_function(wrap_pyfunction!(awgn_py, m)?)?;
    m.add_function(wrap_pyfunction!(rayleigh_fading, m)?)?;
    m.add_function(wrap_pyfunction!(rician_fading, m)?)?;
    m.add_function(wrap_pyfunction!(ser_awgn, m)?)?;
    m.add_function(wrap_pyfunction!(ser_rayleigh, m)?)?;
    m.add_function(wrap_pyfunction!(ser_rician, m)?)?;
    m.add_function(wrap_pyfunction!(simulate_ser, m)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names() {
        assert_eq!(parse_channel("AWGN", None).unwrap(), Channel::Awgn);
        assert_eq!(parse_channel("rayleigh", Some(3f64)).unwrap(), Channel::Rayleigh);
        assert_eq!(
            parse_channel("Rician", Some(6f64)).unwrap(),
            Channel::Rician { k_db: 6f64 }
        );
        assert!(parse_channel("rician", None).is_err());
        assert!(parse_channel("nakagami", None).is_err());
    }

    #[test]
    fn seeded_generators_repeat() {
        let a: u64 = seeded(Some(9)).random();
        let b: u64 = seeded(Some(9)).random();
        assert_eq!(a, b);
    }
}
