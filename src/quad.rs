use serde::{Deserialize, Serialize};

use crate::error::{ModemError, ModemResult};

// Kronrod abscissae on [0, 1]; odd entries are shared with the Gauss rule.
const XGK: [f64; 8] = [
    0.991455371120812639206854697526329,
    0.949107912342758524526189684047851,
    0.864864423359769072789712788640926,
    0.741531185599394439863864773280788,
    0.586087235467691130294144845693013,
    0.405845151377397166906606412076961,
    0.207784955007898467600689403773245,
    0.000000000000000000000000000000000,
];

const WGK: [f64; 8] = [
    0.022935322010529224963732008058970,
    0.063092092629978553290700663189204,
    0.104790010322250183839876322541518,
    0.140653259715525918745189590510238,
    0.169004726639267902826583426598550,
    0.190350578064785409913256402421014,
    0.204432940075298892414161999234649,
    0.209482141084727828012999174891714,
];

const WG: [f64; 4] = [
    0.129484966168869693270611432679082,
    0.279705391489276667901467771423780,
    0.381830050505118944950369775488975,
    0.417959183673469387755102040816327,
];

/// Tolerances and subinterval budget of the integrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrature {
    /// Absolute error tolerance.
    pub epsabs: f64,
    /// Relative error tolerance.
    pub epsrel: f64,
    /// Maximum number of subintervals.
    pub limit: usize,
}

impl Default for Quadrature {
    fn default() -> Self {
        Self {
            epsabs: 1e-13,
            epsrel: 1.49e-8,
            limit: 200,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

impl Segment {
    fn new<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> Self {
        let (value, error) = gauss_kronrod(f, a, b);
        Self { a, b, value, error }
    }
}

fn gauss_kronrod<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> (f64, f64) {
    let center = 0.5 * (a + b);
    let half = 0.5 * (b - a);

    let f_center = f(center);
    let mut kronrod = f_center * WGK[7];
    let mut gauss = f_center * WG[3];

    for (j, (&x, &w)) in XGK.iter().zip(WGK.iter()).take(7).enumerate() {
        let dx = half * x;
        let pair = f(center - dx) + f(center + dx);
        kronrod += w * pair;
        if j % 2 == 1 {
            gauss += WG[j / 2] * pair;
        }
    }

    (kronrod * half, ((kronrod - gauss) * half).abs())
}

impl Quadrature {
    pub fn new(epsabs: f64, epsrel: f64, limit: usize) -> Self {
        Self {
            epsabs,
            epsrel,
            limit,
        }
    }

    /// `∫_a^b f(x) dx`. Either bound may be infinite.
    pub fn integrate<F: Fn(f64) -> f64>(&self, f: F, a: f64, b: f64) -> ModemResult<f64> {
        if a.is_nan() || b.is_nan() {
            return Err(ModemError::invalid_parameter("integration bounds must not be NaN"));
        }
        if a == b {
            return Ok(0f64);
        }
        if a > b {
            return Ok(-self.integrate(f, b, a)?);
        }

        match (a.is_finite(), b.is_finite()) {
            (true, true) => self.adaptive(&f, a, b, (a, b)),
            // x = a + t / (1 - t)
            (true, false) => self.adaptive(
                &|t: f64| {
                    let s = 1f64 - t;
                    weighted(&f, a + t / s, 1f64 / (s * s))
                },
                0f64,
                1f64,
                (a, b),
            ),
            // x = b - t / (1 - t)
            (false, true) => self.adaptive(
                &|t: f64| {
                    let s = 1f64 - t;
                    weighted(&f, b - t / s, 1f64 / (s * s))
                },
                0f64,
                1f64,
                (a, b),
            ),
            // x = t / (1 - t^2)
            (false, false) => self.adaptive(
                &|t: f64| {
                    let s = 1f64 - t * t;
                    weighted(&f, t / s, (1f64 + t * t) / (s * s))
                },
                -1f64,
                1f64,
                (a, b),
            ),
        }
    }

    fn adaptive<F: Fn(f64) -> f64>(
        &self,
        f: &F,
        a: f64,
        b: f64,
        bounds: (f64, f64),
    ) -> ModemResult<f64> {
        let mut segments = vec![Segment::new(f, a, b)];

        loop {
            let value: f64 = segments.iter().map(|s| s.value).sum();
            let error: f64 = segments.iter().map(|s| s.error).sum();

            if error <= self.epsabs.max(self.epsrel * value.abs()) {
                return Ok(value);
            }

            let worst = segments
                .iter()
                .enumerate()
                .max_by(|(_, x), (_, y)| x.error.total_cmp(&y.error))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let Segment { a: lo, b: hi, .. } = segments[worst];
            let mid = 0.5 * (lo + hi);

            if segments.len() >= self.limit || !(lo < mid && mid < hi) {
                return Err(ModemError::NumericIntegration {
                    lower: bounds.0,
                    upper: bounds.1,
                    abs_error: error,
                    subintervals: segments.len(),
                });
            }

            tracing::trace!(lo, hi, error, "bisecting subinterval");
            segments.swap_remove(worst);
            segments.push(Segment::new(f, lo, mid));
            segments.push(Segment::new(f, mid, hi));
        }
    }
}

#[inline]
fn weighted<F: Fn(f64) -> f64>(f: &F, x: f64, jacobian: f64) -> f64 {
    if !x.is_finite() {
        return 0f64;
    }
    let y = f(x);
    if y == 0f64 { 0f64 } else { y * jacobian }
}

/// `∫_a^b f(x) dx` with the default tolerances.
pub fn quad<F: Fn(f64) -> f64>(f: F, a: f64, b: f64) -> ModemResult<f64> {
    Quadrature::default().integrate(f, a, b)
}
