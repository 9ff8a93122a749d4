//! Error types

use thiserror::Error;

/// Result type for modem and error-rate operations
pub type ModemResult<T> = Result<T, ModemError>;

/// Errors raised at the boundary of a modem, channel or analysis operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModemError {
    /// Modulation order is unusable for the requested family
    #[error("Invalid modulation order M={m}: {reason}")]
    InvalidOrder { m: usize, reason: &'static str },

    /// Unknown modulation name, bad FSK coherence, mismatched lengths, ...
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Symbol index outside the alphabet `[0, M-1]`
    #[error("Symbol index {index} is outside the range 0 to {}", m - 1)]
    OutOfRange { index: usize, m: usize },

    /// Adaptive quadrature ran out of subintervals before meeting its tolerance
    #[error(
        "Numerical integration over [{lower}, {upper}] did not converge: \
         error estimate {abs_error:e} after {subintervals} subintervals"
    )]
    NumericIntegration {
        lower: f64,
        upper: f64,
        abs_error: f64,
        subintervals: usize,
    },
}

impl ModemError {
    /// Check if this error was caused by the caller's input
    pub fn is_input_error(&self) -> bool {
        !matches!(self, ModemError::NumericIntegration { .. })
    }

    pub(crate) fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        ModemError::InvalidParameter(msg.into())
    }
}
