use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModemError, ModemResult};

/// Decision rule used by an FSK receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coherence {
    /// Known carrier phase: pick the largest real correlation.
    Coherent,
    /// Unknown carrier phase: pick the largest correlation envelope.
    Noncoherent,
}

impl FromStr for Coherence {
    type Err = ModemError;

    fn from_str(s: &str) -> ModemResult<Self> {
        match s.to_lowercase().as_str() {
            "coherent" => Ok(Coherence::Coherent),
            "noncoherent" => Ok(Coherence::Noncoherent),
            _ => Err(ModemError::invalid_parameter(format!(
                "FSK coherence must be 'coherent' or 'noncoherent', got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for Coherence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coherence::Coherent => write!(f, "coherent"),
            Coherence::Noncoherent => write!(f, "noncoherent"),
        }
    }
}

/// Modulation family. FSK carries the detection mode of its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modulation {
    Psk,
    Qam,
    Pam,
    Fsk(Coherence),
}

impl Modulation {
    /// Parse a family name (`"psk"`, `"QAM"`, ...). FSK requires a coherence mode,
    /// which is ignored for every other family.
    pub fn from_name(name: &str, coherence: Option<&str>) -> ModemResult<Self> {
        match name.to_lowercase().as_str() {
            "psk" => Ok(Modulation::Psk),
            "qam" => Ok(Modulation::Qam),
            "pam" => Ok(Modulation::Pam),
            "fsk" => match coherence {
                Some(c) => Ok(Modulation::Fsk(c.parse()?)),
                None => Err(ModemError::invalid_parameter(
                    "FSK requires a coherence mode ('coherent' or 'noncoherent')",
                )),
            },
            _ => Err(ModemError::invalid_parameter(format!(
                "unknown modulation type '{}'",
                name
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Modulation::Psk => "PSK",
            Modulation::Qam => "QAM",
            Modulation::Pam => "PAM",
            Modulation::Fsk(_) => "FSK",
        }
    }

    /// Whether symbols of this family live in the IQ plane.
    pub fn is_planar(&self) -> bool {
        !matches!(self, Modulation::Fsk(_))
    }

    /// `M` must be a power of two, and an even power of two for square QAM.
    pub fn validate_order(&self, m: usize) -> ModemResult<()> {
        match self {
            Modulation::Qam => check_square_order(m),
            _ => check_order(m),
        }
    }
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modulation::Fsk(coherence) => write!(f, "{} FSK", coherence),
            _ => write!(f, "{}", self.name()),
        }
    }
}

pub fn check_order(m: usize) -> ModemResult<()> {
    if m < 2 || !m.is_power_of_two() {
        return Err(ModemError::InvalidOrder {
            m,
            reason: "M must be a power of 2",
        });
    }
    Ok(())
}

pub fn check_square_order(m: usize) -> ModemResult<()> {
    check_order(m)?;
    if m.trailing_zeros() % 2 != 0 {
        return Err(ModemError::InvalidOrder {
            m,
            reason: "only square QAM is supported, M must be an even power of 2",
        });
    }
    Ok(())
}

/// `log2(M)` for a valid order.
#[inline]
pub fn bits_per_symbol(m: usize) -> usize {
    m.trailing_zeros() as usize
}
