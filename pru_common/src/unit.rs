//! PRU core selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Raw unit number outside `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("PRU unit must be 0 or 1, got {0}")]
pub struct InvalidUnit(pub u8);

/// One of the two PRU cores of the PRU-ICSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PruUnit {
    /// PRU core 0.
    #[default]
    Pru0,
    /// PRU core 1.
    Pru1,
}

impl PruUnit {
    /// Zero-based core index.
    pub const fn index(self) -> usize {
        match self {
            Self::Pru0 => 0,
            Self::Pru1 => 1,
        }
    }

    /// System event the core raises towards the host (`PRUn_ARM_INTERRUPT`).
    pub const fn arm_interrupt(self) -> u32 {
        match self {
            Self::Pru0 => 19,
            Self::Pru1 => 20,
        }
    }
}

impl TryFrom<u8> for PruUnit {
    type Error = InvalidUnit;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pru0),
            1 => Ok(Self::Pru1),
            other => Err(InvalidUnit(other)),
        }
    }
}

impl From<PruUnit> for u8 {
    fn from(unit: PruUnit) -> Self {
        unit.index() as u8
    }
}

impl fmt::Display for PruUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PRU{}", self.index())
    }
}
