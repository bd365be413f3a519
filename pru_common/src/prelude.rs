//! Prelude module for common re-exports.
//!
//! # Usage
//!
//! ```rust
//! use pru_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, PruConfig};

// ─── Memory layout ──────────────────────────────────────────────────
pub use crate::layout::{LayoutError, Mode, Statics, TaskHeader};

// ─── Pins ───────────────────────────────────────────────────────────
pub use crate::pins::{resolve, Connector, LogicalPin, PinClaims, PinError, PinKind, PinTarget};

// ─── Units & constants ─────────────────────────────────────────────
pub use crate::consts::{DEFAULT_PERIOD_NS, PRU_DATA_RAM_SIZE};
pub use crate::unit::PruUnit;
