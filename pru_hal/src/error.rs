//! Error types for PRU driver operations.

use pru_common::config::ConfigError;
use pru_common::layout::LayoutError;
use pru_common::pins::PinError;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors of coprocessor bring-up.
#[derive(Debug, Error)]
pub enum BringUpError {
    /// Process lacks the privileges needed for `/dev/mem`.
    #[error("Root privileges required (effective uid {0})")]
    NotRoot(u32),

    /// Kernel module missing and could not be loaded.
    #[error("Kernel module {module} unavailable: {reason}")]
    KernelModule {
        /// Module name.
        module: String,
        /// Failure detail.
        reason: String,
    },

    /// UIO event device could not be opened.
    #[error("Failed to open event device {path:?}: {source}")]
    EventDevice {
        /// Device path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A memory window could not be mapped.
    #[error("Failed to map {what}: {source}")]
    Map {
        /// Mapped window.
        what: &'static str,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Firmware image not found in any searched location.
    #[error("Firmware not found: {0:?}")]
    FirmwareNotFound(PathBuf),

    /// Firmware image unreadable or malformed.
    #[error("Invalid firmware {path:?}: {reason}")]
    FirmwareInvalid {
        /// Image path.
        path: PathBuf,
        /// Failure detail.
        reason: String,
    },

    /// Allocations exceed the data RAM.
    #[error("Shared region exhausted: need {needed} bytes, have {available}")]
    RegionExhausted {
        /// High-water mark after the failing allocation.
        needed: u32,
        /// Region length.
        available: u32,
    },

    /// Event listener thread could not be started.
    #[error("Failed to start event listener: {0}")]
    Listener(#[source] std::io::Error),

    /// No driver registered under the requested name.
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Driver does not provide a required facility.
    #[error("Driver {driver} does not support {what}")]
    Unsupported {
        /// Driver name.
        driver: &'static str,
        /// Missing facility.
        what: &'static str,
    },
}

/// Signal table errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// Name already exported.
    #[error("Duplicate signal name: {0}")]
    Duplicate(String),

    /// Name not exported.
    #[error("Unknown signal: {0}")]
    Unknown(String),

    /// Requested type differs from the exported one.
    #[error("Signal {name} has type {actual}, requested {requested}")]
    TypeMismatch {
        /// Signal name.
        name: String,
        /// Exported type.
        actual: &'static str,
        /// Requested type.
        requested: &'static str,
    },
}

/// Top-level error type of the PRU driver.
#[derive(Debug, Error)]
pub enum PruError {
    /// Bring-up failure.
    #[error(transparent)]
    BringUp(#[from] BringUpError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Pin resolution failure.
    #[error(transparent)]
    Pin(#[from] PinError),

    /// Signal export failure.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Data RAM contents do not decode.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Operation requires a completed bring-up.
    #[error("Coprocessor not brought up")]
    NotBroughtUp,
}
