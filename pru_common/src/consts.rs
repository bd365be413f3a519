//! System-wide constants for the PRU workspace.
//!
//! Single source of truth for memory sizes, limits and default paths.

/// Size of one PRU data RAM in bytes.
pub const PRU_DATA_RAM_SIZE: usize = 8 * 1024;

/// Size of one PRU instruction RAM in bytes.
pub const PRU_IRAM_SIZE: usize = 8 * 1024;

/// Allocation granularity inside the data RAM.
pub const WORD_SIZE: u32 = 4;

/// Default control period in nanoseconds.
pub const DEFAULT_PERIOD_NS: u32 = 10_000;

/// Default host servo period in nanoseconds.
pub const DEFAULT_SERVO_PERIOD_NS: u32 = 1_000_000;

/// Default prefix for exported signal and function names.
pub const DEFAULT_PREFIX: &str = "hal_pru_generic";

/// Default firmware image file name.
pub const DEFAULT_FIRMWARE: &str = "pru_generic.bin";

/// Directory searched when the firmware path does not exist as given.
pub const FIRMWARE_FALLBACK_DIR: &str = "/usr/lib/linuxcnc/prubin";

/// Kernel module exposing the PRU subsystem to userspace.
pub const UIO_PRUSS_MODULE: &str = "uio_pruss";

/// Highest host event channel the PRU subsystem routes to userspace.
pub const MAX_EVENT: u8 = 7;

/// Maximum instances of any one module kind.
pub const MAX_INSTANCES: usize = 32;

/// Maximum outputs of one PWM generator.
pub const MAX_PWM_OUTPUTS: usize = 16;

/// Maximum channels of one encoder.
pub const MAX_ENCODER_CHANNELS: usize = 16;
