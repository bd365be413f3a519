//! UIO driver module.
//!
//! Talks to the AM335x PRU-ICSS directly: data and instruction RAM and the
//! control registers are mapped from `/dev/mem`, interrupts arrive through
//! the `uio_pruss` kernel module.

mod driver;
mod event;
mod gpio;
mod intc;
mod regs;

pub use driver::{module_loaded, UioDriver};
pub use event::{device_path, UioEvents};
pub use gpio::MmioGpioBanks;
pub use intc::IntcMapping;
pub use regs::PruControl;

use super::PruDriver;

/// Factory function to create a UIO driver instance.
pub fn create_driver() -> Box<dyn PruDriver> {
    Box::new(UioDriver::new())
}
