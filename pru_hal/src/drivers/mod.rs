//! Coprocessor driver implementations.
//!
//! A [`PruDriver`] gives the core everything bring-up needs from the
//! platform: privilege and kernel-module checks, the event channel, the data
//! RAM window, GPIO bank access and PRU control.
//!
//! - [`uio`] - AM335x PRU-ICSS through `/dev/mem` and `uio_pruss`
//! - [`simulation`] - Heap-backed data RAM for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement [`PruDriver`]
//! 3. Register a factory in [`register_all_drivers`]

pub mod simulation;
pub mod uio;

use crate::driver_registry::DriverRegistry;
use crate::error::BringUpError;
use crate::gpio::GpioBanks;
use crate::region::SharedRegion;
use pru_common::unit::PruUnit;
use std::time::Duration;

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn PruDriver>;

/// Blocking source of PRU-to-host events.
///
/// Owned by the event listener thread.
pub trait EventChannel: Send {
    /// Wait up to `timeout` for an event.
    ///
    /// Returns the driver's running event count, or `None` on timeout.
    ///
    /// # Errors
    /// Device read failures.
    fn wait(&mut self, timeout: Duration) -> std::io::Result<Option<u32>>;

    /// Acknowledge the last event so the next one can be raised.
    ///
    /// Clears the system event of the PRU the channel was opened for.
    fn clear(&mut self);
}

/// Platform access used by bring-up and teardown.
///
/// All methods run outside the periodic path and may block.
pub trait PruDriver: Send {
    /// Returns the driver's unique identifier (e.g., "uio", "simulation").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;

    /// Fail unless the process may map physical memory.
    ///
    /// # Errors
    /// `NotRoot`.
    fn check_privileges(&self) -> Result<(), BringUpError>;

    /// Make sure the kernel side is present, loading it if needed.
    ///
    /// # Errors
    /// `KernelModule`.
    fn ensure_kernel_module(&mut self) -> Result<(), BringUpError>;

    /// Open event channel `event` and route the system event `unit`
    /// raises towards the host.
    ///
    /// # Errors
    /// `EventDevice`.
    fn open_events(
        &mut self,
        unit: PruUnit,
        event: u8,
    ) -> Result<Box<dyn EventChannel>, BringUpError>;

    /// Map the data RAM of `unit`.
    ///
    /// # Errors
    /// `Map`.
    fn map_data_ram(&mut self, unit: PruUnit) -> Result<SharedRegion, BringUpError>;

    /// Host access to the SoC GPIO banks.
    ///
    /// # Errors
    /// `Map`, or `Unsupported` when the driver has no GPIO access.
    fn gpio_banks(&mut self) -> Result<Box<dyn GpioBanks>, BringUpError>;

    /// Hold `unit` in reset.
    ///
    /// # Errors
    /// `Map` when the control registers are unreachable.
    fn reset(&mut self, unit: PruUnit) -> Result<(), BringUpError>;

    /// Copy `image` into the instruction RAM of `unit`. The PRU must be in
    /// reset.
    ///
    /// # Errors
    /// `Map`, or `FirmwareInvalid` when the image does not fit.
    fn load_firmware(&mut self, unit: PruUnit, image: &[u8]) -> Result<(), BringUpError>;

    /// Release `unit` from reset and start execution at address 0.
    ///
    /// # Errors
    /// `Map`.
    fn start(&mut self, unit: PruUnit) -> Result<(), BringUpError>;

    /// Halt `unit`.
    ///
    /// # Errors
    /// `Map`.
    fn stop(&mut self, unit: PruUnit) -> Result<(), BringUpError>;
}

/// Register all built-in drivers.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("uio", uio::create_driver);
    registry.register("simulation", simulation::create_driver);
}
