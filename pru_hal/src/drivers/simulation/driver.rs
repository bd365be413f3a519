//! Simulation driver implementation.
//!
//! The `SimulationDriver` implements the `PruDriver` trait with no hardware:
//! data RAM is a heap buffer, GPIO banks live in memory and PRU control
//! calls only update the shared [`SimulationHandle`].

use super::state::SimulationHandle;
use crate::drivers::{EventChannel, PruDriver};
use crate::error::BringUpError;
use crate::gpio::GpioBanks;
use crate::region::SharedRegion;
use pru_common::consts::{PRU_DATA_RAM_SIZE, PRU_IRAM_SIZE};
use pru_common::unit::PruUnit;
use tracing::{debug, info};

/// Simulation driver implementing the PruDriver trait.
pub struct SimulationDriver {
    /// Driver name
    name: &'static str,
    /// Driver version
    version: &'static str,
    /// Size of each simulated data RAM
    data_ram_size: usize,
    /// State shared with observers
    handle: SimulationHandle,
}

impl SimulationDriver {
    /// Create a new simulation driver instance with full-size data RAM.
    pub fn new() -> Self {
        Self::with_data_ram(PRU_DATA_RAM_SIZE)
    }

    /// Create a simulation driver whose data RAM is `len` bytes.
    pub fn with_data_ram(len: usize) -> Self {
        Self {
            name: "simulation",
            version: env!("CARGO_PKG_VERSION"),
            data_ram_size: len,
            handle: SimulationHandle::default(),
        }
    }

    /// Observer handle sharing this driver's state.
    pub fn handle(&self) -> SimulationHandle {
        self.handle.clone()
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PruDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn check_privileges(&self) -> Result<(), BringUpError> {
        Ok(())
    }

    fn ensure_kernel_module(&mut self) -> Result<(), BringUpError> {
        debug!("Simulation: no kernel module needed");
        Ok(())
    }

    fn open_events(
        &mut self,
        unit: PruUnit,
        event: u8,
    ) -> Result<Box<dyn EventChannel>, BringUpError> {
        Ok(Box::new(self.handle.events(unit, event)))
    }

    fn map_data_ram(&mut self, unit: PruUnit) -> Result<SharedRegion, BringUpError> {
        info!(
            "Simulation: {} data RAM on heap ({} bytes)",
            unit, self.data_ram_size
        );
        Ok(SharedRegion::heap(self.data_ram_size))
    }

    fn gpio_banks(&mut self) -> Result<Box<dyn GpioBanks>, BringUpError> {
        Ok(Box::new(self.handle.gpio().clone()))
    }

    fn reset(&mut self, unit: PruUnit) -> Result<(), BringUpError> {
        self.handle.record_reset(unit);
        Ok(())
    }

    fn load_firmware(&mut self, unit: PruUnit, image: &[u8]) -> Result<(), BringUpError> {
        if image.len() > PRU_IRAM_SIZE {
            return Err(BringUpError::FirmwareInvalid {
                path: "<memory>".into(),
                reason: format!("{} bytes exceed instruction RAM", image.len()),
            });
        }
        self.handle.record_load(unit, image.len());
        Ok(())
    }

    fn start(&mut self, unit: PruUnit) -> Result<(), BringUpError> {
        self.handle.record_start(unit);
        info!("Simulation: {} started", unit);
        Ok(())
    }

    fn stop(&mut self, unit: PruUnit) -> Result<(), BringUpError> {
        self.handle.record_stop(unit);
        Ok(())
    }
}
