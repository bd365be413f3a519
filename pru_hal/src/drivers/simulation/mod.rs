//! Simulation driver module.
//!
//! Runs the full bring-up sequence against a heap-backed data RAM and
//! in-memory GPIO banks, recording every PRU control operation so tests can
//! observe it through a [`SimulationHandle`].

mod driver;
mod state;

pub use driver::SimulationDriver;
pub use state::{SimulatedEvents, SimulationHandle};

use super::PruDriver;

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn PruDriver> {
    Box::new(SimulationDriver::new())
}
