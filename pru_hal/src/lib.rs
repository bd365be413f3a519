//! # PRU HAL Library
//!
//! Host side of the PRU task scheduler: lays out the coprocessor's data RAM
//! as a ring of task records, drives the function modules every servo
//! period and brings the coprocessor up and down.
//!
//! # Module Structure
//!
//! - [`core`] - PruCore struct, bring-up/teardown, host cycle loop
//! - [`context`] - Data RAM, allocator, task list and pin claims of one PRU
//! - [`region`] - Shared data RAM access
//! - [`allocator`] - Word-aligned bump allocator
//! - [`tasks`] - Task records and the cyclic task list
//! - [`modules`] - Step, PWM, encoder, GPIO and wait gate modules
//! - [`cycle`] - Capture/update coordination
//! - [`signals`] - Exported signal table
//! - [`drivers`] - UIO and simulation drivers
//! - [`driver_registry`] - Driver factory registration
//! - [`firmware`] - Firmware lookup and validation
//! - [`listener`] - Event listener thread
//! - [`gpio`] - GPIO bank access seam
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        pru_hal (single crate)                    │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │ SignalTable │◄──►│  PruCore     │◄──►│  Driver Registry    │  │
//! │  │             │    │ (cycle loop) │    │                     │  │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                            │                                     │
//! │              ┌─────────────┴─────────────┐                       │
//! │              ▼                           ▼                       │
//! │   ┌────────────────────┐      ┌────────────────────┐             │
//! │   │ CycleCoordinator   │      │  PruDriver         │             │
//! │   │ (modules)          │      │  (trait object)    │             │
//! │   └─────────┬──────────┘      └────────────────────┘             │
//! │             ▼                                                    │
//! │   ┌────────────────────────────────────────────────┐             │
//! │   │ PruContext: statics │ task │ task │ ... (ring)  │             │
//! │   └────────────────────────────────────────────────┘             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod allocator;
pub mod context;
pub mod core;
pub mod cycle;
pub mod driver_registry;
pub mod drivers;
pub mod error;
pub mod firmware;
pub mod gpio;
pub mod listener;
pub mod modules;
pub mod region;
pub mod signals;
pub mod tasks;

// Re-export key types for convenience
pub use crate::context::PruContext;
pub use crate::core::PruCore;
pub use crate::driver_registry::DriverRegistry;
pub use crate::error::{BringUpError, PruError, SignalError};
pub use crate::region::SharedRegion;
pub use crate::signals::{Signal, SignalTable};
