//! Driver context threaded through module registration.
//!
//! [`PruContext`] owns the shared region together with the allocator, the
//! task list and the pin claim table. Modules receive it mutably during
//! `init`; afterwards only the region is handed to the cycle functions.

use crate::allocator::BumpAllocator;
use crate::error::{BringUpError, PruError};
use crate::region::SharedRegion;
use crate::tasks::{TaskList, TaskRecord};
use pru_common::layout::{header, len_words, statics, Mode, Statics, TaskHeader, STATICS_SIZE};
use pru_common::pins::{resolve_for, LogicalPin, PinClaims, PinError, DEFAULT_WIRE_PIN};
use pru_common::unit::PruUnit;
use tracing::debug;

/// Region, allocator, task list and pin claims of one PRU.
#[derive(Debug)]
pub struct PruContext {
    region: SharedRegion,
    allocator: BumpAllocator,
    tasks: TaskList,
    claims: PinClaims,
    unit: PruUnit,
}

impl PruContext {
    /// Zero the region and write the statics block.
    pub fn new(mut region: SharedRegion, unit: PruUnit, period_ns: u32) -> Self {
        region.zero();
        let statics = Statics {
            first_task: 0,
            period_ns,
            ready: 0,
        };
        region.write_bytes(0, &statics.to_bytes());
        debug!(
            "Statics written: period {}ns, region {} bytes",
            period_ns,
            region.len()
        );
        Self {
            region,
            allocator: BumpAllocator::new(),
            tasks: TaskList::new(),
            claims: PinClaims::new(),
            unit,
        }
    }

    /// PRU core the context belongs to.
    pub fn unit(&self) -> PruUnit {
        self.unit
    }

    /// Reserve `len` bytes in the region.
    ///
    /// # Errors
    /// `RegionExhausted` when the reservation ends past the region.
    pub fn allocate(&mut self, len: u32) -> Result<u32, BringUpError> {
        let offset = self.allocator.allocate(len);
        let needed = self.allocator.high_water();
        if needed > self.region.len() {
            return Err(BringUpError::RegionExhausted {
                needed,
                available: self.region.len(),
            });
        }
        debug!("Allocated {} bytes at {:#06x}", len, offset);
        Ok(offset)
    }

    /// Allocate a task record of `size` bytes and write its mode and length.
    ///
    /// # Errors
    /// `RegionExhausted` when the record does not fit.
    pub fn new_task(&mut self, mode: Mode, size: u32) -> Result<TaskRecord, BringUpError> {
        let addr = self.allocate(size)?;
        self.region.write_u8(addr + header::MODE, mode as u8);
        self.region.write_u8(addr + header::LEN, len_words(size));
        Ok(TaskRecord::new(addr, mode, size))
    }

    /// Link `record` into the task ring.
    pub fn add_task(&mut self, record: &mut TaskRecord) {
        self.tasks.add_task(&mut self.region, record);
    }

    /// Resolve `pin` for this PRU, claim it for `owner` and return its wire
    /// byte. `None` selects the unclaimed default pin.
    ///
    /// # Errors
    /// Unusable pins, pins of the other PRU, and pins claimed twice.
    pub fn claim_pin(&mut self, pin: Option<LogicalPin>, owner: &str) -> Result<u8, PinError> {
        let Some(pin) = pin else {
            return Ok(DEFAULT_WIRE_PIN);
        };
        let target = resolve_for(pin, self.unit)?;
        let wire = target.wire_pin().ok_or(PinError::Unusable(pin))?;
        self.claims.claim(pin, target, owner)?;
        debug!("Pin {} claimed by {} (wire {:#04x})", pin, owner, wire);
        Ok(wire)
    }

    /// Claim table, for modules that resolve pins themselves.
    pub fn claims_mut(&mut self) -> &mut PinClaims {
        &mut self.claims
    }

    /// Shared region.
    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    /// Shared region, mutably.
    pub fn region_mut(&mut self) -> &mut SharedRegion {
        &mut self.region
    }

    /// Task list.
    pub fn tasks(&self) -> &TaskList {
        &self.tasks
    }

    /// First free offset.
    pub fn high_water(&self) -> u32 {
        self.allocator.high_water()
    }

    /// Statics block as currently stored in the region.
    ///
    /// # Errors
    /// `Layout` when the sentinels were overwritten.
    pub fn statics(&self) -> Result<Statics, PruError> {
        let mut raw = [0u8; STATICS_SIZE as usize];
        self.region.read_bytes(0, &mut raw);
        Ok(Statics::from_bytes(&raw)?)
    }

    /// Task headers in firmware visitation order.
    ///
    /// # Errors
    /// `Layout` when a header carries an unknown mode.
    pub fn task_headers(&self) -> Result<Vec<(u32, TaskHeader)>, PruError> {
        self.tasks
            .walk(&self.region)
            .into_iter()
            .map(|addr| {
                let mut raw = [0u8; 8];
                self.region.read_bytes(addr, &mut raw);
                Ok((addr, TaskHeader::from_bytes(&raw)?))
            })
            .collect()
    }

    /// Offset of the first task as stored in the statics block.
    pub fn first_task(&self) -> u32 {
        self.region.read_u32(statics::FIRST_TASK)
    }
}
