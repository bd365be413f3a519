//! Busy-wait gate.
//!
//! The last task in the ring. The firmware drives the busy pin (`dataX`)
//! while it works through the other tasks, then spins here until the next
//! period starts. `dataY` is the firmware's busy flag.

use super::{write_header, PruModule};
use crate::context::PruContext;
use crate::error::PruError;
use crate::region::SharedRegion;
use crate::signals::{Signal, SignalDir, SignalTable};
use crate::tasks::TaskRecord;
use pru_common::layout::{header, wait, Mode};
use pru_common::pins::LogicalPin;

/// Period gate at the end of the task ring.
pub struct WaitGate {
    pin: Option<LogicalPin>,
    busy_pin: Signal<u32>,
    busy: Signal<bool>,
    record: Option<TaskRecord>,
    written_pin: Option<u8>,
}

impl WaitGate {
    /// Create the gate and export `<prefix>.pru_busy_pin` and
    /// `<prefix>.pru_busy`.
    ///
    /// # Errors
    /// Duplicate signal names.
    pub fn new(
        prefix: &str,
        pin: Option<LogicalPin>,
        signals: &mut SignalTable,
    ) -> Result<Self, PruError> {
        Ok(Self {
            pin,
            busy_pin: signals.export(format!("{prefix}.pru_busy_pin"), SignalDir::Rw, 0u32)?,
            busy: signals.export(format!("{prefix}.pru_busy"), SignalDir::Out, false)?,
            record: None,
            written_pin: None,
        })
    }

    fn wire(&self) -> u8 {
        self.busy_pin.get() as u8
    }
}

impl PruModule for WaitGate {
    fn name(&self) -> &str {
        "wait"
    }

    fn init(&mut self, ctx: &mut PruContext) -> Result<(), PruError> {
        let wire = ctx.claim_pin(self.pin, "wait.busy_pin")?;
        self.busy_pin.set(wire as u32);
        let mut record = ctx.new_task(Mode::Wait, wait::SIZE)?;
        ctx.add_task(&mut record);
        self.record = Some(record);
        Ok(())
    }

    fn capture(&mut self, region: &SharedRegion) {
        if let Some(record) = &self.record {
            self.busy.set(region.read_u8(record.field(header::DATA_Y)) != 0);
        }
    }

    fn update(&mut self, region: &mut SharedRegion) {
        let wire = self.wire();
        if let Some(record) = &self.record
            && self.written_pin != Some(wire)
        {
            region.write_u8(record.field(header::DATA_X), wire);
            self.written_pin = Some(wire);
        }
    }

    fn force_write(&mut self, region: &mut SharedRegion) {
        let wire = self.wire();
        if let Some(record) = &self.record {
            // dataY belongs to the firmware.
            let busy = region.read_u8(record.field(header::DATA_Y));
            write_header(region, record, wire, busy);
            self.written_pin = Some(wire);
        }
    }

    fn task(&self) -> Option<&TaskRecord> {
        self.record.as_ref()
    }
}
