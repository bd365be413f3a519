//! Two-output delta-sigma modulator.
//!
//! The firmware integrates each output value every task period and drives
//! the pin high whenever the integrator overflows, so the pin's duty is the
//! value over [`deltasig::FULL_SCALE`]. Record layout: see
//! [`pru_common::layout::deltasig`]; header `dataX` is the enable flag.

use super::{instance_name, write_header, PruModule};
use crate::context::PruContext;
use crate::error::PruError;
use crate::region::SharedRegion;
use crate::signals::{Signal, SignalDir, SignalTable};
use crate::tasks::TaskRecord;
use pru_common::config::DeltasigConfig;
use pru_common::layout::{deltasig, header, Mode};
use pru_common::pins::LogicalPin;

/// Host-owned fields as last written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Written {
    enable: bool,
    values: [u16; 2],
    pins: [u8; 2],
}

/// One delta-sigma modulator instance.
pub struct Deltasig {
    name: String,
    pins: [Option<LogicalPin>; 2],
    wires: [u8; 2],
    enable: Signal<bool>,
    outs: [Signal<f64>; 2],
    pin_sigs: [Signal<u32>; 2],
    record: Option<TaskRecord>,
    written: Option<Written>,
}

/// 14-bit density of `value`: 0 at or below 0.0, full scale at or above 1.0.
pub fn density(value: f64) -> u16 {
    if value >= 1.0 {
        deltasig::FULL_SCALE
    } else if value > 0.0 {
        (value * f64::from(deltasig::FULL_SCALE)) as u16 & (deltasig::FULL_SCALE - 1)
    } else {
        // Also catches NaN.
        0
    }
}

impl Deltasig {
    /// Create instance `index` and export its signals.
    ///
    /// # Errors
    /// Duplicate signal names.
    pub fn new(
        prefix: &str,
        index: usize,
        config: &DeltasigConfig,
        signals: &mut SignalTable,
    ) -> Result<Self, PruError> {
        let n = |field: &str| instance_name(prefix, "delta", index, field);
        Ok(Self {
            name: format!("delta.{index:02}"),
            pins: [config.pin1, config.pin2],
            wires: [0, 0],
            enable: signals.export(n("enable"), SignalDir::In, false)?,
            outs: [
                signals.export(n("out1"), SignalDir::In, 0.0)?,
                signals.export(n("out2"), SignalDir::In, 0.0)?,
            ],
            pin_sigs: [
                signals.export(n("pin1"), SignalDir::Ro, 0u32)?,
                signals.export(n("pin2"), SignalDir::Ro, 0u32)?,
            ],
            record: None,
            written: None,
        })
    }

    fn wanted(&self) -> Written {
        Written {
            enable: self.enable.get(),
            values: [density(self.outs[0].get()), density(self.outs[1].get())],
            pins: self.wires,
        }
    }

    fn write(&mut self, region: &mut SharedRegion, force: bool) {
        let Some(record) = &self.record else {
            return;
        };
        let wanted = self.wanted();
        let prev = if force { None } else { self.written };

        if force {
            write_header(region, record, wanted.enable as u8, 0);
        } else if prev.map(|w| w.enable) != Some(wanted.enable) {
            region.write_u8(record.field(header::DATA_X), wanted.enable as u8);
        }
        if prev.map(|w| w.values) != Some(wanted.values) {
            region.write_u16(record.field(deltasig::VALUE1), wanted.values[0]);
            region.write_u16(record.field(deltasig::VALUE2), wanted.values[1]);
        }
        if prev.map(|w| w.pins) != Some(wanted.pins) {
            region.write_u8(record.field(deltasig::PIN1), wanted.pins[0]);
            region.write_u8(record.field(deltasig::PIN2), wanted.pins[1]);
        }
        self.written = Some(wanted);
    }
}

impl PruModule for Deltasig {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, ctx: &mut PruContext) -> Result<(), PruError> {
        for k in 0..2 {
            let owner = format!("{}.pin{}", self.name, k + 1);
            self.wires[k] = ctx.claim_pin(self.pins[k], &owner)?;
            self.pin_sigs[k].set(self.wires[k] as u32);
        }
        let mut record = ctx.new_task(Mode::DeltaSigma, deltasig::SIZE)?;
        ctx.add_task(&mut record);
        self.record = Some(record);
        Ok(())
    }

    fn capture(&mut self, _region: &SharedRegion) {}

    fn update(&mut self, region: &mut SharedRegion) {
        self.write(region, false);
    }

    fn force_write(&mut self, region: &mut SharedRegion) {
        self.write(region, true);
    }

    fn task(&self) -> Option<&TaskRecord> {
        self.record.as_ref()
    }
}
