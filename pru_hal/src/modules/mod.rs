//! Function modules.
//!
//! Each module owns one task record (or, for plain GPIO, none), a set of
//! exported signals and a shadow of the values it last wrote. The cycle
//! coordinator drives all of them through [`PruModule`]:
//!
//! | Operation     | When                          | Touches                     |
//! |---------------|-------------------------------|-----------------------------|
//! | `init`        | bring-up, PRU halted          | allocator, task list, pins  |
//! | `force_write` | bring-up, after all `init`    | every host-owned field      |
//! | `capture`     | every period, before `update` | firmware-owned fields       |
//! | `update`      | every period                  | changed host-owned fields   |
//!
//! Modules are registered in a fixed order: step generators, PWM
//! generators, delta-sigma modulators, encoders, plain GPIO, and the
//! busy-wait gate last.

pub mod deltasig;
pub mod encoder;
pub mod gpio_pins;
pub mod pwmgen;
pub mod stepgen;
pub mod wait;

use crate::context::PruContext;
use crate::error::PruError;
use crate::gpio::GpioBanks;
use crate::region::SharedRegion;
use crate::signals::SignalTable;
use crate::tasks::TaskRecord;
use pru_common::config::{ConfigError, PruConfig};
use pru_common::layout::header;

pub use deltasig::Deltasig;
pub use encoder::Encoder;
pub use gpio_pins::GpioPins;
pub use pwmgen::Pwmgen;
pub use stepgen::Stepgen;
pub use wait::WaitGate;

/// One function module.
pub trait PruModule: Send {
    /// Instance name, e.g. `stepgen.00`.
    fn name(&self) -> &str;

    /// Claim pins, allocate and link the task record.
    fn init(&mut self, ctx: &mut PruContext) -> Result<(), PruError>;

    /// Publish firmware-owned fields to output signals.
    fn capture(&mut self, region: &SharedRegion);

    /// Write changed host-owned fields from input signals.
    fn update(&mut self, region: &mut SharedRegion);

    /// Write every host-owned field unconditionally.
    fn force_write(&mut self, region: &mut SharedRegion);

    /// Task record, once initialised.
    fn task(&self) -> Option<&TaskRecord>;
}

/// Build all configured modules in registration order.
///
/// Signals are exported here; records are laid out later by `init`.
///
/// # Errors
/// Duplicate signal names, header-less GPIO pins, or GPIO pins without
/// GPIO bank access.
pub fn build_modules(
    config: &PruConfig,
    signals: &mut SignalTable,
    gpio: Option<Box<dyn GpioBanks>>,
) -> Result<Vec<Box<dyn PruModule>>, PruError> {
    let prefix = config.prefix.as_str();
    let mut modules: Vec<Box<dyn PruModule>> = Vec::new();

    for i in 0..config.stepgen_count() {
        modules.push(Box::new(Stepgen::new(
            prefix,
            i,
            &config.stepgen_config(i),
            config.period_ns,
            config.servo_period_ns,
            signals,
        )?));
    }
    for i in 0..config.pwmgen_count() {
        modules.push(Box::new(Pwmgen::new(
            prefix,
            i,
            &config.pwmgen_config(i),
            config.period_ns,
            signals,
        )?));
    }
    for i in 0..config.deltasig_count() {
        modules.push(Box::new(Deltasig::new(
            prefix,
            i,
            &config.deltasig_config(i),
            signals,
        )?));
    }
    for i in 0..config.encoder_count() {
        modules.push(Box::new(Encoder::new(
            prefix,
            i,
            &config.encoder_config(i),
            signals,
        )?));
    }
    if !config.gpio.is_empty() {
        let banks = gpio.ok_or_else(|| {
            ConfigError::ValidationError("GPIO pins configured without GPIO bank access".to_string())
        })?;
        modules.push(Box::new(GpioPins::new(prefix, &config.gpio, banks, signals)?));
    }
    if config.wait_gate {
        modules.push(Box::new(WaitGate::new(prefix, config.busy_pin, signals)?));
    }
    Ok(modules)
}

/// Full name of an instance signal, e.g. `hpg.stepgen.00.enable`.
pub(crate) fn instance_name(prefix: &str, kind: &str, index: usize, field: &str) -> String {
    format!("{prefix}.{kind}.{index:02}.{field}")
}

/// Convert nanoseconds to whole task periods, rounding up.
pub(crate) fn ns_to_periods(ns: u32, period_ns: u32) -> u16 {
    let periods = (ns as u64).div_ceil(period_ns.max(1) as u64);
    periods.min(u16::MAX as u64) as u16
}

/// Write the module-owned header bytes (mode, len, dataX, dataY).
pub(crate) fn write_header(region: &mut SharedRegion, record: &TaskRecord, data_x: u8, data_y: u8) {
    region.write_u8(record.field(header::MODE), record.mode() as u8);
    region.write_u8(
        record.field(header::LEN),
        pru_common::layout::len_words(record.size()),
    );
    region.write_u8(record.field(header::DATA_X), data_x);
    region.write_u8(record.field(header::DATA_Y), data_y);
}

/// Guard a scale divisor against values too close to zero.
///
/// Returns the corrected value when `scale` had to be reset to ±1.0.
pub(crate) fn guard_scale(scale: f64) -> Option<f64> {
    if scale.abs() < 1e-6 || scale.is_nan() {
        Some(if scale.is_sign_negative() { -1.0 } else { 1.0 })
    } else {
        None
    }
}
