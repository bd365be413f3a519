//! Header pins driven directly by the host through the SoC GPIO banks.
//!
//! No task record; the PRU never sees these pins. Inputs are sampled in
//! `capture`, outputs are set or cleared in `update`. Each pin has a paired
//! `invert` parameter.

use super::PruModule;
use crate::context::PruContext;
use crate::error::PruError;
use crate::gpio::{GpioBanks, GPIO_BANKS};
use crate::region::SharedRegion;
use crate::signals::{Signal, SignalDir, SignalTable};
use crate::tasks::TaskRecord;
use pru_common::config::GpioConfig;
use pru_common::pins::{resolve, LogicalPin, PinError, PinTarget};
use tracing::debug;

struct GpioPin {
    logical: LogicalPin,
    bank: u8,
    bit: u8,
    value: Signal<bool>,
    invert: Signal<bool>,
}

impl GpioPin {
    fn new(
        prefix: &str,
        direction: &str,
        pin: LogicalPin,
        signals: &mut SignalTable,
    ) -> Result<Self, PruError> {
        let LogicalPin::Header {
            connector, index, ..
        } = pin
        else {
            return Err(PinError::NotHeaderPin(pin).into());
        };
        let PinTarget::Bank { bank, bit } = resolve(pin) else {
            return Err(PinError::Unusable(pin).into());
        };
        let name = format!("{prefix}.p{}.{direction}-{index:02}", connector.number());
        let dir = if direction == "in" {
            SignalDir::Out
        } else {
            SignalDir::In
        };
        Ok(Self {
            logical: pin,
            bank,
            bit,
            value: signals.export(name.clone(), dir, false)?,
            invert: signals.export(format!("{name}.invert"), SignalDir::Rw, false)?,
        })
    }

    fn mask(&self) -> u32 {
        1 << self.bit
    }
}

/// Plain GPIO inputs and outputs.
pub struct GpioPins {
    banks: Box<dyn GpioBanks>,
    inputs: Vec<GpioPin>,
    outputs: Vec<GpioPin>,
    written: [Option<u32>; GPIO_BANKS],
}

impl GpioPins {
    /// Resolve the configured pins and export their signals.
    ///
    /// # Errors
    /// Raw GPIO numbers, pins without a GPIO ball, duplicate signal names.
    pub fn new(
        prefix: &str,
        config: &GpioConfig,
        banks: Box<dyn GpioBanks>,
        signals: &mut SignalTable,
    ) -> Result<Self, PruError> {
        let inputs = config
            .inputs
            .iter()
            .map(|pin| GpioPin::new(prefix, "in", *pin, signals))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = config
            .outputs
            .iter()
            .map(|pin| GpioPin::new(prefix, "out", *pin, signals))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            banks,
            inputs,
            outputs,
            written: [None; GPIO_BANKS],
        })
    }

    /// Desired output levels and driven-bit mask per bank.
    fn wanted(&self) -> [(u32, u32); GPIO_BANKS] {
        let mut levels = [(0u32, 0u32); GPIO_BANKS];
        for pin in &self.outputs {
            let (high, mask) = &mut levels[pin.bank as usize];
            *mask |= pin.mask();
            if pin.value.get() != pin.invert.get() {
                *high |= pin.mask();
            }
        }
        levels
    }

    fn write(&mut self, force: bool) {
        for (bank, (high, mask)) in self.wanted().into_iter().enumerate() {
            if mask == 0 || (!force && self.written[bank] == Some(high)) {
                continue;
            }
            self.banks.write(bank as u8, high, mask & !high);
            self.written[bank] = Some(high);
        }
    }
}

impl PruModule for GpioPins {
    fn name(&self) -> &str {
        "gpio"
    }

    fn init(&mut self, ctx: &mut PruContext) -> Result<(), PruError> {
        let mut masks = [(0u32, 0u32); GPIO_BANKS];
        for (pin, is_input) in self
            .inputs
            .iter()
            .map(|p| (p, true))
            .chain(self.outputs.iter().map(|p| (p, false)))
        {
            let target = PinTarget::Bank {
                bank: pin.bank,
                bit: pin.bit,
            };
            let owner = format!("gpio.{}", pin.logical);
            ctx.claims_mut().claim(pin.logical, target, &owner)?;
            let (inputs, outputs) = &mut masks[pin.bank as usize];
            if is_input {
                *inputs |= pin.mask();
            } else {
                *outputs |= pin.mask();
            }
        }
        for (bank, (inputs, outputs)) in masks.into_iter().enumerate() {
            if inputs | outputs != 0 {
                self.banks.configure(bank as u8, inputs, outputs);
                debug!(
                    "GPIO bank {} configured: inputs {:#010x}, outputs {:#010x}",
                    bank, inputs, outputs
                );
            }
        }
        Ok(())
    }

    fn capture(&mut self, _region: &SharedRegion) {
        let mut levels = [None; GPIO_BANKS];
        for pin in &self.inputs {
            let level = *levels[pin.bank as usize].get_or_insert_with(|| self.banks.read(pin.bank));
            let high = level & pin.mask() != 0;
            pin.value.set(high != pin.invert.get());
        }
    }

    fn update(&mut self, _region: &mut SharedRegion) {
        self.write(false);
    }

    fn force_write(&mut self, _region: &mut SharedRegion) {
        self.write(true);
    }

    fn task(&self) -> Option<&TaskRecord> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::MemoryGpio;
    use pru_common::pins::{Connector, PinKind};
    use pru_common::unit::PruUnit;

    fn p8(index: u8) -> LogicalPin {
        LogicalPin::header(PinKind::Gpio, Connector::P8, index)
    }

    fn setup(config: &GpioConfig) -> (GpioPins, MemoryGpio, PruContext, SignalTable) {
        let gpio = MemoryGpio::new();
        let mut signals = SignalTable::new();
        let mut pins =
            GpioPins::new("hpg", config, Box::new(gpio.clone()), &mut signals).unwrap();
        let mut ctx = PruContext::new(SharedRegion::heap(64), PruUnit::Pru0, 10_000);
        pins.init(&mut ctx).unwrap();
        pins.force_write(ctx.region_mut());
        (pins, gpio, ctx, signals)
    }

    #[test]
    fn names_and_directions() {
        let config = GpioConfig {
            inputs: vec![p8(11), LogicalPin::header(PinKind::Gpio, Connector::P9, 91)],
            outputs: vec![p8(12)],
        };
        let (_, gpio, ctx, signals) = setup(&config);
        assert!(signals.contains("hpg.p8.in-11"));
        assert!(signals.contains("hpg.p8.in-11.invert"));
        assert!(signals.contains("hpg.p9.in-91"));
        assert!(signals.contains("hpg.p8.out-12.invert"));
        // P8.12 is gpio44: bank 1 bit 12.
        assert_eq!(gpio.output_enable(1), 1 << 12);
        assert_eq!(ctx.tasks().len(), 0);
    }

    #[test]
    fn inputs_follow_levels_and_invert() {
        let config = GpioConfig {
            inputs: vec![p8(11)],
            outputs: vec![],
        };
        let (mut pins, gpio, ctx, signals) = setup(&config);
        let value: Signal<bool> = signals.get("hpg.p8.in-11").unwrap();
        let invert: Signal<bool> = signals.get("hpg.p8.in-11.invert").unwrap();

        pins.capture(ctx.region());
        assert!(!value.get());
        gpio.set_inputs(1, 1 << 13);
        pins.capture(ctx.region());
        assert!(value.get());
        invert.set(true);
        pins.capture(ctx.region());
        assert!(!value.get());
    }

    #[test]
    fn outputs_written_only_on_change() {
        let config = GpioConfig {
            inputs: vec![],
            outputs: vec![p8(12)],
        };
        let (mut pins, gpio, mut ctx, signals) = setup(&config);
        let value: Signal<bool> = signals.get("hpg.p8.out-12").unwrap();
        assert_eq!(gpio.write_count(1), 1);

        pins.update(ctx.region_mut());
        assert_eq!(gpio.write_count(1), 1);

        value.set(true);
        pins.update(ctx.region_mut());
        assert_eq!(gpio.outputs(1), 1 << 12);
        assert_eq!(gpio.write_count(1), 2);
    }

    #[test]
    fn raw_and_unusable_pins_rejected() {
        let mut signals = SignalTable::new();
        let raw = GpioConfig {
            inputs: vec![LogicalPin::Raw(37)],
            outputs: vec![],
        };
        assert!(matches!(
            GpioPins::new("hpg", &raw, Box::new(MemoryGpio::new()), &mut signals),
            Err(PruError::Pin(PinError::NotHeaderPin(_)))
        ));
        let ground = GpioConfig {
            inputs: vec![],
            outputs: vec![p8(1)],
        };
        assert!(matches!(
            GpioPins::new("hpg", &ground, Box::new(MemoryGpio::new()), &mut signals),
            Err(PruError::Pin(PinError::Unusable(_)))
        ));
    }

    #[test]
    fn duplicate_pin_rejected_at_init() {
        let config = GpioConfig {
            inputs: vec![p8(11)],
            outputs: vec![],
        };
        let mut signals = SignalTable::new();
        let mut pins =
            GpioPins::new("hpg", &config, Box::new(MemoryGpio::new()), &mut signals).unwrap();
        let mut ctx = PruContext::new(SharedRegion::heap(64), PruUnit::Pru0, 10_000);
        ctx.claims_mut()
            .claim(p8(11), PinTarget::Bank { bank: 1, bit: 13 }, "other")
            .unwrap();
        assert!(matches!(
            pins.init(&mut ctx),
            Err(PruError::Pin(PinError::AlreadyClaimed { .. }))
        ));
    }
}
