//! GPIO bank access seam.
//!
//! Plain GPIO header pins are read and written by the host, not by the PRU.
//! Drivers provide the register access through [`GpioBanks`]; the
//! in-memory [`MemoryGpio`] backs simulation and tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Number of SoC GPIO banks.
pub const GPIO_BANKS: usize = 4;

/// Register-level access to the SoC GPIO banks.
pub trait GpioBanks: Send {
    /// Configure the direction of the given bits. Bits in neither mask keep
    /// their current direction.
    fn configure(&mut self, bank: u8, inputs: u32, outputs: u32);

    /// Current input levels of a bank.
    fn read(&self, bank: u8) -> u32;

    /// Drive the `set` bits high and the `clear` bits low.
    fn write(&mut self, bank: u8, set: u32, clear: u32);
}

#[derive(Debug, Default)]
struct BankState {
    input: AtomicU32,
    output: AtomicU32,
    output_enable: AtomicU32,
    writes: AtomicU32,
}

/// In-memory GPIO banks. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryGpio {
    banks: Arc<[BankState; GPIO_BANKS]>,
}

impl MemoryGpio {
    /// Banks with all inputs low and all pins configured as inputs.
    pub fn new() -> Self {
        Self::default()
    }

    fn bank(&self, bank: u8) -> Option<&BankState> {
        self.banks.get(bank as usize)
    }

    /// Set the input levels seen by [`GpioBanks::read`].
    pub fn set_inputs(&self, bank: u8, levels: u32) {
        if let Some(b) = self.bank(bank) {
            b.input.store(levels, Ordering::Relaxed);
        }
    }

    /// Output latch of a bank.
    pub fn outputs(&self, bank: u8) -> u32 {
        self.bank(bank)
            .map_or(0, |b| b.output.load(Ordering::Relaxed))
    }

    /// Bits configured as outputs.
    pub fn output_enable(&self, bank: u8) -> u32 {
        self.bank(bank)
            .map_or(0, |b| b.output_enable.load(Ordering::Relaxed))
    }

    /// Number of [`GpioBanks::write`] calls on a bank.
    pub fn write_count(&self, bank: u8) -> u32 {
        self.bank(bank)
            .map_or(0, |b| b.writes.load(Ordering::Relaxed))
    }
}

impl GpioBanks for MemoryGpio {
    fn configure(&mut self, bank: u8, inputs: u32, outputs: u32) {
        if let Some(b) = self.bank(bank) {
            let oe = b.output_enable.load(Ordering::Relaxed);
            b.output_enable
                .store((oe & !inputs) | outputs, Ordering::Relaxed);
        }
    }

    fn read(&self, bank: u8) -> u32 {
        self.bank(bank)
            .map_or(0, |b| b.input.load(Ordering::Relaxed))
    }

    fn write(&mut self, bank: u8, set: u32, clear: u32) {
        if let Some(b) = self.bank(bank) {
            let out = b.output.load(Ordering::Relaxed);
            b.output.store((out | set) & !clear, Ordering::Relaxed);
            b.writes.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let gpio = MemoryGpio::new();
        let mut driver_side = gpio.clone();
        driver_side.configure(1, 0, 0b1010);
        driver_side.write(1, 0b1000, 0);
        assert_eq!(gpio.output_enable(1), 0b1010);
        assert_eq!(gpio.outputs(1), 0b1000);

        gpio.set_inputs(2, 0xFF);
        assert_eq!(driver_side.read(2), 0xFF);
    }

    #[test]
    fn out_of_range_bank_is_ignored() {
        let mut gpio = MemoryGpio::new();
        gpio.write(9, 1, 0);
        assert_eq!(gpio.read(9), 0);
        assert_eq!(gpio.write_count(9), 0);
    }
}
