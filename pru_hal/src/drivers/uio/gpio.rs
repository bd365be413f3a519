//! Memory-mapped AM335x GPIO banks.

use super::regs::RegisterWindow;
use crate::error::BringUpError;
use crate::gpio::{GpioBanks, GPIO_BANKS};
use std::fs::File;

/// Physical bases of GPIO0..GPIO3.
pub const GPIO_BASES: [u64; GPIO_BANKS] = [0x44E0_7000, 0x4804_C000, 0x481A_C000, 0x481A_E000];

const GPIO_WINDOW: usize = 0x1000;
const OE: usize = 0x134;
const DATAIN: usize = 0x138;
const CLEARDATAOUT: usize = 0x190;
const SETDATAOUT: usize = 0x194;

/// The four SoC GPIO banks mapped through `/dev/mem`.
pub struct MmioGpioBanks {
    banks: Vec<RegisterWindow>,
}

impl MmioGpioBanks {
    /// Map all four banks.
    ///
    /// # Errors
    /// `Map`.
    pub fn open(mem: &File) -> Result<Self, BringUpError> {
        let banks = GPIO_BASES
            .iter()
            .map(|base| RegisterWindow::open(mem, *base, GPIO_WINDOW, "GPIO bank"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { banks })
    }
}

impl GpioBanks for MmioGpioBanks {
    fn configure(&mut self, bank: u8, inputs: u32, outputs: u32) {
        if let Some(regs) = self.banks.get_mut(bank as usize) {
            // OE bit set means input.
            let oe = regs.read(OE);
            regs.write(OE, (oe | inputs) & !outputs);
        }
    }

    fn read(&self, bank: u8) -> u32 {
        self.banks
            .get(bank as usize)
            .map_or(0, |regs| regs.read(DATAIN))
    }

    fn write(&mut self, bank: u8, set: u32, clear: u32) {
        if let Some(regs) = self.banks.get_mut(bank as usize) {
            if set != 0 {
                regs.write(SETDATAOUT, set);
            }
            if clear != 0 {
                regs.write(CLEARDATAOUT, clear);
            }
        }
    }
}
