//! AM335x PRU-ICSS register map and `/dev/mem` windows.

use crate::error::BringUpError;
use bitflags::bitflags;
use memmap2::{MmapMut, MmapOptions};
use pru_common::consts::{PRU_DATA_RAM_SIZE, PRU_IRAM_SIZE};
use pru_common::unit::PruUnit;
use std::fs::File;

/// Physical base of the PRU-ICSS.
pub const PRUSS_BASE: u64 = 0x4A30_0000;

/// Interrupt controller offset.
pub const INTC_OFFSET: u64 = 0x2_0000;
/// Interrupt controller window length.
pub const INTC_LEN: usize = 0x2000;

/// Control register window length.
pub const CONTROL_LEN: usize = 0x1000;
/// Control register offset within its window.
pub const CONTROL: usize = 0x00;

/// Data RAM offset of `unit`.
pub const fn data_ram_offset(unit: PruUnit) -> u64 {
    match unit {
        PruUnit::Pru0 => 0x0_0000,
        PruUnit::Pru1 => 0x0_2000,
    }
}

/// Instruction RAM offset of `unit`.
pub const fn iram_offset(unit: PruUnit) -> u64 {
    match unit {
        PruUnit::Pru0 => 0x3_4000,
        PruUnit::Pru1 => 0x3_8000,
    }
}

/// Control register page offset of `unit`.
pub const fn control_offset(unit: PruUnit) -> u64 {
    match unit {
        PruUnit::Pru0 => 0x2_2000,
        PruUnit::Pru1 => 0x2_4000,
    }
}

/// Length of the data RAM window.
pub const DATA_RAM_LEN: usize = PRU_DATA_RAM_SIZE;
/// Length of the instruction RAM window.
pub const IRAM_LEN: usize = PRU_IRAM_SIZE;

bitflags! {
    /// PRU CONTROL register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PruControl: u32 {
        /// Clear to hold the core in soft reset.
        const SOFT_RST_N     = 1 << 0;
        /// Core executes instructions.
        const ENABLE         = 1 << 1;
        /// Core is in SLP.
        const SLEEPING       = 1 << 2;
        /// Cycle counter runs.
        const COUNTER_ENABLE = 1 << 3;
        /// Execute one instruction per enable.
        const SINGLE_STEP    = 1 << 8;
        /// Core is running (read-only).
        const RUNSTATE       = 1 << 15;
    }
}

impl PruControl {
    /// Value written to start the core at instruction 0.
    pub const RUN: Self = Self::SOFT_RST_N
        .union(Self::ENABLE)
        .union(Self::COUNTER_ENABLE);
}

/// Map `len` bytes of physical memory at `phys` through `/dev/mem`.
///
/// # Errors
/// `Map` when the kernel refuses the mapping.
pub fn map_physical(
    mem: &File,
    phys: u64,
    len: usize,
    what: &'static str,
) -> Result<MmapMut, BringUpError> {
    // SAFETY: the mapping covers device memory that only this process maps;
    // accesses go through the volatile helpers below or `SharedRegion`.
    unsafe { MmapOptions::new().offset(phys).len(len).map_mut(mem) }
        .map_err(|source| BringUpError::Map { what, source })
}

/// A mapped register window with 32-bit volatile access.
pub struct RegisterWindow {
    map: MmapMut,
}

impl RegisterWindow {
    /// Map a window.
    ///
    /// # Errors
    /// `Map`.
    pub fn open(
        mem: &File,
        phys: u64,
        len: usize,
        what: &'static str,
    ) -> Result<Self, BringUpError> {
        Ok(Self {
            map: map_physical(mem, phys, len, what)?,
        })
    }

    fn word_ptr(&self, offset: usize) -> *const u32 {
        assert!(
            offset % 4 == 0 && offset + 4 <= self.map.len(),
            "register offset {offset:#x} outside window"
        );
        // SAFETY: bounds and alignment checked above.
        unsafe { self.map.as_ptr().add(offset) as *const u32 }
    }

    /// Read the register at `offset`.
    ///
    /// # Panics
    /// When `offset` is unaligned or outside the window.
    pub fn read(&self, offset: usize) -> u32 {
        let ptr = self.word_ptr(offset);
        // SAFETY: `ptr` is an aligned word inside the live mapping.
        unsafe { std::ptr::read_volatile(ptr) }
    }

    /// Write the register at `offset`.
    ///
    /// # Panics
    /// When `offset` is unaligned or outside the window.
    pub fn write(&mut self, offset: usize, value: u32) {
        let ptr = self.word_ptr(offset) as *mut u32;
        // SAFETY: `ptr` is an aligned word inside the live, writable mapping.
        unsafe { std::ptr::write_volatile(ptr, value) }
    }

    /// Copy `data` word by word to the start of the window. A trailing
    /// partial word is zero-padded.
    pub fn write_words(&mut self, data: &[u8]) {
        for (i, chunk) in data.chunks(4).enumerate() {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.write(i * 4, u32::from_le_bytes(word));
        }
    }
}
