//! Bump allocator for the PRU data RAM.
//!
//! Offsets are handed out upwards from the end of the statics block, rounded
//! to whole words, and never reclaimed. The allocator itself is infallible;
//! [`crate::context::PruContext::allocate`] checks the result against the
//! region length.

use pru_common::consts::WORD_SIZE;
use pru_common::layout::STATICS_SIZE;

/// Word-aligned bump allocator.
#[derive(Debug, Clone)]
pub struct BumpAllocator {
    next: u32,
}

impl BumpAllocator {
    /// Allocator starting right after the statics block.
    pub const fn new() -> Self {
        Self::starting_at(STATICS_SIZE)
    }

    /// Allocator starting at `base`, rounded up to a word.
    pub const fn starting_at(base: u32) -> Self {
        Self {
            next: base.next_multiple_of(WORD_SIZE),
        }
    }

    /// Reserve `len` bytes, rounded up to a multiple of 4, and return the
    /// offset of the reservation.
    pub fn allocate(&mut self, len: u32) -> u32 {
        let offset = self.next;
        let rounded = len.saturating_add(WORD_SIZE - 1) / WORD_SIZE * WORD_SIZE;
        self.next = self.next.saturating_add(rounded);
        offset
    }

    /// First offset not yet handed out.
    pub fn high_water(&self) -> u32 {
        self.next
    }
}

impl Default for BumpAllocator {
    fn default() -> Self {
        Self::new()
    }
}
