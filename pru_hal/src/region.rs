//! Shared data RAM region.
//!
//! [`SharedRegion`] is the PRU data RAM seen from the host: a fixed-size
//! byte window, backed either by a `/dev/mem` mapping or by an owned buffer
//! for simulation. All access goes through little-endian accessors at
//! explicit byte offsets.
//!
//! # Panics
//!
//! Accessors panic when an offset lies outside the region. Offsets come from
//! the allocator, which checks every allocation against the region length,
//! so an out-of-range access is a layout bug.

use memmap2::MmapMut;

enum Backing {
    Heap(Box<[u8]>),
    Mapped(MmapMut),
}

/// Byte window shared with the PRU firmware.
pub struct SharedRegion {
    backing: Backing,
    len: u32,
}

/// Addressable length of `bytes`. Offsets are `u32`, so anything past
/// `u32::MAX` is out of reach and not counted.
fn addressable_len(bytes: usize) -> u32 {
    u32::try_from(bytes).unwrap_or(u32::MAX)
}

impl SharedRegion {
    /// Zero-filled heap-backed region of `len` bytes.
    pub fn heap(len: usize) -> Self {
        Self {
            backing: Backing::Heap(vec![0u8; len].into_boxed_slice()),
            len: addressable_len(len),
        }
    }

    /// Region over a memory mapping of the data RAM.
    pub fn mapped(map: MmapMut) -> Self {
        let len = addressable_len(map.len());
        Self {
            backing: Backing::Mapped(map),
            len,
        }
    }

    /// True when backed by a hardware mapping.
    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// Region length in bytes.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// True for a zero-length region.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whole region as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Heap(buf) => buf,
            Backing::Mapped(map) => map,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.backing {
            Backing::Heap(buf) => buf,
            Backing::Mapped(map) => map,
        }
    }

    /// Fill the region with zeros.
    pub fn zero(&mut self) {
        self.bytes_mut().fill(0);
    }

    fn slice<const N: usize>(&self, offset: u32) -> [u8; N] {
        let start = offset as usize;
        let mut raw = [0u8; N];
        raw.copy_from_slice(&self.as_bytes()[start..start + N]);
        raw
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    pub fn read_bytes(&self, offset: u32, buf: &mut [u8]) {
        let start = offset as usize;
        buf.copy_from_slice(&self.as_bytes()[start..start + buf.len()]);
    }

    /// Copy `data` into the region starting at `offset`.
    pub fn write_bytes(&mut self, offset: u32, data: &[u8]) {
        let start = offset as usize;
        self.bytes_mut()[start..start + data.len()].copy_from_slice(data);
    }

    /// Read one byte.
    pub fn read_u8(&self, offset: u32) -> u8 {
        self.as_bytes()[offset as usize]
    }

    /// Write one byte.
    pub fn write_u8(&mut self, offset: u32, value: u8) {
        self.bytes_mut()[offset as usize] = value;
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&self, offset: u32) -> u16 {
        u16::from_le_bytes(self.slice(offset))
    }

    /// Write a little-endian `u16`.
    pub fn write_u16(&mut self, offset: u32, value: u16) {
        self.write_bytes(offset, &value.to_le_bytes());
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&self, offset: u32) -> u32 {
        u32::from_le_bytes(self.slice(offset))
    }

    /// Write a little-endian `u32`.
    pub fn write_u32(&mut self, offset: u32, value: u32) {
        self.write_bytes(offset, &value.to_le_bytes());
    }

    /// Read a little-endian `i32`.
    pub fn read_i32(&self, offset: u32) -> i32 {
        i32::from_le_bytes(self.slice(offset))
    }

    /// Write a little-endian `i32`.
    pub fn write_i32(&mut self, offset: u32, value: i32) {
        self.write_bytes(offset, &value.to_le_bytes());
    }

    /// Read a little-endian `u64`.
    pub fn read_u64(&self, offset: u32) -> u64 {
        u64::from_le_bytes(self.slice(offset))
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
