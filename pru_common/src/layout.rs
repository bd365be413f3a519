//! Binary layout of the PRU data RAM.
//!
//! The data RAM is shared between the host and the PRU firmware. It starts
//! with a fixed 16-byte statics block, followed by task records handed out
//! by the host allocator. Every task record begins with an 8-byte header;
//! the firmware walks the records through the header `next` field forever.
//!
//! ```text
//! 0x0000 ┌────────────────────────────┐
//!        │ statics (16 bytes)         │
//! 0x0010 ├────────────────────────────┤
//!        │ task record #1             │──┐ next
//!        ├────────────────────────────┤  │
//!        │ task record #2             │◄─┘ ...
//!        ├────────────────────────────┤
//!        │ free                       │
//! 0x2000 └────────────────────────────┘
//! ```
//!
//! All multi-byte fields are little-endian. Offsets in this module are
//! relative to the start of the statics block or to the start of the task
//! record they belong to.

use static_assertions::const_assert_eq;
use thiserror::Error;

/// Error decoding a raw structure read back from the data RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// Task mode byte outside the known encoding.
    #[error("Unknown task mode: {0}")]
    UnknownMode(u8),

    /// Statics sentinel bytes do not match.
    #[error("Bad statics sentinel: {x:#04x} {y:#04x}")]
    BadSentinel {
        /// Byte found at the first sentinel position.
        x: u8,
        /// Byte found at the second sentinel position.
        y: u8,
    },
}

/// Task mode, shared with the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Mode {
    /// Inert record.
    None = 0,
    /// Busy-wait gate until the next period.
    Wait = 1,
    /// Raw register write.
    Write = 2,
    /// Raw register read.
    Read = 3,
    /// Step/direction pulse generator.
    StepDir = 4,
    /// Up/down pulse generator.
    UpDown = 5,
    /// Delta-sigma modulator.
    DeltaSigma = 6,
    /// PWM generator.
    Pwm = 7,
    /// Quadrature encoder counter.
    Encoder = 8,
}

impl Mode {
    /// Convert from raw `u8` value. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Wait),
            2 => Some(Self::Write),
            3 => Some(Self::Read),
            4 => Some(Self::StepDir),
            5 => Some(Self::UpDown),
            6 => Some(Self::DeltaSigma),
            7 => Some(Self::Pwm),
            8 => Some(Self::Encoder),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = LayoutError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(LayoutError::UnknownMode(value))
    }
}

// ─── Statics ────────────────────────────────────────────────────────

/// Byte size of the statics block.
pub const STATICS_SIZE: u32 = 16;

/// First sentinel byte.
pub const SENTINEL_X: u8 = 0xAB;

/// Second sentinel byte.
pub const SENTINEL_Y: u8 = 0xFE;

/// Field offsets inside the statics block.
pub mod statics {
    /// Mode byte, always `Mode::None`.
    pub const MODE: u32 = 0;
    /// Length byte, always 0.
    pub const LEN: u32 = 1;
    /// First sentinel.
    pub const SENTINEL_X: u32 = 2;
    /// Second sentinel.
    pub const SENTINEL_Y: u32 = 3;
    /// Offset of the first task record.
    pub const FIRST_TASK: u32 = 4;
    /// Control period in nanoseconds.
    pub const PERIOD: u32 = 8;
    /// Firmware-owned ready word, zeroed by the host.
    pub const READY: u32 = 12;
}

/// Decoded statics block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Statics {
    /// Offset of the first task record (0 while the list is empty).
    pub first_task: u32,
    /// Control period in nanoseconds.
    pub period_ns: u32,
    /// Firmware ready word.
    pub ready: u32,
}

impl Statics {
    /// Encode to the on-wire representation.
    pub fn to_bytes(&self) -> [u8; STATICS_SIZE as usize] {
        let mut raw = [0u8; STATICS_SIZE as usize];
        raw[statics::MODE as usize] = Mode::None as u8;
        raw[statics::LEN as usize] = 0;
        raw[statics::SENTINEL_X as usize] = SENTINEL_X;
        raw[statics::SENTINEL_Y as usize] = SENTINEL_Y;
        raw[4..8].copy_from_slice(&self.first_task.to_le_bytes());
        raw[8..12].copy_from_slice(&self.period_ns.to_le_bytes());
        raw[12..16].copy_from_slice(&self.ready.to_le_bytes());
        raw
    }

    /// Decode from the on-wire representation, checking the sentinels.
    pub fn from_bytes(raw: &[u8; STATICS_SIZE as usize]) -> Result<Self, LayoutError> {
        let (x, y) = (raw[2], raw[3]);
        if x != SENTINEL_X || y != SENTINEL_Y {
            return Err(LayoutError::BadSentinel { x, y });
        }
        Ok(Self {
            first_task: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
            period_ns: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
            ready: u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]),
        })
    }
}

const_assert_eq!(core::mem::size_of::<Statics>() + 4, STATICS_SIZE as usize);

// ─── Task header ────────────────────────────────────────────────────

/// Byte size of the common task header.
pub const TASK_HEADER_SIZE: u32 = 8;

/// Field offsets inside the task header.
///
/// The owning module writes bytes 0..4; only the task list builder writes
/// `NEXT`.
pub mod header {
    /// Task mode.
    pub const MODE: u32 = 0;
    /// Record length in 32-bit words, header included.
    pub const LEN: u32 = 1;
    /// Mode-specific scalar.
    pub const DATA_X: u32 = 2;
    /// Mode-specific scalar.
    pub const DATA_Y: u32 = 3;
    /// Offset of the next task record.
    pub const NEXT: u32 = 4;
}

/// Decoded task header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct TaskHeader {
    /// Task mode.
    pub mode: Mode,
    /// Record length in 32-bit words.
    pub len: u8,
    /// Mode-specific scalar.
    pub data_x: u8,
    /// Mode-specific scalar.
    pub data_y: u8,
    /// Offset of the next task record.
    pub next: u32,
}

const_assert_eq!(core::mem::size_of::<TaskHeader>(), TASK_HEADER_SIZE as usize);

impl TaskHeader {
    /// Encode to the on-wire representation.
    pub fn to_bytes(&self) -> [u8; TASK_HEADER_SIZE as usize] {
        let next = self.next.to_le_bytes();
        [
            self.mode as u8,
            self.len,
            self.data_x,
            self.data_y,
            next[0],
            next[1],
            next[2],
            next[3],
        ]
    }

    /// Decode from the on-wire representation.
    pub fn from_bytes(raw: &[u8; TASK_HEADER_SIZE as usize]) -> Result<Self, LayoutError> {
        Ok(Self {
            mode: Mode::try_from(raw[0])?,
            len: raw[1],
            data_x: raw[2],
            data_y: raw[3],
            next: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        })
    }
}

/// Record length in words for the `len` header byte.
pub const fn len_words(record_size: u32) -> u8 {
    let words = record_size.div_ceil(4);
    if words > u8::MAX as u32 {
        u8::MAX
    } else {
        words as u8
    }
}

// ─── Per-mode records ───────────────────────────────────────────────

/// Step/direction generator record.
///
/// Header `dataX` carries the enable flag, `dataY` is unused.
pub mod stepdir {
    /// Signed step rate added to the accumulator every task period (host).
    pub const RATE: u32 = 8;
    /// Step pulse length in task periods (host, u16).
    pub const STEPLEN: u32 = 12;
    /// Direction hold time in task periods (host, u16).
    pub const DIRHOLD: u32 = 14;
    /// Minimum space between steps in task periods (host, u16).
    pub const STEPSPACE: u32 = 16;
    /// Direction setup time in task periods (host, u16).
    pub const DIRSETUP: u32 = 18;
    /// Phase accumulator (firmware, initialised by host).
    pub const ACCUM: u32 = 20;
    /// Step position counter (firmware, initialised by host).
    pub const POS: u32 = 24;
    /// Step output wire pin (host).
    pub const STEP_PIN: u32 = 28;
    /// Direction output wire pin (host).
    pub const DIR_PIN: u32 = 29;
    /// Record size.
    pub const SIZE: u32 = 32;
}

/// PWM generator record.
///
/// Header `dataX` carries the output count. Outputs follow the fixed part.
pub mod pwm {
    /// PWM period in task periods (host, u16).
    pub const PERIOD: u32 = 8;
    /// First output slot.
    pub const OUTPUTS: u32 = 12;
    /// Size of one output slot.
    pub const OUTPUT_SIZE: u32 = 4;
    /// Output wire pin, relative to the slot (host).
    pub const OUT_PIN: u32 = 0;
    /// High time in task periods, relative to the slot (host, u16).
    pub const OUT_HIGH: u32 = 2;

    /// Record size for `outputs` outputs.
    pub const fn size(outputs: u32) -> u32 {
        OUTPUTS + outputs * OUTPUT_SIZE
    }
}

/// Delta-sigma modulator record.
///
/// Header `dataX` is the enable flag. Two outputs share the record; each
/// value is a 14-bit density where `FULL_SCALE` keeps the output high.
pub mod deltasig {
    /// Output 1 density (host, u16).
    pub const VALUE1: u32 = 8;
    /// Output 2 density (host, u16).
    pub const VALUE2: u32 = 10;
    /// Output 1 wire pin (host).
    pub const PIN1: u32 = 12;
    /// Output 2 wire pin (host).
    pub const PIN2: u32 = 13;
    /// Record size; bytes 14..16 are reserved.
    pub const SIZE: u32 = 16;
    /// Density of a permanently high output.
    pub const FULL_SCALE: u16 = 0x4000;
}

/// Quadrature encoder record.
///
/// Header `dataX` carries the channel count. Channels follow the header.
pub mod encoder {
    /// First channel slot.
    pub const CHANNELS: u32 = 8;
    /// Size of one channel slot.
    pub const CHANNEL_SIZE: u32 = 8;
    /// A input wire pin, relative to the slot (host).
    pub const A_PIN: u32 = 0;
    /// B input wire pin, relative to the slot (host).
    pub const B_PIN: u32 = 1;
    /// Index input wire pin, relative to the slot (host).
    pub const INDEX_PIN: u32 = 2;
    /// Counting mode, relative to the slot (host). 0 is quadrature.
    pub const MODE: u32 = 3;
    /// Free-running 16-bit counter, relative to the slot (firmware).
    pub const COUNT: u32 = 4;
    /// Counter latched on the last index pulse, relative to the slot (firmware).
    pub const INDEX_COUNT: u32 = 6;

    /// Record size for `channels` channels.
    pub const fn size(channels: u32) -> u32 {
        CHANNELS + channels * CHANNEL_SIZE
    }
}

/// Busy-wait gate record.
///
/// Header `dataX` is the busy indicator wire pin (host), `dataY` the busy
/// flag (firmware).
pub mod wait {
    /// Record size.
    pub const SIZE: u32 = super::TASK_HEADER_SIZE;
}
