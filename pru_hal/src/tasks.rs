//! Cyclic task list.
//!
//! The firmware executes task records in the order given by their header
//! `next` field and wraps from the most recently added record back to the
//! first one. [`TaskList`] is the only writer of `next` fields and of the
//! statics `first_task` word.

use crate::region::SharedRegion;
use pru_common::layout::{header, statics, Mode, TASK_HEADER_SIZE};
use tracing::debug;

/// Host-side handle of one task record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    addr: u32,
    mode: Mode,
    size: u32,
    next: u32,
}

impl TaskRecord {
    /// Record at `addr` of `size` bytes, not yet linked.
    pub fn new(addr: u32, mode: Mode, size: u32) -> Self {
        Self {
            addr,
            mode,
            size,
            next: addr,
        }
    }

    /// Offset of the record in the region.
    pub fn addr(&self) -> u32 {
        self.addr
    }

    /// Task mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Record size in bytes, header included.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// `next` value written when the record was linked.
    pub fn next(&self) -> u32 {
        self.next
    }

    /// Offset of a payload field of this record.
    ///
    /// # Panics
    /// When `offset` lies outside the record. Field offsets are layout
    /// constants, so this is checked in release builds too rather than
    /// letting a write land in the next record.
    pub fn field(&self, offset: u32) -> u32 {
        assert!(
            offset < self.size,
            "field offset {offset} outside {:?} record of {} bytes",
            self.mode,
            self.size
        );
        self.addr + offset
    }
}

/// Builder of the singly-linked cyclic task list.
#[derive(Debug, Default)]
pub struct TaskList {
    head: Option<u32>,
    last: Option<u32>,
    len: usize,
}

impl TaskList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record` to the ring.
    ///
    /// The first record becomes the head, is published in the statics block
    /// and points to itself. Every later record points to the head and is
    /// linked after the previously added one.
    pub fn add_task(&mut self, region: &mut SharedRegion, record: &mut TaskRecord) {
        match (self.head, self.last) {
            (Some(head), Some(last)) => {
                record.next = head;
                region.write_u32(record.addr + header::NEXT, head);
                region.write_u32(last + header::NEXT, record.addr);
            }
            _ => {
                record.next = record.addr;
                region.write_u32(statics::FIRST_TASK, record.addr);
                region.write_u32(record.addr + header::NEXT, record.addr);
                self.head = Some(record.addr);
            }
        }
        self.last = Some(record.addr);
        self.len += 1;
        debug!(
            "Task {} added: {:?} at {:#06x}, next {:#06x}",
            self.len, record.mode, record.addr, record.next
        );
    }

    /// Offset of the first record.
    pub fn head(&self) -> Option<u32> {
        self.head
    }

    /// Number of linked records.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no record is linked.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Record offsets in firmware visitation order, read back from the region.
    ///
    /// Stops when the walk returns to the head, leaves the region, or has
    /// taken more steps than records were added.
    pub fn walk(&self, region: &SharedRegion) -> Vec<u32> {
        let mut order = Vec::with_capacity(self.len);
        let Some(head) = self.head else {
            return order;
        };
        let mut addr = head;
        while order.len() <= self.len {
            order.push(addr);
            if addr + TASK_HEADER_SIZE > region.len() {
                break;
            }
            addr = region.read_u32(addr + header::NEXT);
            if addr == head {
                break;
            }
        }
        order
    }
}
