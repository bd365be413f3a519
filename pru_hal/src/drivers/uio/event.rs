//! UIO event channel.
//!
//! Each `/dev/uio<N>` of `uio_pruss` delivers one PRU-to-host interrupt.
//! A 4-byte read blocks until the next interrupt and returns the running
//! interrupt count. The system event the PRU raised is acknowledged through
//! the INTC so the next one can fire.

use super::intc::SICR;
use super::regs::RegisterWindow;
use crate::drivers::EventChannel;
use crate::error::BringUpError;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use pru_common::unit::PruUnit;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::fd::AsFd;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Path of the UIO device for `event`.
pub fn device_path(event: u8) -> PathBuf {
    PathBuf::from(format!("/dev/uio{event}"))
}

/// Open UIO device with INTC access for acknowledging.
pub struct UioEvents {
    device: File,
    sys_event: u32,
    intc: RegisterWindow,
}

impl UioEvents {
    /// Open `/dev/uio<event>` for the events `unit` raises.
    ///
    /// # Errors
    /// `EventDevice` when the device cannot be opened.
    pub fn open(unit: PruUnit, event: u8, intc: RegisterWindow) -> Result<Self, BringUpError> {
        let path = device_path(event);
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| BringUpError::EventDevice {
                path: path.clone(),
                source,
            })?;
        debug!(
            "Opened event device {:?} for {} system event {}",
            path,
            unit,
            unit.arm_interrupt()
        );
        Ok(Self {
            device,
            sys_event: unit.arm_interrupt(),
            intc,
        })
    }
}

impl EventChannel for UioEvents {
    fn wait(&mut self, timeout: Duration) -> std::io::Result<Option<u32>> {
        let ms = timeout.as_millis().min(u16::MAX as u128) as u16;
        let ready = {
            let mut fds = [PollFd::new(self.device.as_fd(), PollFlags::POLLIN)];
            poll(&mut fds, PollTimeout::from(ms))?
        };
        if ready == 0 {
            return Ok(None);
        }
        let mut buf = [0u8; 4];
        self.device.read_exact(&mut buf)?;
        Ok(Some(u32::from_ne_bytes(buf)))
    }

    fn clear(&mut self) {
        self.intc.write(SICR, self.sys_event);
    }
}
