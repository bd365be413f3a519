//! PRU-ICSS interrupt controller setup.
//!
//! The standard routing used with `uio_pruss`:
//!
//! | System event          | Channel | Host              |
//! |-----------------------|---------|-------------------|
//! | 17 PRU0 to PRU1       | 1       | 1 (PRU1)          |
//! | 18 PRU1 to PRU0       | 0       | 0 (PRU0)          |
//! | 19 PRU0 to ARM        | 2       | 2 (EVTOUT0, uio0) |
//! | 20 PRU1 to ARM        | 3       | 3 (EVTOUT1, uio1) |
//! | 21 ARM to PRU0        | 0       | 0 (PRU0)          |
//! | 22 ARM to PRU1        | 1       | 1 (PRU1)          |

use super::regs::RegisterWindow;

/// Global enable register.
pub const GER: usize = 0x010;
/// System event index clear register.
pub const SICR: usize = 0x024;
/// Host interrupt index enable set register.
pub const HIEISR: usize = 0x034;
/// System event enable clear/status registers, events 0..32 and 32..64.
pub const SECR: [usize; 2] = [0x280, 0x284];
/// System event enable set registers.
pub const ESR: [usize; 2] = [0x300, 0x304];
/// First channel map register; one byte per system event.
pub const CMR: usize = 0x400;
/// First host map register; one byte per channel.
pub const HMR: usize = 0x800;
/// System event polarity registers.
pub const SIPR: [usize; 2] = [0xD00, 0xD04];
/// System event type registers.
pub const SITR: [usize; 2] = [0xD80, 0xD84];

/// Number of system events.
const SYS_EVENTS: usize = 64;
/// Number of channels and host interrupts.
const CHANNELS: usize = 10;

/// Routing of system events to channels and channels to hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntcMapping {
    /// `(system event, channel)` pairs; every listed event is enabled.
    pub events: &'static [(u8, u8)],
    /// `(channel, host)` pairs.
    pub channels: &'static [(u8, u8)],
    /// Host interrupts to enable.
    pub hosts: &'static [u8],
}

impl IntcMapping {
    /// Routing expected by `uio_pruss` userspace.
    pub const STANDARD: Self = Self {
        events: &[(17, 1), (18, 0), (19, 2), (20, 3), (21, 0), (22, 1)],
        channels: &[(0, 0), (1, 1), (2, 2), (3, 3)],
        hosts: &[0, 1, 2, 3],
    };

    /// Register writes that program this mapping, in order.
    pub fn register_writes(&self) -> Vec<(usize, u32)> {
        let mut writes = vec![(SIPR[0], u32::MAX), (SIPR[1], u32::MAX)];

        let mut cmr = [0u32; SYS_EVENTS / 4];
        for &(event, channel) in self.events {
            let event = event as usize % SYS_EVENTS;
            cmr[event / 4] |= u32::from(channel & 0xF) << ((event % 4) * 8);
        }
        writes.extend(cmr.iter().enumerate().map(|(i, w)| (CMR + i * 4, *w)));

        let mut hmr = [0u32; CHANNELS.div_ceil(4)];
        for &(channel, host) in self.channels {
            let channel = channel as usize % CHANNELS;
            hmr[channel / 4] |= u32::from(host & 0xF) << ((channel % 4) * 8);
        }
        writes.extend(hmr.iter().enumerate().map(|(i, w)| (HMR + i * 4, *w)));

        writes.push((SITR[0], 0));
        writes.push((SITR[1], 0));

        let mut enabled = [0u32; 2];
        for &(event, _) in self.events {
            let event = event as usize % SYS_EVENTS;
            enabled[event / 32] |= 1 << (event % 32);
        }
        for half in 0..2 {
            writes.push((ESR[half], enabled[half]));
            writes.push((SECR[half], enabled[half]));
        }

        writes.extend(self.hosts.iter().map(|h| (HIEISR, u32::from(*h))));
        writes.push((GER, 1));
        writes
    }

    /// Program the interrupt controller.
    pub fn program(&self, intc: &mut RegisterWindow) {
        for (offset, value) in self.register_writes() {
            intc.write(offset, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pru_common::unit::PruUnit;

    fn value_at(writes: &[(usize, u32)], offset: usize) -> Vec<u32> {
        writes
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    #[test]
    fn arm_interrupts_reach_evtout_hosts() {
        let writes = IntcMapping::STANDARD.register_writes();
        // CMR4 holds events 16..20: 17 -> 1, 18 -> 0, 19 -> 2.
        assert_eq!(value_at(&writes, CMR + 16), [0x0200_0100]);
        // CMR5 holds events 20..24: 20 -> 3, 21 -> 0, 22 -> 1.
        assert_eq!(value_at(&writes, CMR + 20), [0x0001_0003]);
        // Channels 0..4 map straight to hosts 0..4.
        assert_eq!(value_at(&writes, HMR), [0x0302_0100]);
        assert_eq!(value_at(&writes, HMR + 4), [0]);

        let unit_events =
            (1 << PruUnit::Pru0.arm_interrupt()) | (1 << PruUnit::Pru1.arm_interrupt());
        let enabled = value_at(&writes, ESR[0])[0];
        assert_eq!(enabled & unit_events, unit_events);
        assert_eq!(enabled, 0x007E_0000);
        assert_eq!(value_at(&writes, ESR[1]), [0]);
    }

    #[test]
    fn global_enable_comes_last() {
        let writes = IntcMapping::STANDARD.register_writes();
        assert_eq!(writes.last(), Some(&(GER, 1)));
        assert_eq!(value_at(&writes, HIEISR), [0, 1, 2, 3]);
        assert_eq!(value_at(&writes, SIPR[0]), [u32::MAX]);
        let cmr_writes = writes
            .iter()
            .filter(|(o, _)| (CMR..CMR + 64).contains(o))
            .count();
        assert_eq!(cmr_writes, 16);
    }
}
