//! Shared state of the simulated PRU-ICSS.

use crate::drivers::EventChannel;
use crate::gpio::MemoryGpio;
use pru_common::unit::PruUnit;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Poll interval of [`SimulatedEvents::wait`].
const EVENT_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Default)]
struct UnitState {
    running: AtomicBool,
    resets: AtomicU32,
    starts: AtomicU32,
    image_len: AtomicUsize,
}

#[derive(Debug, Default)]
struct Inner {
    units: [UnitState; 2],
    pending_events: AtomicU32,
    events_raised: AtomicU32,
    events_cleared: AtomicU32,
    opened_event: AtomicU32,
    cleared_sys_event: AtomicU32,
}

/// Observer and stimulus side of a [`super::SimulationDriver`].
///
/// Clones share state with the driver they were taken from.
#[derive(Debug, Clone, Default)]
pub struct SimulationHandle {
    inner: Arc<Inner>,
    gpio: MemoryGpio,
}

impl SimulationHandle {
    fn unit(&self, unit: PruUnit) -> &UnitState {
        &self.inner.units[unit.index()]
    }

    /// True while `unit` is released from reset.
    pub fn is_running(&self, unit: PruUnit) -> bool {
        self.unit(unit).running.load(Ordering::SeqCst)
    }

    /// Number of times `unit` was put into reset.
    pub fn reset_count(&self, unit: PruUnit) -> u32 {
        self.unit(unit).resets.load(Ordering::SeqCst)
    }

    /// Number of times `unit` was started.
    pub fn start_count(&self, unit: PruUnit) -> u32 {
        self.unit(unit).starts.load(Ordering::SeqCst)
    }

    /// Length of the last image loaded into `unit`.
    pub fn image_len(&self, unit: PruUnit) -> usize {
        self.unit(unit).image_len.load(Ordering::SeqCst)
    }

    /// Raise one PRU-to-host event.
    pub fn raise_event(&self) {
        self.inner.pending_events.fetch_add(1, Ordering::SeqCst);
    }

    /// Events delivered to the listener so far.
    pub fn events_raised(&self) -> u32 {
        self.inner.events_raised.load(Ordering::SeqCst)
    }

    /// Events acknowledged by the listener so far.
    pub fn events_cleared(&self) -> u32 {
        self.inner.events_cleared.load(Ordering::SeqCst)
    }

    /// Event channel number opened at bring-up.
    pub fn opened_event(&self) -> u32 {
        self.inner.opened_event.load(Ordering::SeqCst)
    }

    /// System event the last acknowledge cleared.
    pub fn cleared_sys_event(&self) -> u32 {
        self.inner.cleared_sys_event.load(Ordering::SeqCst)
    }

    /// GPIO banks shared with the driver.
    pub fn gpio(&self) -> &MemoryGpio {
        &self.gpio
    }

    pub(super) fn record_reset(&self, unit: PruUnit) {
        let state = self.unit(unit);
        state.running.store(false, Ordering::SeqCst);
        state.resets.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn record_load(&self, unit: PruUnit, len: usize) {
        self.unit(unit).image_len.store(len, Ordering::SeqCst);
    }

    pub(super) fn record_start(&self, unit: PruUnit) {
        let state = self.unit(unit);
        state.running.store(true, Ordering::SeqCst);
        state.starts.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn record_stop(&self, unit: PruUnit) {
        self.unit(unit).running.store(false, Ordering::SeqCst);
    }

    pub(super) fn events(&self, unit: PruUnit, event: u8) -> SimulatedEvents {
        self.inner
            .opened_event
            .store(event as u32, Ordering::SeqCst);
        SimulatedEvents {
            inner: Arc::clone(&self.inner),
            sys_event: unit.arm_interrupt(),
        }
    }
}

/// Event channel fed by [`SimulationHandle::raise_event`].
#[derive(Debug)]
pub struct SimulatedEvents {
    inner: Arc<Inner>,
    sys_event: u32,
}

impl EventChannel for SimulatedEvents {
    fn wait(&mut self, timeout: Duration) -> std::io::Result<Option<u32>> {
        let deadline = Instant::now() + timeout;
        loop {
            let taken = self
                .inner
                .pending_events
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if taken.is_ok() {
                let count = self.inner.events_raised.fetch_add(1, Ordering::SeqCst) + 1;
                return Ok(Some(count));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(EVENT_POLL.min(deadline - now));
        }
    }

    fn clear(&mut self) {
        self.inner
            .cleared_sys_event
            .store(self.sys_event, Ordering::SeqCst);
        self.inner.events_cleared.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_counted() {
        let handle = SimulationHandle::default();
        let mut events = handle.events(PruUnit::Pru0, 3);
        assert_eq!(handle.opened_event(), 3);
        assert_eq!(events.wait(Duration::from_millis(1)).unwrap(), None);

        handle.raise_event();
        handle.raise_event();
        assert_eq!(events.wait(Duration::from_millis(1)).unwrap(), Some(1));
        events.clear();
        assert_eq!(events.wait(Duration::from_millis(1)).unwrap(), Some(2));
        assert_eq!(handle.events_raised(), 2);
        assert_eq!(handle.events_cleared(), 1);
        assert_eq!(handle.cleared_sys_event(), 19);
    }

    #[test]
    fn unit_lifecycle() {
        let handle = SimulationHandle::default();
        handle.record_reset(PruUnit::Pru1);
        handle.record_load(PruUnit::Pru1, 64);
        handle.record_start(PruUnit::Pru1);
        assert!(handle.is_running(PruUnit::Pru1));
        assert!(!handle.is_running(PruUnit::Pru0));
        assert_eq!(handle.image_len(PruUnit::Pru1), 64);
        handle.record_stop(PruUnit::Pru1);
        assert!(!handle.is_running(PruUnit::Pru1));
        assert_eq!(handle.reset_count(PruUnit::Pru1), 1);
        assert_eq!(handle.start_count(PruUnit::Pru1), 1);
    }
}
