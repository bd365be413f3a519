//! Background listener for PRU-to-host events.
//!
//! Waits on the event channel with a short timeout so it can observe the
//! stop flag, logs and acknowledges each event, and never touches the
//! shared region.

use crate::drivers::EventChannel;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Wait timeout between stop-flag checks.
const WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Handle of the running listener thread.
pub struct EventListener {
    stop: Arc<AtomicBool>,
    events_seen: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl EventListener {
    /// Move `channel` to a new thread and start listening.
    ///
    /// # Errors
    /// Thread spawn failure.
    pub fn spawn(mut channel: Box<dyn EventChannel>) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let events_seen = Arc::new(AtomicU64::new(0));
        let thread_stop = Arc::clone(&stop);
        let thread_seen = Arc::clone(&events_seen);

        let handle = std::thread::Builder::new()
            .name("pru-events".to_string())
            .spawn(move || {
                debug!("Event listener started");
                while !thread_stop.load(Ordering::SeqCst) {
                    match channel.wait(WAIT_TIMEOUT) {
                        Ok(Some(count)) => {
                            thread_seen.fetch_add(1, Ordering::Relaxed);
                            debug!("PRU event (count {})", count);
                            channel.clear();
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!("Event channel error: {}", e);
                            std::thread::sleep(WAIT_TIMEOUT);
                        }
                    }
                }
                debug!("Event listener stopped");
            })?;

        Ok(Self {
            stop,
            events_seen,
            handle: Some(handle),
        })
    }

    /// Events handled so far.
    pub fn events_seen(&self) -> u64 {
        self.events_seen.load(Ordering::Relaxed)
    }

    /// Signal the thread to stop and wait for it.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Event listener thread panicked");
        }
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        self.stop();
    }
}
