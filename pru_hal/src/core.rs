//! PRU Core struct, bring-up/teardown and host cycle loop.
//!
//! The `PruCore` struct is the main entry point: it owns the driver, the
//! exported signals, the data RAM context and the modules, and runs the
//! strictly sequential bring-up.

use crate::context::PruContext;
use crate::cycle::CycleCoordinator;
use crate::drivers::{EventChannel, PruDriver};
use crate::error::{BringUpError, PruError};
use crate::firmware;
use crate::listener::EventListener;
use crate::modules::build_modules;
use crate::signals::SignalTable;
use pru_common::config::PruConfig;
use pru_common::consts::FIRMWARE_FALLBACK_DIR;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// PRU Core manages the coprocessor and the host cycle.
pub struct PruCore {
    /// Driver configuration
    config: PruConfig,
    /// Platform driver
    driver: Box<dyn PruDriver>,
    /// Exported signals and functions
    signals: SignalTable,
    /// Modules, once built
    coordinator: Option<CycleCoordinator>,
    /// Data RAM, allocator, task list and pin claims
    context: Option<PruContext>,
    /// Event channel opened at bring-up and not handed to a listener
    events: Option<Box<dyn EventChannel>>,
    /// Listener thread when an event is configured
    listener: Option<EventListener>,
    /// Directory searched for the firmware image
    firmware_dir: PathBuf,
    /// Running flag for cycle loop control
    running: Arc<AtomicBool>,
    /// PRU released from reset
    started: bool,
    /// Timing statistics
    stats: TimingStats,
}

/// Timing statistics for host cycle monitoring.
#[derive(Debug, Default)]
struct TimingStats {
    /// Number of cycles executed
    cycle_count: u64,
    /// Number of timing violations (cycle exceeded target)
    timing_violations: u64,
    /// Maximum observed cycle time
    max_cycle_time_us: u64,
    /// Sum of cycle times for average calculation
    total_cycle_time_us: u64,
}

impl PruCore {
    /// Create a new PruCore for `config` on `driver`.
    ///
    /// # Errors
    /// Returns error if configuration validation fails.
    pub fn new(config: PruConfig, driver: Box<dyn PruDriver>) -> Result<Self, PruError> {
        config.validate()?;

        info!(
            "PruCore created: driver {} v{}, {} on {}, period {}ns",
            driver.name(),
            driver.version(),
            config.prefix,
            config.pru,
            config.period_ns
        );

        Ok(Self {
            config,
            driver,
            signals: SignalTable::new(),
            coordinator: None,
            context: None,
            events: None,
            listener: None,
            firmware_dir: PathBuf::from(FIRMWARE_FALLBACK_DIR),
            running: Arc::new(AtomicBool::new(false)),
            started: false,
            stats: TimingStats::default(),
        })
    }

    /// Search `dir` instead of the installation directory for firmware.
    pub fn with_firmware_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.firmware_dir = dir.into();
        self
    }

    /// Bring the coprocessor up. Each step gates the next; on failure
    /// everything done so far is undone.
    ///
    /// # Errors
    /// The first failing step.
    pub fn bring_up(&mut self) -> Result<(), PruError> {
        if self.context.is_some() {
            return Ok(());
        }
        let result = self.try_bring_up();
        if result.is_err() {
            self.teardown();
            self.signals = SignalTable::new();
        }
        result
    }

    fn try_bring_up(&mut self) -> Result<(), PruError> {
        let unit = self.config.pru;
        info!("Bringing up {} with driver '{}'...", unit, self.driver.name());

        self.driver.check_privileges()?;
        self.driver.ensure_kernel_module()?;

        let event = self.config.event.unwrap_or(0);
        self.events = Some(self.driver.open_events(unit, event)?);
        debug!("Event channel {} open", event);

        let region = self.driver.map_data_ram(unit)?;
        self.driver.reset(unit)?;
        let mut context = PruContext::new(region, unit, self.config.period_ns);

        let gpio = if self.config.gpio.is_empty() {
            None
        } else {
            Some(self.driver.gpio_banks()?)
        };
        let modules = build_modules(&self.config, &mut self.signals, gpio)?;
        let mut coordinator =
            CycleCoordinator::new(&self.config.prefix, modules, &mut self.signals)?;
        coordinator.init(&mut context)?;
        info!(
            "{} tasks laid out, {} of {} bytes used, {} signals exported",
            context.tasks().len(),
            context.high_water(),
            context.region().len(),
            self.signals.len()
        );
        self.context = Some(context);
        self.coordinator = Some(coordinator);

        let path = firmware::locate(&self.config.firmware, &self.firmware_dir)?;
        let image = firmware::load(&path)?;
        self.driver.load_firmware(unit, &image)?;
        if self.config.disabled {
            info!("{} left disabled", unit);
        } else {
            self.driver.start(unit)?;
            self.started = true;
        }

        if self.config.event.is_some()
            && let Some(channel) = self.events.take()
        {
            let listener = EventListener::spawn(channel).map_err(BringUpError::Listener)?;
            self.listener = Some(listener);
            info!("Listening for event {}", event);
        }

        info!("PruCore brought up successfully");
        Ok(())
    }

    /// Publish firmware-owned fields (`<prefix>.capture-position`).
    ///
    /// # Errors
    /// `NotBroughtUp`.
    pub fn capture(&mut self) -> Result<(), PruError> {
        match (self.coordinator.as_mut(), self.context.as_ref()) {
            (Some(coordinator), Some(context)) => {
                coordinator.capture(context.region());
                Ok(())
            }
            _ => Err(PruError::NotBroughtUp),
        }
    }

    /// Write changed host-owned fields (`<prefix>.update`).
    ///
    /// # Errors
    /// `NotBroughtUp`.
    pub fn update(&mut self) -> Result<(), PruError> {
        match (self.coordinator.as_mut(), self.context.as_mut()) {
            (Some(coordinator), Some(context)) => {
                coordinator.update(context.region_mut());
                Ok(())
            }
            _ => Err(PruError::NotBroughtUp),
        }
    }

    /// Run capture then update every servo period until the running flag is
    /// cleared or `cycles` cycles have run.
    ///
    /// # Errors
    /// `NotBroughtUp`.
    pub fn run(&mut self, cycles: Option<u64>) -> Result<(), PruError> {
        if self.context.is_none() {
            return Err(PruError::NotBroughtUp);
        }
        let cycle_time = Duration::from_nanos(self.config.servo_period_ns as u64);
        let target_us = cycle_time.as_micros() as u64;

        info!(
            "Starting PruCore cycle loop (cycle_time={}us)...",
            target_us
        );
        self.running.store(true, Ordering::SeqCst);

        // Detect RT mode
        if detect_rt_mode() {
            info!("Running in real-time mode");
        } else {
            info!("Running in standard (non-RT) mode");
        }

        let mut executed = 0u64;
        while self.running.load(Ordering::SeqCst) && cycles.is_none_or(|n| executed < n) {
            let cycle_start = Instant::now();

            self.capture()?;
            self.update()?;
            executed += 1;

            // Update timing stats
            let cycle_time_us = cycle_start.elapsed().as_micros() as u64;
            self.stats.cycle_count += 1;
            self.stats.total_cycle_time_us += cycle_time_us;
            if cycle_time_us > self.stats.max_cycle_time_us {
                self.stats.max_cycle_time_us = cycle_time_us;
            }

            // Check for timing violation
            if cycle_time_us > target_us {
                self.stats.timing_violations += 1;
                if self.stats.timing_violations <= 10 || self.stats.timing_violations % 1000 == 0 {
                    warn!(
                        "Timing violation #{}: cycle took {}us (target {}us)",
                        self.stats.timing_violations, cycle_time_us, target_us
                    );
                }
            }

            // Sleep for remaining cycle time
            let elapsed = cycle_start.elapsed();
            if elapsed < cycle_time {
                std::thread::sleep(cycle_time - elapsed);
            }

            // Debug log every 1000 cycles
            if self.stats.cycle_count % 1000 == 0 {
                debug!(
                    "Cycle loop: {} cycles, avg={}us, max={}us, violations={}",
                    self.stats.cycle_count,
                    self.stats.total_cycle_time_us / self.stats.cycle_count,
                    self.stats.max_cycle_time_us,
                    self.stats.timing_violations
                );
            }
        }
        self.running.store(false, Ordering::SeqCst);

        info!(
            "PruCore cycle loop stopped after {} cycles (violations: {})",
            self.stats.cycle_count, self.stats.timing_violations
        );
        Ok(())
    }

    /// Stop the listener and the PRU, then release the data RAM and the
    /// event channel. Safe to call more than once.
    pub fn teardown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(mut listener) = self.listener.take() {
            listener.stop();
        }
        if self.started || self.context.is_some() {
            if let Err(e) = self.driver.stop(self.config.pru) {
                warn!("Failed to stop {}: {}", self.config.pru, e);
            }
            self.started = false;
        }
        if self.context.is_some() {
            info!("PruCore torn down");
        }
        self.coordinator = None;
        self.context = None;
        self.events = None;
    }

    /// Exported signals.
    pub fn signals(&self) -> &SignalTable {
        &self.signals
    }

    /// Data RAM context, after bring-up.
    pub fn context(&self) -> Option<&PruContext> {
        self.context.as_ref()
    }

    /// Data RAM context, mutably.
    pub fn context_mut(&mut self) -> Option<&mut PruContext> {
        self.context.as_mut()
    }

    /// Configuration in use.
    pub fn config(&self) -> &PruConfig {
        &self.config
    }

    /// True once the PRU has been released from reset.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Events handled by the listener, when one runs.
    pub fn events_seen(&self) -> Option<u64> {
        self.listener.as_ref().map(EventListener::events_seen)
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Get timing statistics: cycles, violations, max cycle time in us.
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.stats.cycle_count,
            self.stats.timing_violations,
            self.stats.max_cycle_time_us,
        )
    }

    /// Firmware search directory.
    pub fn firmware_dir(&self) -> &Path {
        &self.firmware_dir
    }
}

impl Drop for PruCore {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{sched_getscheduler, SCHED_FIFO, SCHED_RR};
        // SAFETY: sched_getscheduler(0) only queries the calling thread.
        unsafe {
            let policy = sched_getscheduler(0);
            policy == SCHED_FIFO || policy == SCHED_RR
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::SimulationDriver;
    use pru_common::unit::PruUnit;
    use tempfile::TempDir;

    fn firmware_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("pru_generic.bin"), [0u8; 16]).unwrap();
        dir
    }

    fn config() -> PruConfig {
        PruConfig {
            prefix: "hpg".to_string(),
            pru: PruUnit::Pru1,
            num_stepgens: Some(1),
            ..PruConfig::default()
        }
    }

    #[test]
    fn cycle_calls_require_bring_up() {
        let mut core = PruCore::new(config(), Box::new(SimulationDriver::new())).unwrap();
        assert!(matches!(core.capture(), Err(PruError::NotBroughtUp)));
        assert!(matches!(core.run(Some(1)), Err(PruError::NotBroughtUp)));
    }

    #[test]
    fn invalid_config_rejected() {
        let bad = PruConfig {
            period_ns: 0,
            ..config()
        };
        assert!(PruCore::new(bad, Box::new(SimulationDriver::new())).is_err());
    }

    #[test]
    fn bring_up_run_teardown() {
        let dir = firmware_dir();
        let driver = SimulationDriver::new();
        let handle = driver.handle();
        let mut core = PruCore::new(config(), Box::new(driver))
            .unwrap()
            .with_firmware_dir(dir.path());
        core.bring_up().unwrap();
        assert!(handle.is_running(PruUnit::Pru1));
        assert_eq!(handle.image_len(PruUnit::Pru1), 16);
        assert_eq!(handle.reset_count(PruUnit::Pru1), 1);

        core.run(Some(3)).unwrap();
        assert_eq!(core.stats().0, 3);

        core.teardown();
        assert!(!handle.is_running(PruUnit::Pru1));
        assert!(core.context().is_none());
    }

    #[test]
    fn missing_firmware_undoes_bring_up() {
        let dir = TempDir::new().unwrap();
        let driver = SimulationDriver::new();
        let handle = driver.handle();
        let mut core = PruCore::new(config(), Box::new(driver))
            .unwrap()
            .with_firmware_dir(dir.path());
        assert!(matches!(
            core.bring_up(),
            Err(PruError::BringUp(BringUpError::FirmwareNotFound(_)))
        ));
        assert!(core.context().is_none());
        assert!(!handle.is_running(PruUnit::Pru1));
        assert_eq!(handle.start_count(PruUnit::Pru1), 0);
    }
}
