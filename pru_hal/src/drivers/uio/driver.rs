//! UIO driver implementation for the AM335x PRU-ICSS.

use super::event::UioEvents;
use super::gpio::MmioGpioBanks;
use super::intc::IntcMapping;
use super::regs::{
    control_offset, data_ram_offset, iram_offset, map_physical, PruControl, RegisterWindow,
    CONTROL, CONTROL_LEN, DATA_RAM_LEN, INTC_LEN, INTC_OFFSET, IRAM_LEN, PRUSS_BASE,
};
use crate::drivers::{EventChannel, PruDriver};
use crate::error::BringUpError;
use crate::gpio::GpioBanks;
use crate::region::SharedRegion;
use nix::unistd::geteuid;
use pru_common::consts::UIO_PRUSS_MODULE;
use pru_common::unit::PruUnit;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::process::Command;
use tracing::{debug, info};

const DEV_MEM: &str = "/dev/mem";
const PROC_MODULES: &str = "/proc/modules";
const MODULE_LOADER: &str = "/sbin/modprobe";

/// True when `/proc/modules` content lists `name`.
pub fn module_loaded(proc_modules: &str, name: &str) -> bool {
    proc_modules
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|module| module == name)
}

/// Driver for the PRU-ICSS through `uio_pruss` and `/dev/mem`.
pub struct UioDriver {
    /// Driver name
    name: &'static str,
    /// Driver version
    version: &'static str,
    /// `/dev/mem`, opened on first use
    mem: Option<File>,
    /// Control register pages, mapped on first use
    control: [Option<RegisterWindow>; 2],
}

impl UioDriver {
    /// Create a new UIO driver instance. Nothing is opened yet.
    pub fn new() -> Self {
        Self {
            name: "uio",
            version: env!("CARGO_PKG_VERSION"),
            mem: None,
            control: [None, None],
        }
    }

    fn mem(&mut self) -> Result<&File, BringUpError> {
        if self.mem.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_SYNC)
                .open(DEV_MEM)
                .map_err(|source| BringUpError::Map {
                    what: "/dev/mem",
                    source,
                })?;
            self.mem = Some(file);
        }
        self.mem.as_ref().ok_or(BringUpError::Unsupported {
            driver: "uio",
            what: "/dev/mem",
        })
    }

    fn control(&mut self, unit: PruUnit) -> Result<&mut RegisterWindow, BringUpError> {
        let slot = unit.index();
        if self.control[slot].is_none() {
            let window = RegisterWindow::open(
                self.mem()?,
                PRUSS_BASE + control_offset(unit),
                CONTROL_LEN,
                "PRU control registers",
            )?;
            self.control[slot] = Some(window);
        }
        self.control[slot].as_mut().ok_or(BringUpError::Unsupported {
            driver: "uio",
            what: "PRU control registers",
        })
    }
}

impl Default for UioDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PruDriver for UioDriver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn check_privileges(&self) -> Result<(), BringUpError> {
        let euid = geteuid();
        if euid.is_root() {
            Ok(())
        } else {
            Err(BringUpError::NotRoot(euid.as_raw()))
        }
    }

    fn ensure_kernel_module(&mut self) -> Result<(), BringUpError> {
        let modules = std::fs::read_to_string(PROC_MODULES).map_err(|e| {
            BringUpError::KernelModule {
                module: UIO_PRUSS_MODULE.to_string(),
                reason: format!("cannot read {PROC_MODULES}: {e}"),
            }
        })?;
        if module_loaded(&modules, UIO_PRUSS_MODULE) {
            debug!("Kernel module {} already loaded", UIO_PRUSS_MODULE);
            return Ok(());
        }

        info!("Loading kernel module {}", UIO_PRUSS_MODULE);
        let status = Command::new(MODULE_LOADER)
            .arg(UIO_PRUSS_MODULE)
            .status()
            .map_err(|e| BringUpError::KernelModule {
                module: UIO_PRUSS_MODULE.to_string(),
                reason: format!("cannot run {MODULE_LOADER}: {e}"),
            })?;
        if !status.success() {
            return Err(BringUpError::KernelModule {
                module: UIO_PRUSS_MODULE.to_string(),
                reason: format!("{MODULE_LOADER} exited with {status}"),
            });
        }
        Ok(())
    }

    fn open_events(
        &mut self,
        unit: PruUnit,
        event: u8,
    ) -> Result<Box<dyn EventChannel>, BringUpError> {
        let mut intc = RegisterWindow::open(
            self.mem()?,
            PRUSS_BASE + INTC_OFFSET,
            INTC_LEN,
            "PRU interrupt controller",
        )?;
        IntcMapping::STANDARD.program(&mut intc);
        debug!("Interrupt controller programmed");
        Ok(Box::new(UioEvents::open(unit, event, intc)?))
    }

    fn map_data_ram(&mut self, unit: PruUnit) -> Result<SharedRegion, BringUpError> {
        let map = map_physical(
            self.mem()?,
            PRUSS_BASE + data_ram_offset(unit),
            DATA_RAM_LEN,
            "PRU data RAM",
        )?;
        info!("Mapped {} data RAM ({} bytes)", unit, DATA_RAM_LEN);
        Ok(SharedRegion::mapped(map))
    }

    fn gpio_banks(&mut self) -> Result<Box<dyn GpioBanks>, BringUpError> {
        Ok(Box::new(MmioGpioBanks::open(self.mem()?)?))
    }

    fn reset(&mut self, unit: PruUnit) -> Result<(), BringUpError> {
        self.control(unit)?.write(CONTROL, PruControl::empty().bits());
        debug!("{} held in reset", unit);
        Ok(())
    }

    fn load_firmware(&mut self, unit: PruUnit, image: &[u8]) -> Result<(), BringUpError> {
        if image.len() > IRAM_LEN {
            return Err(BringUpError::FirmwareInvalid {
                path: "<memory>".into(),
                reason: format!("{} bytes exceed instruction RAM", image.len()),
            });
        }
        let mut iram = RegisterWindow::open(
            self.mem()?,
            PRUSS_BASE + iram_offset(unit),
            IRAM_LEN,
            "PRU instruction RAM",
        )?;
        iram.write_words(image);
        debug!("{} bytes written to {} instruction RAM", image.len(), unit);
        Ok(())
    }

    fn start(&mut self, unit: PruUnit) -> Result<(), BringUpError> {
        self.control(unit)?.write(CONTROL, PruControl::RUN.bits());
        info!("{} started", unit);
        Ok(())
    }

    fn stop(&mut self, unit: PruUnit) -> Result<(), BringUpError> {
        let regs = self.control(unit)?;
        let current = PruControl::from_bits_truncate(regs.read(CONTROL));
        regs.write(CONTROL, current.difference(PruControl::ENABLE).bits());
        info!("{} halted", unit);
        Ok(())
    }
}
