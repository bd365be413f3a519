//! # PRU HAL Binary
//!
//! Brings up the PRU task scheduler and runs the host capture/update cycle.
//!
//! # Usage
//!
//! ```bash
//! # Run on hardware
//! pru_hal --config /etc/pru/pru.toml
//!
//! # Simulation driver, 1000 cycles, dump signals at exit
//! pru_hal --config pru.toml -s --cycles 1000 --dump-signals
//!
//! # Show the effective configuration
//! pru_hal --config pru.toml --num-stepgens 3 --print-config
//! ```

use clap::Parser;
use pru_common::config::{LogLevel, PruConfig};
use pru_common::unit::PruUnit;
use pru_hal::core::PruCore;
use pru_hal::driver_registry::DriverRegistry;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// PRU HAL - PRU task scheduler and function modules
#[derive(Parser, Debug)]
#[command(name = "pru_hal")]
#[command(version)]
#[command(about = "PRU task scheduler, function modules and coprocessor bring-up")]
#[command(long_about = None)]
struct Args {
    /// Path to configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the simulation driver instead of UIO
    #[arg(short = 's', long)]
    simulate: bool,

    /// Prefix of exported signal names
    #[arg(long)]
    prefix: Option<String>,

    /// Firmware image
    #[arg(long)]
    firmware: Option<PathBuf>,

    /// PRU task period in ns
    #[arg(long)]
    period_ns: Option<u32>,

    /// Host servo period in ns
    #[arg(long)]
    servo_period_ns: Option<u32>,

    /// PRU core (0 or 1)
    #[arg(long, value_parser = parse_unit)]
    pru: Option<PruUnit>,

    /// Event channel to listen on
    #[arg(long)]
    event: Option<u8>,

    /// Load the firmware but leave the PRU halted
    #[arg(long)]
    disabled: bool,

    /// Number of step generators
    #[arg(long)]
    num_stepgens: Option<usize>,

    /// Number of PWM generators
    #[arg(long)]
    num_pwmgens: Option<usize>,

    /// Number of encoders
    #[arg(long)]
    num_encoders: Option<usize>,

    /// Number of delta-sigma modulators
    #[arg(long)]
    num_deltasigs: Option<usize>,

    /// Stop after this many cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Print all signal values as JSON at exit
    #[arg(long)]
    dump_signals: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn parse_unit(s: &str) -> Result<PruUnit, String> {
    let n: u8 = s.parse().map_err(|e| format!("{e}"))?;
    PruUnit::try_from(n).map_err(|e| e.to_string())
}

fn main() {
    if let Err(e) = run() {
        error!("PRU HAL failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => PruConfig::from_file(path),
        None => Ok(PruConfig::default()),
    };

    // Initialize tracing. A config that fails to load is reported at the
    // default level.
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            setup_tracing(&args, LogLevel::default());
            return Err(e.into());
        }
    };
    apply_overrides(&mut config, &args);
    setup_tracing(&args, config.log_level);

    if args.print_config {
        config.validate()?;
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    info!("PRU HAL v{} starting...", env!("CARGO_PKG_VERSION"));

    let driver_name = if args.simulate {
        info!("Simulation mode enabled");
        "simulation"
    } else {
        "uio"
    };
    let registry = DriverRegistry::with_builtin();
    let driver = registry.create_driver(driver_name)?;

    let mut core = PruCore::new(config, driver)?;

    // Setup signal handler.
    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    core.bring_up()?;
    let result = core.run(args.cycles);
    if args.dump_signals {
        println!("{}", serde_json::to_string_pretty(&core.signals().snapshot())?);
    }
    core.teardown();
    result?;

    info!("PRU HAL shutdown complete");
    Ok(())
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut PruConfig, args: &Args) {
    if let Some(prefix) = &args.prefix {
        config.prefix = prefix.clone();
    }
    if let Some(firmware) = &args.firmware {
        config.firmware = firmware.clone();
    }
    if let Some(period) = args.period_ns {
        config.period_ns = period;
    }
    if let Some(period) = args.servo_period_ns {
        config.servo_period_ns = period;
    }
    if let Some(pru) = args.pru {
        config.pru = pru;
    }
    if args.event.is_some() {
        config.event = args.event;
    }
    if args.disabled {
        config.disabled = true;
    }
    if args.num_stepgens.is_some() {
        config.num_stepgens = args.num_stepgens;
    }
    if args.num_pwmgens.is_some() {
        config.num_pwmgens = args.num_pwmgens;
    }
    if args.num_encoders.is_some() {
        config.num_encoders = args.num_encoders;
    }
    if args.num_deltasigs.is_some() {
        config.num_deltasigs = args.num_deltasigs;
    }
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::from(log_level)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
