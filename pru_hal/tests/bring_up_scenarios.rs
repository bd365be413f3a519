//! End-to-end bring-up and cycle scenarios on the simulation driver

use pru_common::config::{EncoderChannelConfig, EncoderConfig, GpioConfig};
use pru_common::layout::{deltasig, encoder, header, stepdir};
use pru_common::prelude::*;
use pru_hal::drivers::simulation::{SimulationDriver, SimulationHandle};
use pru_hal::{BringUpError, PruCore, PruError, Signal};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn firmware_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("pru_generic.bin"), [0u8; 64]).unwrap();
    dir
}

fn pin(kind: PinKind, connector: Connector, index: u8) -> LogicalPin {
    LogicalPin::header(kind, connector, index)
}

fn base_config() -> PruConfig {
    PruConfig {
        prefix: "hpg".to_string(),
        pru: PruUnit::Pru1,
        ..PruConfig::default()
    }
}

fn encoder_config() -> EncoderConfig {
    EncoderConfig {
        num_channels: None,
        channels: vec![EncoderChannelConfig {
            a: Some(pin(PinKind::PruIn, Connector::P8, 39)),
            b: Some(pin(PinKind::PruIn, Connector::P8, 40)),
            index: None,
            scale: None,
        }],
    }
}

fn bring_up(config: PruConfig, driver: SimulationDriver, dir: &TempDir) -> PruCore {
    let mut core = PruCore::new(config, Box::new(driver))
        .unwrap()
        .with_firmware_dir(dir.path());
    core.bring_up().unwrap();
    core
}

fn signal<T: pru_hal::signals::SignalValue>(core: &PruCore, name: &str) -> Signal<T> {
    core.signals().get(name).unwrap()
}

#[test]
fn test_ring_follows_registration_order() {
    let dir = firmware_dir();
    let config = PruConfig {
        num_stepgens: Some(2),
        encoder: vec![encoder_config()],
        wait_gate: true,
        ..base_config()
    };
    let core = bring_up(config, SimulationDriver::new(), &dir);
    let ctx = core.context().unwrap();

    let headers = ctx.task_headers().unwrap();
    let modes: Vec<Mode> = headers.iter().map(|(_, h)| h.mode).collect();
    assert_eq!(
        modes,
        [Mode::StepDir, Mode::StepDir, Mode::Encoder, Mode::Wait]
    );

    let addrs: Vec<u32> = headers.iter().map(|(a, _)| *a).collect();
    assert_eq!(addrs, [16, 48, 80, 96]);
    assert_eq!(ctx.first_task(), 16);
    assert_eq!(headers[3].1.next, 16);

    let lens: Vec<u8> = headers.iter().map(|(_, h)| h.len).collect();
    assert_eq!(lens, [8, 8, 4, 2]);

    let statics = ctx.statics().unwrap();
    assert_eq!(statics.period_ns, 10_000);
    assert_eq!(statics.first_task, 16);
}

#[test]
fn test_deltasig_sits_between_pwm_and_encoder() {
    let dir = firmware_dir();
    let config = PruConfig {
        num_pwmgens: Some(1),
        num_deltasigs: Some(1),
        encoder: vec![encoder_config()],
        ..base_config()
    };
    let mut core = bring_up(config, SimulationDriver::new(), &dir);
    let headers = core.context().unwrap().task_headers().unwrap();
    let modes: Vec<Mode> = headers.iter().map(|(_, h)| h.mode).collect();
    assert_eq!(modes, [Mode::Pwm, Mode::DeltaSigma, Mode::Encoder]);

    let record = headers[1].0;
    signal::<bool>(&core, "hpg.delta.00.enable").set(true);
    signal::<f64>(&core, "hpg.delta.00.out1").set(0.25);
    signal::<f64>(&core, "hpg.delta.00.out2").set(1.0);
    core.update().unwrap();

    let region = core.context().unwrap().region();
    assert_eq!(region.read_u8(record + header::DATA_X), 1);
    assert_eq!(region.read_u16(record + deltasig::VALUE1), 0x1000);
    assert_eq!(region.read_u16(record + deltasig::VALUE2), 0x4000);
    assert_eq!(region.read_u8(record + deltasig::PIN1), 0x91);
}

#[test]
fn test_update_after_bring_up_is_idle() {
    let dir = firmware_dir();
    let config = PruConfig {
        num_stepgens: Some(1),
        num_pwmgens: Some(1),
        num_deltasigs: Some(1),
        encoder: vec![encoder_config()],
        ..base_config()
    };
    let mut core = bring_up(config, SimulationDriver::new(), &dir);

    let before = core.context().unwrap().region().as_bytes().to_vec();
    core.capture().unwrap();
    core.update().unwrap();
    assert_eq!(core.context().unwrap().region().as_bytes(), &before[..]);
}

#[test]
fn test_encoder_counts_follow_firmware() {
    let dir = firmware_dir();
    let config = PruConfig {
        encoder: vec![encoder_config()],
        ..base_config()
    };
    let mut core = bring_up(config, SimulationDriver::new(), &dir);
    let counts: Signal<i32> = signal(&core, "hpg.encoder.00.chan.00.counts");
    let scale: Signal<f64> = signal(&core, "hpg.encoder.00.chan.00.scale");
    let position: Signal<f64> = signal(&core, "hpg.encoder.00.chan.00.position");

    let record = core.context().unwrap().tasks().head().unwrap();
    let count_at = record + encoder::CHANNELS + encoder::COUNT;
    assert_eq!(
        core.context().unwrap().region().read_u8(record + encoder::CHANNELS + encoder::A_PIN),
        0x86
    );

    // Count down through zero: the 16-bit counter wraps, the signal does not.
    core.context_mut()
        .unwrap()
        .region_mut()
        .write_u16(count_at, 0xFFF6);
    scale.set(2.0);
    core.capture().unwrap();
    assert_eq!(counts.get(), -10);
    assert_eq!(position.get(), -5.0);

    core.context_mut().unwrap().region_mut().write_u16(count_at, 30);
    core.capture().unwrap();
    assert_eq!(counts.get(), 30);
}

#[test]
fn test_velocity_command_reaches_rate_field() {
    let dir = firmware_dir();
    let config = PruConfig {
        num_stepgens: Some(1),
        ..base_config()
    };
    let mut core = bring_up(config, SimulationDriver::new(), &dir);
    let record = core.context().unwrap().tasks().head().unwrap();

    signal::<bool>(&core, "hpg.stepgen.00.enable").set(true);
    signal::<bool>(&core, "hpg.stepgen.00.control-type").set(true);
    signal::<f64>(&core, "hpg.stepgen.00.maxaccel").set(0.0);
    signal::<f64>(&core, "hpg.stepgen.00.velocity-cmd").set(1000.0);
    core.capture().unwrap();
    core.update().unwrap();

    let region = core.context().unwrap().region();
    assert_eq!(region.read_u8(record + header::DATA_X), 1);
    assert_eq!(region.read_i32(record + stepdir::RATE), 1_342_177);
    assert_eq!(signal::<f64>(&core, "hpg.stepgen.00.velocity-fb").get(), 1000.0);

    signal::<bool>(&core, "hpg.stepgen.00.enable").set(false);
    core.update().unwrap();
    let region = core.context().unwrap().region();
    assert_eq!(region.read_u8(record + header::DATA_X), 0);
    assert_eq!(region.read_i32(record + stepdir::RATE), 0);
}

#[test]
fn test_wait_gate_reports_busy() {
    let dir = firmware_dir();
    let config = PruConfig {
        wait_gate: true,
        busy_pin: Some(pin(PinKind::PruOut, Connector::P8, 46)),
        ..base_config()
    };
    let mut core = bring_up(config, SimulationDriver::new(), &dir);
    let record = core.context().unwrap().tasks().head().unwrap();
    assert_eq!(
        core.context().unwrap().region().read_u8(record + header::DATA_X),
        0x81
    );

    let busy: Signal<bool> = signal(&core, "hpg.pru_busy");
    core.context_mut()
        .unwrap()
        .region_mut()
        .write_u8(record + header::DATA_Y, 1);
    core.capture().unwrap();
    assert!(busy.get());

    core.context_mut()
        .unwrap()
        .region_mut()
        .write_u8(record + header::DATA_Y, 0);
    core.capture().unwrap();
    assert!(!busy.get());
}

#[test]
fn test_gpio_pins_use_driver_banks() {
    let dir = firmware_dir();
    let driver = SimulationDriver::new();
    let handle: SimulationHandle = driver.handle();
    let config = PruConfig {
        gpio: GpioConfig {
            inputs: vec![pin(PinKind::Gpio, Connector::P8, 11)],
            outputs: vec![pin(PinKind::Gpio, Connector::P8, 12)],
        },
        ..base_config()
    };
    let mut core = bring_up(config, driver, &dir);
    assert_eq!(handle.gpio().output_enable(1), 1 << 12);

    handle.gpio().set_inputs(1, 1 << 13);
    core.capture().unwrap();
    assert!(signal::<bool>(&core, "hpg.p8.in-11").get());

    signal::<bool>(&core, "hpg.p8.out-12").set(true);
    core.update().unwrap();
    assert_eq!(handle.gpio().outputs(1), 1 << 12);
    let writes = handle.gpio().write_count(1);
    core.update().unwrap();
    assert_eq!(handle.gpio().write_count(1), writes);

    signal::<bool>(&core, "hpg.p8.out-12.invert").set(true);
    core.update().unwrap();
    assert_eq!(handle.gpio().outputs(1), 0);
}

#[test]
fn test_listener_acknowledges_events() {
    let dir = firmware_dir();
    let driver = SimulationDriver::new();
    let handle = driver.handle();
    let config = PruConfig {
        event: Some(2),
        num_stepgens: Some(1),
        ..base_config()
    };
    let mut core = bring_up(config, driver, &dir);
    assert_eq!(handle.opened_event(), 2);

    handle.raise_event();
    handle.raise_event();
    let deadline = Instant::now() + Duration::from_secs(5);
    while core.events_seen() < Some(2) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(core.events_seen(), Some(2));

    core.teardown();
    assert_eq!(handle.events_cleared(), 2);
    assert_eq!(handle.cleared_sys_event(), PruUnit::Pru1.arm_interrupt());
    assert!(!handle.is_running(PruUnit::Pru1));
}

#[test]
fn test_no_listener_without_event() {
    let dir = firmware_dir();
    let driver = SimulationDriver::new();
    let handle = driver.handle();
    let core = bring_up(base_config(), driver, &dir);
    assert_eq!(core.events_seen(), None);
    assert_eq!(handle.opened_event(), 0);
}

#[test]
fn test_disabled_leaves_pru_halted() {
    let dir = firmware_dir();
    let driver = SimulationDriver::new();
    let handle = driver.handle();
    let config = PruConfig {
        disabled: true,
        num_stepgens: Some(1),
        ..base_config()
    };
    let core = bring_up(config, driver, &dir);
    assert!(!core.is_started());
    assert!(!handle.is_running(PruUnit::Pru1));
    assert_eq!(handle.image_len(PruUnit::Pru1), 64);
    assert_eq!(handle.start_count(PruUnit::Pru1), 0);
}

#[test]
fn test_duplicate_pin_claim_fails_bring_up() {
    let dir = firmware_dir();
    let driver = SimulationDriver::new();
    let handle = driver.handle();
    let step = pin(PinKind::PruOut, Connector::P8, 45);
    let config: PruConfig = toml::from_str(
        r#"
prefix = "hpg"
pru = 1

[[stepgen]]
step_pin = "pru-out:P8.45"

[[stepgen]]
step_pin = "pru-out:P8.45"
"#,
    )
    .unwrap();
    assert_eq!(config.stepgen_config(1).step_pin, Some(step));

    let mut core = PruCore::new(config, Box::new(driver))
        .unwrap()
        .with_firmware_dir(dir.path());
    let err = core.bring_up().unwrap_err();
    assert!(matches!(
        err,
        PruError::Pin(PinError::AlreadyClaimed { .. })
    ));
    assert!(core.context().is_none());
    assert!(core.signals().is_empty());
    assert_eq!(handle.start_count(PruUnit::Pru1), 0);
}

#[test]
fn test_pad_claimed_as_pru_and_gpio_fails_bring_up() {
    let dir = firmware_dir();
    let config: PruConfig = toml::from_str(
        r#"
prefix = "hpg"
pru = 1

[[stepgen]]
step_pin = "pru-out:P8.45"

[gpio]
outputs = ["P8.45"]
"#,
    )
    .unwrap();

    let mut core = PruCore::new(config, Box::new(SimulationDriver::new()))
        .unwrap()
        .with_firmware_dir(dir.path());
    let err = core.bring_up().unwrap_err();
    assert!(matches!(
        err,
        PruError::Pin(PinError::AlreadyClaimed { ref owner, .. }) if owner == "stepgen.00.steppin"
    ));
    assert!(core.signals().is_empty());
}

#[test]
fn test_nan_parameters_do_not_stop_the_cycle() {
    let dir = firmware_dir();
    let config = PruConfig {
        num_stepgens: Some(1),
        ..base_config()
    };
    let mut core = bring_up(config, SimulationDriver::new(), &dir);
    let record = core.context().unwrap().tasks().head().unwrap();

    signal::<bool>(&core, "hpg.stepgen.00.enable").set(true);
    signal::<f64>(&core, "hpg.stepgen.00.maxvel").set(f64::NAN);
    signal::<f64>(&core, "hpg.stepgen.00.position-cmd").set(f64::NAN);
    core.capture().unwrap();
    core.update().unwrap();

    signal::<f64>(&core, "hpg.stepgen.00.position-cmd").set(0.0);
    core.capture().unwrap();
    core.update().unwrap();
    assert_eq!(signal::<f64>(&core, "hpg.stepgen.00.maxvel").get(), 0.0);
    assert_eq!(
        core.context().unwrap().region().read_i32(record + stepdir::RATE),
        0
    );
}

#[test]
fn test_small_data_ram_is_exhausted() {
    let dir = firmware_dir();
    let config = PruConfig {
        num_stepgens: Some(3),
        ..base_config()
    };
    let mut core = PruCore::new(config, Box::new(SimulationDriver::with_data_ram(64)))
        .unwrap()
        .with_firmware_dir(dir.path());
    let err = core.bring_up().unwrap_err();
    assert!(matches!(
        err,
        PruError::BringUp(BringUpError::RegionExhausted {
            needed: 80,
            available: 64
        })
    ));
}

#[test]
fn test_teardown_is_idempotent() {
    let dir = firmware_dir();
    let driver = SimulationDriver::new();
    let handle = driver.handle();
    let config = PruConfig {
        num_pwmgens: Some(1),
        ..base_config()
    };
    let mut core = bring_up(config, driver, &dir);
    core.run(Some(2)).unwrap();
    core.teardown();
    core.teardown();
    assert!(!handle.is_running(PruUnit::Pru1));
    assert!(matches!(core.update(), Err(PruError::NotBroughtUp)));
}
