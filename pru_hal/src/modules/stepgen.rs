//! Step/direction generator.
//!
//! The firmware adds `rate` to a 27-bit phase accumulator every task period
//! and emits a step on each overflow. The host closes the loop once per
//! servo period: `capture` turns the accumulator and step counter into a
//! 16.16 fixed-point position, `update` runs the position or velocity
//! controller and writes the new rate.
//!
//! Record layout: see [`pru_common::layout::stepdir`]. Header `dataX` is the
//! enable flag.

use super::{guard_scale, instance_name, ns_to_periods, write_header, PruModule};
use crate::context::PruContext;
use crate::error::PruError;
use crate::region::SharedRegion;
use crate::signals::{Signal, SignalDir, SignalTable};
use crate::tasks::TaskRecord;
use pru_common::config::StepgenConfig;
use pru_common::layout::{header, stepdir, Mode};
use pru_common::pins::LogicalPin;
use tracing::error;

/// Accumulator value of one whole step.
const STEP_UNIT: f64 = 134_217_728.0; // 2^27

/// Largest rate magnitude the firmware accepts.
const MAX_RATE: f64 = 0x7FF_FFFF as f64;

/// Initial accumulator: half a step, so the first step lands mid-period.
const INITIAL_ACCUM: u32 = 1 << 26;

struct StepgenSignals {
    position_cmd: Signal<f64>,
    velocity_cmd: Signal<f64>,
    velocity_fb: Signal<f64>,
    position_fb: Signal<f64>,
    counts: Signal<i32>,
    enable: Signal<bool>,
    control_type: Signal<bool>,
    rawcounts: Signal<i32>,
    position_scale: Signal<f64>,
    maxvel: Signal<f64>,
    maxaccel: Signal<f64>,
    steplen: Signal<u32>,
    stepspace: Signal<u32>,
    dirsetup: Signal<u32>,
    dirhold: Signal<u32>,
    steppin: Signal<u32>,
    dirpin: Signal<u32>,
}

/// Host-owned fields as last written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Written {
    /// steplen, dirhold, stepspace, dirsetup in task periods.
    timing: [u16; 4],
    enable: bool,
    pins: (u8, u8),
}

/// One step generator instance.
pub struct Stepgen {
    name: String,
    step_pin: Option<LogicalPin>,
    dir_pin: Option<LogicalPin>,
    task_period_ns: u32,
    servo_period_s: f64,
    sig: StepgenSignals,
    record: Option<TaskRecord>,
    wires: (u8, u8),
    prev_accum: u32,
    subcounts: i64,
    old_position_cmd: f64,
    rate: i32,
    written: Option<Written>,
}

impl Stepgen {
    /// Create instance `index` and export its signals.
    ///
    /// # Errors
    /// Duplicate signal names.
    pub fn new(
        prefix: &str,
        index: usize,
        config: &StepgenConfig,
        task_period_ns: u32,
        servo_period_ns: u32,
        signals: &mut SignalTable,
    ) -> Result<Self, PruError> {
        let n = |field: &str| instance_name(prefix, "stepgen", index, field);
        let timing = |v: Option<u32>| v.unwrap_or(task_period_ns);
        let sig = StepgenSignals {
            position_cmd: signals.export(n("position-cmd"), SignalDir::In, 0.0)?,
            velocity_cmd: signals.export(n("velocity-cmd"), SignalDir::In, 0.0)?,
            velocity_fb: signals.export(n("velocity-fb"), SignalDir::Out, 0.0)?,
            position_fb: signals.export(n("position-fb"), SignalDir::Out, 0.0)?,
            counts: signals.export(n("counts"), SignalDir::Out, 0i32)?,
            enable: signals.export(n("enable"), SignalDir::In, false)?,
            control_type: signals.export(n("control-type"), SignalDir::In, false)?,
            rawcounts: signals.export(n("rawcounts"), SignalDir::Out, 0i32)?,
            position_scale: signals.export(
                n("position-scale"),
                SignalDir::Rw,
                config.position_scale.unwrap_or(1.0),
            )?,
            maxvel: signals.export(n("maxvel"), SignalDir::Rw, config.maxvel.unwrap_or(0.0))?,
            maxaccel: signals.export(
                n("maxaccel"),
                SignalDir::Rw,
                config.maxaccel.unwrap_or(1.0),
            )?,
            steplen: signals.export(n("steplen"), SignalDir::Rw, timing(config.steplen_ns))?,
            stepspace: signals.export(n("stepspace"), SignalDir::Rw, timing(config.stepspace_ns))?,
            dirsetup: signals.export(n("dirsetup"), SignalDir::Rw, timing(config.dirsetup_ns))?,
            dirhold: signals.export(n("dirhold"), SignalDir::Rw, timing(config.dirhold_ns))?,
            steppin: signals.export(n("steppin"), SignalDir::Ro, 0u32)?,
            dirpin: signals.export(n("dirpin"), SignalDir::Ro, 0u32)?,
        };

        Ok(Self {
            name: format!("stepgen.{index:02}"),
            step_pin: config.step_pin,
            dir_pin: config.dir_pin,
            task_period_ns,
            servo_period_s: servo_period_ns as f64 * 1e-9,
            sig,
            record: None,
            wires: (0, 0),
            prev_accum: 0,
            subcounts: 0,
            old_position_cmd: 0.0,
            rate: 0,
            written: None,
        })
    }

    /// Position scale after the near-zero guard.
    fn scale(&self) -> f64 {
        let scale = self.sig.position_scale.get();
        match guard_scale(scale) {
            Some(fixed) => {
                error!(
                    "{}: position-scale {} is too close to 0, resetting to {}",
                    self.name, scale, fixed
                );
                self.sig.position_scale.set(fixed);
                fixed
            }
            None => scale,
        }
    }

    fn wanted(&self) -> Written {
        let p = |s: &Signal<u32>| ns_to_periods(s.get(), self.task_period_ns);
        Written {
            timing: [
                p(&self.sig.steplen),
                p(&self.sig.dirhold),
                p(&self.sig.stepspace),
                p(&self.sig.dirsetup),
            ],
            enable: self.sig.enable.get(),
            pins: self.wires,
        }
    }

    fn write(&mut self, region: &mut SharedRegion, wanted: Written, force: bool) {
        let Some(record) = &self.record else {
            return;
        };
        let prev = if force { None } else { self.written };

        if force {
            write_header(region, record, wanted.enable as u8, 0);
        } else if prev.map(|w| w.enable) != Some(wanted.enable) {
            region.write_u8(record.field(header::DATA_X), wanted.enable as u8);
        }
        if prev.map(|w| w.timing) != Some(wanted.timing) {
            let [steplen, dirhold, stepspace, dirsetup] = wanted.timing;
            region.write_u16(record.field(stepdir::STEPLEN), steplen);
            region.write_u16(record.field(stepdir::DIRHOLD), dirhold);
            region.write_u16(record.field(stepdir::STEPSPACE), stepspace);
            region.write_u16(record.field(stepdir::DIRSETUP), dirsetup);
        }
        if prev.map(|w| w.pins) != Some(wanted.pins) {
            region.write_u8(record.field(stepdir::STEP_PIN), wanted.pins.0);
            region.write_u8(record.field(stepdir::DIR_PIN), wanted.pins.1);
        }
        region.write_i32(record.field(stepdir::RATE), self.rate);
        self.written = Some(wanted);
    }

    /// New rate from the position or velocity controller.
    fn compute_rate(&mut self) -> i32 {
        let scale = self.scale();
        let dt = self.servo_period_s;

        // No faster than one step per (steplen + stepspace).
        let min_ns_per_step = (self.sig.steplen.get() as f64 + self.sig.stepspace.get() as f64)
            .max(self.task_period_ns as f64);
        let physical_maxvel = 1.0e9 / min_ns_per_step / scale.abs();

        let mut maxvel_param = self.sig.maxvel.get();
        if maxvel_param.is_nan() {
            error!("{}: maxvel is NaN, setting to 0", self.name);
            maxvel_param = 0.0;
            self.sig.maxvel.set(maxvel_param);
        }
        if maxvel_param < 0.0 {
            error!("{}: maxvel < 0, setting to its absolute value", self.name);
            maxvel_param = maxvel_param.abs();
            self.sig.maxvel.set(maxvel_param);
        }
        if maxvel_param > physical_maxvel {
            error!(
                "{}: maxvel is too big for current step timings & position-scale, clipping to {}",
                self.name, physical_maxvel
            );
            maxvel_param = physical_maxvel;
            self.sig.maxvel.set(maxvel_param);
        }
        let maxvel = if maxvel_param == 0.0 {
            physical_maxvel
        } else {
            maxvel_param
        };

        let mut maxaccel = self.sig.maxaccel.get();
        if maxaccel.is_nan() {
            error!("{}: maxaccel is NaN, setting to 0", self.name);
            maxaccel = 0.0;
            self.sig.maxaccel.set(maxaccel);
        }
        if maxaccel < 0.0 {
            error!("{}: maxaccel < 0, setting to its absolute value", self.name);
            maxaccel = maxaccel.abs();
            self.sig.maxaccel.set(maxaccel);
        }

        let velocity_fb = self.velocity_fb();
        let mut new_vel = if self.sig.control_type.get() {
            // A non-finite command holds the current velocity.
            let cmd = finite_or(self.sig.velocity_cmd.get(), velocity_fb);
            if maxaccel > 0.0 {
                bound(cmd, velocity_fb - maxaccel * dt, velocity_fb + maxaccel * dt)
            } else {
                cmd
            }
        } else {
            self.position_control(maxaccel, dt)
        };
        new_vel = finite_or(bound(new_vel, -maxvel, maxvel), 0.0);
        self.sig.velocity_fb.set(new_vel);

        let steps_per_sec = new_vel * scale;
        let rate = steps_per_sec * STEP_UNIT * self.task_period_ns as f64 * 1e-9;
        bound(rate, -MAX_RATE, MAX_RATE) as i32
    }

    /// Last velocity feedback, zero if it ever became non-finite.
    fn velocity_fb(&self) -> f64 {
        finite_or(self.sig.velocity_fb.get(), 0.0)
    }

    /// First-order feed-forward plus proportional error feedback.
    fn position_control(&mut self, maxaccel: f64, dt: f64) -> f64 {
        let position_cmd = finite_or(self.sig.position_cmd.get(), self.old_position_cmd);
        let position_fb = self.sig.position_fb.get();
        let velocity_fb = self.velocity_fb();

        let ff_vel = (position_cmd - self.old_position_cmd) / dt;
        self.old_position_cmd = position_cmd;

        let velocity_error = velocity_fb - ff_vel;

        // maxaccel 0 means no limit: fix the error within one period.
        let mut match_accel = if velocity_error > 0.0 {
            if maxaccel == 0.0 {
                -velocity_error / dt
            } else {
                -maxaccel
            }
        } else if velocity_error < 0.0 {
            if maxaccel == 0.0 {
                velocity_error / dt
            } else {
                maxaccel
            }
        } else {
            0.0
        };

        let seconds_to_vel_match = if match_accel == 0.0 {
            0.0
        } else {
            -velocity_error / match_accel
        };

        let avg_v = (ff_vel + velocity_fb) * 0.5;
        let position_at_match = position_fb + avg_v * (seconds_to_vel_match + dt);
        let position_cmd_at_match = position_cmd + ff_vel * seconds_to_vel_match;
        let error_at_match = position_at_match - position_cmd_at_match;

        if seconds_to_vel_match < dt {
            let velocity_cmd = ff_vel - 0.5 * error_at_match / dt;
            if maxaccel > 0.0 {
                bound(velocity_cmd, velocity_fb - maxaccel * dt, velocity_fb + maxaccel * dt)
            } else {
                velocity_cmd
            }
        } else {
            // Ramp the other way if that ends closer to the command.
            let dv = -2.0 * match_accel * dt;
            let dp = dv * seconds_to_vel_match;
            if (error_at_match + dp * 2.0).abs() < error_at_match.abs() {
                match_accel = -match_accel;
            }
            velocity_fb + match_accel * dt
        }
    }
}

/// `value` limited to `[lo, hi]`. Unlike `f64::clamp` this never panics on
/// NaN bounds.
fn bound(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

/// Read a 64-bit firmware value twice until both reads agree.
fn read_stable_u64(region: &SharedRegion, offset: u32) -> u64 {
    let mut value = region.read_u64(offset);
    for _ in 0..3 {
        let again = region.read_u64(offset);
        if again == value {
            break;
        }
        value = again;
    }
    value
}

/// Combine the low 16 bits of the step counter with the top 16 fractional
/// bits of the 27-bit accumulator into a 16.16 position, minus the half-step
/// starting offset.
fn fixed_position(accum: u32, pos: u32) -> u32 {
    let whole = (pos & 0xFFFF) << 16;
    let frac = (accum >> 11) & 0xFFFF;
    (whole | frac).wrapping_sub(0x8000)
}

impl PruModule for Stepgen {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, ctx: &mut PruContext) -> Result<(), PruError> {
        let step = ctx.claim_pin(self.step_pin, &format!("{}.steppin", self.name))?;
        let dir = ctx.claim_pin(self.dir_pin, &format!("{}.dirpin", self.name))?;
        self.wires = (step, dir);
        self.sig.steppin.set(step as u32);
        self.sig.dirpin.set(dir as u32);

        let mut record = ctx.new_task(Mode::StepDir, stepdir::SIZE)?;
        let region = ctx.region_mut();
        region.write_u32(record.field(stepdir::ACCUM), INITIAL_ACCUM);
        region.write_u32(record.field(stepdir::POS), 0);
        ctx.add_task(&mut record);
        self.record = Some(record);
        Ok(())
    }

    fn capture(&mut self, region: &SharedRegion) {
        let Some(record) = &self.record else {
            return;
        };
        let raw = read_stable_u64(region, record.field(stepdir::ACCUM));
        let accum = raw as u32;
        let pos = (raw >> 32) as u32;
        self.sig.rawcounts.set(pos as i32);

        let acc = fixed_position(accum, pos);
        let delta = acc.wrapping_sub(self.prev_accum) as i32 as i64;
        self.prev_accum = acc;
        self.subcounts += delta;

        let scale = self.scale();
        self.sig.counts.set((self.subcounts >> 16) as i32);
        self.sig
            .position_fb
            .set(self.subcounts as f64 / 65536.0 / scale);
    }

    fn update(&mut self, region: &mut SharedRegion) {
        if self.sig.enable.get() {
            self.rate = self.compute_rate();
        } else {
            self.rate = 0;
            self.old_position_cmd = finite_or(self.sig.position_cmd.get(), self.old_position_cmd);
            self.sig.velocity_fb.set(0.0);
        }
        let wanted = self.wanted();
        self.write(region, wanted, false);
    }

    fn force_write(&mut self, region: &mut SharedRegion) {
        let wanted = self.wanted();
        self.write(region, wanted, true);
    }

    fn task(&self) -> Option<&TaskRecord> {
        self.record.as_ref()
    }
}
