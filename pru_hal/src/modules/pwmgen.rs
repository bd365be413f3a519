//! Multi-output PWM generator.
//!
//! All outputs of one instance share a period, counted in task periods.
//! Each output has its own high time. Record layout: see
//! [`pru_common::layout::pwm`]; header `dataX` is the output count.

use super::{guard_scale, instance_name, ns_to_periods, write_header, PruModule};
use crate::context::PruContext;
use crate::error::PruError;
use crate::region::SharedRegion;
use crate::signals::{Signal, SignalDir, SignalTable};
use crate::tasks::TaskRecord;
use pru_common::config::PwmgenConfig;
use pru_common::layout::{pwm, Mode};
use pru_common::pins::LogicalPin;
use tracing::error;

/// PWM period used when none is configured, in ns.
pub const DEFAULT_PWM_PERIOD_NS: u32 = 1_000_000;

struct Output {
    pin: Option<LogicalPin>,
    wire: u8,
    enable: Signal<bool>,
    value: Signal<f64>,
    scale: Signal<f64>,
    pin_sig: Signal<u32>,
    written_high: Option<u16>,
    written_pin: Option<u8>,
}

/// One PWM generator instance.
pub struct Pwmgen {
    name: String,
    task_period_ns: u32,
    pwm_period: Signal<u32>,
    outputs: Vec<Output>,
    record: Option<TaskRecord>,
    written_period: Option<u16>,
}

impl Pwmgen {
    /// Create instance `index` and export its signals.
    ///
    /// # Errors
    /// Duplicate signal names.
    pub fn new(
        prefix: &str,
        index: usize,
        config: &PwmgenConfig,
        task_period_ns: u32,
        signals: &mut SignalTable,
    ) -> Result<Self, PruError> {
        let pwm_period = signals.export(
            instance_name(prefix, "pwmgen", index, "pwm_period"),
            SignalDir::In,
            config.period_ns.unwrap_or(DEFAULT_PWM_PERIOD_NS),
        )?;

        let mut outputs = Vec::with_capacity(config.output_count());
        for j in 0..config.output_count() {
            let n = |field: &str| {
                instance_name(prefix, "pwmgen", index, &format!("out.{j:02}.{field}"))
            };
            outputs.push(Output {
                pin: config.outputs.get(j).copied(),
                wire: 0,
                enable: signals.export(n("enable"), SignalDir::In, false)?,
                value: signals.export(n("value"), SignalDir::In, 0.0)?,
                scale: signals.export(n("scale"), SignalDir::Rw, 1.0)?,
                pin_sig: signals.export(n("pin"), SignalDir::Ro, 0u32)?,
                written_high: None,
                written_pin: None,
            });
        }

        Ok(Self {
            name: format!("pwmgen.{index:02}"),
            task_period_ns,
            pwm_period,
            outputs,
            record: None,
            written_period: None,
        })
    }

    fn period_periods(&self) -> u16 {
        ns_to_periods(self.pwm_period.get(), self.task_period_ns).max(1)
    }

    fn write(&mut self, region: &mut SharedRegion, force: bool) {
        let Some(record) = &self.record else {
            return;
        };
        if force {
            write_header(region, record, self.outputs.len() as u8, 0);
        }

        let period = self.period_periods();
        if force || self.written_period != Some(period) {
            region.write_u16(record.field(pwm::PERIOD), period);
            self.written_period = Some(period);
        }

        for (j, out) in self.outputs.iter_mut().enumerate() {
            let base = record.field(pwm::OUTPUTS + j as u32 * pwm::OUTPUT_SIZE);

            let high = if out.enable.get() {
                let raw_scale = out.scale.get();
                let scale = match guard_scale(raw_scale) {
                    Some(fixed) => {
                        error!(
                            "{}.out.{:02}: scale {} is too close to 0, resetting to {}",
                            self.name, j, raw_scale, fixed
                        );
                        out.scale.set(fixed);
                        fixed
                    }
                    None => raw_scale,
                };
                let duty = (out.value.get() / scale).clamp(0.0, 1.0);
                (duty * period as f64).round() as u16
            } else {
                0
            };

            if force || out.written_pin != Some(out.wire) {
                region.write_u8(base + pwm::OUT_PIN, out.wire);
                out.written_pin = Some(out.wire);
            }
            if force || out.written_high != Some(high) {
                region.write_u16(base + pwm::OUT_HIGH, high);
                out.written_high = Some(high);
            }
        }
    }
}

impl PruModule for Pwmgen {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, ctx: &mut PruContext) -> Result<(), PruError> {
        for (j, out) in self.outputs.iter_mut().enumerate() {
            out.wire = ctx.claim_pin(out.pin, &format!("{}.out.{:02}", self.name, j))?;
            out.pin_sig.set(out.wire as u32);
        }
        let mut record = ctx.new_task(Mode::Pwm, pwm::size(self.outputs.len() as u32))?;
        ctx.add_task(&mut record);
        self.record = Some(record);
        Ok(())
    }

    fn capture(&mut self, _region: &SharedRegion) {}

    fn update(&mut self, region: &mut SharedRegion) {
        self.write(region, false);
    }

    fn force_write(&mut self, region: &mut SharedRegion) {
        self.write(region, true);
    }

    fn task(&self) -> Option<&TaskRecord> {
        self.record.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pru_common::layout::header;
    use pru_common::unit::PruUnit;

    fn setup(config: &PwmgenConfig) -> (Pwmgen, PruContext, SignalTable) {
        let mut signals = SignalTable::new();
        let mut pg = Pwmgen::new("hpg", 1, config, 10_000, &mut signals).unwrap();
        let mut ctx = PruContext::new(SharedRegion::heap(256), PruUnit::Pru0, 10_000);
        pg.init(&mut ctx).unwrap();
        pg.force_write(ctx.region_mut());
        (pg, ctx, signals)
    }

    fn high(pg: &Pwmgen, ctx: &PruContext, j: u32) -> u16 {
        let rec = pg.task().unwrap();
        ctx.region()
            .read_u16(rec.field(pwm::OUTPUTS + j * pwm::OUTPUT_SIZE + pwm::OUT_HIGH))
    }

    #[test]
    fn record_size_follows_output_count() {
        let config = PwmgenConfig {
            num_outputs: Some(3),
            ..PwmgenConfig::default()
        };
        let (pg, ctx, signals) = setup(&config);
        let rec = pg.task().unwrap();
        assert_eq!(rec.size(), 24);
        assert_eq!(ctx.region().read_u8(rec.field(header::DATA_X)), 3);
        assert_eq!(ctx.region().read_u16(rec.field(pwm::PERIOD)), 100);
        assert!(signals.contains("hpg.pwmgen.01.out.02.value"));
        assert!(signals.contains("hpg.pwmgen.01.pwm_period"));
    }

    #[test]
    fn duty_cycle_is_clamped_and_scaled() {
        let (mut pg, mut ctx, signals) = setup(&PwmgenConfig::default());
        let enable: Signal<bool> = signals.get("hpg.pwmgen.01.out.00.enable").unwrap();
        let value: Signal<f64> = signals.get("hpg.pwmgen.01.out.00.value").unwrap();
        let scale: Signal<f64> = signals.get("hpg.pwmgen.01.out.00.scale").unwrap();

        value.set(0.25);
        pg.update(ctx.region_mut());
        assert_eq!(high(&pg, &ctx, 0), 0);

        enable.set(true);
        pg.update(ctx.region_mut());
        assert_eq!(high(&pg, &ctx, 0), 25);

        value.set(3.0);
        pg.update(ctx.region_mut());
        assert_eq!(high(&pg, &ctx, 0), 100);

        scale.set(10.0);
        pg.update(ctx.region_mut());
        assert_eq!(high(&pg, &ctx, 0), 30);

        value.set(-1.0);
        pg.update(ctx.region_mut());
        assert_eq!(high(&pg, &ctx, 0), 0);
    }

    #[test]
    fn unchanged_fields_are_not_rewritten() {
        let (mut pg, mut ctx, signals) = setup(&PwmgenConfig::default());
        let rec = pg.task().unwrap().clone();
        // Scribble over the period; update must leave it alone.
        ctx.region_mut().write_u16(rec.field(pwm::PERIOD), 7);
        pg.update(ctx.region_mut());
        assert_eq!(ctx.region().read_u16(rec.field(pwm::PERIOD)), 7);

        let period: Signal<u32> = signals.get("hpg.pwmgen.01.pwm_period").unwrap();
        period.set(500_000);
        pg.update(ctx.region_mut());
        assert_eq!(ctx.region().read_u16(rec.field(pwm::PERIOD)), 50);
    }

    #[test]
    fn zero_period_counts_as_one() {
        let config = PwmgenConfig {
            period_ns: Some(0),
            ..PwmgenConfig::default()
        };
        let (pg, ctx, _) = setup(&config);
        let rec = pg.task().unwrap();
        assert_eq!(ctx.region().read_u16(rec.field(pwm::PERIOD)), 1);
    }
}
