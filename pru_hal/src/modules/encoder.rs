//! Quadrature encoder counter.
//!
//! The firmware keeps a free-running 16-bit counter per channel. The host
//! extends it to 32 bits by accumulating signed 16-bit deltas, so counts
//! survive any number of wraps as long as a channel moves less than 32767
//! counts per servo period.
//!
//! Record layout: see [`pru_common::layout::encoder`]; header `dataX` is the
//! channel count.

use super::{guard_scale, instance_name, write_header, PruModule};
use crate::context::PruContext;
use crate::error::PruError;
use crate::region::SharedRegion;
use crate::signals::{Signal, SignalDir, SignalTable};
use crate::tasks::TaskRecord;
use pru_common::config::EncoderConfig;
use pru_common::layout::{encoder, Mode};
use pru_common::pins::LogicalPin;
use tracing::error;

/// Channel counting mode: A/B quadrature.
const MODE_QUADRATURE: u8 = 0;

struct Channel {
    pins: [Option<LogicalPin>; 3],
    wires: [u8; 3],
    counts: Signal<i32>,
    rawcounts: Signal<i32>,
    position: Signal<f64>,
    scale: Signal<f64>,
    reset: Signal<bool>,
    pin_sigs: [Signal<u32>; 3],
    prev_count: u16,
    raw: i32,
    offset: i32,
    written_pins: Option<[u8; 3]>,
}

/// One encoder instance with one or more channels.
pub struct Encoder {
    name: String,
    channels: Vec<Channel>,
    record: Option<TaskRecord>,
}

impl Encoder {
    /// Create instance `index` and export its signals.
    ///
    /// # Errors
    /// Duplicate signal names.
    pub fn new(
        prefix: &str,
        index: usize,
        config: &EncoderConfig,
        signals: &mut SignalTable,
    ) -> Result<Self, PruError> {
        let mut channels = Vec::with_capacity(config.channel_count());
        for j in 0..config.channel_count() {
            let n = |field: &str| {
                instance_name(prefix, "encoder", index, &format!("chan.{j:02}.{field}"))
            };
            let chan = config.channels.get(j).cloned().unwrap_or_default();
            channels.push(Channel {
                pins: [chan.a, chan.b, chan.index],
                wires: [0; 3],
                counts: signals.export(n("counts"), SignalDir::Out, 0i32)?,
                rawcounts: signals.export(n("rawcounts"), SignalDir::Out, 0i32)?,
                position: signals.export(n("position"), SignalDir::Out, 0.0)?,
                scale: signals.export(n("scale"), SignalDir::Rw, chan.scale.unwrap_or(1.0))?,
                reset: signals.export(n("reset"), SignalDir::In, false)?,
                pin_sigs: [
                    signals.export(n("A-pin"), SignalDir::Ro, 0u32)?,
                    signals.export(n("B-pin"), SignalDir::Ro, 0u32)?,
                    signals.export(n("index-pin"), SignalDir::Ro, 0u32)?,
                ],
                prev_count: 0,
                raw: 0,
                offset: 0,
                written_pins: None,
            });
        }
        Ok(Self {
            name: format!("encoder.{index:02}"),
            channels,
            record: None,
        })
    }

    fn write(&mut self, region: &mut SharedRegion, force: bool) {
        let Some(record) = &self.record else {
            return;
        };
        if force {
            write_header(region, record, self.channels.len() as u8, 0);
        }
        for (j, chan) in self.channels.iter_mut().enumerate() {
            if !force && chan.written_pins == Some(chan.wires) {
                continue;
            }
            let base = record.field(encoder::CHANNELS + j as u32 * encoder::CHANNEL_SIZE);
            region.write_u8(base + encoder::A_PIN, chan.wires[0]);
            region.write_u8(base + encoder::B_PIN, chan.wires[1]);
            region.write_u8(base + encoder::INDEX_PIN, chan.wires[2]);
            region.write_u8(base + encoder::MODE, MODE_QUADRATURE);
            chan.written_pins = Some(chan.wires);
        }
    }
}

impl PruModule for Encoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, ctx: &mut PruContext) -> Result<(), PruError> {
        const ROLES: [&str; 3] = ["A", "B", "index"];
        for (j, chan) in self.channels.iter_mut().enumerate() {
            for (k, role) in ROLES.iter().enumerate() {
                let owner = format!("{}.chan.{:02}.{}", self.name, j, role);
                chan.wires[k] = ctx.claim_pin(chan.pins[k], &owner)?;
                chan.pin_sigs[k].set(chan.wires[k] as u32);
            }
        }
        let mut record = ctx.new_task(Mode::Encoder, encoder::size(self.channels.len() as u32))?;
        ctx.add_task(&mut record);

        let region = ctx.region_mut();
        for (j, chan) in self.channels.iter_mut().enumerate() {
            let base = record.field(encoder::CHANNELS + j as u32 * encoder::CHANNEL_SIZE);
            chan.prev_count = region.read_u16(base + encoder::COUNT);
        }
        self.record = Some(record);
        Ok(())
    }

    fn capture(&mut self, region: &SharedRegion) {
        let Some(record) = &self.record else {
            return;
        };
        for (j, chan) in self.channels.iter_mut().enumerate() {
            let base = record.field(encoder::CHANNELS + j as u32 * encoder::CHANNEL_SIZE);
            let count = region.read_u16(base + encoder::COUNT);
            let delta = count.wrapping_sub(chan.prev_count) as i16;
            chan.prev_count = count;
            chan.raw = chan.raw.wrapping_add(delta as i32);

            if chan.reset.get() {
                chan.offset = chan.raw;
            }
            let counts = chan.raw.wrapping_sub(chan.offset);
            chan.rawcounts.set(chan.raw);
            chan.counts.set(counts);

            let raw_scale = chan.scale.get();
            let scale = match guard_scale(raw_scale) {
                Some(fixed) => {
                    error!(
                        "{}.chan.{:02}: scale {} is too close to 0, resetting to {}",
                        self.name, j, raw_scale, fixed
                    );
                    chan.scale.set(fixed);
                    fixed
                }
                None => raw_scale,
            };
            chan.position.set(counts as f64 / scale);
        }
    }

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
