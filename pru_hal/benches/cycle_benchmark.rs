//! Host cycle benchmarks

use criterion::{Criterion, criterion_group, criterion_main};
use pru_common::config::PruConfig;
use pru_common::consts::PRU_DATA_RAM_SIZE;
use pru_common::unit::PruUnit;
use pru_hal::cycle::CycleCoordinator;
use pru_hal::modules::build_modules;
use pru_hal::{PruContext, SharedRegion, SignalTable};
use std::hint::black_box;

/// Coordinator with `stepgens` step generators, one PWM generator and one
/// encoder, laid out on a heap region.
fn setup(stepgens: usize) -> (CycleCoordinator, PruContext, SignalTable) {
    let config = PruConfig {
        prefix: "bench".to_string(),
        num_stepgens: Some(stepgens),
        num_pwmgens: Some(1),
        num_encoders: Some(1),
        ..PruConfig::default()
    };
    let mut signals = SignalTable::new();
    let modules = build_modules(&config, &mut signals, None).unwrap();
    let mut coordinator = CycleCoordinator::new("bench", modules, &mut signals).unwrap();
    let mut ctx = PruContext::new(
        SharedRegion::heap(PRU_DATA_RAM_SIZE),
        PruUnit::Pru0,
        config.period_ns,
    );
    coordinator.init(&mut ctx).unwrap();
    (coordinator, ctx, signals)
}

/// Benchmark one idle capture+update cycle
fn bench_idle_cycle(c: &mut Criterion) {
    let (mut coordinator, mut ctx, _signals) = setup(4);

    c.bench_function("cycle_idle_4_stepgens", |b| {
        b.iter(|| {
            coordinator.capture(black_box(ctx.region()));
            coordinator.update(black_box(ctx.region_mut()));
        });
    });
}

/// Benchmark cycles with every step generator running the position loop
fn bench_active_cycle(c: &mut Criterion) {
    let (mut coordinator, mut ctx, signals) = setup(8);
    let commands: Vec<_> = (0..8)
        .map(|i| {
            let name = format!("bench.stepgen.{i:02}");
            signals
                .get::<bool>(&format!("{name}.enable"))
                .unwrap()
                .set(true);
            signals.get::<f64>(&format!("{name}.position-cmd")).unwrap()
        })
        .collect();

    let mut position = 0.0;
    c.bench_function("cycle_active_8_stepgens", |b| {
        b.iter(|| {
            position += 0.001;
            for cmd in &commands {
                cmd.set(position);
            }
            coordinator.capture(ctx.region());
            coordinator.update(ctx.region_mut());
            black_box(ctx.region().read_u32(16));
        });
    });
}

criterion_group!(benches, bench_idle_cycle, bench_active_cycle);
criterion_main!(benches);
