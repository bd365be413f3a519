//! Property tests for data RAM layout

use proptest::prelude::*;
use pru_common::layout::{Mode, STATICS_SIZE};
use pru_common::unit::PruUnit;
use pru_hal::allocator::BumpAllocator;
use pru_hal::{PruContext, SharedRegion};

fn mode() -> impl Strategy<Value = Mode> {
    prop_oneof![
        Just(Mode::Wait),
        Just(Mode::StepDir),
        Just(Mode::Pwm),
        Just(Mode::Encoder),
    ]
}

proptest! {
    #[test]
    fn allocations_are_aligned_and_disjoint(lens in prop::collection::vec(0u32..200, 1..40)) {
        let mut alloc = BumpAllocator::new();
        let mut prev_end = STATICS_SIZE;
        for len in lens {
            let offset = alloc.allocate(len);
            prop_assert_eq!(offset % 4, 0);
            prop_assert!(offset >= prev_end);
            prev_end = offset + len;
            prop_assert!(alloc.high_water() >= prev_end);
            prop_assert_eq!(alloc.high_water() % 4, 0);
        }
    }

    #[test]
    fn ring_visits_every_task_once(
        tasks in prop::collection::vec((mode(), 1u32..6), 1..20)
    ) {
        let mut ctx = PruContext::new(SharedRegion::heap(8192), PruUnit::Pru0, 10_000);
        let mut added = Vec::new();
        for (mode, words) in tasks {
            let mut record = ctx.new_task(mode, 8 + words * 4).unwrap();
            ctx.add_task(&mut record);
            added.push((record.addr(), mode));
        }

        let headers = ctx.task_headers().unwrap();
        prop_assert_eq!(headers.len(), added.len());
        for ((addr, header), (want_addr, want_mode)) in headers.iter().zip(&added) {
            prop_assert_eq!(addr, want_addr);
            prop_assert_eq!(header.mode, *want_mode);
        }
        prop_assert_eq!(ctx.first_task(), added[0].0);
        prop_assert_eq!(headers[headers.len() - 1].1.next, added[0].0);
    }

    #[test]
    fn exhaustion_is_reported_not_wrapped(words in 1u32..64, count in 1usize..200) {
        let mut ctx = PruContext::new(SharedRegion::heap(512), PruUnit::Pru1, 10_000);
        let size = 8 + words * 4;
        let mut placed = 0usize;
        for _ in 0..count {
            match ctx.new_task(Mode::Pwm, size) {
                Ok(mut record) => {
                    prop_assert!(record.addr() + size <= 512);
                    ctx.add_task(&mut record);
                    placed += 1;
                }
                Err(_) => break,
            }
        }
        prop_assert_eq!(placed, count.min(((512 - 16) / size) as usize));
        prop_assert!(ctx.high_water() >= ctx.region().len() || placed == count);
    }
}
