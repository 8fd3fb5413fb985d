//! Property tests for the tick buffer's range bookkeeping: whatever order
//! ticks and tick lists arrive in, consumption yields each age exactly
//! once, in order, and never past a gap.

use proptest::prelude::*;
use ticklog_driver::{ExecutionMode, MemoryLog, TickBuffer, TickBufferConfig};
use ticklog_shared::{Tick, TickList};

fn new_buffer() -> TickBuffer {
    TickBuffer::new(TickBufferConfig::new(ExecutionMode::Passive, 0.0))
}

fn drain(buffer: &mut TickBuffer, log: &mut MemoryLog) -> Vec<u64> {
    let mut consumed = Vec::new();
    while let Some(tick) = buffer.consume(log) {
        consumed.push(tick.age());
    }
    consumed
}

proptest! {
    #[test]
    fn shuffled_single_ticks_consume_as_the_contiguous_prefix(
        ages in proptest::collection::vec(0u64..40, 1..60),
    ) {
        let mut log = MemoryLog::new(0.0);
        let mut buffer = new_buffer();
        for &age in &ages {
            buffer.add_tick(Tick::empty(age));
        }

        let mut present: Vec<u64> = ages.clone();
        present.sort_unstable();
        present.dedup();
        // the consumable prefix starts at age 0 and stops at the first gap
        let expected: Vec<u64> = present
            .iter()
            .copied()
            .enumerate()
            .take_while(|&(i, age)| age == i as u64)
            .map(|(_, age)| age)
            .collect();

        prop_assert_eq!(drain(&mut buffer, &mut log), expected);
    }

    #[test]
    fn overlapping_tick_lists_never_duplicate_or_reorder(
        spans in proptest::collection::vec((0u64..30, 1u64..10), 1..12),
    ) {
        let mut log = MemoryLog::new(0.0);
        let mut buffer = new_buffer();
        for &(from, len) in &spans {
            let to = from + len - 1;
            buffer.add_tick_list(TickList {
                from,
                to,
                ticks: Vec::new(),
            });
        }

        let mut covered: Vec<bool> = vec![false; 64];
        for &(from, len) in &spans {
            for age in from..from + len {
                covered[age as usize] = true;
            }
        }
        let expected: Vec<u64> = (0u64..64)
            .take_while(|&age| covered[age as usize])
            .collect();

        prop_assert_eq!(drain(&mut buffer, &mut log), expected);
    }
}
