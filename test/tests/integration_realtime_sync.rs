//! Realtime synchronization: an active instance generating ticks, passive
//! instances consuming them, and skip behavior over backlogs.

use ticklog_driver::{LocalTickMode, MemoryLog};
use ticklog_shared::Tick;
use ticklog_test::{active_driver, drive, passive_driver, RecordingSim};

const FRAME: f64 = 1000.0 / 30.0;

fn verbose_logs() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

#[test]
fn passive_replays_exactly_what_the_active_generated() {
    verbose_logs();
    let mut active = active_driver(
        MemoryLog::new(0.0),
        RecordingSim::new(Some(LocalTickMode::NonLocal)),
    );
    active.start_game();
    drive(&mut active, 10, FRAME);
    assert_eq!(active.sim().age(), 10);

    // hand the stored log to a fresh passive instance
    let mut log = MemoryLog::new(0.0);
    for tick in active.log().stored_ticks() {
        log.preload_tick(tick);
    }
    let mut passive = passive_driver(log, RecordingSim::new(Some(LocalTickMode::NonLocal)));
    passive.start_game();
    drive(&mut passive, 4, FRAME);
    assert_eq!(passive.sim().age(), active.sim().age());
    assert!(active.take_errors().is_empty());
    assert!(passive.take_errors().is_empty());
}

#[test]
fn a_backlog_is_skipped_through_in_one_batch() {
    verbose_logs();
    let mut log = MemoryLog::new(0.0);
    for age in 0..50 {
        log.preload_tick(Tick::empty(age));
    }
    let mut driver = passive_driver(log, RecordingSim::new(Some(LocalTickMode::NonLocal)));
    driver.start_game();

    // frame 1 requests, frame 2 receives and catches up
    drive(&mut driver, 2, FRAME);
    let sim = driver.sim();
    assert_eq!(sim.age(), 50);
    assert_eq!(sim.skip_changes, vec![true, false]);
    // skipping raises the playback rate hint for the duration
    assert_eq!(sim.playback_rates, vec![100.0, 1.0]);
}

#[test]
fn small_delays_are_consumed_one_tick_per_frame_without_skipping() {
    verbose_logs();
    let mut log = MemoryLog::new(0.0);
    for age in 0..3 {
        log.preload_tick(Tick::empty(age));
    }
    let mut driver = passive_driver(log, RecordingSim::new(Some(LocalTickMode::NonLocal)));
    driver.start_game();
    drive(&mut driver, 2, FRAME);
    assert_eq!(driver.sim().age(), 3);

    // five more ticks appear: within the delay-ignore threshold, so no
    // skip and no burst
    for age in 3..8 {
        driver.log_mut().push_tick(Tick::empty(age));
    }
    driver.looper(FRAME);
    assert_eq!(driver.sim().age(), 4);
    driver.looper(FRAME);
    assert_eq!(driver.sim().age(), 5);
    let skips = &driver.sim().skip_changes;
    // only the initial age-0 catch-up toggled skipping
    assert_eq!(skips.iter().filter(|s| **s).count(), 1);
}

#[test]
fn an_interpolating_scene_fills_the_wait_with_local_ticks() {
    verbose_logs();
    let log = MemoryLog::new(0.0);
    let mut driver = passive_driver(
        log,
        RecordingSim::new(Some(LocalTickMode::InterpolateLocal)),
    );
    driver.start_game();

    // no shared ticks exist; every frame becomes a local tick
    drive(&mut driver, 3, FRAME);
    let sim = driver.sim();
    assert_eq!(sim.age(), 0);
    assert_eq!(sim.local_tick_count(), 3);
}
