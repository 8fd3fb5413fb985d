//! Target-time replays: timestamp pacing, the exact-boundary rule, dead
//! time omission while skipping, and the target-reached notification.

use ticklog_driver::{LocalTickMode, MemoryLog};
use ticklog_shared::{EventKind, Tick};
use ticklog_test::{drive, replay_driver, timestamp_tick, RecordingSim};

fn verbose_logs() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

#[test]
fn a_tick_stamped_exactly_at_the_target_time_is_consumed() {
    verbose_logs();
    let mut log = MemoryLog::new(0.0);
    log.preload_tick(timestamp_tick(0, 80.0));
    let mut driver = replay_driver(
        log,
        RecordingSim::new(Some(LocalTickMode::InterpolateLocal)),
        |lc| {
            lc.target_time_offset = Some(0.0);
            lc.omit_interpolated_tick_on_replay = false;
        },
    );
    driver.start_game();

    // wall 40: nothing buffered yet, request and wait
    driver.looper(40.0);
    assert_eq!(driver.sim().age(), 0);

    // wall 80: the target lands exactly on the tick's timestamp; the tick
    // is due and consumed, pinned to the target
    driver.looper(40.0);
    let sim = driver.sim();
    assert_eq!(sim.age(), 1);
    assert_eq!(sim.local_tick_count(), 2);
    assert!(sim
        .events
        .iter()
        .any(|e| matches!(e.kind, EventKind::Timestamp { timestamp } if timestamp == 80.0)));
}

#[test]
fn stalled_interpolation_stays_behind_the_target_time() {
    verbose_logs();
    let log = MemoryLog::new(0.0);
    // an empty log keeps the loop waiting for its first tick; a raised
    // playback rate doubles the frames per callback
    let mut driver = replay_driver(
        log,
        RecordingSim::new(Some(LocalTickMode::InterpolateLocal)),
        |lc| {
            lc.target_time_offset = Some(0.0);
            lc.playback_rate = 2.0;
        },
    );
    driver.start_game();

    let frame = 1000.0 / 30.0;
    drive(&mut driver, 30, frame);
    let sim = driver.sim();
    // interpolated time may approach the wall-clock target but never
    // overrun it, no matter how many frames the stall spans
    assert!(sim.local_tick_count() > 0);
    assert!(sim.local_tick_count() as f64 * frame <= 30.0 * frame + 1e-6);
}

#[test]
fn skipping_replay_omits_dead_time_instead_of_interpolating() {
    verbose_logs();
    let mut log = MemoryLog::new(0.0);
    for age in 0..5 {
        log.preload_tick(Tick::empty(age));
    }
    log.preload_tick(timestamp_tick(5, 50_000.0));
    let mut driver = replay_driver(
        log,
        RecordingSim::new(Some(LocalTickMode::InterpolateLocal)),
        |lc| lc.target_time_offset = Some(-60_000.0),
    );
    driver.start_game();

    drive(&mut driver, 2, 40.0);
    let sim = driver.sim();
    assert_eq!(sim.age(), 6);
    // no interpolated ticks during the skip; the dead time before the
    // stamped tick arrives as an omission count instead
    assert_eq!(sim.local_tick_count(), 0);
    assert!(sim.ticks.iter().any(|t| t.advance_age && t.omitted == 1494));
    assert_eq!(sim.skip_changes.first(), Some(&true));
}

#[test]
fn the_target_time_notification_fires_once_per_stall() {
    verbose_logs();
    let log = MemoryLog::new(0.0);
    let mut driver = replay_driver(log, RecordingSim::new(Some(LocalTickMode::NonLocal)), |lc| {
        lc.target_time_offset = Some(0.0)
    });
    driver.start_game();

    // the empty log stalls the replay within the first frame window
    drive(&mut driver, 3, 33.0);
    assert_eq!(driver.sim().targets_reached, vec![33.0]);
}
