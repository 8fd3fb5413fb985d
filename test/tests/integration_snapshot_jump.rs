//! Jumping through start-point snapshots when the target is far away, and
//! discarding snapshots that are not worth a reset.

use ticklog_driver::{LocalTickMode, LoopConfigurationUpdate, MemoryLog};
use ticklog_shared::{StartPoint, StartPointData, Tick};
use ticklog_test::{drive, replay_driver, RecordingSim};

const FRAME: f64 = 1000.0 / 30.0;

fn snapshot(frame: u64, timestamp: f64) -> StartPoint {
    StartPoint {
        frame,
        timestamp,
        data: StartPointData {
            seed: Some(42),
            global_args: None,
            fps: Some(30.0),
            started_at: Some(0.0),
            rand_gen_ser: None,
            game_snapshot: Some(serde_json::json!({"frame": frame})),
        },
    }
}

#[test]
fn a_far_target_jumps_through_the_nearest_snapshot() {
    let mut log = MemoryLog::new(0.0);
    log.preload_start_point(snapshot(45_000, 1_500_000.0));
    for age in 45_000..45_005 {
        log.preload_tick(Tick::empty(age));
    }
    let mut driver = replay_driver(log, RecordingSim::new(Some(LocalTickMode::NonLocal)), |lc| {
        lc.target_age = Some(50_000)
    });
    driver.start_game();

    drive(&mut driver, 3, FRAME);
    let sim = driver.sim();
    assert_eq!(sim.resets.len(), 1);
    assert_eq!(sim.resets[0].frame, 45_000);
    // consumption resumes from the snapshot, not from age zero
    assert_eq!(sim.age(), 45_005);
    assert!(sim.skip_changes.contains(&true));
}

#[test]
fn a_snapshot_too_close_ahead_is_discarded() {
    let mut log = MemoryLog::new(0.0);
    // the only snapshot is closer than the jump-ignore window
    log.preload_start_point(snapshot(100, 3_400.0));
    let mut driver = replay_driver(log, RecordingSim::new(Some(LocalTickMode::NonLocal)), |lc| {
        lc.target_age = Some(40_000)
    });
    driver.start_game();

    drive(&mut driver, 3, FRAME);
    let sim = driver.sim();
    assert!(sim.resets.is_empty());
    assert_eq!(sim.age(), 0);
}

#[test]
fn lowering_the_target_age_seeks_backward_through_a_snapshot() {
    let mut log = MemoryLog::new(0.0);
    log.preload_start_point(snapshot(0, 0.0));
    for age in 0..30 {
        log.preload_tick(Tick::empty(age));
    }
    let mut driver = replay_driver(log, RecordingSim::new(Some(LocalTickMode::NonLocal)), |lc| {
        lc.target_age = Some(30)
    });
    driver.start_game();
    drive(&mut driver, 2, FRAME);
    assert_eq!(driver.sim().age(), 30);

    // rewind: the target now lies behind the current age
    driver.set_loop_configuration(LoopConfigurationUpdate {
        target_age: Some(Some(10)),
        ..LoopConfigurationUpdate::default()
    });
    drive(&mut driver, 3, FRAME);
    let sim = driver.sim();
    assert_eq!(sim.resets.len(), 1);
    assert_eq!(sim.resets[0].frame, 0);
    // replayed forward through the new target, which is then cleared and
    // playback resumes at one age per frame
    assert_eq!(sim.age(), 11);
    assert!(driver.loop_configuration().target_age.is_none());
}

#[test]
fn reaching_the_target_age_resumes_forward_playback() {
    let mut log = MemoryLog::new(0.0);
    for age in 0..20 {
        log.preload_tick(Tick::empty(age));
    }
    let mut driver = replay_driver(log, RecordingSim::new(Some(LocalTickMode::NonLocal)), |lc| {
        lc.target_age = Some(5)
    });
    driver.start_game();

    drive(&mut driver, 10, FRAME);
    let sim = driver.sim();
    // one waiting frame, a five-tick catch-up, then one age per frame
    assert_eq!(sim.age(), 13);
    assert!(driver.loop_configuration().target_age.is_none());
}
