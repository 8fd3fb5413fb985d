//! Switching the execution role at runtime: tick generation must resume
//! exactly where consumption left off, and event routing must flip with it.

use ticklog_driver::{
    DriverConfiguration, ExecutionMode, GameConfiguration, GameDriver, LocalTickMode, MemoryLog,
};
use ticklog_shared::{Event, EventKind, Tick};
use ticklog_test::{drive, RecordingSim};

const FRAME: f64 = 1000.0 / 30.0;

/// A driver whose token grants every permission, so it can take over the
/// active role mid-session.
fn promotable_driver(log: MemoryLog) -> GameDriver<MemoryLog, RecordingSim> {
    let config = DriverConfiguration {
        token: Some("session-owner".to_owned()),
        player_id: Some("p0".to_owned()),
        execution_mode: Some(ExecutionMode::Passive),
        event_buffer_mode: None,
    };
    let game = GameConfiguration::new(30.0, 0.0, 42);
    let sim = RecordingSim::new(Some(LocalTickMode::NonLocal));
    GameDriver::initialize(log, sim, config, game).expect("driver initialization failed")
}

#[test]
fn promotion_continues_the_age_sequence_without_a_gap() {
    let mut log = MemoryLog::new(0.0);
    for age in 0..3 {
        log.preload_tick(Tick::empty(age));
    }
    let mut driver = promotable_driver(log);
    driver.start_game();
    drive(&mut driver, 2, FRAME);
    assert_eq!(driver.sim().age(), 3);

    // the previous active instance is gone; take over
    driver.set_execution_mode(ExecutionMode::Active);
    drive(&mut driver, 2, FRAME);
    assert_eq!(driver.sim().age(), 5);
    let stored = driver.log().stored_ticks();
    assert_eq!(stored.len(), 5);
    assert_eq!(stored.last().unwrap().age, 4);
    assert!(driver.take_errors().is_empty());
}

#[test]
fn event_routing_flips_with_the_role() {
    let log = MemoryLog::new(0.0);
    let mut driver = promotable_driver(log);
    driver.start_game();
    driver.looper(FRAME);

    // passive: shared events go out to the log
    driver.raise_event(Event::new(
        EventKind::Message {
            data: serde_json::json!("from-passive"),
        },
        "p0",
    ));
    assert_eq!(driver.log().sent_events().len(), 1);

    driver.set_execution_mode(ExecutionMode::Active);

    // active: shared events are buffered into the next generated tick
    driver.raise_event(Event::new(
        EventKind::Message {
            data: serde_json::json!("from-active"),
        },
        "p0",
    ));
    assert_eq!(driver.log().sent_events().len(), 1);
    drive(&mut driver, 2, FRAME);
    let with_events = driver
        .log()
        .stored_ticks()
        .into_iter()
        .find(|t| t.events.is_some())
        .expect("a generated tick should carry the buffered event");
    assert!(with_events
        .events
        .unwrap()
        .iter()
        .any(|e| matches!(e.kind, EventKind::Message { .. })));
}

#[test]
fn demotion_stops_generation_and_resumes_consumption() {
    let log = MemoryLog::new(0.0);
    let mut driver = promotable_driver(log);
    driver.set_execution_mode(ExecutionMode::Active);
    driver.start_game();
    drive(&mut driver, 3, FRAME);
    assert_eq!(driver.log().stored_tick_count(), 3);

    driver.set_execution_mode(ExecutionMode::Passive);
    drive(&mut driver, 2, FRAME);
    // no new ticks were generated after the demotion
    assert_eq!(driver.log().stored_tick_count(), 3);
}
