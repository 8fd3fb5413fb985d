//! Storage reads and writes routed through tick-carried data, including
//! join storage resolution and stale-completion handling.

use ticklog_driver::{DriverError, ExecutionMode, LocalTickMode, LogError, MemoryLog};
use ticklog_shared::{EventKind, StorageKey, StorageValue};
use ticklog_test::{active_driver, drive, passive_driver, RecordingSim};

const FRAME: f64 = 1000.0 / 30.0;

fn score_value(n: i64) -> StorageValue {
    StorageValue {
        data: serde_json::json!(n),
        tag: None,
    }
}

#[test]
fn an_active_read_is_answered_through_the_next_tick() {
    let key = StorageKey::new("score");
    let mut log = MemoryLog::new(0.0);
    log.preload_storage(&key, score_value(120));
    let mut driver = active_driver(log, RecordingSim::new(Some(LocalTickMode::NonLocal)));
    driver.start_game();

    let id = driver.read_storage(&[key.clone()], None).unwrap();
    driver.looper(FRAME);

    let loads = driver.take_storage_loads();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].id, id);
    assert_eq!(loads[0].values[0][0].data, serde_json::json!(120));

    // the fetched records ride on the generated tick for passive peers
    let carrying = driver
        .log()
        .stored_ticks()
        .into_iter()
        .find(|t| t.storage.is_some())
        .expect("a tick should carry the storage records");
    assert_eq!(carrying.age, loads[0].serialization);
}

#[test]
fn a_passive_read_resolves_from_the_carrying_tick() {
    let key = StorageKey::new("score");
    let mut active_log = MemoryLog::new(0.0);
    active_log.preload_storage(&key, score_value(7));
    let mut active = active_driver(active_log, RecordingSim::new(Some(LocalTickMode::NonLocal)));
    active.start_game();
    active.read_storage(&[key.clone()], None).unwrap();
    drive(&mut active, 2, FRAME);
    let serialization = active.take_storage_loads()[0].serialization;

    let mut log = MemoryLog::new(0.0);
    for tick in active.log().stored_ticks() {
        log.preload_tick(tick);
    }
    let mut passive = passive_driver(log, RecordingSim::new(Some(LocalTickMode::NonLocal)));
    passive.start_game();
    let id = passive.read_storage(&[key], Some(serialization)).unwrap();
    drive(&mut passive, 2, FRAME);

    let loads = passive.take_storage_loads();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].id, id);
    assert_eq!(loads[0].serialization, serialization);
    assert_eq!(loads[0].values[0][0].data, serde_json::json!(7));
}

#[test]
fn a_completion_arriving_after_a_role_switch_is_dropped() {
    let key = StorageKey::new("score");
    let mut log = MemoryLog::new(0.0);
    log.preload_storage(&key, score_value(1));
    log.set_hold_storage(true);
    let mut driver = active_driver(log, RecordingSim::new(Some(LocalTickMode::NonLocal)));
    driver.start_game();

    driver.read_storage(&[key], None).unwrap();
    driver.looper(FRAME);

    // the generator forgets the request when the role flips
    driver.set_execution_mode(ExecutionMode::Passive);
    let id = driver.log().pending_storage_request_ids()[0];
    driver.log_mut().release_storage(id);
    drive(&mut driver, 2, FRAME);

    assert!(driver.take_storage_loads().is_empty());
    assert!(driver.take_errors().is_empty());
}

#[test]
fn storage_writes_require_the_active_permission() {
    let key = StorageKey::new("score");
    let mut passive = passive_driver(
        MemoryLog::new(0.0),
        RecordingSim::new(Some(LocalTickMode::NonLocal)),
    );
    let err = passive.write_storage(&key, &score_value(3)).unwrap_err();
    assert!(matches!(
        err,
        DriverError::Log(LogError::PermissionDenied(_))
    ));

    let mut active = active_driver(
        MemoryLog::new(0.0),
        RecordingSim::new(Some(LocalTickMode::NonLocal)),
    );
    active.write_storage(&key, &score_value(3)).unwrap();
}

#[test]
fn joins_pick_up_their_player_storage_before_entering_a_tick() {
    let key = StorageKey::new("score");
    let mut log = MemoryLog::new(0.0);
    log.preload_storage(&key, score_value(55));
    let sim = RecordingSim::new(Some(LocalTickMode::NonLocal));
    let mut driver = {
        use ticklog_driver::{DriverConfiguration, GameConfiguration, GameDriver, TOKEN_ACTIVE};
        let config = DriverConfiguration {
            token: Some(TOKEN_ACTIVE.to_owned()),
            player_id: Some("p0".to_owned()),
            execution_mode: Some(ExecutionMode::Active),
            event_buffer_mode: None,
        };
        let mut game = GameConfiguration::new(30.0, 0.0, 42);
        game.keys_for_join = Some(vec![key]);
        GameDriver::initialize(log, sim, config, game).expect("driver initialization failed")
    };
    driver.start_game();

    driver.raise_event(ticklog_shared::Event::new(
        EventKind::Join {
            name: Some("newcomer".to_owned()),
            storage: None,
        },
        "p1",
    ));
    drive(&mut driver, 3, FRAME);

    let join_tick = driver
        .log()
        .stored_ticks()
        .into_iter()
        .find(|t| {
            t.events
                .as_ref()
                .is_some_and(|evs| evs.iter().any(|e| matches!(e.kind, EventKind::Join { .. })))
        })
        .expect("the join should eventually enter a tick");
    let events = join_tick.events.unwrap();
    let join = events
        .iter()
        .find(|e| matches!(e.kind, EventKind::Join { .. }))
        .unwrap();
    let EventKind::Join { storage, .. } = &join.kind else {
        unreachable!()
    };
    let records = storage.as_ref().expect("join storage should be attached");
    assert_eq!(records[0].values[0].data, serde_json::json!(55));
}
