use ticklog_driver::{
    DriverConfiguration, ExecutionMode, GameConfiguration, GameDriver, LoopConfiguration,
    LoopMode, MemoryLog, TOKEN_ACTIVE, TOKEN_PASSIVE,
};
use ticklog_shared::{Age, Event, EventKind, Tick};

use crate::helpers::recording_sim::RecordingSim;

pub const FPS: f64 = 30.0;
pub const SEED: i64 = 42;

fn initialize(
    log: MemoryLog,
    sim: RecordingSim,
    token: &str,
    mode: ExecutionMode,
    loop_configuration: LoopConfiguration,
) -> GameDriver<MemoryLog, RecordingSim> {
    let started_at = log.started_at();
    let config = DriverConfiguration {
        token: Some(token.to_owned()),
        player_id: Some("p0".to_owned()),
        execution_mode: Some(mode),
        event_buffer_mode: None,
    };
    let mut game = GameConfiguration::new(FPS, started_at, SEED);
    game.loop_configuration = loop_configuration;
    GameDriver::initialize(log, sim, config, game).expect("driver initialization failed")
}

pub fn active_driver(log: MemoryLog, sim: RecordingSim) -> GameDriver<MemoryLog, RecordingSim> {
    initialize(
        log,
        sim,
        TOKEN_ACTIVE,
        ExecutionMode::Active,
        LoopConfiguration::default(),
    )
}

pub fn passive_driver(log: MemoryLog, sim: RecordingSim) -> GameDriver<MemoryLog, RecordingSim> {
    initialize(
        log,
        sim,
        TOKEN_PASSIVE,
        ExecutionMode::Passive,
        LoopConfiguration::default(),
    )
}

/// A passive driver in replay mode with the given loop configuration on
/// top of the defaults.
pub fn replay_driver(
    log: MemoryLog,
    sim: RecordingSim,
    configure: impl FnOnce(&mut LoopConfiguration),
) -> GameDriver<MemoryLog, RecordingSim> {
    let mut lc = LoopConfiguration {
        loop_mode: LoopMode::Replay,
        ..LoopConfiguration::default()
    };
    configure(&mut lc);
    initialize(log, sim, TOKEN_PASSIVE, ExecutionMode::Passive, lc)
}

/// A tick whose payload pins it to an absolute timestamp.
pub fn timestamp_tick(age: Age, timestamp: f64) -> Tick {
    Tick {
        age,
        events: Some(vec![Event::new(EventKind::Timestamp { timestamp }, "p0")]),
        storage: None,
    }
}

/// Runs `frames` looper callbacks of `delta_ms` each.
pub fn drive(driver: &mut GameDriver<MemoryLog, RecordingSim>, frames: usize, delta_ms: f64) {
    for _ in 0..frames {
        driver.looper(delta_ms);
    }
}
