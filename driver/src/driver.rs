//! The top-level driver: authenticates against the log, picks the event
//! buffer mode for the role, seeds the zeroth start point, and wraps the
//! frame loop behind one handle.

use log::debug;
use ticklog_shared::{
    Age, Event, PlayerId, StartPoint, StorageKey, StorageValue, EVENT_FLAG_PRIORITY_MASK,
};

use crate::config::{DriverConfiguration, EventBufferMode, LoopConfiguration, LoopConfigurationUpdate};
use crate::error::DriverError;
use crate::event_buffer::{EventFilter, FilterHandle};
use crate::execution_mode::ExecutionMode;
use crate::game_loop::{GameLoop, GameLoopConfig};
use crate::log_service::{LogService, Permission, StartPointQuery};
use crate::point_resolver::{PointEventResolver, PointSample};
use crate::simulation::Simulation;
use crate::storage_resolver::{StorageLoadId, StorageLoadResult};

/// Session parameters of the game being driven.
#[derive(Clone, Debug)]
pub struct GameConfiguration {
    pub fps: f64,
    pub started_at: f64,
    pub seed: i64,
    pub global_args: Option<serde_json::Value>,
    pub loop_configuration: LoopConfiguration,
    /// Storage keys resolved for every joining player before the join
    /// event enters a tick.
    pub keys_for_join: Option<Vec<StorageKey>>,
}

impl GameConfiguration {
    pub fn new(fps: f64, started_at: f64, seed: i64) -> Self {
        Self {
            fps,
            started_at,
            seed,
            global_args: None,
            loop_configuration: LoopConfiguration::default(),
            keys_for_join: None,
        }
    }
}

pub struct GameDriver<L: LogService, S: Simulation> {
    game_loop: GameLoop<L, S>,
    permission: Permission,
    player_id: Option<PlayerId>,
    point_resolver: Option<PointEventResolver>,
    errors: Vec<DriverError>,
}

impl<L: LogService, S: Simulation> GameDriver<L, S> {
    /// Authenticates, derives the event buffer mode and default event
    /// priority from the role and permission, and writes the zeroth start
    /// point when this instance owns tick generation.
    pub fn initialize(
        mut log: L,
        sim: S,
        config: DriverConfiguration,
        game: GameConfiguration,
    ) -> Result<Self, DriverError> {
        let token = config.token.as_deref().ok_or(DriverError::NotAuthenticated)?;
        let permission = log.authenticate(token)?;
        let execution_mode = config.execution_mode.unwrap_or(ExecutionMode::Passive);
        let event_buffer_mode = config
            .event_buffer_mode
            .unwrap_or_else(|| EventBufferMode::for_execution_mode(execution_mode));
        let default_event_priority = EVENT_FLAG_PRIORITY_MASK & permission.max_event_priority;

        let writes_zeroth = execution_mode == ExecutionMode::Active && permission.write_tick;
        if writes_zeroth {
            let zeroth = StartPoint::zeroth(
                game.seed,
                game.started_at,
                game.fps,
                game.global_args.clone(),
            );
            log.put_start_point(&zeroth);
            // read it back so a broken log surfaces before ticks pile up
            log.request_start_point(&StartPointQuery::by_frame(0));
        }

        let mut game_loop = GameLoop::new(
            log,
            sim,
            GameLoopConfig {
                fps: game.fps,
                started_at: game.started_at,
                execution_mode,
                loop_configuration: game.loop_configuration,
                event_buffer_mode,
                default_event_priority,
                keys_for_join: game.keys_for_join,
            },
        );
        if writes_zeroth {
            game_loop.verify_zeroth_start_point(game.seed);
        }
        let point_resolver = config.player_id.clone().map(PointEventResolver::new);
        Ok(Self {
            game_loop,
            permission,
            player_id: config.player_id,
            point_resolver,
            errors: Vec::new(),
        })
    }

    pub fn start_game(&mut self) {
        self.game_loop.start();
    }

    pub fn stop_game(&mut self) {
        self.game_loop.stop();
    }

    pub fn running(&self) -> bool {
        self.game_loop.running()
    }

    /// Drives one looper callback; returns the suggested wait in ms.
    pub fn looper(&mut self, delta_ms: f64) -> f64 {
        self.game_loop.looper(delta_ms)
    }

    pub fn raise_event(&mut self, event: Event) {
        self.game_loop.raise_event(event);
    }

    /// Turns a raw pointer sample into a point event and feeds it in.
    /// Samples arriving without a preceding down are dropped.
    pub fn raise_point_event(&mut self, sample: PointSample) {
        let Some(resolver) = self.point_resolver.as_mut() else {
            debug!("dropping a point sample: no player id configured");
            return;
        };
        if let Some(event) = resolver.resolve(sample) {
            self.game_loop.raise_event(event);
        }
    }

    /// Generates one tick immediately with the given events. Active only.
    pub fn raise_tick(&mut self, events: Vec<Event>) -> Result<(), DriverError> {
        self.game_loop.raise_tick(events)
    }

    /// Moves the generator so the next generated tick gets `age`.
    pub fn set_next_age(&mut self, age: Age) -> Result<(), DriverError> {
        self.game_loop.tick_controller_mut().set_next_age(age)
    }

    /// Switches the role at runtime. The event buffer flips first so no
    /// event is mis-routed while the tick pipeline resets behind it.
    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        if self.game_loop.execution_mode() == mode {
            return;
        }
        self.game_loop
            .set_event_buffer_mode(EventBufferMode::for_execution_mode(mode));
        self.game_loop.set_execution_mode(mode);
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.game_loop.execution_mode()
    }

    pub fn notify_age_passed(&mut self, age: Age) {
        self.game_loop.notify_age_passed(age);
    }

    pub fn read_storage(
        &mut self,
        keys: &[StorageKey],
        serialization: Option<Age>,
    ) -> Result<StorageLoadId, DriverError> {
        self.game_loop.read_storage(keys, serialization)
    }

    pub fn write_storage(
        &mut self,
        key: &StorageKey,
        value: &StorageValue,
    ) -> Result<(), DriverError> {
        if !self.permission.write_tick {
            return Err(DriverError::Log(crate::log_service::LogError::PermissionDenied(
                "storage write",
            )));
        }
        self.game_loop.write_storage(key, value)
    }

    pub fn take_storage_loads(&mut self) -> Vec<StorageLoadResult> {
        self.game_loop.take_storage_loads()
    }

    pub fn add_event_filter(&mut self, filter: Box<EventFilter>, handle_empty: bool) -> FilterHandle {
        self.game_loop
            .event_buffer_mut()
            .add_filter(filter, handle_empty)
    }

    /// Removes one filter, or every filter when `handle` is `None`.
    pub fn remove_event_filter(&mut self, handle: Option<FilterHandle>) {
        self.game_loop.event_buffer_mut().remove_filter(handle);
    }

    pub fn loop_configuration(&self) -> LoopConfiguration {
        self.game_loop.loop_configuration()
    }

    pub fn set_loop_configuration(&mut self, update: LoopConfigurationUpdate) {
        self.game_loop.set_loop_configuration(update);
    }

    pub fn permission(&self) -> &Permission {
        &self.permission
    }

    pub fn player_id(&self) -> Option<&PlayerId> {
        self.player_id.as_ref()
    }

    pub fn skipping(&self) -> bool {
        self.game_loop.skipping()
    }

    pub fn sim(&self) -> &S {
        self.game_loop.sim()
    }

    pub fn sim_mut(&mut self) -> &mut S {
        self.game_loop.sim_mut()
    }

    pub fn log(&self) -> &L {
        self.game_loop.log()
    }

    pub fn log_mut(&mut self) -> &mut L {
        self.game_loop.log_mut()
    }

    /// Drains every error accumulated since the last call, across the
    /// loop, the tick pipeline and the driver itself.
    pub fn take_errors(&mut self) -> Vec<DriverError> {
        let mut errors = std::mem::take(&mut self.errors);
        errors.extend(self.game_loop.take_errors());
        errors
    }
}
