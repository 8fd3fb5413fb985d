//! The frame loop: paces the clock, generates or consumes ticks, fills
//! gaps with local ticks, skips when behind, and jumps via start points
//! when too far behind.

use std::collections::BTreeSet;

use log::debug;
use ticklog_shared::{Age, Event, EventFlags, StartPoint, StorageKey, StorageValue};

use crate::clock::{Clock, ClockConfig, FramePlan, DEFAULT_DELTA_TIME_BROKEN_THRESHOLD};
use crate::config::{EventBufferMode, LoopConfiguration, LoopConfigurationUpdate,
    DEFAULT_POLLING_TICK_THRESHOLD};
use crate::error::DriverError;
use crate::event_buffer::EventBuffer;
use crate::execution_mode::ExecutionMode;
use crate::log_service::{LogError, LogResponse, LogService, StartPointQuery};
use crate::loop_mode::{LoopMode, LoopRenderMode};
use crate::simulation::{LocalTickMode, Simulation, TickGenerationMode};
use crate::storage_resolver::{StorageLoadId, StorageLoadResult, StorageResolver};
use crate::tick_buffer::{ConsumedTick, TickBufferConfig};
use crate::tick_controller::TickController;
use crate::tick_generator::StorageOnTick;

/// At most this many clocked frames run per looper callback.
const DEFAULT_MAX_FRAME_PER_ONCE: u64 = 5;

pub struct GameLoopConfig {
    pub fps: f64,
    pub started_at: f64,
    pub execution_mode: ExecutionMode,
    pub loop_configuration: LoopConfiguration,
    pub event_buffer_mode: EventBufferMode,
    pub default_event_priority: EventFlags,
    pub keys_for_join: Option<Vec<StorageKey>>,
}

pub struct GameLoop<L: LogService, S: Simulation> {
    log: L,
    sim: S,
    running: bool,
    started_at: f64,
    frame_time: f64,
    /// Absolute time of the last consumed or local tick.
    current_time: f64,
    /// Absolute wall time, advanced by raw looper deltas.
    wall_time: f64,

    loop_mode: LoopMode,
    delay_ignore_threshold: u64,
    skip_ticks_at_once: u64,
    skip_threshold: u64,
    skip_threshold_time: f64,
    jump_try_threshold: u64,
    jump_ignore_threshold: u64,
    playback_rate: f64,
    target_age: Option<Age>,
    target_time_offset: Option<f64>,
    origin_date: Option<f64>,
    real_target_time_offset: f64,
    omit_interpolated_tick_on_replay: bool,
    loop_render_mode: LoopRenderMode,

    skipping: bool,
    waiting_next_tick: bool,
    consumed_latest_tick: bool,
    waiting_start_point: bool,
    last_requested_start_point_age: Option<Age>,
    last_requested_start_point_time: Option<f64>,
    target_time_notified: bool,
    expected_zeroth_seed: Option<i64>,
    polling_elapsed: f64,
    wait_time_for_polling: f64,
    omitted_tick_duration: f64,

    clock: Clock,
    event_buffer: EventBuffer,
    tick_controller: TickController,
    storage_resolver: StorageResolver,
    storage_loads: Vec<StorageLoadResult>,
    age_table: BTreeSet<Age>,
    errors: Vec<DriverError>,
}

impl<L: LogService, S: Simulation> GameLoop<L, S> {
    pub fn new(log: L, sim: S, config: GameLoopConfig) -> Self {
        let lc = config.loop_configuration;
        let frame_time = 1000.0 / config.fps;
        let clock = Clock::new(ClockConfig {
            fps: config.fps,
            scale_factor: lc.playback_rate,
            max_frame_per_once: DEFAULT_MAX_FRAME_PER_ONCE,
            delta_time_broken_threshold: DEFAULT_DELTA_TIME_BROKEN_THRESHOLD,
        });
        let event_buffer = EventBuffer::new(config.event_buffer_mode, config.default_event_priority);
        let tick_controller = TickController::new(
            TickBufferConfig::new(config.execution_mode, config.started_at),
            config.keys_for_join,
        );
        let mut game_loop = Self {
            log,
            sim,
            running: false,
            started_at: config.started_at,
            frame_time,
            current_time: config.started_at,
            wall_time: config.started_at,
            loop_mode: lc.loop_mode,
            delay_ignore_threshold: lc.delay_ignore_threshold,
            skip_ticks_at_once: lc.skip_ticks_at_once,
            skip_threshold: lc.skip_threshold,
            skip_threshold_time: lc.skip_threshold as f64 * frame_time,
            jump_try_threshold: lc.jump_try_threshold,
            jump_ignore_threshold: lc.jump_ignore_threshold,
            playback_rate: lc.playback_rate,
            target_age: lc.target_age,
            target_time_offset: lc.target_time_offset,
            origin_date: lc.origin_date,
            real_target_time_offset: 0.0,
            omit_interpolated_tick_on_replay: lc.omit_interpolated_tick_on_replay,
            loop_render_mode: lc.loop_render_mode,
            skipping: false,
            waiting_next_tick: false,
            consumed_latest_tick: false,
            waiting_start_point: false,
            last_requested_start_point_age: None,
            last_requested_start_point_time: None,
            target_time_notified: false,
            expected_zeroth_seed: None,
            polling_elapsed: 0.0,
            wait_time_for_polling: DEFAULT_POLLING_TICK_THRESHOLD,
            omitted_tick_duration: 0.0,
            clock,
            event_buffer,
            tick_controller,
            storage_resolver: StorageResolver::new(),
            storage_loads: Vec::new(),
            age_table: BTreeSet::new(),
            errors: Vec::new(),
        };
        game_loop.update_target_time_offset();
        game_loop
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn skipping(&self) -> bool {
        self.skipping
    }

    pub fn waiting_next_tick(&self) -> bool {
        self.waiting_next_tick
    }

    pub fn frame_time(&self) -> f64 {
        self.frame_time
    }

    pub fn sim(&self) -> &S {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut S {
        &mut self.sim
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut L {
        &mut self.log
    }

    pub fn tick_controller(&self) -> &TickController {
        &self.tick_controller
    }

    pub fn tick_controller_mut(&mut self) -> &mut TickController {
        &mut self.tick_controller
    }

    pub fn event_buffer_mut(&mut self) -> &mut EventBuffer {
        &mut self.event_buffer
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.tick_controller.execution_mode()
    }

    pub fn start(&mut self) {
        self.running = true;
        self.tick_controller.start(&mut self.log);
        if self.event_buffer.mode().is_receiver {
            self.log.set_event_subscription(true);
        }
        self.dispatch_scene();
        self.clock.start();
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.tick_controller.stop(&mut self.log);
        if self.event_buffer.mode().is_receiver {
            self.log.set_event_subscription(false);
        }
        self.clock.stop();
    }

    /// The looper callback: digests log responses, runs the frames the
    /// clock owes, renders, and returns the suggested wait time until the
    /// next call.
    pub fn looper(&mut self, delta_ms: f64) -> f64 {
        if delta_ms > 0.0 {
            self.wall_time += delta_ms;
        }
        self.pump_log();
        let Some(plan) = self.clock.plan(delta_ms) else {
            return self.frame_time;
        };
        let consumed = self.run_frames(&plan);
        let next_wait = self.clock.commit(consumed);
        if self.waiting_next_tick && delta_ms > 0.0 {
            self.polling_elapsed += delta_ms;
            if self.polling_elapsed >= self.wait_time_for_polling {
                self.polling_elapsed = 0.0;
                self.tick_controller.buffer_mut().request_ticks(&mut self.log);
            }
        }
        if self.loop_render_mode == LoopRenderMode::AfterRawFrame && self.sim.wants_render() {
            self.sim.render();
        }
        next_wait
    }

    /// Feeds one event in as if it arrived from input or the log.
    pub fn raise_event(&mut self, event: Event) {
        self.event_buffer.on_event(event, &mut self.log);
    }

    /// Generates one tick immediately carrying the given events, bypassing
    /// the filter chain. Active only.
    pub fn raise_tick(&mut self, events: Vec<Event>) -> Result<(), DriverError> {
        if self.execution_mode() != ExecutionMode::Active {
            return Err(DriverError::NotActive);
        }
        for event in events {
            self.event_buffer.add_event_direct(event, &mut self.log);
        }
        let result = self
            .tick_controller
            .force_generate_tick(&mut self.event_buffer, &mut self.log)?;
        if result.got_next {
            self.on_got_next_tick();
        }
        if let Some(signal) = result.storage {
            self.on_storage_on_tick(signal);
        }
        Ok(())
    }

    /// Requests `Simulation::age_passed` when consumption passes `age`.
    pub fn notify_age_passed(&mut self, age: Age) {
        self.age_table.insert(age);
    }

    /// Starts a storage read resolved against tick-carried data. With a
    /// `serialization` token the read re-fetches the data carried at that
    /// age, yielding the same values on every instance.
    pub fn read_storage(
        &mut self,
        keys: &[StorageKey],
        serialization: Option<Age>,
    ) -> Result<StorageLoadId, DriverError> {
        let age = match serialization {
            Some(age) => {
                self.tick_controller
                    .buffer_mut()
                    .request_ticks_from(&mut self.log, age, 1);
                age
            }
            None => match self.execution_mode() {
                ExecutionMode::Active => {
                    self.tick_controller.request_storage_tick(keys, &mut self.log)?
                }
                ExecutionMode::Passive => {
                    let age = self.sim.current_age();
                    self.tick_controller
                        .buffer_mut()
                        .request_ticks_from(&mut self.log, age, 1);
                    age
                }
            },
        };
        let (id, immediate) = self.storage_resolver.register_load(age);
        if let Some(result) = immediate {
            self.storage_loads.push(result);
        }
        Ok(id)
    }

    /// Writes one storage value. Active only; passive instances observe
    /// writes through tick-carried data.
    pub fn write_storage(&mut self, key: &StorageKey, value: &StorageValue) -> Result<(), DriverError> {
        if self.execution_mode() != ExecutionMode::Active {
            return Err(DriverError::NotActive);
        }
        self.log.put_storage(key, value);
        Ok(())
    }

    pub fn take_storage_loads(&mut self) -> Vec<StorageLoadResult> {
        std::mem::take(&mut self.storage_loads)
    }

    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        if self.execution_mode() == mode {
            return;
        }
        self.tick_controller.set_execution_mode(mode, &mut self.log);
        self.storage_resolver.clear();
        self.waiting_next_tick = false;
        self.consumed_latest_tick = false;
        self.waiting_start_point = false;
        self.last_requested_start_point_age = None;
        self.last_requested_start_point_time = None;
        self.omitted_tick_duration = 0.0;
        self.dispatch_scene();
    }

    pub fn set_event_buffer_mode(&mut self, mode: EventBufferMode) {
        self.event_buffer.set_mode(mode, &mut self.log);
    }

    pub fn loop_configuration(&self) -> LoopConfiguration {
        LoopConfiguration {
            loop_mode: self.loop_mode,
            delay_ignore_threshold: self.delay_ignore_threshold,
            skip_ticks_at_once: self.skip_ticks_at_once,
            skip_threshold: self.skip_threshold,
            jump_try_threshold: self.jump_try_threshold,
            jump_ignore_threshold: self.jump_ignore_threshold,
            playback_rate: self.playback_rate,
            target_age: self.target_age,
            target_time_offset: self.target_time_offset,
            origin_date: self.origin_date,
            omit_interpolated_tick_on_replay: self.omit_interpolated_tick_on_replay,
            loop_render_mode: self.loop_render_mode,
        }
    }

    pub fn set_loop_configuration(&mut self, update: LoopConfigurationUpdate) {
        if let Some(mode) = update.loop_mode {
            self.loop_mode = mode;
        }
        if let Some(v) = update.delay_ignore_threshold {
            self.delay_ignore_threshold = v;
        }
        if let Some(v) = update.skip_ticks_at_once {
            self.skip_ticks_at_once = v;
        }
        if let Some(v) = update.skip_threshold {
            self.skip_threshold = v;
            self.skip_threshold_time = v as f64 * self.frame_time;
        }
        if let Some(v) = update.jump_try_threshold {
            self.jump_try_threshold = v;
        }
        if let Some(v) = update.jump_ignore_threshold {
            self.jump_ignore_threshold = v;
        }
        if let Some(v) = update.omit_interpolated_tick_on_replay {
            self.omit_interpolated_tick_on_replay = v;
        }
        if let Some(v) = update.loop_render_mode {
            self.loop_render_mode = v;
        }
        if let Some(target) = update.target_age {
            if self.target_age != target {
                self.target_age = target;
                // a fresh target un-stalls a replay parked at the old one
                self.waiting_next_tick = false;
            }
        }
        if let Some(v) = update.target_time_offset {
            self.target_time_offset = v;
            self.target_time_notified = false;
        }
        if let Some(v) = update.origin_date {
            self.origin_date = v;
            self.target_time_notified = false;
        }
        self.update_target_time_offset();
        if let Some(rate) = update.playback_rate {
            if rate != self.playback_rate {
                self.playback_rate = rate;
                self.clock.change_scale_factor(rate);
                self.sim.set_playback_rate(if self.skipping {
                    rate * self.skip_ticks_at_once as f64
                } else {
                    rate
                });
            }
        }
    }

    pub fn take_errors(&mut self) -> Vec<DriverError> {
        let mut errors = std::mem::take(&mut self.errors);
        errors.extend(self.tick_controller.take_errors());
        errors
    }

    fn update_target_time_offset(&mut self) {
        self.real_target_time_offset = match (self.origin_date, self.target_time_offset) {
            (Some(origin), _) => origin - self.started_at,
            (None, Some(offset)) => offset,
            (None, None) => 0.0,
        };
    }

    fn timed_replay(&self) -> bool {
        self.loop_mode == LoopMode::Replay
            && (self.origin_date.is_some() || self.target_time_offset.is_some())
    }

    fn replay_target_time(&self) -> f64 {
        self.wall_time - self.real_target_time_offset
    }

    fn pump_log(&mut self) {
        for response in self.log.poll() {
            match response {
                LogResponse::Tick(tick) => {
                    let result = self.tick_controller.buffer_mut().add_tick(tick);
                    if result.got_next {
                        self.on_got_next_tick();
                    }
                    if let Some(signal) = result.storage {
                        self.on_storage_on_tick(signal);
                    }
                }
                LogResponse::Event(event) => self.event_buffer.on_event(event, &mut self.log),
                LogResponse::TickList(result) => {
                    let outcome = self.tick_controller.buffer_mut().on_tick_list_response(result);
                    if outcome.got_no_tick {
                        self.on_got_no_tick();
                    }
                    if outcome.got_next {
                        self.on_got_next_tick();
                    }
                    for signal in outcome.storage {
                        self.on_storage_on_tick(signal);
                    }
                }
                LogResponse::StartPoint(result) => self.on_start_point(result),
                LogResponse::Storage { id, result } => {
                    if let Some(signal) = self.tick_controller.on_storage_response(id, result) {
                        self.on_storage_on_tick(signal);
                    }
                }
                LogResponse::StoragePut(result) | LogResponse::StartPointPut(result) => {
                    if let Err(e) = result {
                        self.errors.push(DriverError::Log(e));
                    }
                }
            }
        }
    }

    fn on_got_next_tick(&mut self) {
        self.consumed_latest_tick = false;
        // frame-by-frame execution is externally paced; reception must
        // not resume it
        if self.waiting_next_tick && self.loop_mode != LoopMode::FrameByFrame {
            self.stop_waiting_next_tick();
        }
    }

    fn on_got_no_tick(&mut self) {
        if self.waiting_next_tick {
            self.consumed_latest_tick = true;
        }
    }

    fn on_storage_on_tick(&mut self, signal: StorageOnTick) {
        if let Some(result) = self.storage_resolver.on_storage_on_tick(signal) {
            self.storage_loads.push(result);
        }
    }

    /// Arms a one-shot check of the next zeroth start point fetched from
    /// the log against the seed this instance wrote.
    pub(crate) fn verify_zeroth_start_point(&mut self, seed: i64) {
        self.expected_zeroth_seed = Some(seed);
    }

    fn on_start_point(&mut self, result: Result<StartPoint, LogError>) {
        self.waiting_start_point = false;
        let start_point = match result {
            Ok(sp) => sp,
            Err(e) => {
                self.errors.push(DriverError::Log(e));
                return;
            }
        };
        if start_point.frame == 0 {
            if let Some(seed) = self.expected_zeroth_seed.take() {
                if start_point.data.seed != Some(seed) {
                    self.errors.push(DriverError::BrokenZerothStartPoint);
                }
                return;
            }
        }
        if self.is_stale_start_point(&start_point) {
            debug!(
                "discarding a start point at frame {} (current age {})",
                start_point.frame,
                self.tick_controller.buffer().current_age()
            );
            return;
        }
        self.stop_skipping();
        self.tick_controller.buffer_mut().set_current_age(start_point.frame);
        self.current_time = start_point.timestamp;
        self.waiting_next_tick = false;
        self.consumed_latest_tick = false;
        self.last_requested_start_point_age = None;
        self.last_requested_start_point_time = None;
        self.omitted_tick_duration = 0.0;
        self.target_time_notified = false;
        self.sim.reset_with_start_point(&start_point);
        self.dispatch_scene();
    }

    /// A fetched start point is useless when it lies beyond the target, or
    /// when it is so close ahead that replaying up to it normally is
    /// cheaper than resetting the simulation.
    fn is_stale_start_point(&self, start_point: &StartPoint) -> bool {
        if self.timed_replay() {
            let target = self.replay_target_time();
            let current = self.current_time;
            return target < start_point.timestamp
                || (current <= target
                    && start_point.timestamp
                        < current + self.jump_ignore_threshold as f64 * self.frame_time);
        }
        let target_age = match self.loop_mode {
            LoopMode::Realtime => self.tick_controller.buffer().known_latest_age().map(|k| k + 1),
            _ => self.target_age,
        };
        let Some(target) = target_age else {
            return true;
        };
        let current = self.tick_controller.buffer().current_age();
        target < start_point.frame
            || (current <= target && start_point.frame < current + self.jump_ignore_threshold)
    }

    fn dispatch_scene(&mut self) {
        match self.sim.local_tick_mode() {
            None | Some(LocalTickMode::FullLocal) => self.tick_controller.stop_tick(),
            Some(_) => match self.sim.tick_generation_mode() {
                TickGenerationMode::ByClock => self.tick_controller.start_tick(),
                TickGenerationMode::Manual => self.tick_controller.start_tick_once(),
            },
        }
    }

    fn run_frames(&mut self, plan: &FramePlan) -> u64 {
        let mut consumed = 0;
        while consumed < plan.frames {
            let raw_delta = if consumed == 0 { plan.delta_time } else { 0.0 };
            let interrupt = self.frame(raw_delta);
            consumed += 1;
            if interrupt {
                break;
            }
        }
        consumed
    }

    fn frame(&mut self, raw_delta: f64) -> bool {
        match self.sim.local_tick_mode() {
            None | Some(LocalTickMode::FullLocal) => {
                self.tick_controller.stop_tick();
                self.event_buffer.process_events(true);
                self.do_local_tick();
                false
            }
            Some(local_mode) => {
                self.event_buffer.process_events(false);
                if let Some(result) = self
                    .tick_controller
                    .generate_tick(&mut self.event_buffer, &mut self.log)
                {
                    if result.got_next {
                        self.on_got_next_tick();
                    }
                    if let Some(signal) = result.storage {
                        self.on_storage_on_tick(signal);
                    }
                }
                if self.timed_replay() {
                    let target = self.replay_target_time();
                    let prev_time = self.current_time;
                    let interrupt = self.frame_for_timed_replay(local_mode, target);
                    if self.current_time != prev_time {
                        self.target_time_notified = false;
                    } else if !self.target_time_notified
                        && prev_time <= target
                        && target <= prev_time + self.frame_time
                    {
                        self.target_time_notified = true;
                        self.sim.target_time_reached(target);
                    }
                    interrupt
                } else {
                    self.frame_normal(local_mode, raw_delta)
                }
            }
        }
    }

    fn do_local_tick(&mut self) {
        if let Some(events) = self.event_buffer.read_local_events() {
            self.sim.push_events(events);
        }
        self.current_time += self.frame_time;
        let omitted = (self.omitted_tick_duration / self.frame_time) as u64;
        self.omitted_tick_duration = 0.0;
        if self.sim.tick(false, omitted) {
            self.dispatch_scene();
        }
    }

    fn frame_normal(&mut self, local_mode: LocalTickMode, raw_delta: f64) -> bool {
        // a huge first-frame delta means the looper itself stalled; enter
        // skipping so the catch-up is not rendered tick by tick
        if !self.skipping && !self.waiting_next_tick && raw_delta > self.skip_threshold_time {
            self.start_skipping();
        }
        if self.waiting_next_tick {
            if local_mode == LocalTickMode::InterpolateLocal {
                self.do_local_tick();
            }
            return false;
        }

        let current_age = self.tick_controller.buffer().current_age();
        let target_age: i64 = match self.loop_mode {
            LoopMode::Realtime => self
                .tick_controller
                .buffer()
                .known_latest_age()
                .map(|k| k as i64 + 1)
                .unwrap_or(current_age as i64),
            _ => match self.target_age {
                // a reached seek target is cleared; playback resumes at
                // one age per frame
                Some(t) if current_age == t => {
                    self.target_age = None;
                    current_age as i64 + 1
                }
                Some(t) => t as i64,
                None => current_age as i64 + 1,
            },
        };
        let gap = target_age - current_age as i64;

        if (gap > self.jump_try_threshold as i64 || gap < 0) && !self.waiting_start_point {
            let requestable = self
                .last_requested_start_point_age
                .map_or(true, |last| last < current_age);
            if requestable {
                let frame = target_age.max(0) as Age;
                self.waiting_start_point = true;
                self.last_requested_start_point_age = Some(frame);
                self.log.request_start_point(&StartPointQuery::by_frame(frame));
            }
        }

        if gap <= 0 {
            if gap == 0 {
                if current_age == 0 {
                    // nothing consumed yet and nothing known: ask
                    self.tick_controller.buffer_mut().request_ticks(&mut self.log);
                }
                self.start_waiting_next_tick();
            }
            if local_mode == LocalTickMode::InterpolateLocal {
                self.do_local_tick();
            }
            self.stop_skipping();
            return false;
        }

        if !self.skipping
            && (gap > self.skip_threshold as i64 || current_age == 0)
            && self.tick_controller.buffer().has_next_tick()
        {
            self.start_skipping();
        }

        let loop_count = if !self.skipping && gap <= self.delay_ignore_threshold as i64 {
            1
        } else {
            (gap as u64).min(self.skip_ticks_at_once)
        };

        let mut interrupt = false;
        for _ in 0..loop_count {
            let mut next_frame_time = self.current_time + self.frame_time;
            if let Some(next_tick_time) = self.tick_controller.buffer_mut().read_next_tick_time() {
                if next_frame_time < next_tick_time {
                    if self.loop_mode == LoopMode::Realtime
                        || (self.omit_interpolated_tick_on_replay && self.skipping)
                    {
                        // fast-forward over the dead time before the tick
                        let aligned =
                            (next_tick_time / self.frame_time).ceil() * self.frame_time;
                        self.omitted_tick_duration += aligned - next_frame_time;
                        next_frame_time = aligned;
                    } else if local_mode == LocalTickMode::InterpolateLocal {
                        self.do_local_tick();
                        continue;
                    } else {
                        break;
                    }
                }
            }
            match self.consume_one(next_frame_time) {
                ConsumeOutcome::Absent => {
                    self.tick_controller.buffer_mut().request_ticks(&mut self.log);
                    self.start_waiting_next_tick();
                    break;
                }
                ConsumeOutcome::Consumed => {}
                ConsumeOutcome::Interrupt => {
                    interrupt = true;
                    break;
                }
            }
        }

        if self.skipping && target_age - (self.tick_controller.buffer().current_age() as i64) < 1 {
            self.stop_skipping();
        }
        interrupt
    }

    fn frame_for_timed_replay(&mut self, local_mode: LocalTickMode, target_time: f64) -> bool {
        if self.waiting_next_tick {
            // interpolation during a stall must stay behind the target time
            if local_mode == LocalTickMode::InterpolateLocal
                && self.current_time + self.frame_time <= target_time
            {
                self.do_local_tick();
            }
            return false;
        }

        let frame_gap = (target_time - self.current_time) / self.frame_time;
        if (frame_gap > self.jump_try_threshold as f64 || frame_gap < 0.0)
            && !self.waiting_start_point
        {
            let requestable = self
                .last_requested_start_point_time
                .map_or(true, |last| last < self.current_time);
            if requestable {
                self.waiting_start_point = true;
                self.last_requested_start_point_time = Some(target_time);
                self.log
                    .request_start_point(&StartPointQuery::by_timestamp(target_time));
            }
        }
        if frame_gap <= 0.0 {
            self.stop_skipping();
            return false;
        }

        if !self.skipping
            && (frame_gap > self.skip_threshold as f64
                || self.tick_controller.buffer().current_age() == 0)
            && (self.tick_controller.buffer().has_next_tick()
                || (self.omit_interpolated_tick_on_replay && self.consumed_latest_tick))
        {
            self.start_skipping();
        }

        if self.omit_interpolated_tick_on_replay
            && local_mode == LocalTickMode::InterpolateLocal
            && self.consumed_latest_tick
        {
            // the log is exhausted: jump the timeline to just behind the
            // target instead of interpolating the whole way
            let new_time = target_time - self.frame_time;
            if new_time > self.current_time {
                self.omitted_tick_duration += new_time - self.current_time;
                self.current_time = new_time;
            }
        }

        let mut interrupt = false;
        for _ in 0..self.skip_ticks_at_once {
            if !self.tick_controller.buffer().has_next_tick() {
                if !self.consumed_latest_tick {
                    self.tick_controller.buffer_mut().request_ticks(&mut self.log);
                }
                self.start_waiting_next_tick();
                break;
            }
            let mut next_frame_time = self.current_time + self.frame_time;
            let next_tick_time = self
                .tick_controller
                .buffer_mut()
                .read_next_tick_time()
                .unwrap_or(next_frame_time);
            if target_time < next_frame_time {
                if next_tick_time <= target_time {
                    // the tick itself is due even though the frame would
                    // overshoot: consume it pinned to the target
                    next_frame_time = target_time;
                } else {
                    break;
                }
            } else if next_frame_time < next_tick_time {
                if self.omit_interpolated_tick_on_replay && self.skipping {
                    if target_time <= next_tick_time {
                        // dead time covers the rest of the catch-up
                        self.omitted_tick_duration += target_time - self.current_time;
                        self.current_time =
                            (target_time / self.frame_time).floor() * self.frame_time;
                        break;
                    }
                    self.omitted_tick_duration += next_tick_time - next_frame_time;
                    next_frame_time = next_tick_time;
                } else if local_mode == LocalTickMode::InterpolateLocal {
                    self.do_local_tick();
                    continue;
                } else {
                    break;
                }
            }
            match self.consume_one(next_frame_time) {
                ConsumeOutcome::Absent => {
                    if !self.consumed_latest_tick {
                        self.tick_controller.buffer_mut().request_ticks(&mut self.log);
                    }
                    self.start_waiting_next_tick();
                    break;
                }
                ConsumeOutcome::Consumed => {}
                ConsumeOutcome::Interrupt => {
                    interrupt = true;
                    break;
                }
            }
        }

        if self.skipping && target_time - self.current_time < self.frame_time {
            self.stop_skipping();
        }
        interrupt
    }

    fn consume_one(&mut self, next_frame_time: f64) -> ConsumeOutcome {
        let Some(consumed) = self.tick_controller.buffer_mut().consume(&mut self.log) else {
            return ConsumeOutcome::Absent;
        };
        self.current_time = next_frame_time;
        let age = consumed.age();
        let mut events = self.event_buffer.read_local_events().unwrap_or_default();
        if let ConsumedTick::Full(tick) = consumed {
            if let Some(tick_events) = tick.events {
                events.extend(tick_events);
            }
        }
        if !events.is_empty() {
            self.sim.push_events(events);
        }
        let omitted = (self.omitted_tick_duration / self.frame_time) as u64;
        self.omitted_tick_duration = 0.0;
        let scene_changed = self.sim.tick(true, omitted);
        if self.age_table.remove(&age) {
            self.sim.age_passed(age);
            return ConsumeOutcome::Interrupt;
        }
        if scene_changed {
            self.dispatch_scene();
            return ConsumeOutcome::Interrupt;
        }
        ConsumeOutcome::Consumed
    }

    fn start_skipping(&mut self) {
        if self.skipping {
            return;
        }
        self.skipping = true;
        self.sim
            .set_playback_rate(self.playback_rate * self.skip_ticks_at_once as f64);
        self.sim.skipping_changed(true);
    }

    fn stop_skipping(&mut self) {
        if !self.skipping {
            return;
        }
        self.skipping = false;
        self.sim.set_playback_rate(self.playback_rate);
        self.sim.skipping_changed(false);
    }

    fn start_waiting_next_tick(&mut self) {
        self.stop_skipping();
        self.waiting_next_tick = true;
        self.polling_elapsed = 0.0;
    }

    fn stop_waiting_next_tick(&mut self) {
        self.waiting_next_tick = false;
        self.polling_elapsed = 0.0;
    }
}

enum ConsumeOutcome {
    Absent,
    Consumed,
    Interrupt,
}
