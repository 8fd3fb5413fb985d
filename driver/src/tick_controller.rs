use log::warn;
use ticklog_shared::{Age, StorageKey, StorageRecord, Tick};

use crate::error::DriverError;
use crate::event_buffer::EventBuffer;
use crate::execution_mode::ExecutionMode;
use crate::log_service::{LogError, LogService, StorageRequestId};
use crate::tick_buffer::{AddTickResult, TickBuffer, TickBufferConfig};
use crate::tick_generator::{StorageOnTick, TickGenerator};

/// Couples the tick generator and the tick buffer under one execution
/// role. Generated ticks are both submitted to the log and fed to the own
/// buffer, so the active instance consumes exactly what it publishes.
pub struct TickController {
    execution_mode: ExecutionMode,
    started: bool,
    stop_after_one: bool,
    generator: TickGenerator,
    buffer: TickBuffer,
    errors: Vec<DriverError>,
}

impl TickController {
    pub fn new(
        buffer_config: TickBufferConfig,
        keys_for_join: Option<Vec<StorageKey>>,
    ) -> Self {
        let execution_mode = buffer_config.execution_mode;
        Self {
            execution_mode,
            started: false,
            stop_after_one: false,
            generator: TickGenerator::new(keys_for_join),
            buffer: TickBuffer::new(buffer_config),
            errors: Vec::new(),
        }
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub fn buffer(&self) -> &TickBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut TickBuffer {
        &mut self.buffer
    }

    pub fn start_tick(&mut self) {
        self.started = true;
        self.stop_after_one = false;
    }

    /// Starts generation and stops it again after the first tick; used for
    /// manual tick-generation scenes.
    pub fn start_tick_once(&mut self) {
        self.started = true;
        self.stop_after_one = true;
    }

    pub fn stop_tick(&mut self) {
        self.started = false;
    }

    pub fn start<L: LogService>(&mut self, log: &mut L) {
        self.generator.start();
        self.buffer.start(log);
    }

    pub fn stop<L: LogService>(&mut self, log: &mut L) {
        self.generator.stop();
        self.buffer.stop(log);
    }

    /// Runs once per clocked frame: while started and active, generates
    /// one tick, publishes it and adopts it locally.
    pub fn generate_tick<L: LogService>(
        &mut self,
        event_buffer: &mut EventBuffer,
        log: &mut L,
    ) -> Option<AddTickResult> {
        if !self.started || self.execution_mode != ExecutionMode::Active {
            return None;
        }
        let tick = self.generator.next(event_buffer, log)?;
        if self.stop_after_one {
            self.started = false;
        }
        Some(self.publish(tick, log))
    }

    /// Generates one tick immediately, regardless of scene pacing.
    pub fn force_generate_tick<L: LogService>(
        &mut self,
        event_buffer: &mut EventBuffer,
        log: &mut L,
    ) -> Result<AddTickResult, DriverError> {
        if self.execution_mode != ExecutionMode::Active {
            return Err(DriverError::NotActive);
        }
        let tick = self.generator.force_next(event_buffer, log)?;
        Ok(self.publish(tick, log))
    }

    fn publish<L: LogService>(&mut self, tick: Tick, log: &mut L) -> AddTickResult {
        if let Err(e) = log.send_tick(&tick) {
            warn!("failed to submit tick {}: {}", tick.age, e);
            self.errors.push(DriverError::Log(e));
        }
        self.buffer.add_tick(tick)
    }

    pub fn set_next_age(&mut self, age: Age) -> Result<(), DriverError> {
        self.generator.set_next_age(age)
    }

    pub fn request_storage_tick<L: LogService>(
        &mut self,
        keys: &[StorageKey],
        log: &mut L,
    ) -> Result<Age, DriverError> {
        if self.execution_mode != ExecutionMode::Active {
            return Err(DriverError::NotActive);
        }
        self.generator.request_storage_tick(keys, log)
    }

    /// Switches roles. The buffer resets before the generator so the
    /// generator can pick up the buffer's post-reset current age.
    pub fn set_execution_mode<L: LogService>(&mut self, mode: ExecutionMode, log: &mut L) {
        if self.execution_mode == mode {
            return;
        }
        self.execution_mode = mode;
        self.buffer.set_execution_mode(mode, log);
        self.generator.reset(self.buffer.current_age());
    }

    pub fn on_storage_response(
        &mut self,
        id: StorageRequestId,
        result: Result<Vec<StorageRecord>, LogError>,
    ) -> Option<StorageOnTick> {
        self.generator.on_storage_response(id, result)
    }

    pub fn take_errors(&mut self) -> Vec<DriverError> {
        let mut errors = std::mem::take(&mut self.errors);
        errors.extend(self.generator.take_errors());
        errors.extend(self.buffer.take_errors());
        errors
    }
}
