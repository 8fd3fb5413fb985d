//! # Ticklog Driver
//! Drives a deterministic simulation against a shared tick log: one active
//! instance turns events into numbered ticks, every instance consumes the
//! same sequence, and replays jump through start-point snapshots.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod clock;
mod config;
mod driver;
mod error;
mod event_buffer;
mod execution_mode;
mod game_loop;
mod join_resolver;
mod log_service;
mod loop_mode;
mod memory_log;
mod point_resolver;
mod simulation;
mod storage_resolver;
mod tick_buffer;
mod tick_controller;
mod tick_generator;

pub use clock::{Clock, ClockConfig, FramePlan, DEFAULT_DELTA_TIME_BROKEN_THRESHOLD};
pub use config::{
    DriverConfiguration, EventBufferMode, LoopConfiguration, LoopConfigurationUpdate,
    DEFAULT_DELAY_IGNORE_THRESHOLD, DEFAULT_JUMP_IGNORE_THRESHOLD, DEFAULT_JUMP_TRY_THRESHOLD,
    DEFAULT_POLLING_TICK_THRESHOLD, DEFAULT_SKIP_THRESHOLD, DEFAULT_SKIP_TICKS_AT_ONCE,
};
pub use driver::{GameConfiguration, GameDriver};
pub use error::DriverError;
pub use event_buffer::{EventBuffer, EventFilter, FilterHandle};
pub use execution_mode::ExecutionMode;
pub use game_loop::{GameLoop, GameLoopConfig};
pub use log_service::{
    LogError, LogResponse, LogService, Permission, StartPointQuery, StorageRequestId,
};
pub use loop_mode::{LoopMode, LoopRenderMode};
pub use memory_log::{MemoryLog, TOKEN_ACTIVE, TOKEN_PASSIVE};
pub use point_resolver::{PointEventResolver, PointSample, PointSampleKind};
pub use simulation::{LocalTickMode, Simulation, TickGenerationMode};
pub use storage_resolver::{StorageLoadId, StorageLoadResult, StorageResolver};
pub use tick_buffer::{
    AddTickListResult, AddTickResult, ConsumedTick, TickBuffer, TickBufferConfig, TickListOutcome,
    DEFAULT_PREFETCH_THRESHOLD, DEFAULT_SIZE_REQUEST_ONCE,
};
pub use tick_controller::TickController;
pub use tick_generator::{StorageOnTick, TickGenerator};
