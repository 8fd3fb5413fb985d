use ticklog_shared::{Age, EventFlags, PlayerId};

use crate::execution_mode::ExecutionMode;
use crate::loop_mode::{LoopMode, LoopRenderMode};

/// Ticks of lag below which the loop does not bother catching up.
pub const DEFAULT_DELAY_IGNORE_THRESHOLD: u64 = 6;
/// Hard cap on ticks consumed within one clocked frame while skipping.
pub const DEFAULT_SKIP_TICKS_AT_ONCE: u64 = 100;
/// Ticks of lag beyond which the loop enters skipping.
pub const DEFAULT_SKIP_THRESHOLD: u64 = 100;
/// Ticks of lag beyond which a snapshot jump is attempted.
pub const DEFAULT_JUMP_TRY_THRESHOLD: u64 = 30_000;
/// A fetched start point closer than this to the current age is discarded.
pub const DEFAULT_JUMP_IGNORE_THRESHOLD: u64 = 15_000;
/// Wall-clock milliseconds to wait for a pushed tick before re-requesting.
pub const DEFAULT_POLLING_TICK_THRESHOLD: f64 = 10_000.0;

/// How the event buffer treats incoming and outgoing events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventBufferMode {
    /// Buffer non-local events for processing.
    pub is_receiver: bool,
    /// Forward non-local events to the log service.
    pub is_sender: bool,
    /// Buffer local events for processing.
    pub is_local_receiver: bool,
    /// Drop everything that would have been buffered.
    pub is_discarder: bool,
    /// Priority stamped on outgoing events that carry no flags. `None`
    /// falls back to the driver default derived from the permission.
    pub default_event_priority: Option<EventFlags>,
}

impl EventBufferMode {
    /// The default mode for a role: the active instance receives (its ticks
    /// embed the events), passive instances send.
    pub fn for_execution_mode(mode: ExecutionMode) -> Self {
        let active = mode == ExecutionMode::Active;
        Self {
            is_receiver: active,
            is_sender: !active,
            is_local_receiver: true,
            is_discarder: false,
            default_event_priority: None,
        }
    }
}

/// Static, per-session driver settings.
#[derive(Clone, Debug, Default)]
pub struct DriverConfiguration {
    pub token: Option<String>,
    pub player_id: Option<PlayerId>,
    pub execution_mode: Option<ExecutionMode>,
    pub event_buffer_mode: Option<EventBufferMode>,
}

/// Loop pacing configuration. All fields have working defaults; replay
/// targets are absent unless set.
#[derive(Clone, Debug)]
pub struct LoopConfiguration {
    pub loop_mode: LoopMode,
    /// Ticks of lag to tolerate before catching up.
    pub delay_ignore_threshold: u64,
    pub skip_ticks_at_once: u64,
    pub skip_threshold: u64,
    pub jump_try_threshold: u64,
    pub jump_ignore_threshold: u64,
    pub playback_rate: f64,
    /// Replay target in ticks. Takes effect in `LoopMode::Replay` when no
    /// target time is set.
    pub target_age: Option<Age>,
    /// Replay target as a time offset in milliseconds from session start.
    /// Overridden by `origin_date` when both are set.
    pub target_time_offset: Option<f64>,
    /// Replay origin as an absolute epoch timestamp; when set, the replay
    /// target time is wall-clock-now minus this.
    pub origin_date: Option<f64>,
    /// Skip interpolated local ticks while replay-skipping, accounting
    /// their duration as omitted instead.
    pub omit_interpolated_tick_on_replay: bool,
    pub loop_render_mode: LoopRenderMode,
}

impl Default for LoopConfiguration {
    fn default() -> Self {
        Self {
            loop_mode: LoopMode::Realtime,
            delay_ignore_threshold: DEFAULT_DELAY_IGNORE_THRESHOLD,
            skip_ticks_at_once: DEFAULT_SKIP_TICKS_AT_ONCE,
            skip_threshold: DEFAULT_SKIP_THRESHOLD,
            jump_try_threshold: DEFAULT_JUMP_TRY_THRESHOLD,
            jump_ignore_threshold: DEFAULT_JUMP_IGNORE_THRESHOLD,
            playback_rate: 1.0,
            target_age: None,
            target_time_offset: None,
            origin_date: None,
            omit_interpolated_tick_on_replay: true,
            loop_render_mode: LoopRenderMode::AfterRawFrame,
        }
    }
}

/// Partial update applied over a live `LoopConfiguration`; `None` keeps the
/// current value.
#[derive(Clone, Debug, Default)]
pub struct LoopConfigurationUpdate {
    pub loop_mode: Option<LoopMode>,
    pub delay_ignore_threshold: Option<u64>,
    pub skip_ticks_at_once: Option<u64>,
    pub skip_threshold: Option<u64>,
    pub jump_try_threshold: Option<u64>,
    pub jump_ignore_threshold: Option<u64>,
    pub playback_rate: Option<f64>,
    pub target_age: Option<Option<Age>>,
    pub target_time_offset: Option<Option<f64>>,
    pub origin_date: Option<Option<f64>>,
    pub omit_interpolated_tick_on_replay: Option<bool>,
    pub loop_render_mode: Option<LoopRenderMode>,
}
