use ticklog_shared::{Age, Event, StartPoint};

/// How local (non-shared) ticks are interleaved for the current scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalTickMode {
    /// Every tick is local; no shared ticks are consumed.
    FullLocal,
    /// Only shared ticks advance the simulation.
    NonLocal,
    /// Local ticks fill the gaps while waiting for shared ticks.
    InterpolateLocal,
}

/// How ticks are generated while this instance is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickGenerationMode {
    /// One tick per clocked frame.
    ByClock,
    /// Ticks only on explicit request (`GameLoop::raise_tick`).
    Manual,
}

/// The simulated game, driven by the loop.
///
/// The driver never touches scene or rendering internals; everything it
/// needs from the game goes through this trait. Implementations must be
/// deterministic with respect to the tick/event sequence they are fed.
pub trait Simulation {
    /// Advances the simulation by one tick. `advance_age` is false for
    /// local ticks, which do not consume a shared tick. `omitted_ticks` is
    /// the number of interpolated local ticks skipped just before this one.
    /// Returns true when the tick changed the current scene.
    fn tick(&mut self, advance_age: bool, omitted_ticks: u64) -> bool;

    fn render(&mut self);

    /// `None` while no scene is loaded yet.
    fn local_tick_mode(&self) -> Option<LocalTickMode>;

    fn tick_generation_mode(&self) -> TickGenerationMode;

    /// Hands events to the simulation for processing during the next tick.
    fn push_events(&mut self, events: Vec<Event>);

    fn current_age(&self) -> Age;

    fn set_playback_rate(&mut self, rate: f64);

    fn skipping_changed(&mut self, skipping: bool);

    /// Fired when a registered age is passed; registration is via
    /// `GameLoop::notify_age_passed`.
    fn age_passed(&mut self, age: Age);

    /// Fired once when a timed replay stalls exactly at its target time.
    fn target_time_reached(&mut self, target_time: f64);

    /// Discards current state and restarts from the given start point.
    fn reset_with_start_point(&mut self, start_point: &StartPoint);

    /// Whether a render is wanted after the current raw frame.
    fn wants_render(&self) -> bool;
}
