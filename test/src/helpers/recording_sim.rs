use ticklog_driver::{LocalTickMode, Simulation, TickGenerationMode};
use ticklog_shared::{Age, Event, StartPoint};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickRecord {
    pub advance_age: bool,
    pub omitted: u64,
}

/// A `Simulation` that records everything the driver tells it, with a
/// scriptable scene switch for mode-transition tests.
pub struct RecordingSim {
    local_tick_mode: Option<LocalTickMode>,
    tick_generation_mode: TickGenerationMode,
    age: Age,
    /// Switch to this mode (reporting a scene change) once `age` is reached.
    scene_switch: Option<(Age, Option<LocalTickMode>)>,
    pub ticks: Vec<TickRecord>,
    pub events: Vec<Event>,
    pub skip_changes: Vec<bool>,
    pub playback_rates: Vec<f64>,
    pub ages_passed: Vec<Age>,
    pub targets_reached: Vec<f64>,
    pub resets: Vec<StartPoint>,
    pub renders: usize,
    pub wants_render: bool,
}

impl RecordingSim {
    pub fn new(local_tick_mode: Option<LocalTickMode>) -> Self {
        Self {
            local_tick_mode,
            tick_generation_mode: TickGenerationMode::ByClock,
            age: 0,
            scene_switch: None,
            ticks: Vec::new(),
            events: Vec::new(),
            skip_changes: Vec::new(),
            playback_rates: Vec::new(),
            ages_passed: Vec::new(),
            targets_reached: Vec::new(),
            resets: Vec::new(),
            renders: 0,
            wants_render: false,
        }
    }

    pub fn with_generation_mode(mut self, mode: TickGenerationMode) -> Self {
        self.tick_generation_mode = mode;
        self
    }

    /// Schedules a scene switch: once the simulation reaches `age`, the
    /// local tick mode changes and the tick reports a scene change.
    pub fn switch_scene_at(mut self, age: Age, mode: Option<LocalTickMode>) -> Self {
        self.scene_switch = Some((age, mode));
        self
    }

    pub fn age(&self) -> Age {
        self.age
    }

    pub fn shared_tick_count(&self) -> usize {
        self.ticks.iter().filter(|t| t.advance_age).count()
    }

    pub fn local_tick_count(&self) -> usize {
        self.ticks.iter().filter(|t| !t.advance_age).count()
    }
}

impl Simulation for RecordingSim {
    fn tick(&mut self, advance_age: bool, omitted_ticks: u64) -> bool {
        if advance_age {
            self.age += 1;
        }
        self.ticks.push(TickRecord {
            advance_age,
            omitted: omitted_ticks,
        });
        if let Some((at, mode)) = self.scene_switch {
            if self.age >= at {
                self.scene_switch = None;
                self.local_tick_mode = mode;
                return true;
            }
        }
        false
    }

    fn render(&mut self) {
        self.renders += 1;
    }

    fn local_tick_mode(&self) -> Option<LocalTickMode> {
        self.local_tick_mode
    }

    fn tick_generation_mode(&self) -> TickGenerationMode {
        self.tick_generation_mode
    }

    fn push_events(&mut self, events: Vec<Event>) {
        self.events.extend(events);
    }

    fn current_age(&self) -> Age {
        self.age
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.playback_rates.push(rate);
    }

    fn skipping_changed(&mut self, skipping: bool) {
        self.skip_changes.push(skipping);
    }

    fn age_passed(&mut self, age: Age) {
        self.ages_passed.push(age);
    }

    fn target_time_reached(&mut self, target_time: f64) {
        self.targets_reached.push(target_time);
    }

    fn reset_with_start_point(&mut self, start_point: &StartPoint) {
        self.age = start_point.frame;
        self.resets.push(start_point.clone());
    }

    fn wants_render(&self) -> bool {
        self.wants_render
    }
}
