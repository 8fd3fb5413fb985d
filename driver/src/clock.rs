//! Frame pacing.
//!
//! The clock turns irregular looper deltas into a stable stream of logical
//! frames. Accumulated time below the anticipate threshold yields no frame;
//! bursts are batched up to a cap; absurd deltas (tab suspended, debugger
//! pause) collapse to a single frame's worth.

/// Fraction of a frame period that must accumulate before a frame fires.
/// Firing slightly early cancels out the platform timer firing slightly
/// late.
const ANTICIPATE_RATE: f64 = 0.8;

pub const DEFAULT_DELTA_TIME_BROKEN_THRESHOLD: f64 = 150.0;

#[derive(Clone, Debug)]
pub struct ClockConfig {
    pub fps: f64,
    pub scale_factor: f64,
    pub max_frame_per_once: u64,
    pub delta_time_broken_threshold: f64,
}

/// A batch of logical frames owed for one looper callback.
///
/// `delta_time` is the raw (clamped) delta and applies to the first frame
/// of the batch only; subsequent frames see zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FramePlan {
    pub frames: u64,
    pub delta_time: f64,
}

#[derive(Debug)]
pub struct Clock {
    fps: f64,
    scale_factor: f64,
    max_frame_per_once: u64,
    delta_time_broken_threshold: f64,
    running: bool,
    total_delta: f64,
    wait_time: f64,
    wait_time_doubled: f64,
    wait_time_max: f64,
    skip_frame_wait_time: f64,
    real_max_frame_per_once: u64,
}

impl Clock {
    pub fn new(config: ClockConfig) -> Self {
        let mut clock = Self {
            fps: config.fps,
            scale_factor: config.scale_factor,
            max_frame_per_once: config.max_frame_per_once,
            delta_time_broken_threshold: config.delta_time_broken_threshold,
            running: false,
            total_delta: 0.0,
            wait_time: 0.0,
            wait_time_doubled: 0.0,
            wait_time_max: 0.0,
            skip_frame_wait_time: 0.0,
            real_max_frame_per_once: 0,
        };
        clock.update_wait_times();
        clock
    }

    fn update_wait_times(&mut self) {
        let real_fps = self.fps * self.scale_factor;
        self.wait_time = 1000.0 / real_fps;
        self.wait_time_doubled = (2000.0 / real_fps).floor().max(1.0);
        self.wait_time_max =
            ((self.scale_factor * 1000.0 * self.max_frame_per_once as f64) / real_fps)
                .floor()
                .max(1.0);
        self.skip_frame_wait_time = (self.wait_time * ANTICIPATE_RATE).floor();
        self.real_max_frame_per_once =
            ((self.max_frame_per_once as f64) * self.scale_factor) as u64;
    }

    pub fn start(&mut self) {
        self.total_delta = 0.0;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// The unscaled frame period in milliseconds.
    pub fn frame_time(&self) -> f64 {
        1000.0 / self.fps
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Changing the scale restarts accumulation: sub-frame time carried at
    /// the old scale is meaningless at the new one.
    pub fn change_scale_factor(&mut self, scale_factor: f64) {
        let was_running = self.running;
        if was_running {
            self.stop();
        }
        self.scale_factor = scale_factor;
        self.update_wait_times();
        if was_running {
            self.start();
        }
    }

    /// Accounts one looper delta and plans the frames it is worth.
    /// Returns `None` while stopped. A plan must be settled with `commit`
    /// before the next `plan` call.
    pub fn plan(&mut self, delta_ms: f64) -> Option<FramePlan> {
        if !self.running {
            return None;
        }
        if delta_ms <= 0.0 {
            return Some(FramePlan {
                frames: 0,
                delta_time: 0.0,
            });
        }
        // only the accumulator is clamped against a broken delta; the plan
        // carries the raw value so the frame handler can see the stall
        let accountable = if delta_ms > self.delta_time_broken_threshold {
            self.wait_time
        } else {
            delta_ms
        };
        self.total_delta += accountable;
        if self.total_delta <= self.skip_frame_wait_time {
            return Some(FramePlan {
                frames: 0,
                delta_time: delta_ms,
            });
        }
        let frames = if self.total_delta < self.wait_time_doubled {
            1
        } else if self.total_delta > self.wait_time_max {
            self.real_max_frame_per_once
        } else {
            (self.total_delta / self.wait_time) as u64
        };
        Some(FramePlan {
            frames,
            delta_time: delta_ms,
        })
    }

    /// Settles a plan after `consumed` of its frames actually ran (a batch
    /// may be interrupted). Returns the suggested wait until the next
    /// looper callback.
    pub fn commit(&mut self, consumed: u64) -> f64 {
        self.total_delta -= consumed as f64 * self.wait_time;
        self.wait_time - self.total_delta
    }
}
