use std::collections::HashMap;

use log::debug;
use ticklog_shared::{Event, EventKind, PlayerId};

/// A raw pointer sample from the platform, before resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointSample {
    pub kind: PointSampleKind,
    pub pointer_id: i64,
    pub x: f64,
    pub y: f64,
    /// Entity hit-tested by the caller at pointer-down time.
    pub target: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointSampleKind {
    Down,
    Move,
    Up,
}

struct PointRecord {
    target: Option<i64>,
    start_x: f64,
    start_y: f64,
    prev_x: f64,
    prev_y: f64,
}

/// Tracks pointers between down and up, deriving the per-move deltas that
/// point events carry. Samples for an unknown pointer (a move or up whose
/// down predates this instance) are dropped.
pub struct PointEventResolver {
    player_id: PlayerId,
    points: HashMap<i64, PointRecord>,
}

impl PointEventResolver {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            points: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, sample: PointSample) -> Option<Event> {
        let PointSample {
            kind,
            pointer_id,
            x,
            y,
            target,
        } = sample;
        match kind {
            PointSampleKind::Down => {
                self.points.insert(
                    pointer_id,
                    PointRecord {
                        target,
                        start_x: x,
                        start_y: y,
                        prev_x: x,
                        prev_y: y,
                    },
                );
                Some(Event::new(
                    EventKind::PointDown {
                        pointer_id,
                        x,
                        y,
                        target,
                    },
                    self.player_id.clone(),
                ))
            }
            PointSampleKind::Move => {
                let record = match self.points.get_mut(&pointer_id) {
                    Some(r) => r,
                    None => {
                        debug!("dropping a move sample for unknown pointer {}", pointer_id);
                        return None;
                    }
                };
                let ev = EventKind::PointMove {
                    pointer_id,
                    x,
                    y,
                    start_dx: x - record.start_x,
                    start_dy: y - record.start_y,
                    prev_dx: x - record.prev_x,
                    prev_dy: y - record.prev_y,
                    target: record.target,
                };
                record.prev_x = x;
                record.prev_y = y;
                Some(Event::new(ev, self.player_id.clone()))
            }
            PointSampleKind::Up => {
                let record = match self.points.remove(&pointer_id) {
                    Some(r) => r,
                    None => {
                        debug!("dropping an up sample for unknown pointer {}", pointer_id);
                        return None;
                    }
                };
                Some(Event::new(
                    EventKind::PointUp {
                        pointer_id,
                        x,
                        y,
                        start_dx: x - record.start_x,
                        start_dy: y - record.start_y,
                        prev_dx: x - record.prev_x,
                        prev_dy: y - record.prev_y,
                        target: record.target,
                    },
                    self.player_id.clone(),
                ))
            }
        }
    }
}
