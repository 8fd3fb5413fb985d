use crate::event::Event;
use crate::storage::StorageRecord;
use crate::types::Age;

/// The unit of simulation advancement: zero or more events and optional
/// storage data for one age. Immutable once sent to the log service.
#[derive(Clone, Debug, PartialEq)]
pub struct Tick {
    pub age: Age,
    pub events: Option<Vec<Event>>,
    pub storage: Option<Vec<StorageRecord>>,
}

impl Tick {
    pub fn empty(age: Age) -> Self {
        Self {
            age,
            events: None,
            storage: None,
        }
    }

    /// A tick with no payload is not kept individually by buffers; its age
    /// alone is recorded through range bookkeeping.
    pub fn has_payload(&self) -> bool {
        self.events.is_some() || self.storage.is_some()
    }
}

/// Wire form of a run of ticks: `[from, to]` is inclusive on both ends and
/// `ticks` holds only the payload-bearing ticks in that span.
#[derive(Clone, Debug, PartialEq)]
pub struct TickList {
    pub from: Age,
    pub to: Age,
    pub ticks: Vec<Tick>,
}

/// In-memory form used by the tick buffer: a half-open interval
/// `[start, end)` of confirmed-present ages. `ticks` holds only the
/// payload-bearing ticks, in age order.
#[derive(Clone, Debug, PartialEq)]
pub struct TickRange {
    pub start: Age,
    pub end: Age,
    pub ticks: Vec<Tick>,
}

impl TickRange {
    pub fn from_tick(tick: Tick) -> Self {
        let age = tick.age;
        let ticks = if tick.has_payload() { vec![tick] } else { Vec::new() };
        Self {
            start: age,
            end: age + 1,
            ticks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}
