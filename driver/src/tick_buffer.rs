//! Received-tick bookkeeping.
//!
//! Ticks arrive as pushed singles and as requested lists, in any order and
//! with duplicates. The buffer coalesces them into sorted, non-overlapping
//! half-open `TickRange`s, tracks the first missing age, and hands ticks
//! out strictly in age order.

use log::debug;
use ticklog_shared::{Age, EventKind, Tick, TickList, TickRange};

use crate::error::DriverError;
use crate::execution_mode::ExecutionMode;
use crate::log_service::{LogError, LogService};
use crate::tick_generator::StorageOnTick;

pub const DEFAULT_PREFETCH_THRESHOLD: u64 = 1800;
pub const DEFAULT_SIZE_REQUEST_ONCE: u64 = 9000;

/// Timestamps older than this far before the session start are assumed to
/// be session-relative rather than absolute, and rebased onto `started_at`.
/// Works around logs written by old recorders.
const OLD_TIMESTAMP_WINDOW: f64 = 86_400_000.0 * 10.0;

#[derive(Clone, Debug, PartialEq)]
pub enum ConsumedTick {
    /// A payload-bearing tick.
    Full(Tick),
    /// An age known to exist but carrying no payload.
    Empty(Age),
}

impl ConsumedTick {
    pub fn age(&self) -> Age {
        match self {
            ConsumedTick::Full(t) => t.age,
            ConsumedTick::Empty(age) => *age,
        }
    }
}

#[derive(Debug, Default)]
pub struct AddTickResult {
    /// The added tick closed the gap at the current age.
    pub got_next: bool,
    pub storage: Option<StorageOnTick>,
}

#[derive(Debug, Default)]
pub struct AddTickListResult {
    /// Half-open span actually inserted, after overlap trimming. `None`
    /// when the whole list was already known.
    pub inserted: Option<(Age, Age)>,
    pub storage: Vec<StorageOnTick>,
}

#[derive(Debug, Default)]
pub struct TickListOutcome {
    pub got_next: bool,
    /// The requested span is (still) empty on the log side.
    pub got_no_tick: bool,
    pub storage: Vec<StorageOnTick>,
}

#[derive(Clone, Debug)]
pub struct TickBufferConfig {
    pub execution_mode: ExecutionMode,
    pub started_at: f64,
    pub prefetch_threshold: u64,
    pub size_request_once: u64,
}

impl TickBufferConfig {
    pub fn new(execution_mode: ExecutionMode, started_at: f64) -> Self {
        Self {
            execution_mode,
            started_at,
            prefetch_threshold: DEFAULT_PREFETCH_THRESHOLD,
            size_request_once: DEFAULT_SIZE_REQUEST_ONCE,
        }
    }
}

pub struct TickBuffer {
    execution_mode: ExecutionMode,
    receiving: bool,
    current_age: Age,
    known_latest_age: Option<Age>,
    /// The smallest age >= `current_age` not covered by any range.
    nearest_absent_age: Age,
    ranges: Vec<TickRange>,
    /// Cached `read_next_tick_time` for the current age; invalidated by
    /// consumption and by insertions at the current age.
    next_tick_time_cache: Option<Option<f64>>,
    started_at: f64,
    old_timestamp_threshold: f64,
    prefetch_threshold: u64,
    size_request_once: u64,
    errors: Vec<DriverError>,
}

impl TickBuffer {
    pub fn new(config: TickBufferConfig) -> Self {
        Self {
            execution_mode: config.execution_mode,
            receiving: false,
            current_age: 0,
            known_latest_age: None,
            nearest_absent_age: 0,
            ranges: Vec::new(),
            next_tick_time_cache: None,
            started_at: config.started_at,
            old_timestamp_threshold: config.started_at - OLD_TIMESTAMP_WINDOW,
            prefetch_threshold: config.prefetch_threshold,
            size_request_once: config.size_request_once,
            errors: Vec::new(),
        }
    }

    pub fn current_age(&self) -> Age {
        self.current_age
    }

    pub fn known_latest_age(&self) -> Option<Age> {
        self.known_latest_age
    }

    pub fn has_next_tick(&self) -> bool {
        self.current_age != self.nearest_absent_age
    }

    pub fn start<L: LogService>(&mut self, log: &mut L) {
        self.receiving = true;
        self.update_subscription(log);
    }

    pub fn stop<L: LogService>(&mut self, log: &mut L) {
        self.receiving = false;
        self.update_subscription(log);
    }

    fn update_subscription<L: LogService>(&mut self, log: &mut L) {
        log.set_tick_subscription(self.receiving && self.execution_mode == ExecutionMode::Passive);
    }

    /// Switches roles, dropping everything buffered: the tick sequence an
    /// active instance generates need not match what was received.
    pub fn set_execution_mode<L: LogService>(&mut self, mode: ExecutionMode, log: &mut L) {
        if self.execution_mode == mode {
            return;
        }
        self.execution_mode = mode;
        self.ranges.clear();
        self.next_tick_time_cache = None;
        self.known_latest_age = Some(self.current_age);
        self.nearest_absent_age = self.current_age;
        self.update_subscription(log);
    }

    /// Adopts one tick, pushed or locally generated.
    pub fn add_tick(&mut self, tick: Tick) -> AddTickResult {
        let age = tick.age;
        self.known_latest_age = Some(self.known_latest_age.map_or(age, |k| k.max(age)));
        let storage = tick
            .storage
            .clone()
            .map(|records| StorageOnTick { age, records });
        let inserted = self.insert_tick(tick);
        let mut got_next = false;
        if inserted {
            if age == self.current_age {
                self.next_tick_time_cache = None;
            }
            if age == self.nearest_absent_age {
                got_next = self.current_age == age;
                self.nearest_absent_age = self.find_nearest_absent_age(age);
            }
        }
        self.assert_range_invariants();
        AddTickResult {
            got_next,
            storage: if inserted { storage } else { None },
        }
    }

    /// Adopts a requested tick list, trimming away the parts already held.
    pub fn add_tick_list(&mut self, list: TickList) -> AddTickListResult {
        let mut start = list.from;
        let mut end = list.to + 1;
        if start >= end {
            return AddTickListResult::default();
        }

        // trim the left edge against every range at or before it
        let mut i = 0;
        while i < self.ranges.len() && self.ranges[i].start <= start {
            if self.ranges[i].end > start {
                start = self.ranges[i].end;
            }
            i += 1;
        }
        // [i, j) covers the ranges fully inside the new span; the list is
        // authoritative for that span and replaces them
        let mut j = i;
        while j < self.ranges.len() && self.ranges[j].end <= end {
            j += 1;
        }
        if j < self.ranges.len() && self.ranges[j].start < end {
            end = self.ranges[j].start;
        }
        if start >= end {
            debug!("ignoring an already-covered tick list [{}, {}]", list.from, list.to);
            return AddTickListResult::default();
        }

        let ticks: Vec<Tick> = list
            .ticks
            .into_iter()
            .filter(|t| t.age >= start && t.age < end && t.has_payload())
            .collect();
        let storage: Vec<StorageOnTick> = ticks
            .iter()
            .filter_map(|t| {
                t.storage.clone().map(|records| StorageOnTick {
                    age: t.age,
                    records,
                })
            })
            .collect();
        self.ranges
            .splice(i..j, std::iter::once(TickRange { start, end, ticks }));
        // coalesce with touching neighbors so abutting coverage stays one range
        if i + 1 < self.ranges.len() && self.ranges[i].end == self.ranges[i + 1].start {
            let right = self.ranges.remove(i + 1);
            self.ranges[i].end = right.end;
            self.ranges[i].ticks.extend(right.ticks);
        }
        if i > 0 && self.ranges[i - 1].end == self.ranges[i].start {
            let merged = self.ranges.remove(i);
            self.ranges[i - 1].end = merged.end;
            self.ranges[i - 1].ticks.extend(merged.ticks);
        }
        self.known_latest_age = Some(self.known_latest_age.map_or(end - 1, |k| k.max(end - 1)));
        if start <= self.current_age && self.current_age < end {
            self.next_tick_time_cache = None;
        }
        if start <= self.nearest_absent_age && self.nearest_absent_age < end {
            self.nearest_absent_age = self.find_nearest_absent_age(self.nearest_absent_age);
        }
        self.assert_range_invariants();
        AddTickListResult {
            inserted: Some((start, end)),
            storage,
        }
    }

    /// Digests the completion of a tick-list request.
    pub fn on_tick_list_response(
        &mut self,
        result: Result<Option<TickList>, LogError>,
    ) -> TickListOutcome {
        let mut outcome = TickListOutcome::default();
        match result {
            Err(e) => {
                self.errors.push(DriverError::Log(e));
            }
            Ok(None) => {
                outcome.got_no_tick = true;
            }
            Ok(Some(list)) => {
                let may_got_next = self.current_age == self.nearest_absent_age;
                let added = self.add_tick_list(list);
                match added.inserted {
                    None => outcome.got_no_tick = true,
                    Some((start, end)) => {
                        outcome.storage = added.storage;
                        outcome.got_next =
                            may_got_next && start <= self.current_age && self.current_age < end;
                    }
                }
            }
        }
        outcome
    }

    /// Hands out the tick at the current age, advancing it. `None` while
    /// that age is absent. Prefetches more ticks when consumption gets
    /// within `prefetch_threshold` of the first absent age.
    pub fn consume<L: LogService>(&mut self, log: &mut L) -> Option<ConsumedTick> {
        loop {
            let start = self.ranges.first()?.start;
            if start > self.current_age {
                return None;
            }
            if start < self.current_age {
                // ranges below the current age linger after a jump forward
                let age = self.current_age;
                self.drop_until(age);
                if self.ranges.is_empty() {
                    return None;
                }
                continue;
            }
            if self.current_age + self.prefetch_threshold == self.nearest_absent_age {
                let from = self.nearest_absent_age;
                let len = self.size_request_once;
                self.request_ticks_from(log, from, len);
            }
            let age = self.current_age;
            self.current_age += 1;
            self.next_tick_time_cache = None;
            let front = &mut self.ranges[0];
            front.start = age + 1;
            let consumed = if front.ticks.first().map(|t| t.age) == Some(age) {
                ConsumedTick::Full(front.ticks.remove(0))
            } else {
                ConsumedTick::Empty(age)
            };
            if front.is_empty() {
                self.ranges.remove(0);
            }
            return Some(consumed);
        }
    }

    /// The wall-clock time of the next tick, when it carries a timestamp
    /// event. Cached per age.
    pub fn read_next_tick_time(&mut self) -> Option<f64> {
        if let Some(cached) = self.next_tick_time_cache {
            return cached;
        }
        let value = self.peek_next_tick_time();
        self.next_tick_time_cache = Some(value);
        value
    }

    fn peek_next_tick_time(&self) -> Option<f64> {
        let front = self.ranges.first()?;
        if front.start != self.current_age {
            return None;
        }
        let tick = front.ticks.first()?;
        if tick.age != self.current_age {
            return None;
        }
        for ev in tick.events.as_deref()? {
            if let EventKind::Timestamp { timestamp } = ev.kind {
                return Some(if timestamp < self.old_timestamp_threshold {
                    timestamp + self.started_at
                } else {
                    timestamp
                });
            }
        }
        None
    }

    /// Jumps consumption to `age`, discarding everything below it.
    pub fn set_current_age(&mut self, age: Age) {
        self.drop_until(age);
        self.next_tick_time_cache = None;
        self.current_age = age;
        self.nearest_absent_age = self.find_nearest_absent_age(age);
        self.assert_range_invariants();
    }

    /// Requests a default-sized batch starting at the current age.
    pub fn request_ticks<L: LogService>(&mut self, log: &mut L) {
        let from = self.current_age;
        let len = self.size_request_once;
        self.request_ticks_from(log, from, len);
    }

    /// Passive only; an active instance is its own tick source.
    pub fn request_ticks_from<L: LogService>(&mut self, log: &mut L, from: Age, len: u64) {
        if self.execution_mode != ExecutionMode::Passive || len == 0 {
            return;
        }
        log.request_tick_list(from, from + len - 1);
    }

    pub fn take_errors(&mut self) -> Vec<DriverError> {
        std::mem::take(&mut self.errors)
    }

    fn insert_tick(&mut self, tick: Tick) -> bool {
        let age = tick.age;
        // scan from the back; ticks mostly arrive at the tail
        let mut idx = self.ranges.len();
        while idx > 0 {
            let range = &self.ranges[idx - 1];
            if age >= range.end {
                break;
            }
            if age >= range.start {
                return false; // duplicate
            }
            idx -= 1;
        }
        let left_adjacent = idx > 0 && self.ranges[idx - 1].end == age;
        let right_adjacent = idx < self.ranges.len() && self.ranges[idx].start == age + 1;
        match (left_adjacent, right_adjacent) {
            (true, true) => {
                let right = self.ranges.remove(idx);
                let left = &mut self.ranges[idx - 1];
                left.end = right.end;
                if tick.has_payload() {
                    left.ticks.push(tick);
                }
                left.ticks.extend(right.ticks);
            }
            (true, false) => {
                let left = &mut self.ranges[idx - 1];
                left.end = age + 1;
                if tick.has_payload() {
                    left.ticks.push(tick);
                }
            }
            (false, true) => {
                let right = &mut self.ranges[idx];
                right.start = age;
                if tick.has_payload() {
                    right.ticks.insert(0, tick);
                }
            }
            (false, false) => {
                self.ranges.insert(idx, TickRange::from_tick(tick));
            }
        }
        true
    }

    fn find_nearest_absent_age(&self, mut age: Age) -> Age {
        let mut i = 0;
        while i < self.ranges.len() && self.ranges[i].end <= age {
            i += 1;
        }
        while i < self.ranges.len() && age >= self.ranges[i].start {
            age = self.ranges[i].end;
            i += 1;
        }
        age
    }

    fn drop_until(&mut self, age: Age) {
        while let Some(first) = self.ranges.first() {
            if first.end <= age {
                self.ranges.remove(0);
            } else {
                break;
            }
        }
        if let Some(first) = self.ranges.first_mut() {
            if first.start < age {
                first.start = age;
                first.ticks.retain(|t| t.age >= age);
            }
        }
    }

    fn assert_range_invariants(&self) {
        debug_assert!(
            self.ranges.windows(2).all(|w| w[0].end < w[1].start),
            "tick ranges must stay sorted, disjoint and coalesced"
        );
        debug_assert!(self.ranges.iter().all(|r| r.start < r.end));
        debug_assert!(self.ranges.iter().all(|r| {
            r.ticks.windows(2).all(|w| w[0].age < w[1].age)
                && r.ticks
                    .iter()
                    .all(|t| t.age >= r.start && t.age < r.end && t.has_payload())
        }));
    }
}
