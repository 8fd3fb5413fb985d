//! In-memory `LogService`, for tests and offline replay of a prepared log.
//!
//! Requests complete on the next `poll` unless completion is explicitly
//! held back, which lets tests exercise out-of-order and stale-completion
//! paths.

use std::collections::{BTreeMap, HashMap, VecDeque};

use ticklog_shared::{
    Age, Event, StartPoint, StorageKey, StorageRecord, StorageValue, Tick, TickList,
};

use crate::log_service::{
    LogError, LogResponse, LogService, Permission, StartPointQuery, StorageRequestId,
};

/// Token granting the active-instance permission set.
pub const TOKEN_ACTIVE: &str = "mtk-active";
/// Token granting the passive-instance permission set.
pub const TOKEN_PASSIVE: &str = "mtk-passive";

pub struct MemoryLog {
    started_at: f64,
    ticks: BTreeMap<Age, Tick>,
    start_points: Vec<StartPoint>,
    storage: HashMap<String, StorageValue>,
    responses: VecDeque<LogResponse>,
    next_storage_request: u64,
    issued_storage_ids: Vec<StorageRequestId>,
    held_storage: Vec<(StorageRequestId, Vec<StorageRecord>)>,
    hold_storage: bool,
    tick_subscription: bool,
    event_subscription: bool,
    sent_events: Vec<Event>,
    requested_tick_spans: Vec<(Age, Age)>,
}

impl MemoryLog {
    pub fn new(started_at: f64) -> Self {
        Self {
            started_at,
            ticks: BTreeMap::new(),
            start_points: Vec::new(),
            storage: HashMap::new(),
            responses: VecDeque::new(),
            next_storage_request: 0,
            issued_storage_ids: Vec::new(),
            held_storage: Vec::new(),
            hold_storage: false,
            tick_subscription: false,
            event_subscription: false,
            sent_events: Vec::new(),
            requested_tick_spans: Vec::new(),
        }
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    /// Preloads a tick as if another instance had submitted it.
    pub fn preload_tick(&mut self, tick: Tick) {
        self.ticks.insert(tick.age, tick);
    }

    pub fn preload_start_point(&mut self, start_point: StartPoint) {
        self.start_points.push(start_point);
    }

    pub fn preload_storage(&mut self, key: &StorageKey, value: StorageValue) {
        self.storage.insert(key.region_key.clone(), value);
    }

    /// Queues a tick as pushed over the tick subscription.
    pub fn push_tick(&mut self, tick: Tick) {
        self.ticks.insert(tick.age, tick.clone());
        if self.tick_subscription {
            self.responses.push_back(LogResponse::Tick(tick));
        }
    }

    /// Queues an event as pushed over the event subscription.
    pub fn push_event(&mut self, event: Event) {
        if self.event_subscription {
            self.responses.push_back(LogResponse::Event(event));
        }
    }

    /// While held, storage completions queue up for `release_storage`.
    pub fn set_hold_storage(&mut self, hold: bool) {
        self.hold_storage = hold;
    }

    /// Releases one held storage completion, in any order.
    pub fn release_storage(&mut self, id: StorageRequestId) {
        if let Some(pos) = self.held_storage.iter().position(|(held, _)| *held == id) {
            let (id, records) = self.held_storage.remove(pos);
            self.responses.push_back(LogResponse::Storage {
                id,
                result: Ok(records),
            });
        }
    }

    pub fn tick_subscribed(&self) -> bool {
        self.tick_subscription
    }

    pub fn event_subscribed(&self) -> bool {
        self.event_subscription
    }

    pub fn stored_ticks(&self) -> Vec<Tick> {
        self.ticks.values().cloned().collect()
    }

    pub fn stored_tick_count(&self) -> usize {
        self.ticks.len()
    }

    pub fn sent_events(&self) -> &[Event] {
        &self.sent_events
    }

    pub fn requested_tick_spans(&self) -> Vec<(Age, Age)> {
        self.requested_tick_spans.clone()
    }

    pub fn pending_storage_request_ids(&self) -> Vec<StorageRequestId> {
        self.issued_storage_ids.clone()
    }

    pub fn start_points(&self) -> &[StartPoint] {
        &self.start_points
    }

    fn read_storage(&self, keys: &[StorageKey]) -> Vec<StorageRecord> {
        keys.iter()
            .map(|key| StorageRecord {
                read_key: key.clone(),
                values: self
                    .storage
                    .get(&key.region_key)
                    .cloned()
                    .into_iter()
                    .collect(),
            })
            .collect()
    }
}

impl LogService for MemoryLog {
    fn authenticate(&mut self, token: &str) -> Result<Permission, LogError> {
        let permission = match token {
            TOKEN_ACTIVE => Permission {
                write_tick: true,
                read_tick: true,
                subscribe_tick: false,
                send_event: false,
                subscribe_event: true,
                max_event_priority: 2,
            },
            TOKEN_PASSIVE => Permission {
                write_tick: false,
                read_tick: true,
                subscribe_tick: true,
                send_event: true,
                subscribe_event: false,
                max_event_priority: 2,
            },
            _ => Permission {
                write_tick: true,
                read_tick: true,
                subscribe_tick: true,
                send_event: true,
                subscribe_event: true,
                max_event_priority: 2,
            },
        };
        Ok(permission)
    }

    /// Stores a tick, stripping transient events the way a persistent log
    /// would. Re-submitting an existing age is rejected.
    fn send_tick(&mut self, tick: &Tick) -> Result<(), LogError> {
        if self.ticks.contains_key(&tick.age) {
            return Err(LogError::TickAlreadyExists(tick.age));
        }
        let events = tick.events.as_ref().map(|evs| {
            evs.iter()
                .filter(|e| !e.is_transient())
                .cloned()
                .collect::<Vec<_>>()
        });
        let stored = Tick {
            age: tick.age,
            events: match events {
                Some(evs) if !evs.is_empty() => Some(evs),
                _ => None,
            },
            storage: tick.storage.clone(),
        };
        self.ticks.insert(stored.age, stored);
        Ok(())
    }

    fn send_event(&mut self, event: &Event) -> Result<(), LogError> {
        self.sent_events.push(event.clone());
        Ok(())
    }

    fn request_tick_list(&mut self, from: Age, to: Age) {
        self.requested_tick_spans.push((from, to));
        let last_known = self.ticks.keys().next_back().copied();
        let result = match last_known {
            Some(last) if from <= last => {
                let to = to.min(last);
                let ticks = self
                    .ticks
                    .range(from..=to)
                    .map(|(_, t)| t.clone())
                    .filter(Tick::has_payload)
                    .collect();
                Ok(Some(TickList { from, to, ticks }))
            }
            _ => Ok(None),
        };
        self.responses.push_back(LogResponse::TickList(result));
    }

    fn request_start_point(&mut self, query: &StartPointQuery) {
        let best = self
            .start_points
            .iter()
            .filter(|sp| match (query.frame, query.timestamp) {
                (Some(frame), _) => sp.frame <= frame,
                (None, Some(timestamp)) => sp.timestamp <= timestamp,
                (None, None) => true,
            })
            .max_by(|a, b| {
                if query.frame.is_some() {
                    a.frame.cmp(&b.frame)
                } else {
                    a.timestamp.total_cmp(&b.timestamp)
                }
            })
            .cloned();
        self.responses.push_back(LogResponse::StartPoint(
            best.ok_or(LogError::NoStartPoint),
        ));
    }

    fn request_storage(&mut self, keys: &[StorageKey]) -> StorageRequestId {
        let id = StorageRequestId(self.next_storage_request);
        self.next_storage_request += 1;
        self.issued_storage_ids.push(id);
        let records = self.read_storage(keys);
        if self.hold_storage {
            self.held_storage.push((id, records));
        } else {
            self.responses.push_back(LogResponse::Storage {
                id,
                result: Ok(records),
            });
        }
        id
    }

    fn put_start_point(&mut self, start_point: &StartPoint) {
        self.start_points.push(start_point.clone());
        self.responses.push_back(LogResponse::StartPointPut(Ok(())));
    }

    fn put_storage(&mut self, key: &StorageKey, value: &StorageValue) {
        self.storage.insert(key.region_key.clone(), value.clone());
        self.responses.push_back(LogResponse::StoragePut(Ok(())));
    }

    fn set_tick_subscription(&mut self, on: bool) {
        self.tick_subscription = on;
    }

    fn set_event_subscription(&mut self, on: bool) {
        self.event_subscription = on;
    }

    fn poll(&mut self) -> Vec<LogResponse> {
        self.responses.drain(..).collect()
    }
}
