use log::debug;
use ticklog_shared::{Age, StorageKey, StorageRecord, Tick};

use crate::error::DriverError;
use crate::event_buffer::EventBuffer;
use crate::join_resolver::JoinResolver;
use crate::log_service::{LogError, LogService, StorageRequestId};

/// Storage records attached to a freshly generated or received tick,
/// addressed to the storage resolver.
#[derive(Clone, Debug)]
pub struct StorageOnTick {
    pub age: Age,
    pub records: Vec<StorageRecord>,
}

/// Produces the authoritative tick sequence while this instance is active.
///
/// At most one storage-carrying tick may be pending at a time; while it is,
/// generation and age manipulation are frozen.
pub struct TickGenerator {
    next_age: Age,
    generating: bool,
    waiting_storage: Option<StorageRequestId>,
    storage_for_next: Option<Vec<StorageRecord>>,
    join_resolver: JoinResolver,
    errors: Vec<DriverError>,
}

impl TickGenerator {
    pub fn new(keys_for_join: Option<Vec<StorageKey>>) -> Self {
        Self {
            next_age: 0,
            generating: false,
            waiting_storage: None,
            storage_for_next: None,
            join_resolver: JoinResolver::new(keys_for_join),
            errors: Vec::new(),
        }
    }

    pub fn next_age(&self) -> Age {
        self.next_age
    }

    pub fn start(&mut self) {
        self.generating = true;
    }

    pub fn stop(&mut self) {
        self.generating = false;
    }

    pub fn waiting_storage(&self) -> bool {
        self.waiting_storage.is_some()
    }

    /// Generates the next tick, if generating and not frozen on storage.
    /// Pending join/leave events are funneled through the join resolver;
    /// only its resolved prefix is embedded.
    pub fn next<L: LogService>(
        &mut self,
        event_buffer: &mut EventBuffer,
        log: &mut L,
    ) -> Option<Tick> {
        if !self.generating || self.waiting_storage.is_some() {
            return None;
        }
        Some(self.generate(event_buffer, log))
    }

    /// Generates one tick regardless of the generating flag.
    pub fn force_next<L: LogService>(
        &mut self,
        event_buffer: &mut EventBuffer,
        log: &mut L,
    ) -> Result<Tick, DriverError> {
        if self.waiting_storage.is_some() {
            return Err(DriverError::ForceTickWhileWaitingStorage);
        }
        Ok(self.generate(event_buffer, log))
    }

    fn generate<L: LogService>(&mut self, event_buffer: &mut EventBuffer, log: &mut L) -> Tick {
        if let Some(join_leaves) = event_buffer.read_join_leaves() {
            for ev in join_leaves {
                self.join_resolver.request(ev, log);
            }
        }
        let mut events = event_buffer.read_events().unwrap_or_default();
        if let Some(resolved) = self.join_resolver.read_resolved() {
            events.extend(resolved);
        }
        let age = self.next_age;
        self.next_age += 1;
        Tick {
            age,
            events: if events.is_empty() { None } else { Some(events) },
            storage: self.storage_for_next.take(),
        }
    }

    pub fn set_next_age(&mut self, age: Age) -> Result<(), DriverError> {
        if self.waiting_storage.is_some() {
            return Err(DriverError::SetNextAgeWhileWaitingStorage(age));
        }
        self.next_age = age;
        Ok(())
    }

    /// Requests storage to be carried on the next generated tick. Returns
    /// the age that tick will have.
    pub fn request_storage_tick<L: LogService>(
        &mut self,
        keys: &[StorageKey],
        log: &mut L,
    ) -> Result<Age, DriverError> {
        if self.waiting_storage.is_some() {
            return Err(DriverError::StorageRequestInFlight);
        }
        self.waiting_storage = Some(log.request_storage(keys));
        Ok(self.next_age)
    }

    /// Routes one storage completion to either the pending storage tick or
    /// the join resolver. Stale completions are dropped.
    pub fn on_storage_response(
        &mut self,
        id: StorageRequestId,
        result: Result<Vec<StorageRecord>, LogError>,
    ) -> Option<StorageOnTick> {
        if self.waiting_storage == Some(id) {
            self.waiting_storage = None;
            return match result {
                Ok(records) => {
                    self.storage_for_next = Some(records.clone());
                    Some(StorageOnTick {
                        age: self.next_age,
                        records,
                    })
                }
                Err(e) => {
                    self.errors.push(DriverError::Log(e));
                    None
                }
            };
        }
        if !self.join_resolver.on_storage_response(id, result) {
            debug!("dropping a stale storage completion: {:?}", id);
        }
        None
    }

    /// Resets generation state for a role change. The join queue is
    /// dropped wholesale; the next active instance rebuilds it.
    pub fn reset(&mut self, next_age: Age) {
        self.next_age = next_age;
        self.waiting_storage = None;
        self.storage_for_next = None;
        self.join_resolver.clear();
    }

    pub fn take_errors(&mut self) -> Vec<DriverError> {
        let mut errors = std::mem::take(&mut self.errors);
        errors.extend(self.join_resolver.take_errors());
        errors
    }
}
