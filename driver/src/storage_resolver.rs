use std::collections::HashMap;

use log::debug;
use ticklog_shared::{Age, StorageRecord, StorageValue};

use crate::tick_generator::StorageOnTick;

/// Identifies one storage load issued through the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StorageLoadId(pub u64);

/// A completed storage load: one value list per requested key, plus the
/// age usable as the serialization token for a deterministic re-read.
#[derive(Clone, Debug)]
pub struct StorageLoadResult {
    pub id: StorageLoadId,
    pub values: Vec<Vec<StorageValue>>,
    pub serialization: Age,
}

/// Matches storage loads against the storage data carried on ticks.
///
/// A load is keyed by the age of the tick that will carry (or carried) its
/// data; whichever side arrives first waits in a map for the other. The
/// tick is the serialization point, so every instance resolves the same
/// load to the same values.
#[derive(Default)]
pub struct StorageResolver {
    unresolved_loads: HashMap<Age, StorageLoadId>,
    unresolved_storages: HashMap<Age, Vec<StorageRecord>>,
    next_load_id: u64,
}

impl StorageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a load for the storage carried at `age`. Resolves
    /// immediately when that storage already arrived.
    pub fn register_load(&mut self, age: Age) -> (StorageLoadId, Option<StorageLoadResult>) {
        let id = StorageLoadId(self.next_load_id);
        self.next_load_id += 1;
        if let Some(records) = self.unresolved_storages.remove(&age) {
            return (id, Some(Self::resolve(id, age, records)));
        }
        if let Some(stale) = self.unresolved_loads.insert(age, id) {
            debug!("replacing an unresolved storage load {:?} at age {}", stale, age);
        }
        (id, None)
    }

    /// Feeds storage carried on a tick; resolves the waiting load if any,
    /// otherwise stashes the data for a later load at that age.
    pub fn on_storage_on_tick(&mut self, signal: StorageOnTick) -> Option<StorageLoadResult> {
        let StorageOnTick { age, records } = signal;
        match self.unresolved_loads.remove(&age) {
            Some(id) => Some(Self::resolve(id, age, records)),
            None => {
                self.unresolved_storages.insert(age, records);
                None
            }
        }
    }

    /// Drops pending state; used when the execution role changes.
    pub fn clear(&mut self) {
        self.unresolved_loads.clear();
        self.unresolved_storages.clear();
    }

    fn resolve(id: StorageLoadId, age: Age, records: Vec<StorageRecord>) -> StorageLoadResult {
        StorageLoadResult {
            id,
            values: records.into_iter().map(|r| r.values).collect(),
            serialization: age,
        }
    }
}
